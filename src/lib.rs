//! xjson: a lazy, zero-copy JSON query library with an XPath-like path
//! language (see SPEC_FULL.md for the full design). Containers don't
//! materialize their children until something asks for them, and edits are
//! applied in place — `Root::parse` does no more work than sniffing the
//! leading byte of the document.
//!
//! ```
//! use xjson::Root;
//!
//! let root = Root::parse(br#"{"user":{"name":"ada","active":true}}"#.to_vec()).unwrap();
//! let name = root.node().query("/user/name");
//! assert_eq!(name.string_value().as_deref(), Some("ada"));
//! ```

mod config;
mod error;
mod eval;
mod filter;
mod funcs;
pub mod iter;
mod node;
mod path;
mod scan;
#[cfg(feature = "serde")]
mod ser;

pub use config::Options;
pub use error::{Error, Result};
pub use funcs::{FuncTable, NodeFn};
pub use node::{Node, Type};

use std::sync::Arc;

/// Owns a document's backing byte buffer and its top-level node. Every
/// `Node` reachable from it shares the same `Arc<[u8]>`, so cloning a
/// `Node` anywhere in the tree is one refcount bump, not a copy.
pub struct Root {
    node: Node,
    options: Options,
}

impl Root {
    /// Parses `bytes` with default options (spec §5: 50-deep recursion
    /// cap). The top-level value's kind is sniffed immediately; nothing
    /// underneath it is parsed until queried.
    pub fn parse(bytes: Vec<u8>) -> Result<Root> {
        Root::parse_with_options(bytes, Options::default())
    }

    pub fn parse_with_options(bytes: Vec<u8>, options: Options) -> Result<Root> {
        let raw: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
        let (node, _end) = Node::parse_value(&raw, 0, FuncTable::new(), None).map_err(|e| {
            tracing::trace!(error = %e, "top-level document parse failed");
            e
        })?;
        node.set_max_depth(options.max_depth);
        Ok(Root { node, options })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Consumes the `Root`, handing back its top-level node. The backing
    /// buffer stays alive as long as any `Node` derived from it does.
    pub fn into_node(self) -> Node {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_document() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        assert_eq!(root.node().get("a").int(), Some(1));
    }

    #[test]
    fn parses_array_document() {
        let root = Root::parse(br#"[1,2,3]"#.to_vec()).unwrap();
        assert_eq!(root.node().len(), 3);
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(Root::parse(b"{".to_vec()).is_err());
    }

    #[test]
    fn custom_options_are_retained() {
        let opts = Options { max_depth: 5 };
        let root = Root::parse_with_options(br#"{}"#.to_vec(), opts).unwrap();
        assert_eq!(root.options().max_depth, 5);
    }

    #[test]
    fn custom_max_depth_is_enforced_during_descendant_search() {
        let doc = br#"{"a":{"a":{"a":{"a":{"a":{"name":1}}}}}}"#.to_vec();

        let deep_cap = Root::parse_with_options(doc.clone(), Options { max_depth: 5 }).unwrap();
        assert!(!deep_cap.node().query("//name").is_valid());

        let default_cap = Root::parse(doc).unwrap();
        assert_eq!(default_cap.node().query("//name").int(), Some(1));
    }
}
