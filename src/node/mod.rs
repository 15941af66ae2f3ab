//! Node Model (spec §3, §4.4): a tagged sum over JSON value kinds sharing a
//! single allocation (`NodeCell`) so that `parent` can be a homogeneous
//! `Weak<NodeCell>` back-reference regardless of which kind a node is.

mod array;
mod capability;
mod object;
mod prim;

pub use capability::Type;
pub(crate) use capability::synthetic_array;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::Error;
use crate::funcs::FuncTable;

pub(crate) use array::ArrayData;
pub(crate) use object::ObjectData;
pub(crate) use prim::{PrimData, Raw, StringData};

/// A handle to a JSON node. Cheap to clone (one `Arc` bump); every clone
/// shares the same underlying raw buffer and, for containers, the same
/// lazily-populated child cache.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeCell>);

pub(crate) struct NodeCell {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Mutex<Option<Weak<NodeCell>>>,
    pub(crate) err: Mutex<Option<Error>>,
    pub(crate) funcs: Mutex<FuncTable>,
    /// Recursion depth cap, meaningful only on a document's root cell —
    /// `eval.rs` walks up to the root before reading it. Every other node
    /// just carries the crate-default value unused.
    pub(crate) max_depth: AtomicUsize,
}

pub(crate) enum NodeKind {
    Object(ObjectData),
    Array(ArrayData),
    Str(StringData),
    Number(PrimData),
    Bool(PrimData),
    Null(PrimData),
    Invalid,
}

impl Node {
    pub(crate) fn from_kind(kind: NodeKind, funcs: FuncTable, parent: Option<Weak<NodeCell>>) -> Node {
        Node(Arc::new(NodeCell {
            kind,
            parent: Mutex::new(parent),
            err: Mutex::new(None),
            funcs: Mutex::new(funcs),
            max_depth: AtomicUsize::new(crate::config::Options::default().max_depth),
        }))
    }

    /// Overrides the recursion depth cap this node's cell carries. Only
    /// meaningful when called on a document's root node; see `max_depth`.
    pub(crate) fn set_max_depth(&self, depth: usize) {
        self.0.max_depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.0.max_depth.load(Ordering::Relaxed)
    }

    /// An immutable error sentinel. Every capability on it is a no-op that
    /// hands back the same error.
    pub fn invalid(err: Error) -> Node {
        let node = Node::from_kind(NodeKind::Invalid, FuncTable::new(), None);
        *node.0.err.lock().unwrap() = Some(err);
        node
    }

    /// Builds a standalone string value, detached from any document, for
    /// use with `set`/`append` or as a filter-expression literal.
    pub fn from_string(text: impl Into<String>) -> Node {
        let data = StringData::literal(text.into());
        Node::from_kind(NodeKind::Str(data), FuncTable::new(), None)
    }

    pub fn from_number(value: f64) -> Node {
        let data = PrimData::literal(format_number(value));
        Node::from_kind(NodeKind::Number(data), FuncTable::new(), None)
    }

    pub fn from_bool(value: bool) -> Node {
        let data = PrimData::literal(if value { "true".into() } else { "false".into() });
        Node::from_kind(NodeKind::Bool(data), FuncTable::new(), None)
    }

    pub fn null_value() -> Node {
        let data = PrimData::literal("null".into());
        Node::from_kind(NodeKind::Null(data), FuncTable::new(), None)
    }

    pub fn new_object() -> Node {
        Node::from_kind(NodeKind::Object(ObjectData::new_empty()), FuncTable::new(), None)
    }

    pub fn new_array() -> Node {
        Node::from_kind(NodeKind::Array(ArrayData::new_empty()), FuncTable::new(), None)
    }

    pub(crate) fn weak(&self) -> Weak<NodeCell> {
        Arc::downgrade(&self.0)
    }

    pub(crate) fn set_parent(&self, parent: Weak<NodeCell>) {
        *self.0.parent.lock().unwrap() = Some(parent);
    }

    pub(crate) fn parent_cell(&self) -> Option<Arc<NodeCell>> {
        self.0.parent.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Rewraps an already-live cell (e.g. from `parent_cell()`) as a `Node`
    /// handle, used by the evaluator for `..` navigation and root lookup.
    pub(crate) fn from_cell(cell: Arc<NodeCell>) -> Node {
        Node(cell)
    }

    /// Builds the right node kind for the raw value starting at `pos`,
    /// sniffing the leading byte. Containers are lazy stubs; primitives are
    /// materialized eagerly (spec §4.5 "Construction").
    pub(crate) fn parse_value(
        raw: &Raw,
        pos: usize,
        funcs: FuncTable,
        parent: Option<Weak<NodeCell>>,
    ) -> crate::error::Result<(Node, usize)> {
        let pos = crate::scan::skip_whitespace(raw, pos);
        match raw.get(pos) {
            Some(b'{') => {
                let end = crate::scan::find_matching_brace(raw, pos, 0)?;
                let data = ObjectData::new_lazy(raw.clone(), pos, end);
                let node = Node::from_kind(NodeKind::Object(data), funcs, parent);
                Ok((node, end))
            }
            Some(b'[') => {
                let end = crate::scan::find_matching_bracket(raw, pos, 0)?;
                let data = ArrayData::new_lazy(raw.clone(), pos, end);
                let node = Node::from_kind(NodeKind::Array(data), funcs, parent);
                Ok((node, end))
            }
            Some(b'"') => {
                let (data, end) = StringData::from_raw(raw.clone(), pos)?;
                Ok((Node::from_kind(NodeKind::Str(data), funcs, parent), end))
            }
            Some(b't' | b'f') => {
                let (data, end) = PrimData::bool(raw.clone(), pos)?;
                Ok((Node::from_kind(NodeKind::Bool(data), funcs, parent), end))
            }
            Some(b'n') => {
                let (data, end) = PrimData::null(raw.clone(), pos)?;
                Ok((Node::from_kind(NodeKind::Null(data), funcs, parent), end))
            }
            Some(b'-' | b'0'..=b'9') => {
                let (data, end) = PrimData::number(raw.clone(), pos)?;
                Ok((Node::from_kind(NodeKind::Number(data), funcs, parent), end))
            }
            Some(c) => Err(Error::ParseError(format!("unexpected byte {:#04x}", c))),
            None => Err(Error::ParseError("unexpected end of input".into())),
        }
    }

    /// Marks every Object/Array ancestor dirty, stopping as soon as an
    /// already-dirty ancestor is found (its own ancestors were marked when
    /// it first became dirty).
    pub(crate) fn propagate_dirty(&self) {
        let mut current = self.parent_cell();
        while let Some(cell) = current {
            let became_dirty = match &cell.kind {
                NodeKind::Object(o) => !o.dirty.swap(true, Ordering::AcqRel),
                NodeKind::Array(a) => !a.dirty.swap(true, Ordering::AcqRel),
                _ => false,
            };
            if !became_dirty {
                break;
            }
            current = cell.parent.lock().unwrap().as_ref().and_then(Weak::upgrade);
        }
    }
}

/// Renders an `f64` the way the serializer wants numbers to look: integral
/// values without a trailing `.0`, everything else via the shortest
/// round-tripping decimal `std` can produce.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.kind())
            .field("raw", &self.raw())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn dirty_propagates_through_every_ancestor() {
        let root = Root::parse(br#"{"a":{"b":{"c":1}}}"#.to_vec()).unwrap();
        let before_a = root.node().get("a").string();
        let before_root = root.node().string();

        root.node().get("a").get("b").set("c", crate::Node::from_number(2.0));

        assert_ne!(root.node().get("a").string(), before_a);
        assert_ne!(root.node().string(), before_root);
        assert!(root.node().string().contains(r#""c":2"#));
    }

    #[test]
    fn clean_sibling_subtree_keeps_original_raw_bytes() {
        let root = Root::parse(br#"{"a":1,"b":{"untouched":true}}"#.to_vec()).unwrap();
        root.node().set("a", crate::Node::from_number(2.0));
        assert_eq!(root.node().get("b").string(), r#"{"untouched":true}"#);
    }

    #[test]
    fn parent_link_resolves_back_to_container() {
        let root = Root::parse(br#"{"a":{"b":1}}"#.to_vec()).unwrap();
        let b = root.node().get("a").get("b");
        let cell = b.parent_cell().expect("b has a parent");
        let parent = Node::from_cell(cell);
        assert_eq!(parent.get("b").int(), Some(1));
    }
}
