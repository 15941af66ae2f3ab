//! The capability surface shared by every node kind (spec §4.4).
//!
//! Sticky-error convention used throughout: a read-only query that fails
//! (wrong type, missing key, out-of-range index) returns a *new* `Invalid`
//! sibling and leaves the receiver untouched; a mutation that fails marks
//! the receiver's own `err` and returns the receiver unchanged. Either way,
//! `is_valid()` on the result reflects the failure and every further
//! chained call short-circuits.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::Error;
use crate::funcs::NodeFn;

use super::{array, object, ArrayData, Node, NodeKind, ObjectData};

/// The tag of a node's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
    Invalid,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Object => "object",
            Type::Array => "array",
            Type::String => "string",
            Type::Number => "number",
            Type::Bool => "bool",
            Type::Null => "null",
            Type::Invalid => "invalid",
        }
    }
}

impl Node {
    pub fn kind(&self) -> Type {
        match &self.0.kind {
            NodeKind::Object(_) => Type::Object,
            NodeKind::Array(_) => Type::Array,
            NodeKind::Str(_) => Type::String,
            NodeKind::Number(_) => Type::Number,
            NodeKind::Bool(_) => Type::Bool,
            NodeKind::Null(_) => Type::Null,
            NodeKind::Invalid => Type::Invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0.err.lock().unwrap().is_none()
    }

    pub fn error(&self) -> Option<Error> {
        self.0.err.lock().unwrap().clone()
    }

    /// Marks this node's own error slot (mutating methods only; see module
    /// docs). A no-op if an error is already recorded, preserving "first
    /// error sticks".
    pub(crate) fn fail(&self, err: Error) {
        let mut slot = self.0.err.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn type_error(&self, expected: &'static str) -> Node {
        Node::invalid(Error::TypeAssertion {
            expected,
            found: self.kind().name(),
        })
    }

    /// Re-serializes compact JSON for this subtree (empty string if this
    /// node is invalid). Reuses the original raw slice for clean subtrees.
    pub fn string(&self) -> String {
        match &self.0.kind {
            NodeKind::Object(d) => object::to_string(self, d),
            NodeKind::Array(d) => array::to_string(self, d),
            NodeKind::Str(d) => d.raw_slice().into_owned(),
            NodeKind::Number(d) => d.text().to_string(),
            NodeKind::Bool(d) => d.text().to_string(),
            NodeKind::Null(d) => d.text().to_string(),
            NodeKind::Invalid => String::new(),
        }
    }

    /// Alias for `string()`, named to mirror the `raw()` accessor in spec
    /// §4.4.
    pub fn raw(&self) -> String {
        self.string()
    }

    /// Best-effort dotted/bracketed label built by walking `parent`
    /// back-links, identifying each step by searching the parent container
    /// for the child that is (by pointer identity) this node. Falls back to
    /// `"/?"` if a step's container no longer holds this exact node (e.g. it
    /// was replaced by a later `set`) or a link points at a non-container.
    pub fn path(&self) -> String {
        let mut segments = Vec::new();
        let mut current = self.clone();
        while let Some(cell) = current.parent_cell() {
            let parent = Node::from_cell(cell);
            let segment = match parent.kind() {
                Type::Object => parent
                    .keys()
                    .into_iter()
                    .find(|k| Arc::ptr_eq(&parent.get(k).0, &current.0)),
                Type::Array => parent
                    .array_value()
                    .unwrap_or_default()
                    .iter()
                    .position(|v| Arc::ptr_eq(&v.0, &current.0))
                    .map(|i| i.to_string()),
                _ => None,
            };
            match segment {
                Some(s) => segments.push(s),
                None => return "/?".to_string(),
            }
            current = parent;
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Re-serializes without attempting a string re-quote: for `String`
    /// nodes, zero-copy when the original had no escapes.
    pub fn raw_string(&self) -> String {
        match &self.0.kind {
            NodeKind::Str(d) => d.raw_slice().into_owned(),
            _ => self.string(),
        }
    }

    // --- typed accessors -------------------------------------------------

    pub fn string_value(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Str(d) => Some(d.text.clone()),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<f64> {
        match &self.0.kind {
            NodeKind::Number(d) => d.as_f64().ok(),
            _ => None,
        }
    }

    pub fn raw_float(&self) -> f64 {
        self.float().unwrap_or_default()
    }

    pub fn int(&self) -> Option<i64> {
        self.float().map(|f| f as i64)
    }

    pub fn bool_value(&self) -> Option<bool> {
        match &self.0.kind {
            NodeKind::Bool(d) => Some(d.as_bool()),
            _ => None,
        }
    }

    /// Parses a `String` node as RFC 3339 via `chrono` (the "standard time
    /// library" delegated to per spec §1/SPEC_FULL.md).
    pub fn time(&self) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        let s = self.string_value()?;
        chrono::DateTime::parse_from_rfc3339(&s).ok()
    }

    pub fn array_value(&self) -> Option<Vec<Node>> {
        match &self.0.kind {
            NodeKind::Array(d) => Some(array::elements(d, self)),
            _ => None,
        }
    }

    /// Returns string projections of every array element, silently
    /// skipping non-string elements (see SPEC_FULL.md's note on this
    /// lenient-projection decision).
    pub fn strings(&self) -> Vec<String> {
        self.array_value()
            .into_iter()
            .flatten()
            .filter_map(|n| n.string_value())
            .collect()
    }

    /// Snapshot as a sorted map (objects only).
    pub fn as_map(&self) -> Option<BTreeMap<String, Node>> {
        match &self.0.kind {
            NodeKind::Object(d) => {
                let _ = object::lazy_parse(self, d);
                let state = d.state.lock().unwrap();
                Some(state.value.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            _ => None,
        }
    }

    /// Fully materializes this subtree into a plain `serde_json::Value`
    /// (spec §4.4's `interface` accessor — the dynamically-typed generic
    /// value escape hatch, independent of the optional `serde` feature's
    /// `Serialize` impl on `Node` itself). An `Invalid` node materializes as
    /// `Value::Null`.
    pub fn interface(&self) -> serde_json::Value {
        match self.kind() {
            Type::Object => {
                let mut map = serde_json::Map::new();
                for key in self.keys() {
                    map.insert(key.clone(), self.get(&key).interface());
                }
                serde_json::Value::Object(map)
            }
            Type::Array => serde_json::Value::Array(
                self.array_value()
                    .unwrap_or_default()
                    .iter()
                    .map(Node::interface)
                    .collect(),
            ),
            Type::String => serde_json::Value::String(self.string_value().unwrap_or_default()),
            Type::Number => serde_json::Number::from_f64(self.raw_float())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Type::Bool => serde_json::Value::Bool(self.bool_value().unwrap_or(false)),
            Type::Null | Type::Invalid => serde_json::Value::Null,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match &self.0.kind {
            NodeKind::Object(d) => object::sorted_keys(d, self),
            _ => Vec::new(),
        }
    }

    /// `(key, value)` pairs in document order, used by descendant search
    /// (spec §4.7's Descendant tie-break); empty for non-objects.
    pub(crate) fn object_entries_doc_order(&self) -> Vec<(String, Node)> {
        match &self.0.kind {
            NodeKind::Object(d) => object::doc_order_entries(self, d),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.0.kind {
            NodeKind::Object(d) => object::len(d, self),
            NodeKind::Array(d) => array::len(d, self),
            NodeKind::Str(d) => d.text.chars().count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `value`'s string projection equals one of an array's
    /// elements, or an object's values, by textual comparison.
    pub fn contains(&self, value: &str) -> bool {
        match &self.0.kind {
            NodeKind::Array(d) => array::elements(d, self).iter().any(|n| n.string() == value),
            NodeKind::Object(d) => {
                let _ = object::lazy_parse(self, d);
                d.state.lock().unwrap().value.values().any(|n| n.string() == value)
            }
            _ => false,
        }
    }

    // --- navigation --------------------------------------------------

    pub fn get(&self, key: &str) -> Node {
        if !self.is_valid() {
            return self.clone();
        }
        match &self.0.kind {
            NodeKind::Object(d) => match object::get_or_parse_key(self, d, key) {
                Ok(Some(n)) => n,
                Ok(None) => Node::invalid(Error::NotFound(key.to_string())),
                Err(e) => Node::invalid(e),
            },
            _ => self.type_error("object"),
        }
    }

    pub fn index(&self, i: i64) -> Node {
        if !self.is_valid() {
            return self.clone();
        }
        match &self.0.kind {
            NodeKind::Array(d) => match array::get_index(self, d, i) {
                Ok(n) => n,
                Err(e) => Node::invalid(e),
            },
            _ => self.type_error("array"),
        }
    }

    /// Compiles and evaluates `path` against this node (spec §4.7).
    pub fn query(&self, path: &str) -> Node {
        crate::eval::evaluate(self, path)
    }

    pub fn for_each<F: FnMut(Option<&str>, &Node) -> bool>(&self, mut f: F) {
        match &self.0.kind {
            NodeKind::Object(d) => {
                let _ = object::lazy_parse(self, d);
                let state = d.state.lock().unwrap();
                for key in &state.sorted_keys {
                    if let Some(v) = state.value.get(key) {
                        if !f(Some(key.as_str()), v) {
                            break;
                        }
                    }
                }
            }
            NodeKind::Array(d) => {
                for v in array::elements(d, self) {
                    if !f(None, &v) {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    /// Raw-mode object iteration (component "Iterators"): streams entries
    /// straight off the original bytes without materializing every child.
    /// `None` once this node has been mutated, or if it isn't an object.
    pub fn iter_object_raw(&self) -> Option<crate::iter::ObjectIter> {
        match &self.0.kind {
            NodeKind::Object(d) if !d.dirty.load(Ordering::Acquire) => {
                Some(crate::iter::ObjectIter::new(self.clone(), d.raw.clone(), d.start))
            }
            _ => None,
        }
    }

    /// Raw-mode array iteration; see `iter_object_raw`.
    pub fn iter_array_raw(&self) -> Option<crate::iter::ArrayIter> {
        match &self.0.kind {
            NodeKind::Array(d) if !d.dirty.load(Ordering::Acquire) => {
                Some(crate::iter::ArrayIter::new(self.clone(), d.raw.clone(), d.start))
            }
            _ => None,
        }
    }

    // --- filter / map --------------------------------------------------

    /// Returns a new, clean synthetic array of the elements for which
    /// `pred` is true (objects: of the values).
    pub fn filter<F: Fn(&Node) -> bool>(&self, pred: F) -> Node {
        let items: Vec<Node> = match &self.0.kind {
            NodeKind::Array(d) => array::elements(d, self).into_iter().filter(|n| pred(n)).collect(),
            NodeKind::Object(d) => {
                let _ = object::lazy_parse(self, d);
                let state = d.state.lock().unwrap();
                state
                    .sorted_keys
                    .iter()
                    .filter_map(|k| state.value.get(k))
                    .filter(|n| pred(*n))
                    .cloned()
                    .collect()
            }
            _ => return self.type_error("array|object"),
        };
        synthetic_array(items)
    }

    pub fn map<F: Fn(&Node) -> Node>(&self, f: F) -> Node {
        let items: Vec<Node> = match &self.0.kind {
            NodeKind::Array(d) => array::elements(d, self).iter().map(&f).collect(),
            NodeKind::Object(d) => {
                let _ = object::lazy_parse(self, d);
                let state = d.state.lock().unwrap();
                state
                    .sorted_keys
                    .iter()
                    .filter_map(|k| state.value.get(k))
                    .map(&f)
                    .collect()
            }
            _ => return self.type_error("array|object"),
        };
        synthetic_array(items)
    }

    /// Applies `f` to this node and returns its result; lets ad-hoc
    /// transforms compose without a query.
    pub fn apply<F: FnOnce(&Node) -> Node>(&self, f: F) -> Node {
        f(self)
    }

    // --- mutation --------------------------------------------------------

    pub fn set(&self, key: impl Into<String>, value: Node) -> Node {
        if !self.is_valid() {
            return self.clone();
        }
        let key = key.into();
        match &self.0.kind {
            NodeKind::Object(d) => {
                if let Err(e) = object::set(self, d, key, value) {
                    self.fail(e);
                }
                self.clone()
            }
            NodeKind::Array(d) => match key.parse::<i64>() {
                Ok(i) => {
                    if let Err(e) = array::set_index(self, d, i, value) {
                        self.fail(e);
                    }
                    self.clone()
                }
                Err(_) => {
                    self.fail(Error::ParseError(format!("{:?} is not a valid array index", key)));
                    self.clone()
                }
            },
            _ => {
                self.fail(Error::TypeAssertion {
                    expected: "object|array",
                    found: self.kind().name(),
                });
                self.clone()
            }
        }
    }

    pub fn append(&self, value: Node) -> Node {
        if !self.is_valid() {
            return self.clone();
        }
        match &self.0.kind {
            NodeKind::Array(d) => {
                if let Err(e) = array::append(self, d, value) {
                    self.fail(e);
                }
                self.clone()
            }
            _ => {
                self.fail(Error::TypeAssertion {
                    expected: "array",
                    found: self.kind().name(),
                });
                self.clone()
            }
        }
    }

    // --- registered functions --------------------------------------------

    pub fn register_func(&self, name: impl Into<String>, f: NodeFn) -> Node {
        let mut slot = self.0.funcs.lock().unwrap();
        *slot = slot.inserted(name, f);
        self.clone()
    }

    pub fn remove_func(&self, name: &str) -> Node {
        let mut slot = self.0.funcs.lock().unwrap();
        *slot = slot.removed(name);
        self.clone()
    }

    pub fn call_func(&self, name: &str) -> Node {
        let f = self.0.funcs.lock().unwrap().get(name);
        match f {
            Some(f) => f(self),
            None => Node::invalid(Error::FuncNotFound(name.to_string())),
        }
    }

    // --- must_* (total, panicking) ---------------------------------------

    pub fn must_string(&self) -> String {
        self.string_value().expect("node is not a string")
    }

    pub fn must_float(&self) -> f64 {
        self.float().expect("node is not a number")
    }

    pub fn must_bool(&self) -> bool {
        self.bool_value().expect("node is not a bool")
    }

    pub fn must_array(&self) -> Vec<Node> {
        self.array_value().expect("node is not an array")
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn type_mismatch_produces_invalid_sentinel_not_panic() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let n = root.node().get("a").get("nested");
        assert!(!n.is_valid());
        assert_eq!(n.string(), "");
    }

    #[test]
    fn error_sticks_across_chained_calls() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let missing = root.node().get("missing");
        let chained = missing.get("deeper").index(0);
        assert!(!chained.is_valid());
        assert_eq!(missing.error(), chained.error());
    }

    #[test]
    fn strings_skips_non_string_elements() {
        let root = Root::parse(br#"["a",1,"b",null,"c"]"#.to_vec()).unwrap();
        assert_eq!(
            root.node().strings(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn as_map_mirrors_keys() {
        let root = Root::parse(br#"{"a":1,"b":2}"#.to_vec()).unwrap();
        let map = root.node().as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"].int(), Some(1));
    }

    #[test]
    fn filter_and_map_produce_synthetic_arrays() {
        let root = Root::parse(br#"[1,2,3,4]"#.to_vec()).unwrap();
        let evens = root.node().filter(|n| n.int().unwrap_or(0) % 2 == 0);
        assert_eq!(evens.must_array().len(), 2);
        let doubled = root.node().map(|n| crate::Node::from_number(n.int().unwrap() as f64 * 2.0));
        let values: Vec<i64> = doubled.must_array().iter().map(|n| n.int().unwrap()).collect();
        assert_eq!(values, vec![2, 4, 6, 8]);
    }

    #[test]
    fn call_func_without_registration_is_func_not_found() {
        let root = Root::parse(br#"[1,2,3]"#.to_vec()).unwrap();
        let result = root.node().call_func("missing");
        assert!(!result.is_valid());
        assert!(matches!(result.error(), Some(crate::Error::FuncNotFound(_))));
    }

    #[test]
    fn path_walks_parent_links_back_to_a_label() {
        let root = Root::parse(br#"{"a":{"items":[1,2,{"name":"x"}]}}"#.to_vec()).unwrap();
        let name = root.node().get("a").get("items").index(2).get("name");
        assert_eq!(name.path(), "/a/items/2/name");
    }

    #[test]
    fn path_on_root_is_slash() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        assert_eq!(root.node().path(), "/");
    }

    #[test]
    fn path_on_a_standalone_literal_is_slash() {
        let n = crate::Node::from_number(1.0);
        assert_eq!(n.path(), "/");
    }

    #[test]
    fn path_is_best_effort_after_the_node_is_replaced() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let old_a = root.node().get("a");
        root.node().set("a", crate::Node::from_number(2.0));
        assert_eq!(old_a.path(), "/?");
    }

    #[test]
    fn interface_materializes_a_full_dynamic_snapshot() {
        let root = Root::parse(br#"{"a":1,"b":["x",true,null]}"#.to_vec()).unwrap();
        let v = root.node().interface();
        assert_eq!(
            v,
            serde_json::json!({"a": 1.0, "b": ["x", true, null]})
        );
    }
}

pub(crate) fn synthetic_array(items: Vec<Node>) -> Node {
    let data = ArrayData::new_empty();
    {
        let mut state = data.state.lock().unwrap();
        state.value = items.into_iter().map(Some).collect();
    }
    let node = Node::from_kind(NodeKind::Array(data), crate::funcs::FuncTable::new(), None);
    if let NodeKind::Array(d) = &node.0.kind {
        let mut state = d.state.lock().unwrap();
        for slot in state.value.iter().flatten() {
            slot.set_parent(node.weak());
        }
        drop(state);
        d.dirty.store(true, Ordering::Release);
    }
    node
}

