//! Lazy Object Node (spec §4.5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::funcs::FuncTable;
use crate::scan;

use super::prim::Raw;
use super::{Node, NodeKind};

pub(crate) struct ObjectData {
    pub(crate) raw: Raw,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) parsed: AtomicBool,
    pub(crate) dirty: AtomicBool,
    pub(crate) state: Mutex<ObjectState>,
}

#[derive(Default)]
pub(crate) struct ObjectState {
    pub(crate) value: HashMap<String, Node>,
    pub(crate) sorted_keys: Vec<String>,
    /// Keys in the order they were first seen — document order for parsed
    /// entries, with `set`-appended new keys trailing after them. Distinct
    /// from `sorted_keys`, which Wildcard steps use (spec §4.7 ties Wildcard
    /// to sorted order and Descendant to document order).
    pub(crate) doc_order: Vec<String>,
}

impl ObjectData {
    pub(crate) fn new_lazy(raw: Raw, start: usize, end: usize) -> Self {
        Self {
            raw,
            start,
            end,
            parsed: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            state: Mutex::new(ObjectState::default()),
        }
    }

    pub(crate) fn new_empty() -> Self {
        let raw: Raw = Arc::from(b"{}".to_vec().into_boxed_slice());
        Self {
            raw,
            start: 0,
            end: 2,
            parsed: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            state: Mutex::new(ObjectState::default()),
        }
    }
}

/// Full lazy parse: materializes every child once, in document order, with
/// last-key-wins on duplicates (see DESIGN.md's resolution of the open
/// question). No-op if already parsed or the object has no entries.
pub(crate) fn lazy_parse(node: &Node, data: &ObjectData) -> Result<()> {
    if data.parsed.load(Ordering::Acquire) {
        return Ok(());
    }
    let mut state = data.state.lock().unwrap();
    if data.parsed.load(Ordering::Acquire) {
        return Ok(());
    }
    let funcs = node.0.funcs.lock().unwrap().clone();
    let parent_weak = node.weak();
    // Rebuilt fresh every full parse, independent of any keys a prior
    // single-key fast lookup already seeded into `state.value`, so this
    // always reflects the document's true key order.
    state.doc_order.clear();
    let mut seen = std::collections::HashSet::new();
    for entry in scan::ObjectEntries::new(&data.raw, data.start) {
        let entry = entry?;
        let (child, _) = Node::parse_value(
            &data.raw,
            entry.value_start,
            funcs.clone(),
            Some(parent_weak.clone()),
        )?;
        if seen.contains(&entry.key) {
            tracing::debug!(key = %entry.key, "duplicate object key, last one wins");
        } else {
            seen.insert(entry.key.clone());
            state.doc_order.push(entry.key.clone());
        }
        state.value.insert(entry.key, child);
    }
    let mut keys: Vec<String> = state.value.keys().cloned().collect();
    keys.sort();
    state.sorted_keys = keys;
    data.parsed.store(true, Ordering::Release);
    Ok(())
}

/// Single-key lazy parse (spec §4.5 `lazy_parse_path`): scans only as far as
/// needed to find `key`, falling back to a full parse on structural error or
/// on exhaustion without a match, so the object's state stabilizes either
/// way.
pub(crate) fn get_or_parse_key(node: &Node, data: &ObjectData, key: &str) -> Result<Option<Node>> {
    {
        let state = data.state.lock().unwrap();
        if let Some(n) = state.value.get(key) {
            return Ok(Some(n.clone()));
        }
        if data.parsed.load(Ordering::Acquire) {
            return Ok(None);
        }
    }
    let mut state = data.state.lock().unwrap();
    if let Some(n) = state.value.get(key) {
        return Ok(Some(n.clone()));
    }
    if data.parsed.load(Ordering::Acquire) {
        return Ok(None);
    }
    let funcs = node.0.funcs.lock().unwrap().clone();
    let parent_weak = node.weak();
    match scan::find_key(&data.raw, data.start, key) {
        Ok(Some((vstart, _))) => {
            let (child, _) = Node::parse_value(&data.raw, vstart, funcs, Some(parent_weak))?;
            insert_sorted(&mut state, key.to_string(), child.clone());
            Ok(Some(child))
        }
        Ok(None) => {
            drop(state);
            lazy_parse(node, data)?;
            let state = data.state.lock().unwrap();
            Ok(state.value.get(key).cloned())
        }
        Err(e) => {
            drop(state);
            match lazy_parse(node, data) {
                Ok(()) => {
                    let state = data.state.lock().unwrap();
                    Ok(state.value.get(key).cloned())
                }
                Err(_) => Err(e),
            }
        }
    }
}

fn insert_sorted(state: &mut ObjectState, key: String, value: Node) {
    if !state.value.contains_key(&key) {
        let pos = state.sorted_keys.partition_point(|k| k.as_str() < key.as_str());
        state.sorted_keys.insert(pos, key.clone());
        state.doc_order.push(key.clone());
    }
    state.value.insert(key, value);
}

/// `set(key, v)` (spec §4.5): parses fully first so `sorted_keys` stays
/// correct, inserts/replaces, and marks this node (and, via the caller,
/// its ancestors) dirty.
pub(crate) fn set(node: &Node, data: &ObjectData, key: String, value: Node) -> Result<()> {
    lazy_parse(node, data)?;
    let mut state = data.state.lock().unwrap();
    value.set_parent(node.weak());
    insert_sorted(&mut state, key, value);
    drop(state);
    data.parsed.store(true, Ordering::Release);
    data.dirty.store(true, Ordering::Release);
    node.propagate_dirty();
    Ok(())
}

/// If clean, returns the original raw slice; otherwise rebuilds `{"k":v,...}`
/// in `sorted_keys` order, recursing into children (spec §4.5
/// "Serialization", §9 "re-serialize iff any descendant is dirty").
pub(crate) fn to_string(node: &Node, data: &ObjectData) -> String {
    if !data.dirty.load(Ordering::Acquire) {
        return String::from_utf8_lossy(&data.raw[data.start..data.end]).into_owned();
    }
    let _ = lazy_parse(node, data);
    let state = data.state.lock().unwrap();
    let mut out = String::from("{");
    for (i, key) in state.sorted_keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&super::prim::quote(key));
        out.push(':');
        if let Some(child) = state.value.get(key) {
            out.push_str(&child.string());
        } else {
            out.push_str("null");
        }
    }
    out.push('}');
    out
}

pub(crate) fn len(data: &ObjectData, node: &Node) -> usize {
    let _ = lazy_parse(node, data);
    data.state.lock().unwrap().value.len()
}

/// `(key, value)` pairs in document order (spec §4.7's Descendant tie-break,
/// distinct from `sorted_keys`' alphabetical order used by Wildcard).
pub(crate) fn doc_order_entries(node: &Node, data: &ObjectData) -> Vec<(String, Node)> {
    let _ = lazy_parse(node, data);
    let state = data.state.lock().unwrap();
    state
        .doc_order
        .iter()
        .filter_map(|k| state.value.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

pub(crate) fn sorted_keys(data: &ObjectData, node: &Node) -> Vec<String> {
    let _ = lazy_parse(node, data);
    data.state.lock().unwrap().sorted_keys.clone()
}

pub(crate) fn as_kind(kind: &NodeKind) -> Option<&ObjectData> {
    match kind {
        NodeKind::Object(d) => Some(d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn keys_are_sorted_and_deduplicated() {
        let root = Root::parse(br#"{"c":1,"a":2,"b":3}"#.to_vec()).unwrap();
        assert_eq!(
            root.node().keys(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert_eq!(root.node().len(), 3);
    }

    #[test]
    fn duplicate_key_last_one_wins() {
        let root = Root::parse(br#"{"a":1,"a":2}"#.to_vec()).unwrap();
        assert_eq!(root.node().get("a").int(), Some(2));
        assert_eq!(root.node().keys(), vec!["a".to_string()]);
    }

    #[test]
    fn single_key_lazy_parse_does_not_materialize_siblings() {
        let root = Root::parse(br#"{"a":1,"b":2,"c":3}"#.to_vec()).unwrap();
        let v = root.node().get("b");
        assert_eq!(v.int(), Some(2));
    }

    #[test]
    fn set_marks_dirty_and_reserializes() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let original = root.node().string();
        root.node().set("a", crate::Node::from_number(2.0));
        let after = root.node().string();
        assert_ne!(original, after);
        assert!(after.contains(r#""a":2"#));
    }

    #[test]
    fn set_on_unparsed_key_preserves_other_raw_entries() {
        let root = Root::parse(br#"{"a":1,"b":{"deep":true}}"#.to_vec()).unwrap();
        root.node().set("a", crate::Node::from_number(9.0));
        let after = root.node().string();
        assert!(after.contains(r#""b":{"deep":true}"#));
    }

    #[test]
    fn doc_order_entries_follow_source_order_not_sorted_order() {
        let root = Root::parse(br#"{"c":1,"a":2,"b":3}"#.to_vec()).unwrap();
        let pairs = root.node().object_entries_doc_order();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
