//! Lazy Array Node (spec §4.6). Mirrors the object's lazy/dirty machinery
//! with sequence semantics: negative indices, sparse per-index caching, and
//! `append`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::scan;

use super::prim::Raw;
use super::{Node, NodeKind};

pub(crate) struct ArrayData {
    pub(crate) raw: Raw,
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) parsed: AtomicBool,
    pub(crate) dirty: AtomicBool,
    pub(crate) state: Mutex<ArrayState>,
}

#[derive(Default)]
pub(crate) struct ArrayState {
    /// `None` marks a slot whose element has not yet been materialized.
    pub(crate) value: Vec<Option<Node>>,
}

impl ArrayData {
    pub(crate) fn new_lazy(raw: Raw, start: usize, end: usize) -> Self {
        Self {
            raw,
            start,
            end,
            parsed: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            state: Mutex::new(ArrayState::default()),
        }
    }

    pub(crate) fn new_empty() -> Self {
        let raw: Raw = Arc::from(b"[]".to_vec().into_boxed_slice());
        Self {
            raw,
            start: 0,
            end: 2,
            parsed: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            state: Mutex::new(ArrayState::default()),
        }
    }
}

/// Fills every slot of the sparse cache, in order.
pub(crate) fn lazy_parse(node: &Node, data: &ArrayData) -> Result<()> {
    if data.parsed.load(Ordering::Acquire) {
        return Ok(());
    }
    let mut state = data.state.lock().unwrap();
    if data.parsed.load(Ordering::Acquire) {
        return Ok(());
    }
    let funcs = node.0.funcs.lock().unwrap().clone();
    let parent_weak = node.weak();
    let mut values = Vec::new();
    for elem in scan::ArrayElements::new(&data.raw, data.start) {
        let (start, _end) = elem?;
        let (child, _) = Node::parse_value(&data.raw, start, funcs.clone(), Some(parent_weak.clone()))?;
        values.push(Some(child));
    }
    state.value = values;
    data.parsed.store(true, Ordering::Release);
    Ok(())
}

/// Resolves a (possibly negative) logical index to a 0-based one, requiring
/// the array's length. Negative `-k` means `len + k`; anything out of range
/// yields `IndexOutOfBounds`.
pub(crate) fn resolve_index(len: usize, index: i64) -> Result<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(Error::IndexOutOfBounds { index, len });
    }
    Ok(resolved as usize)
}

/// `index(i)`: for a non-negative `i` this parses only up through the i-th
/// element, never the whole array. A negative index needs the total length
/// first, which costs a full (structure-only) scan either way.
pub(crate) fn get_index(node: &Node, data: &ArrayData, index: i64) -> Result<Node> {
    if data.parsed.load(Ordering::Acquire) {
        let len = data.state.lock().unwrap().value.len();
        let i = resolve_index(len, index)?;
        return materialize_slot(data, i, index, len);
    }
    let i = if index >= 0 {
        index as usize
    } else {
        let len = scan::count_elements(&data.raw, data.start)?;
        resolve_index(len, index)?
    };
    {
        let state = data.state.lock().unwrap();
        if let Some(Some(n)) = state.value.get(i) {
            return Ok(n.clone());
        }
    }
    let funcs = node.0.funcs.lock().unwrap().clone();
    let parent_weak = node.weak();
    match scan::nth_element(&data.raw, data.start, i)? {
        Some((start, _end)) => {
            let (child, _) = Node::parse_value(&data.raw, start, funcs, Some(parent_weak))?;
            let mut state = data.state.lock().unwrap();
            if state.value.len() <= i {
                state.value.resize(i + 1, None);
            }
            state.value[i] = Some(child.clone());
            Ok(child)
        }
        None => Err(Error::IndexOutOfBounds {
            index,
            len: scan::count_elements(&data.raw, data.start)?,
        }),
    }
}

fn materialize_slot(data: &ArrayData, i: usize, index: i64, len: usize) -> Result<Node> {
    let state = data.state.lock().unwrap();
    match state.value.get(i).and_then(Clone::clone) {
        Some(n) => Ok(n),
        None => Err(Error::IndexOutOfBounds { index, len }),
    }
}

pub(crate) fn append(node: &Node, data: &ArrayData, value: Node) -> Result<()> {
    lazy_parse(node, data)?;
    let mut state = data.state.lock().unwrap();
    value.set_parent(node.weak());
    state.value.push(Some(value));
    drop(state);
    data.parsed.store(true, Ordering::Release);
    data.dirty.store(true, Ordering::Release);
    node.propagate_dirty();
    Ok(())
}

/// `set("i", v)`: replaces the element at decimal index `i` in place.
pub(crate) fn set_index(node: &Node, data: &ArrayData, index: i64, value: Node) -> Result<()> {
    lazy_parse(node, data)?;
    let mut state = data.state.lock().unwrap();
    let i = resolve_index(state.value.len(), index)?;
    value.set_parent(node.weak());
    state.value[i] = Some(value);
    drop(state);
    data.dirty.store(true, Ordering::Release);
    node.propagate_dirty();
    Ok(())
}

pub(crate) fn to_string(node: &Node, data: &ArrayData) -> String {
    if !data.dirty.load(Ordering::Acquire) {
        return String::from_utf8_lossy(&data.raw[data.start..data.end]).into_owned();
    }
    let _ = lazy_parse(node, data);
    let state = data.state.lock().unwrap();
    let mut out = String::from("[");
    for (i, slot) in state.value.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match slot {
            Some(n) => out.push_str(&n.string()),
            None => out.push_str("null"),
        }
    }
    out.push(']');
    out
}

pub(crate) fn len(data: &ArrayData, node: &Node) -> usize {
    let _ = lazy_parse(node, data);
    data.state.lock().unwrap().value.len()
}

pub(crate) fn elements(data: &ArrayData, node: &Node) -> Vec<Node> {
    let _ = lazy_parse(node, data);
    data.state
        .lock()
        .unwrap()
        .value
        .iter()
        .filter_map(|s| s.clone())
        .collect()
}

pub(crate) fn as_kind(kind: &NodeKind) -> Option<&ArrayData> {
    match kind {
        NodeKind::Array(d) => Some(d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn negative_index_resolves_from_end() {
        let root = Root::parse(br#"[10,20,30]"#.to_vec()).unwrap();
        assert_eq!(root.node().index(-1).int(), Some(30));
        assert_eq!(root.node().index(-2).int(), Some(20));
    }

    #[test]
    fn out_of_range_index_is_invalid() {
        let root = Root::parse(br#"[10,20,30]"#.to_vec()).unwrap();
        assert!(!root.node().index(3).is_valid());
        assert!(!root.node().index(-4).is_valid());
    }

    #[test]
    fn single_index_lookup_does_not_require_full_parse() {
        let root = Root::parse(br#"[1,2,3,4,5]"#.to_vec()).unwrap();
        assert_eq!(root.node().index(2).int(), Some(3));
    }

    #[test]
    fn append_marks_dirty_and_preserves_order() {
        let root = Root::parse(br#"[1,2]"#.to_vec()).unwrap();
        root.node().append(crate::Node::from_number(3.0));
        assert_eq!(root.node().len(), 3);
        assert_eq!(root.node().string(), "[1,2,3]");
    }

    #[test]
    fn set_index_replaces_element_in_place() {
        let root = Root::parse(br#"[1,2,3]"#.to_vec()).unwrap();
        root.node().set("1", crate::Node::from_number(99.0));
        assert_eq!(root.node().index(1).int(), Some(99));
        assert_eq!(root.node().string(), "[1,99,3]");
    }

    #[test]
    fn nested_append_dirties_the_whole_ancestor_chain() {
        let root = Root::parse(br#"{"items":[1,2]}"#.to_vec()).unwrap();
        let before = root.node().string();
        root.node().get("items").append(crate::Node::from_number(3.0));
        assert_ne!(root.node().string(), before);
        assert!(root.node().string().contains("[1,2,3]"));
    }
}
