//! Iterators (spec "Iterators" component): raw-mode streaming over a
//! container's original bytes, for callers who want to visit entries
//! without forcing every child to materialize into a `Node` up front.
//!
//! Each yielded item caches lazily: `.parse()` builds (and, via the owning
//! node's ordinary lazy-parse path, caches) only the children actually
//! visited. Available only while the container is clean — once it's been
//! mutated, its raw bytes no longer reflect its contents, so callers fall
//! back to `Node::for_each`/`Node::as_map` over the materialized state.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::node::{Node, Raw};
use crate::scan;

pub struct ObjectIter {
    owner: Node,
    raw: Raw,
    pos: usize,
    started: bool,
    done: bool,
}

impl ObjectIter {
    pub(crate) fn new(owner: Node, raw: Raw, start: usize) -> Self {
        Self {
            owner,
            raw,
            pos: start,
            started: false,
            done: false,
        }
    }
}

impl Iterator for ObjectIter {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            self.pos = scan::skip_whitespace(&self.raw, self.pos + 1);
            if self.raw.get(self.pos) == Some(&b'}') {
                self.done = true;
                return None;
            }
        }
        self.pos = scan::skip_whitespace(&self.raw, self.pos);
        let (key, _has_escapes, after_key) = match scan::read_string(&self.raw, self.pos) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let mut i = scan::skip_whitespace(&self.raw, after_key);
        if self.raw.get(i) != Some(&b':') {
            self.done = true;
            return Some(Err(Error::ParseError("expected ':'".into())));
        }
        i = scan::skip_whitespace(&self.raw, i + 1);
        let value_start = i;
        let value_end = match scan::skip_value(&self.raw, i, 0) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        i = scan::skip_whitespace(&self.raw, value_end);
        match self.raw.get(i) {
            Some(b',') => self.pos = i + 1,
            Some(b'}') => {
                self.pos = i + 1;
                self.done = true;
            }
            _ => {
                self.done = true;
                return Some(Err(Error::ParseError("expected ',' or '}'".into())));
            }
        }
        Some(Ok(RawEntry {
            owner: self.owner.clone(),
            raw: self.raw.clone(),
            key,
            value_start,
            value_end,
        }))
    }
}

/// A single not-yet-materialized object entry.
pub struct RawEntry {
    owner: Node,
    raw: Raw,
    key: String,
    value_start: usize,
    value_end: usize,
}

impl RawEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value's original bytes, unparsed.
    pub fn raw(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw[self.value_start..self.value_end])
    }

    /// Materializes this entry's value, caching it into the owning
    /// object's state the same way `Node::get` would.
    pub fn parse_value(&self) -> Node {
        self.owner.get(&self.key)
    }
}

pub struct ArrayIter {
    owner: Node,
    raw: Raw,
    pos: usize,
    index: usize,
    started: bool,
    done: bool,
}

impl ArrayIter {
    pub(crate) fn new(owner: Node, raw: Raw, start: usize) -> Self {
        Self {
            owner,
            raw,
            pos: start,
            index: 0,
            started: false,
            done: false,
        }
    }
}

impl Iterator for ArrayIter {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            self.pos = scan::skip_whitespace(&self.raw, self.pos + 1);
            if self.raw.get(self.pos) == Some(&b']') {
                self.done = true;
                return None;
            }
        }
        let start = self.pos;
        let end = match scan::skip_value(&self.raw, start, 0) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let mut i = scan::skip_whitespace(&self.raw, end);
        match self.raw.get(i) {
            Some(b',') => {
                i = scan::skip_whitespace(&self.raw, i + 1);
                self.pos = i;
            }
            Some(b']') => {
                self.pos = i + 1;
                self.done = true;
            }
            _ => {
                self.done = true;
                return Some(Err(Error::ParseError("expected ',' or ']'".into())));
            }
        }
        let index = self.index;
        self.index += 1;
        Some(Ok(RawElement {
            owner: self.owner.clone(),
            raw: self.raw.clone(),
            index,
            start,
            end,
        }))
    }
}

/// A single not-yet-materialized array element.
pub struct RawElement {
    owner: Node,
    raw: Raw,
    index: usize,
    start: usize,
    end: usize,
}

impl RawElement {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn raw(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw[self.start..self.end])
    }

    pub fn parse_value(&self) -> Node {
        self.owner.index(self.index as i64)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Node, Root};

    #[test]
    fn raw_object_iter_visits_every_entry_in_document_order() {
        let root = Root::parse(br#"{"b":1,"a":2}"#.to_vec()).unwrap();
        let obj = root.node();
        let keys: Vec<String> = obj
            .iter_object_raw()
            .unwrap()
            .map(|e| e.unwrap().key().to_string())
            .collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn raw_array_iter_parses_lazily() {
        let root = Root::parse(br#"[10,20,30]"#.to_vec()).unwrap();
        let arr = root.node();
        let sum: i64 = arr
            .iter_array_raw()
            .unwrap()
            .map(|e| e.unwrap().parse_value().int().unwrap_or(0))
            .sum();
        assert_eq!(sum, 60);
    }

    #[test]
    fn raw_iter_unavailable_once_dirty() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let obj = root.node();
        obj.set("b", Node::from_number(2.0));
        assert!(obj.iter_object_raw().is_none());
    }
}
