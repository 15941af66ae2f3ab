//! Path Evaluator (spec §4.7): walks a compiled path's steps against a
//! working set of nodes, narrowing or fanning out at each step, then
//! collapses the final working set to a single node or a synthetic array
//! depending on how many matches survived.
//!
//! Compiled paths are cached process-wide, keyed by path text (SPEC_FULL.md's
//! compiled-path-cache addition) — a `Step` tree only ever references path
//! text and structural positions, never a specific document, so the same
//! compiled form is valid for every `Node::query` call that uses it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};
use crate::node::{synthetic_array, Node, Type};
use crate::path::{CompiledPath, Step};

fn cache() -> &'static Mutex<HashMap<String, Arc<CompiledPath>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<CompiledPath>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn compiled(path: &str) -> Result<Arc<CompiledPath>> {
    if let Some(hit) = cache().lock().unwrap().get(path) {
        return Ok(hit.clone());
    }
    let built = Arc::new(crate::path::compile(path)?);
    cache().lock().unwrap().insert(path.to_string(), built.clone());
    Ok(built)
}

/// Entry point behind `Node::query` (spec §4.4/§4.7).
pub(crate) fn evaluate(start: &Node, path: &str) -> Node {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return start.clone();
    }
    let root = root_of(start);
    match run(start, &root, trimmed) {
        Ok(n) => n,
        Err(e) => Node::invalid(e),
    }
}

fn root_of(node: &Node) -> Node {
    let mut current = node.clone();
    while let Some(parent) = current.parent_cell() {
        current = Node::from_cell(parent);
    }
    current
}

fn run(start: &Node, root: &Node, path: &str) -> Result<Node> {
    let compiled = compiled(path)?;
    let mut working = vec![start.clone()];
    for step in &compiled.steps {
        working = apply_step(step, &working, root)?;
    }
    finalize(working)
}

/// Single match stays a single node; zero or multiple matches become,
/// respectively, a `NotFound` invalid node or a synthetic array in the
/// order the steps produced them (spec §4.7 "multiplicity-based result").
fn finalize(working: Vec<Node>) -> Result<Node> {
    match working.len() {
        0 => Err(Error::NotFound("path produced no matches".into())),
        1 => Ok(working.into_iter().next().unwrap()),
        _ => Ok(synthetic_array(working)),
    }
}

fn apply_step(step: &Step, working: &[Node], root: &Node) -> Result<Vec<Node>> {
    let mut out = Vec::new();
    match step {
        Step::Child(name) => {
            for n in working {
                match n.kind() {
                    Type::Array => {
                        if let Some(elems) = n.array_value() {
                            for elem in &elems {
                                push_or_abort(&mut out, elem.get(name))?;
                            }
                        }
                    }
                    _ => push_or_abort(&mut out, n.get(name))?,
                }
            }
        }
        Step::Wildcard => {
            for n in working {
                match n.kind() {
                    Type::Object => {
                        for key in n.keys() {
                            let v = n.get(&key);
                            if v.is_valid() {
                                out.push(v);
                            }
                        }
                    }
                    Type::Array => {
                        if let Some(elems) = n.array_value() {
                            out.extend(elems);
                        }
                    }
                    _ => {}
                }
            }
        }
        Step::Descendant(name) => {
            let max_depth = root.max_depth();
            for n in working {
                collect_descendants(n, name.as_deref(), &mut out, 0, max_depth);
            }
        }
        Step::Parent => {
            for n in working {
                if let Some(cell) = n.parent_cell() {
                    out.push(Node::from_cell(cell));
                }
            }
        }
        Step::Index(i) => {
            for n in working {
                push_or_abort(&mut out, n.index(*i))?;
            }
        }
        Step::Slice(lo, hi) => {
            for n in working {
                out.extend(slice_elements(n, *lo, *hi));
            }
        }
        Step::Function(name) => {
            for n in working {
                push_or_abort(&mut out, n.call_func(name))?;
            }
        }
        Step::Expression(expr) => {
            for n in working {
                if crate::filter::eval_bool(expr, root, n) {
                    out.push(n.clone());
                }
            }
        }
    }
    Ok(out)
}

/// Keeps a navigation result unless its error is surfaced-worthy (spec
/// §4.7 point 4: per-item type/index/key misses drop silently; a missing
/// registered function aborts the whole query, same as a compile error).
fn push_or_abort(out: &mut Vec<Node>, result: Node) -> Result<()> {
    if result.is_valid() {
        out.push(result);
        return Ok(());
    }
    match result.error() {
        Some(e) if !e.is_branch_local() => Err(e),
        _ => Ok(()),
    }
}

/// Depth-first, document-order walk, capped at `max_depth` (spec §5's
/// configurable recursion guard). With `name` set, collects every
/// descendant object value keyed by that name; with `name` `None` (`//*`),
/// collects every descendant node regardless of position.
fn collect_descendants(node: &Node, name: Option<&str>, out: &mut Vec<Node>, depth: usize, max_depth: usize) {
    if depth >= max_depth {
        tracing::warn!(max_depth, "descendant search hit recursion depth cap");
        return;
    }
    match node.kind() {
        Type::Object => {
            for (key, v) in node.object_entries_doc_order() {
                if !v.is_valid() {
                    continue;
                }
                let is_match = name.map(|n| n == key).unwrap_or(true);
                if is_match {
                    out.push(v.clone());
                }
                collect_descendants(&v, name, out, depth + 1, max_depth);
            }
        }
        Type::Array => {
            if let Some(elems) = node.array_value() {
                for v in elems {
                    if name.is_none() {
                        out.push(v.clone());
                    }
                    collect_descendants(&v, name, out, depth + 1, max_depth);
                }
            }
        }
        _ => {}
    }
}

/// Python-style slice over an array's elements; negative bounds count from
/// the end, and out-of-range bounds clamp rather than error (spec §4.6
/// negative-index semantics extended to ranges).
fn slice_elements(node: &Node, lo: Option<i64>, hi: Option<i64>) -> Vec<Node> {
    let elems = match node.array_value() {
        Some(e) => e,
        None => return Vec::new(),
    };
    let len = elems.len() as i64;
    let norm = |v: i64| -> i64 {
        if v < 0 {
            (len + v).max(0)
        } else {
            v.min(len)
        }
    };
    let start = lo.map(norm).unwrap_or(0).clamp(0, len);
    let end = hi.map(norm).unwrap_or(len).clamp(0, len);
    if start >= end {
        return Vec::new();
    }
    elems[start as usize..end as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use crate::Root;

    #[test]
    fn child_path_returns_single_node() {
        let root = Root::parse(br#"{"a":{"b":1}}"#.to_vec()).unwrap();
        let n = root.node().query("/a/b");
        assert_eq!(n.int(), Some(1));
    }

    #[test]
    fn wildcard_over_array_fans_out() {
        let root = Root::parse(br#"{"items":[1,2,3]}"#.to_vec()).unwrap();
        let n = root.node().query("/items/*");
        assert_eq!(n.must_array().len(), 3);
    }

    #[test]
    fn missing_child_is_invalid() {
        let root = Root::parse(br#"{"a":1}"#.to_vec()).unwrap();
        let n = root.node().query("/missing");
        assert!(!n.is_valid());
    }

    #[test]
    fn descendant_search_finds_nested_key() {
        let root = Root::parse(br#"{"a":{"b":{"name":"x"}},"name":"y"}"#.to_vec()).unwrap();
        let n = root.node().query("//name");
        assert_eq!(n.must_array().len(), 2);
    }

    #[test]
    fn descendant_search_reports_document_order_not_sorted_order() {
        let root = Root::parse(br#"{"b":{"x":1},"a":{"x":2}}"#.to_vec()).unwrap();
        let n = root.node().query("//x");
        let values: Vec<i64> = n.must_array().iter().filter_map(|v| v.int()).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn child_step_propagates_through_array_elements() {
        let root = Root::parse(br#"{"a":[{"b":1},{"b":2}]}"#.to_vec()).unwrap();
        let n = root.node().query("/a/b");
        let values: Vec<i64> = n.must_array().iter().filter_map(|v| v.int()).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn predicate_filters_array_elements() {
        let root = Root::parse(br#"{"items":[{"n":1},{"n":2},{"n":3}]}"#.to_vec()).unwrap();
        let n = root.node().query("/items[@.n == 2]");
        assert_eq!(n.get("n").int(), Some(2));
    }

    #[test]
    fn negative_index_from_end() {
        let root = Root::parse(br#"{"items":[10,20,30]}"#.to_vec()).unwrap();
        let n = root.node().query("/items[-1]");
        assert_eq!(n.int(), Some(30));
    }
}
