//! Registered user functions (spec §4.8): `[@name]` predicates invoke a
//! unary node-to-node mapping looked up by name. The table is a
//! reference-counted persistent map; `register`/`remove` are copy-on-write
//! so a subtree that registers a function does not retroactively affect
//! sibling nodes that already captured an earlier snapshot of the table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::Node;

/// A registered function: pure, unary, node-to-node.
pub type NodeFn = Arc<dyn Fn(&Node) -> Node + Send + Sync>;

#[derive(Clone)]
pub struct FuncTable(Arc<HashMap<String, NodeFn>>);

impl FuncTable {
    pub fn new() -> Self {
        Self(Arc::new(HashMap::new()))
    }

    pub fn get(&self, name: &str) -> Option<NodeFn> {
        self.0.get(name).cloned()
    }

    /// Returns a new table with `name` bound to `f`, leaving `self`'s
    /// snapshot untouched.
    pub fn inserted(&self, name: impl Into<String>, f: NodeFn) -> Self {
        let name = name.into();
        tracing::debug!(function = %name, "registering function");
        let mut map = (*self.0).clone();
        map.insert(name, f);
        Self(Arc::new(map))
    }

    /// Returns a new table with `name` unbound, leaving `self`'s snapshot
    /// untouched.
    pub fn removed(&self, name: &str) -> Self {
        tracing::debug!(function = %name, "unregistering function");
        let mut map = (*self.0).clone();
        map.remove(name);
        Self(Arc::new(map))
    }
}

impl Default for FuncTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    #[test]
    fn cow_does_not_leak_to_old_snapshot() {
        let t0 = FuncTable::new();
        let t1 = t0.inserted("double", Arc::new(|n: &Node| n.clone()));
        assert!(t0.get("double").is_none());
        assert!(t1.get("double").is_some());
    }
}
