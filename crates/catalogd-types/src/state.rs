use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{kv::KvNode, node::Node};

/// The full mirrored snapshot of the catalog: this agent's own node name,
/// every known [`Node`] keyed by name, and the key-value tree.
///
/// `State` is deliberately plain data with value semantics ([`Clone`],
/// [`PartialEq`]). The watch engine keeps one mutable copy under a mutex and
/// hands listeners their own clone, so a listener can never observe a
/// partially-applied change or hold a reference that outlives the mutex
/// guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "self")]
    pub self_node: String,
    pub nodes: HashMap<String, Node>,
    pub kv: KvNode,
}

impl State {
    /// An empty state for the given local node name.
    pub fn new(self_node: impl Into<String>) -> Self {
        Self {
            self_node: self_node.into(),
            nodes: HashMap::new(),
            kv: KvNode::empty_folder(),
        }
    }

    /// The node this agent is running on, if it has appeared in the catalog.
    pub fn local_node(&self) -> Option<&Node> {
        self.nodes.get(&self.self_node)
    }

    /// The set of node names belonging to group `name`.
    ///
    /// Two groups always exist regardless of any node's `groups` meta:
    /// `"all"`, every known node name, and `name` itself for every known
    /// node name (a node is always a member of its own singleton group).
    /// Recomputed from `nodes` on every call rather than cached: `State` is
    /// plain data with no mutation hooks to invalidate a cache against, so
    /// "lazy" here just means "never computed until asked".
    pub fn group(&self, name: &str) -> BTreeSet<String> {
        if name == "all" {
            return self.nodes.keys().cloned().collect();
        }
        let mut members: BTreeSet<String> = self
            .nodes
            .values()
            .filter(|node| group_members(&node.meta, "groups").contains(name))
            .map(|node| node.name.clone())
            .collect();
        if self.nodes.contains_key(name) {
            members.insert(name.to_string());
        }
        members
    }
}

/// Splits a group-membership meta value into its member names.
///
/// Group membership is recorded as a whitespace-separated list in a node or
/// service meta entry (e.g. `publish-http: "edge-1 edge-2"`). Absent or
/// empty values mean no membership.
pub fn group_members(meta: &BTreeMap<String, String>, key: &str) -> BTreeSet<String> {
    meta.get(key)
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Returns true if `name` is listed under `key` in `meta`.
pub fn in_group(meta: &BTreeMap<String, String>, key: &str, name: &str) -> bool {
    meta.get(key)
        .is_some_and(|value| value.split_whitespace().any(|member| member == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_node_looks_up_by_self_name() {
        let mut state = State::new("node-a");
        state.nodes.insert("node-a".to_string(), Node::new("id-a", "node-a"));
        assert_eq!(state.local_node().unwrap().name, "node-a");
    }

    #[test]
    fn local_node_is_none_before_first_sync() {
        let state = State::new("node-a");
        assert!(state.local_node().is_none());
    }

    #[test]
    fn group_members_splits_on_whitespace() {
        let mut meta = BTreeMap::new();
        meta.insert("publish-http".to_string(), "edge-1  edge-2\tedge-3".to_string());
        let members = group_members(&meta, "publish-http");
        assert_eq!(members.len(), 3);
        assert!(members.contains("edge-2"));
    }

    #[test]
    fn in_group_is_false_when_key_missing() {
        let meta = BTreeMap::new();
        assert!(!in_group(&meta, "publish-http", "edge-1"));
    }

    #[test]
    fn group_all_is_every_known_node_name() {
        let mut state = State::new("self");
        state.nodes.insert("a".to_string(), Node::new("a", "a"));
        state.nodes.insert("b".to_string(), Node::new("b", "b"));
        assert_eq!(state.group("all"), BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn group_by_name_always_contains_the_node_itself() {
        let mut state = State::new("self");
        state.nodes.insert("a".to_string(), Node::new("a", "a"));
        assert!(state.group("a").contains("a"));
    }

    #[test]
    fn group_collects_nodes_whose_meta_lists_it() {
        let mut state = State::new("self");
        let mut a = Node::new("a", "a");
        a.meta.insert("groups".to_string(), "edge canary".to_string());
        let mut b = Node::new("b", "b");
        b.meta.insert("groups".to_string(), "edge".to_string());
        state.nodes.insert("a".to_string(), a);
        state.nodes.insert("b".to_string(), b);

        assert_eq!(state.group("edge"), BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(state.group("canary"), BTreeSet::from(["a".to_string()]));
    }

    #[test]
    fn state_equality_ignores_node_map_iteration_order() {
        let mut a = State::new("self");
        a.nodes.insert("x".to_string(), Node::new("x", "x"));
        a.nodes.insert("y".to_string(), Node::new("y", "y"));

        let mut b = State::new("self");
        b.nodes.insert("y".to_string(), Node::new("y", "y"));
        b.nodes.insert("x".to_string(), Node::new("x", "x"));

        assert_eq!(a, b);
    }
}
