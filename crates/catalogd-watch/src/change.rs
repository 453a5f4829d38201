use std::collections::BTreeMap;

use catalogd_types::{KvNode, Node, Service, State};

/// A single unit of work applied to the mirrored [`State`] as it arrives
/// from one of the long-poll watches.
///
/// Applying a `Change` never blocks and never fails: by the time a change
/// reaches here it has already been decoded from the catalog's response, so
/// this is pure data transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The full node listing changed. Existing nodes are updated in place
    /// (their services are left untouched — a separate `ServicesUpdated`
    /// carries those); nodes no longer present are dropped entirely.
    NodesUpdated(Vec<NodeMeta>),
    /// A single node's service list changed.
    ServicesUpdated { node: String, services: Vec<Service> },
    /// A node disappeared from the catalog.
    NodeRemoved(String),
    /// Every key under `prefix` changed; `entries` is the full listing
    /// (key relative to `prefix` -> value), replacing whatever subtree
    /// previously lived there.
    KvUpdated {
        prefix: String,
        entries: BTreeMap<String, Vec<u8>>,
    },
}

/// Node identity and metadata, without its service list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub id: String,
    pub name: String,
    pub address: String,
    pub meta: BTreeMap<String, String>,
}

impl Change {
    /// Applies this change to `state` in place.
    pub fn apply(self, state: &mut State) {
        match self {
            Change::NodesUpdated(listing) => {
                let present: std::collections::BTreeSet<String> =
                    listing.iter().map(|n| n.name.clone()).collect();

                state.nodes.retain(|name, _| present.contains(name));

                for meta in listing {
                    let node = state
                        .nodes
                        .entry(meta.name.clone())
                        .or_insert_with(|| Node::new(meta.id.clone(), meta.name.clone()));
                    node.id = meta.id;
                    node.address = meta.address;
                    node.meta = meta.meta;
                }
            }
            Change::ServicesUpdated { node, services } => {
                if let Some(node) = state.nodes.get_mut(&node) {
                    node.set_services(services);
                }
            }
            Change::NodeRemoved(name) => {
                state.nodes.remove(&name);
            }
            Change::KvUpdated { prefix, entries } => {
                let mut folder = KvNode::empty_folder();
                for (key, value) in entries {
                    folder.set(&key, KvNode::Value(value));
                }
                state.kv.set(&prefix, folder);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, name: &str) -> NodeMeta {
        NodeMeta {
            id: id.to_string(),
            name: name.to_string(),
            address: "10.0.0.1".to_string(),
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn nodes_updated_drops_nodes_no_longer_listed() {
        let mut state = State::new("self");
        state.nodes.insert("stale".to_string(), Node::new("x", "stale"));

        Change::NodesUpdated(vec![meta("a", "fresh")]).apply(&mut state);

        assert!(!state.nodes.contains_key("stale"));
        assert!(state.nodes.contains_key("fresh"));
    }

    #[test]
    fn nodes_updated_preserves_existing_services() {
        let mut state = State::new("self");
        let mut node = Node::new("a", "node-a");
        node.set_services(vec![Service::new("s1", "web")]);
        state.nodes.insert("node-a".to_string(), node);

        Change::NodesUpdated(vec![meta("a", "node-a")]).apply(&mut state);

        assert_eq!(state.nodes["node-a"].services.len(), 1);
    }

    #[test]
    fn services_updated_replaces_services_on_existing_node() {
        let mut state = State::new("self");
        state.nodes.insert("node-a".to_string(), Node::new("a", "node-a"));

        Change::ServicesUpdated {
            node: "node-a".to_string(),
            services: vec![Service::new("s1", "web")],
        }
        .apply(&mut state);

        assert_eq!(state.nodes["node-a"].services[0].id, "s1");
    }

    #[test]
    fn node_removed_drops_the_node() {
        let mut state = State::new("self");
        state.nodes.insert("node-a".to_string(), Node::new("a", "node-a"));
        Change::NodeRemoved("node-a".to_string()).apply(&mut state);
        assert!(state.nodes.is_empty());
    }

    #[test]
    fn kv_updated_replaces_the_whole_subtree_at_prefix() {
        let mut state = State::new("self");
        state.kv.set("gateway/old", KvNode::Value(vec![1]));

        let mut entries = BTreeMap::new();
        entries.insert("new".to_string(), vec![2]);
        Change::KvUpdated { prefix: "gateway".to_string(), entries }.apply(&mut state);

        assert!(state.kv.get("gateway/old").is_none());
        assert_eq!(state.kv.get("gateway/new").unwrap().as_value(), Some([2].as_slice()));
    }
}
