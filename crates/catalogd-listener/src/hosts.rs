//! Renders `/etc/hosts`-style name-to-address mappings for every node.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use catalogd_types::State;

use crate::error::ListenerError;
use crate::file::FileArtifact;
use crate::listener::Listener;

/// Meta key marking a node as publicly reachable. When set on this agent's
/// own node, its loopback entry also gets a `<node>.<domain>` alias, so
/// local clients can resolve the node's public name to localhost.
pub const VISIBILITY_KEY: &str = "visibility";
pub const VISIBILITY_PUBLIC: &str = "public";
const LOCAL_IP: &str = "127.0.0.1";

/// Renders every known node's address and name into a hosts file.
pub struct HostsListener {
    file: FileArtifact,
    node_domain: String,
}

impl HostsListener {
    pub fn new(file: impl Into<PathBuf>, node_domain: impl Into<String>) -> Self {
        Self {
            file: FileArtifact::new(file),
            node_domain: node_domain.into(),
        }
    }

    fn render(&self, state: &State) -> BTreeMap<String, BTreeSet<String>> {
        let mut hosts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let self_node = state.local_node();

        for node in state.nodes.values() {
            let mut address = node.address.clone();
            if let Some(self_node) = self_node {
                if self_node.id == node.id {
                    address = LOCAL_IP.to_string();
                    if node.meta.get(VISIBILITY_KEY).map(String::as_str) == Some(VISIBILITY_PUBLIC) {
                        hosts
                            .entry(address.clone())
                            .or_default()
                            .insert(format!("{}.{}", node.name, self.node_domain));
                    }
                }
            }
            hosts.entry(address).or_default().insert(node.name.clone());
        }
        hosts
    }
}

#[async_trait]
impl Listener for HostsListener {
    fn name(&self) -> &str {
        "hosts"
    }

    async fn notify(&self, state: &State) -> Result<(), ListenerError> {
        let hosts = self.render(state);
        self.file.write(|w| {
            for (address, names) in &hosts {
                let names = names.iter().cloned().collect::<Vec<_>>().join(" ");
                writeln!(w, "{address} {names}")?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogd_types::Node;

    fn node(id: &str, name: &str, address: &str) -> Node {
        let mut n = Node::new(id, name);
        n.address = address.to_string();
        n
    }

    #[tokio::test]
    async fn self_node_resolves_to_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::new("node-a");
        state.nodes.insert("node-a".to_string(), node("a", "node-a", "10.0.0.1"));
        state.nodes.insert("node-b".to_string(), node("b", "node-b", "10.0.0.2"));

        let listener = HostsListener::new(dir.path().join("hosts"), "internal");
        listener.notify(&state).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
        assert!(contents.contains("127.0.0.1 node-a"));
        assert!(contents.contains("10.0.0.2 node-b"));
    }

    #[tokio::test]
    async fn public_self_node_gets_domain_alias() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::new("node-a");
        let mut me = node("a", "node-a", "10.0.0.1");
        me.meta.insert(VISIBILITY_KEY.to_string(), VISIBILITY_PUBLIC.to_string());
        state.nodes.insert("node-a".to_string(), me);

        let listener = HostsListener::new(dir.path().join("hosts"), "example.com");
        listener.notify(&state).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("hosts")).unwrap();
        assert!(contents.contains("node-a.example.com"));
    }
}
