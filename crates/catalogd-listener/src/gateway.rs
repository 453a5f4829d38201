//! Renders reverse-proxy route definitions for services opted into a
//! publish group, and runs a reload command when the rendered file changes.
//!
//! Route definitions live in the KV tree under a configured prefix, one
//! value per domain name, written in a tiny `[[ ]]`-delimited template
//! language: a `[[range .]] ... [[end]]` block is repeated once per
//! matching service with `[[.Name]]`, `[[.Address]]`, `[[.Port]]`, and
//! `[[.NodeName]]` substituted; text outside the block is copied verbatim.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use catalogd_types::{in_group, State};
use tracing::warn;

use crate::error::ListenerError;
use crate::file::FileArtifact;
use crate::listener::Listener;

pub const DOMAIN_NAME_KEY: &str = "domain-name";
pub const PUBLISH_HTTP_KEY: &str = "publish-http";

struct Endpoint {
    node_name: String,
    service_name: String,
    address: String,
    port: u16,
}

/// Renders gateway route config from KV template definitions and the
/// current service list, then optionally runs a reload command.
pub struct GatewayListener {
    prefixes: Vec<String>,
    key_prefix: String,
    file: FileArtifact,
    exec: String,
}

impl GatewayListener {
    pub fn new(key_prefix: impl Into<String>, http_file: impl Into<PathBuf>, exec: impl Into<String>) -> Self {
        let key_prefix = key_prefix.into();
        Self {
            prefixes: vec![key_prefix.clone()],
            key_prefix,
            file: FileArtifact::new(http_file).mode(0o640).owner("root", "caddy"),
            exec: exec.into(),
        }
    }

    fn matching_endpoints(&self, state: &State, self_name: &str) -> BTreeMap<String, Vec<Endpoint>> {
        let mut by_domain: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
        for node in state.nodes.values() {
            for service in &node.services {
                let Some(domain) = service.meta.get(DOMAIN_NAME_KEY) else {
                    continue;
                };
                if !in_group(&service.meta, PUBLISH_HTTP_KEY, self_name) {
                    continue;
                }
                let address = if service.address.is_empty() {
                    node.address.clone()
                } else {
                    service.address.clone()
                };
                by_domain.entry(domain.clone()).or_default().push(Endpoint {
                    node_name: node.name.clone(),
                    service_name: service.name.clone(),
                    address,
                    port: service.port,
                });
            }
        }
        by_domain
    }

    fn render(&self, state: &State) -> Result<String, ListenerError> {
        let Some(definitions) = state.kv.get(&self.key_prefix).and_then(catalogd_types::KvNode::as_folder) else {
            return Ok(String::new());
        };
        let self_name = state.local_node().map_or("", |n| n.name.as_str());
        let endpoints = self.matching_endpoints(state, self_name);

        let mut out = String::new();
        for (domain, definition) in definitions {
            let Some(services) = endpoints.get(domain) else {
                continue;
            };
            let Some(bytes) = definition.as_value() else {
                continue;
            };
            let body = String::from_utf8_lossy(bytes);
            let reindented = reindent(body.trim());
            out.push('\n');
            out.push_str(domain);
            out.push_str(" {\n");
            out.push_str(&render_template(&reindented, services));
            out.push_str("\n}\n");
        }
        Ok(out)
    }
}

fn reindent(body: &str) -> String {
    body.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_template(template: &str, services: &[Endpoint]) -> String {
    const RANGE_START: &str = "[[range .]]";
    const RANGE_END: &str = "[[end]]";

    // No explicit range block: the whole template is itself the per-instance
    // body, substituted once per matching service (the common case is one
    // instance, i.e. direct substitution).
    let Some(start) = template.find(RANGE_START) else {
        return services.iter().map(|endpoint| substitute(template, endpoint)).collect();
    };
    let Some(end) = template[start..].find(RANGE_END).map(|i| start + i) else {
        return template.to_string();
    };
    let before = &template[..start];
    let block = &template[start + RANGE_START.len()..end];
    let after = &template[end + RANGE_END.len()..];

    let mut rendered = String::from(before);
    for endpoint in services {
        rendered.push_str(&substitute(block, endpoint));
    }
    rendered.push_str(after);
    rendered
}

fn substitute(block: &str, endpoint: &Endpoint) -> String {
    block
        .replace("[[.Name]]", &endpoint.service_name)
        .replace("[[.Address]]", &endpoint.address)
        .replace("[[.Port]]", &endpoint.port.to_string())
        .replace("[[.NodeName]]", &endpoint.node_name)
}

#[async_trait]
impl Listener for GatewayListener {
    fn kv_prefixes(&self) -> &[String] {
        &self.prefixes
    }

    fn name(&self) -> &str {
        "gateway"
    }

    async fn notify(&self, state: &State) -> Result<(), ListenerError> {
        let body = self.render(state)?;
        let changed = self.file.write(|w| w.write_all(body.as_bytes()))?;

        if changed && !self.exec.is_empty() {
            let status = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(&self.exec)
                .status()
                .await;
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    return Err(ListenerError::ExecFailed {
                        command: self.exec.clone(),
                        status: status.code(),
                    })
                }
                Err(err) => {
                    warn!(error = %err, command = %self.exec, "failed to spawn gateway reload command");
                    return Err(ListenerError::ExecFailed {
                        command: self.exec.clone(),
                        status: None,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogd_types::{KvNode, Node, Service};

    #[test]
    fn render_template_repeats_range_block_per_service() {
        let template = "    upstream {\n[[range .]]    server [[.Address]]:[[.Port]];\n[[end]]    }";
        let services = vec![
            Endpoint { node_name: "n1".into(), service_name: "web".into(), address: "10.0.0.1".into(), port: 8080 },
            Endpoint { node_name: "n2".into(), service_name: "web".into(), address: "10.0.0.2".into(), port: 8080 },
        ];
        let rendered = render_template(template, &services);
        assert!(rendered.contains("server 10.0.0.1:8080;"));
        assert!(rendered.contains("server 10.0.0.2:8080;"));
    }

    #[test]
    fn render_template_substitutes_directly_without_a_range_block() {
        let template = "reverse_proxy [[.Address]]:[[.Port]]";
        let services = vec![Endpoint {
            node_name: "n1".into(),
            service_name: "a".into(),
            address: "10.0.0.1".into(),
            port: 80,
        }];
        assert_eq!(render_template(template, &services), "reverse_proxy 10.0.0.1:80");
    }

    #[test]
    fn matching_endpoints_inherits_node_address_when_service_address_is_empty() {
        let mut state = State::new("node-a");
        let mut node = Node::new("a", "node-a");
        node.address = "10.0.0.9".to_string();
        let mut service = Service::new("web-1", "web");
        service.meta.insert(DOMAIN_NAME_KEY.to_string(), "example.com".to_string());
        service.meta.insert(PUBLISH_HTTP_KEY.to_string(), "node-a".to_string());
        node.services.push(service);
        state.nodes.insert("node-a".to_string(), node);

        let listener = GatewayListener::new("gateway/http", "/tmp/unused.conf", "");
        let by_domain = listener.matching_endpoints(&state, "node-a");

        let endpoints = by_domain.get("example.com").unwrap();
        assert_eq!(endpoints[0].address, "10.0.0.9");
    }

    #[tokio::test]
    async fn notify_skips_services_without_domain_name_meta() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = State::new("node-a");
        let mut node = Node::new("a", "node-a");
        node.services.push(Service::new("web-1", "web"));
        state.nodes.insert("node-a".to_string(), node);
        state.kv.set("gateway/http/example.com", KvNode::Value(b"[[range .]]x[[end]]".to_vec()));

        let listener = GatewayListener::new("gateway/http", dir.path().join("gw.conf"), "");
        listener.notify(&state).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("gw.conf")).unwrap_or_default();
        assert!(!contents.contains("example.com"));
    }
}
