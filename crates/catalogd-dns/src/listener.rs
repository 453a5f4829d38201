use std::collections::BTreeSet;

use async_trait::async_trait;
use catalogd_listener::{Listener, ListenerError};
use catalogd_types::State;
use tracing::info;

use crate::registrar::RegistrarClient;

pub const VISIBILITY_KEY: &str = "visibility";
pub const VISIBILITY_PUBLIC: &str = "public";
pub const DOMAIN_NAME_KEY: &str = "domain-name";

/// Reconciles the registrar's `A` records against the set of public nodes
/// and services in [`State`].
///
/// Computes the desired fully-qualified name set (the self node, if public;
/// every service carrying a `domain-name` meta and public visibility),
/// fetches the registrar's current `A` records pointed at the agent's own
/// egress address (from the registrar's `ping`), and issues the minimal
/// create/delete set to reconcile. `dry_run` computes the diff but never
/// calls the registrar.
pub struct DnsListener {
    client: RegistrarClient,
    domains: Vec<String>,
    dry_run: bool,
}

impl DnsListener {
    pub fn new(client: RegistrarClient, domains: Vec<String>, dry_run: bool) -> Self {
        Self {
            client,
            domains,
            dry_run,
        }
    }

    fn desired_names(&self, state: &State) -> BTreeSet<String> {
        let mut names = BTreeSet::new();

        if let Some(self_node) = state.local_node() {
            if self_node.meta.get(VISIBILITY_KEY).map(String::as_str) == Some(VISIBILITY_PUBLIC) {
                names.insert(self_node.name.clone());
            }
        }

        for node in state.nodes.values() {
            for service in &node.services {
                let Some(domain) = service.meta.get(DOMAIN_NAME_KEY) else {
                    continue;
                };
                if service.meta.get(VISIBILITY_KEY).map(String::as_str) != Some(VISIBILITY_PUBLIC) {
                    continue;
                }
                names.insert(domain.clone());
            }
        }

        names
    }

    fn split_name(&self, fqdn: &str) -> Option<(String, String)> {
        for domain in &self.domains {
            if let Some(name) = fqdn.strip_suffix(&format!(".{domain}")) {
                return Some((name.to_string(), domain.clone()));
            }
            if fqdn == domain {
                return Some((String::new(), domain.clone()));
            }
        }
        None
    }
}

#[async_trait]
impl Listener for DnsListener {
    fn name(&self) -> &str {
        "dns"
    }

    async fn notify(&self, state: &State) -> Result<(), ListenerError> {
        let render_err = |reason: String| ListenerError::Render {
            what: "dns".to_string(),
            reason,
        };

        let egress = self
            .client
            .ping()
            .await
            .map_err(|err| render_err(format!("ping registrar: {err}")))?;

        let mut existing: std::collections::BTreeMap<String, String> = Default::default();
        for domain in &self.domains {
            let records = self
                .client
                .retrieve_records(domain)
                .await
                .map_err(|err| render_err(format!("retrieve records for {domain}: {err}")))?;

            for record in records {
                if record.record_type != "A" || record.content != egress {
                    continue;
                }
                existing.insert(record.name, record.id);
            }
        }

        let desired = self.desired_names(state);

        for name in desired.difference(&existing.keys().cloned().collect()) {
            let Some((subdomain, domain)) = self.split_name(name) else {
                continue;
            };
            if !self.dry_run {
                self.client
                    .create_record(&domain, &subdomain, &egress)
                    .await
                    .map_err(|err| render_err(format!("create record for {name}: {err}")))?;
            }
            info!(name, "added dns record");
        }

        for (name, id) in &existing {
            if desired.contains(name) {
                continue;
            }
            let Some((_, domain)) = self.split_name(name) else {
                continue;
            };
            if !self.dry_run {
                self.client
                    .delete_record(&domain, id)
                    .await
                    .map_err(|err| render_err(format!("delete record for {name}: {err}")))?;
            }
            info!(name, "removed dns record");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogd_types::{Node, Service};

    fn listener() -> DnsListener {
        DnsListener::new(
            RegistrarClient::new("key", "secret"),
            vec!["node.example".to_string(), "svc.example".to_string()],
            true,
        )
    }

    #[test]
    fn desired_names_includes_public_self_node() {
        let mut state = State::new("node-a");
        let mut node = Node::new("a", "node-a");
        node.meta.insert(VISIBILITY_KEY.to_string(), VISIBILITY_PUBLIC.to_string());
        state.nodes.insert("node-a".to_string(), node);

        let names = listener().desired_names(&state);
        assert!(names.contains("node-a"));
    }

    #[test]
    fn desired_names_excludes_private_self_node() {
        let mut state = State::new("node-a");
        state.nodes.insert("node-a".to_string(), Node::new("a", "node-a"));

        let names = listener().desired_names(&state);
        assert!(names.is_empty());
    }

    #[test]
    fn desired_names_includes_public_service_with_domain_name() {
        let mut state = State::new("node-a");
        let mut node = Node::new("a", "node-a");
        let mut service = Service::new("s1", "web");
        service.meta.insert(DOMAIN_NAME_KEY.to_string(), "web.svc.example".to_string());
        service.meta.insert(VISIBILITY_KEY.to_string(), VISIBILITY_PUBLIC.to_string());
        node.set_services(vec![service]);
        state.nodes.insert("node-a".to_string(), node);

        let names = listener().desired_names(&state);
        assert!(names.contains("web.svc.example"));
    }

    #[test]
    fn split_name_matches_known_domain_suffix() {
        let listener = listener();
        assert_eq!(
            listener.split_name("web.svc.example"),
            Some(("web".to_string(), "svc.example".to_string()))
        );
        assert_eq!(listener.split_name("unknown.tld"), None);
    }
}
