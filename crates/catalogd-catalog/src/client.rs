use std::collections::BTreeMap;
use std::time::Duration;

use catalogd_types::Service;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::CatalogError;

/// How long a long-poll request blocks on the catalog server before it must
/// respond, even with nothing new to report.
const LONG_POLL_WAIT: Duration = Duration::from_secs(300);

/// The result of one long-poll request: the value observed, and the index
/// to pass back in on the next call.
///
/// If `index` is unchanged from the index passed in, the response carries no
/// new information (a spurious wakeup) and the caller should poll again
/// without treating it as a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPoll<T> {
    pub index: u64,
    pub value: T,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    index: u64,
    items: T,
}

#[derive(Debug, Deserialize)]
struct AgentSelfResponse {
    node_name: String,
}

/// A single node as reported by the catalog's nodes listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListing {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// A single key-value entry as reported by a KV prefix listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// HTTP client for the catalog's node, service, and key-value endpoints.
///
/// Every watch method is a single long-poll request: it blocks (up to
/// [`LONG_POLL_WAIT`]) until the catalog has something new to report past
/// `index`, or until the wait elapses. Detecting a spurious wakeup (the
/// catalog returning the same index) and looping until real change occurs is
/// the caller's responsibility, to keep this client a thin, side-effect-free
/// transport layer.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    datacenter: String,
}

impl CatalogClient {
    pub fn new(
        address: &str,
        token: Option<String>,
        datacenter: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(LONG_POLL_WAIT + Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("http://{address}"),
            token,
            datacenter: datacenter.into(),
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            req = req.header("X-Catalog-Token", token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, CatalogError> {
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// The name of the node this agent is running on.
    pub async fn agent_self(&self) -> Result<String, CatalogError> {
        let req = self.request("/v1/agent/self");
        let resp: AgentSelfResponse = self.get_json(req).await?;
        Ok(resp.node_name)
    }

    /// Long-polls the full node listing.
    pub async fn watch_nodes(&self, index: u64) -> Result<LongPoll<Vec<NodeListing>>, CatalogError> {
        let req = self
            .request("/v1/catalog/nodes")
            .query(&[("dc", self.datacenter.as_str())])
            .query(&[("index", index), ("wait", LONG_POLL_WAIT.as_secs())]);
        let envelope: Envelope<Vec<NodeListing>> = self.get_json(req).await?;
        Ok(LongPoll {
            index: envelope.index,
            value: envelope.items,
        })
    }

    /// Long-polls the service listing for a single node.
    pub async fn watch_node_services(
        &self,
        node: &str,
        index: u64,
    ) -> Result<LongPoll<Vec<Service>>, CatalogError> {
        let req = self
            .request(&format!("/v1/catalog/node/{node}/services"))
            .query(&[("dc", self.datacenter.as_str())])
            .query(&[("index", index), ("wait", LONG_POLL_WAIT.as_secs())]);
        let envelope: Envelope<Vec<Service>> = self.get_json(req).await?;
        Ok(LongPoll {
            index: envelope.index,
            value: envelope.items,
        })
    }

    /// Long-polls every key under `prefix`, recursively.
    pub async fn watch_kv(&self, prefix: &str, index: u64) -> Result<LongPoll<Vec<KvEntry>>, CatalogError> {
        let req = self
            .request(&format!("/v1/kv/{prefix}"))
            .query(&[("dc", self.datacenter.as_str())])
            .query(&[("recurse", "true")])
            .query(&[("index", index), ("wait", LONG_POLL_WAIT.as_secs())]);
        let envelope: Envelope<Vec<KvEntry>> = self.get_json(req).await?;
        Ok(LongPoll {
            index: envelope.index,
            value: envelope.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_has_no_trailing_slash_duplication() {
        let client = CatalogClient::new("127.0.0.1:8500", None, "dc1").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:8500");
    }
}
