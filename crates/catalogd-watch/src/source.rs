use async_trait::async_trait;
use catalogd_catalog::{CatalogClient, CatalogError, KvEntry, LongPoll, NodeListing};
use catalogd_types::Service;

/// The long-poll surface the watch engine needs from a catalog backend.
///
/// Kept as a trait so the engine's coalescing and cancellation behavior can
/// be exercised against a scripted fake instead of a real catalog server.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn agent_self(&self) -> Result<String, CatalogError>;
    async fn watch_nodes(&self, index: u64) -> Result<LongPoll<Vec<NodeListing>>, CatalogError>;
    async fn watch_node_services(
        &self,
        node: &str,
        index: u64,
    ) -> Result<LongPoll<Vec<Service>>, CatalogError>;
    async fn watch_kv(&self, prefix: &str, index: u64) -> Result<LongPoll<Vec<KvEntry>>, CatalogError>;
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn agent_self(&self) -> Result<String, CatalogError> {
        CatalogClient::agent_self(self).await
    }

    async fn watch_nodes(&self, index: u64) -> Result<LongPoll<Vec<NodeListing>>, CatalogError> {
        CatalogClient::watch_nodes(self, index).await
    }

    async fn watch_node_services(
        &self,
        node: &str,
        index: u64,
    ) -> Result<LongPoll<Vec<Service>>, CatalogError> {
        CatalogClient::watch_node_services(self, node, index).await
    }

    async fn watch_kv(&self, prefix: &str, index: u64) -> Result<LongPoll<Vec<KvEntry>>, CatalogError> {
        CatalogClient::watch_kv(self, prefix, index).await
    }
}
