use async_trait::async_trait;
use catalogd_types::State;

use crate::error::ListenerError;

/// A consumer of the mirrored catalog snapshot.
///
/// The watch engine calls [`Listener::notify`] with an isolated clone of
/// [`State`] once the catalog has gone quiet for the coalescing window. A
/// listener should be idempotent: being notified with a snapshot equal to
/// the one it last saw must be a no-op (the file-artifact helper in this
/// crate gives that for free to anything that renders a file).
///
/// Returning `Err` is treated as fatal by the watch engine: it cancels the
/// whole watch group rather than letting listeners silently diverge from
/// the catalog.
#[async_trait]
pub trait Listener: Send + Sync {
    /// KV prefixes this listener needs mirrored into `State::kv`. The watch
    /// engine deduplicates prefixes across all registered listeners before
    /// opening KV watches.
    fn kv_prefixes(&self) -> &[String] {
        &[]
    }

    /// A short name used in logs to identify which listener failed or
    /// changed something on disk.
    fn name(&self) -> &str;

    async fn notify(&self, state: &State) -> Result<(), ListenerError>;
}
