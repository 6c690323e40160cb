//! Publish/subscribe channel keyed by broadcaster name.
mod memory;
use anyhow::Result;
pub use memory::MemoryChannel;
use std::{sync::Arc, time::Duration};

/// A channel holding the latest payload published under each name.
///
/// Publishing replaces the previous payload; there is no backlog. Payloads are
/// immutable once published, so readers share them without copying.
pub trait PubSub: Send + Sync {
    /// Replaces the latest payload under `name`.
    fn publish(&self, name: &str, payload: Vec<u8>) -> Result<()>;

    /// Returns the latest payload under `name`, if any.
    fn get_latest(&self, name: &str) -> Result<Option<Arc<[u8]>>>;

    /// Like [`PubSub::get_latest`], but blocks up to `timeout` until something
    /// has been published under `name`.
    fn wait_latest(&self, name: &str, timeout: Duration) -> Result<Option<Arc<[u8]>>>;
}
