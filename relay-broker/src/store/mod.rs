//! Message store adapter.
//!
//! The storage engine itself is an external dependency; the broker talks to
//! it through [`MessageStore`]. The crate ships an in-memory implementation
//! that backs tests and single-process deployments.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;
use relay_types::{StoredMessage, Topic, TopicMessage};
use tokio::sync::broadcast;

/// Trait for message store backends.
///
/// The store owns the total order over messages of a topic: timestamp,
/// tie-broken by the store-assigned sequence. The broker never reorders.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message and assign it a sequence number.
    async fn append(&self, message: TopicMessage) -> Result<StoredMessage, StoreError>;

    /// All messages on `topic` with `low <= timestamp < high`, in store
    /// order.
    async fn messages_between(
        &self,
        topic: &Topic,
        low_micros: u64,
        high_micros: u64,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Subscribe to append notifications.
    ///
    /// Fires for every appended message, including ones appended by
    /// producers other than this broker process.
    fn subscribe_changes(&self) -> broadcast::Receiver<StoredMessage>;
}
