//! In-memory message store.

use super::MessageStore;
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use relay_types::{StoredMessage, Topic, TopicMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Capacity of the change-notification channel.
///
/// Slow consumers see a lag error and resync rather than blocking appends.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// An in-memory [`MessageStore`].
///
/// Keeps one ordered log per topic. Appends insert at the position given by
/// `(timestamp, seq)` so range queries come back in store order even when
/// producers' clocks deliver out of order.
pub struct MemoryStore {
    topics: DashMap<Topic, Vec<StoredMessage>>,
    seq: AtomicU64,
    changes: broadcast::Sender<StoredMessage>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            topics: DashMap::new(),
            seq: AtomicU64::new(0),
            changes,
        }
    }

    /// Total number of stored messages across all topics.
    pub fn len(&self) -> usize {
        self.topics.iter().map(|entry| entry.value().len()).sum()
    }

    /// Whether the store holds no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: TopicMessage) -> Result<StoredMessage, StoreError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let stored = StoredMessage { message, seq };

        {
            let mut log = self.topics.entry(stored.message.to.clone()).or_default();
            let pos = log.partition_point(|m| m.order_key() <= stored.order_key());
            log.insert(pos, stored.clone());
        }

        // Receiver count may be zero; that is not an error.
        let _ = self.changes.send(stored.clone());

        Ok(stored)
    }

    async fn messages_between(
        &self,
        topic: &Topic,
        low_micros: u64,
        high_micros: u64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let messages = self
            .topics
            .get(topic)
            .map(|log| {
                log.iter()
                    .filter(|m| {
                        m.message.timestamp_micros >= low_micros
                            && m.message.timestamp_micros < high_micros
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(messages)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StoredMessage> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, ts: u64) -> TopicMessage {
        TopicMessage {
            from: "x".into(),
            to: Topic::from(topic),
            body: format!("m{ts}"),
            timestamp_micros: ts,
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_seq() {
        let store = MemoryStore::new();
        let a = store.append(msg("t", 100)).await.unwrap();
        let b = store.append(msg("t", 200)).await.unwrap();
        assert!(b.seq > a.seq);
    }

    #[tokio::test]
    async fn range_query_is_half_open() {
        let store = MemoryStore::new();
        store.append(msg("t", 100)).await.unwrap();
        store.append(msg("t", 200)).await.unwrap();
        store.append(msg("t", 300)).await.unwrap();

        let topic = Topic::from("t");
        let result = store.messages_between(&topic, 100, 300).await.unwrap();
        let stamps: Vec<u64> = result.iter().map(|m| m.message.timestamp_micros).collect();
        assert_eq!(stamps, vec![100, 200]);
    }

    #[tokio::test]
    async fn range_query_orders_out_of_order_appends() {
        let store = MemoryStore::new();
        store.append(msg("t", 300)).await.unwrap();
        store.append(msg("t", 100)).await.unwrap();
        store.append(msg("t", 200)).await.unwrap();

        let topic = Topic::from("t");
        let result = store.messages_between(&topic, 0, 1000).await.unwrap();
        let stamps: Vec<u64> = result.iter().map(|m| m.message.timestamp_micros).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_append_order() {
        let store = MemoryStore::new();
        let a = store.append(msg("t", 100)).await.unwrap();
        let b = store.append(msg("t", 100)).await.unwrap();

        let topic = Topic::from("t");
        let result = store.messages_between(&topic, 0, 1000).await.unwrap();
        assert_eq!(result[0].seq, a.seq);
        assert_eq!(result[1].seq, b.seq);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let store = MemoryStore::new();
        store.append(msg("a", 100)).await.unwrap();
        store.append(msg("b", 100)).await.unwrap();

        let result = store
            .messages_between(&Topic::from("a"), 0, 1000)
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].message.to, Topic::from("a"));
    }

    #[tokio::test]
    async fn unknown_topic_returns_empty() {
        let store = MemoryStore::new();
        let result = store
            .messages_between(&Topic::from("nope"), 0, u64::MAX)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn append_notifies_subscribers() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe_changes();

        let stored = store.append(msg("t", 100)).await.unwrap();
        let notified = changes.recv().await.unwrap();
        assert_eq!(notified, stored);
    }

    #[tokio::test]
    async fn append_without_subscribers_succeeds() {
        let store = MemoryStore::new();
        store.append(msg("t", 100)).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
