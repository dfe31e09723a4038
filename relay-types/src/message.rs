//! The relayed message record.

use serde::{Deserialize, Serialize};

use crate::Topic;

/// A message submitted to the relay for fan-out and storage.
///
/// The timestamp is assigned at ingest by the producing side using a
/// monotonically increasing microsecond clock; the relay never re-derives
/// it. Messages are immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMessage {
    /// Sender identity (public key string).
    pub from: String,
    /// Target topic.
    pub to: Topic,
    /// Message body, opaque to the relay.
    pub body: String,
    /// Producer-assigned timestamp in microseconds.
    pub timestamp_micros: u64,
}

/// A message as it sits in the store, with the store-assigned sequence
/// number used to break timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// The original message record.
    pub message: TopicMessage,
    /// Store-assigned sequence, monotonically increasing per store.
    pub seq: u64,
}

impl StoredMessage {
    /// The ordering key for a single topic: timestamp, tie-broken by
    /// sequence.
    pub fn order_key(&self) -> (u64, u64) {
        (self.message.timestamp_micros, self.seq)
    }
}
