//! Protocol events exchanged between clients and the broker.

use serde::{Deserialize, Serialize};

use crate::{Topic, TopicMessage, WireError};

/// Events a client sends to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Subscribe this connection to a topic.
    Subscribe {
        /// The topic to join.
        topic: Topic,
    },
    /// Request historical replay from a timestamp up to now.
    Sync {
        /// Lower bound of the replay window, microseconds (inclusive).
        since_micros: u64,
    },
    /// Submit a message for storage and fan-out.
    Publish {
        /// The message to relay.
        message: TopicMessage,
    },
    /// The connection is going away.
    Disconnect,
}

/// Events the broker sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A relayed message, both for live fan-out and sync replay.
    Message(TopicMessage),
    /// A domain-level error scoped to this connection.
    Error(DomainError),
    /// A generic named broadcast (ledger notices, sync status, ...).
    Notice {
        /// Event name.
        event: String,
        /// Event payload.
        payload: serde_json::Value,
    },
}

impl ServerEvent {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

impl ClientEvent {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

/// Error codes a client can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Sync requested without an active topic subscription.
    SubscriptionRequired,
    /// The backing store failed or is temporarily unavailable.
    StoreUnavailable,
    /// The submitted payload failed shape validation.
    InvalidPayload,
}

/// A connection-scoped error delivered as a wire event, never an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl DomainError {
    /// The error returned when sync is requested without a subscription.
    pub fn subscription_required() -> Self {
        Self {
            code: ErrorCode::SubscriptionRequired,
            message: "must subscribe before syncing".into(),
        }
    }

    /// The error returned when the store cannot serve a request.
    pub fn store_unavailable(detail: impl std::fmt::Display) -> Self {
        Self {
            code: ErrorCode::StoreUnavailable,
            message: format!("store unavailable: {detail}"),
        }
    }

    /// The error returned for malformed payloads.
    pub fn invalid_payload(detail: impl std::fmt::Display) -> Self {
        Self {
            code: ErrorCode::InvalidPayload,
            message: format!("invalid payload: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> TopicMessage {
        TopicMessage {
            from: "pubkey-a".into(),
            to: Topic::from("pub123"),
            body: "hello".into(),
            timestamp_micros: 1_700_000_000_000_000,
        }
    }

    #[test]
    fn subscribe_roundtrip() {
        let event = ClientEvent::Subscribe {
            topic: Topic::from("pub123"),
        };
        let restored = ClientEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn sync_roundtrip() {
        let event = ClientEvent::Sync { since_micros: 500 };
        let restored = ClientEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn publish_roundtrip() {
        let event = ClientEvent::Publish {
            message: sample_message(),
        };
        let restored = ClientEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert!(matches!(restored, ClientEvent::Publish { .. }));
    }

    #[test]
    fn server_message_roundtrip() {
        let event = ServerEvent::Message(sample_message());
        let restored = ServerEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn notice_carries_json_payload() {
        let event = ServerEvent::Notice {
            event: "block".into(),
            payload: serde_json::json!({ "hash": "00ab" }),
        };
        let restored = ServerEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn subscription_required_message_text() {
        let err = DomainError::subscription_required();
        assert_eq!(err.code, ErrorCode::SubscriptionRequired);
        assert_eq!(err.message, "must subscribe before syncing");
    }

    #[test]
    fn error_event_roundtrip() {
        let event = ServerEvent::Error(DomainError::store_unavailable("query timed out"));
        let restored = ServerEvent::from_bytes(&event.to_bytes().unwrap()).unwrap();
        if let ServerEvent::Error(err) = restored {
            assert_eq!(err.code, ErrorCode::StoreUnavailable);
        } else {
            panic!("expected Error event");
        }
    }
}
