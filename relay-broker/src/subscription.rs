//! Subscription manager: the one-topic-per-connection discipline.

use crate::registry::ConnectionRegistry;
use relay_types::{ConnectionId, Topic};
use std::sync::Arc;

/// Enforces the one-active-topic-per-connection invariant.
pub struct SubscriptionManager {
    registry: Arc<ConnectionRegistry>,
}

impl SubscriptionManager {
    /// Create a manager over the shared registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribe a connection to a topic.
    ///
    /// Precondition: the connection holds exactly its implicit default
    /// membership. Anything else (already subscribed, unknown connection,
    /// empty topic name) is silently ignored; a connection gets one chance
    /// to pick a topic per lifetime and there is no unsubscribe.
    ///
    /// Returns whether the connection joined the topic.
    pub fn subscribe(&self, conn: ConnectionId, topic: Topic) -> bool {
        if topic.is_empty() {
            tracing::debug!(conn = %conn, "ignoring subscribe to empty topic");
            return false;
        }

        // Check-and-join is one atomic registry operation; two racing
        // subscribes for the same connection admit exactly one topic.
        if !self.registry.join_if_unsubscribed(conn, topic.clone()) {
            tracing::debug!(
                conn = %conn,
                topic = %topic,
                "ignoring subscribe outside initial state"
            );
            return false;
        }

        tracing::debug!(conn = %conn, topic = %topic, "subscribed");
        true
    }
}
