//! Sync coordinator: bounded historical replay.

use crate::breaker::StoreBreaker;
use crate::error::StoreError;
use crate::registry::ConnectionRegistry;
use crate::server::BrokerMetrics;
use crate::store::MessageStore;
use crate::time::micros_now;
use relay_types::{ConnectionId, DomainError, ServerEvent};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Validates sync requests, runs the `[since, now)` range query, and
/// unicasts the results to the requester.
pub struct SyncCoordinator {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
    breaker: Arc<StoreBreaker>,
    metrics: Arc<BrokerMetrics>,
    query_timeout: Duration,
}

impl SyncCoordinator {
    /// Create a coordinator over the shared broker state.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
        breaker: Arc<StoreBreaker>,
        metrics: Arc<BrokerMetrics>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            breaker,
            metrics,
            query_timeout,
        }
    }

    /// Handle a sync request from a connection.
    ///
    /// Replayed messages go to the requesting connection only, never the
    /// whole room. Store failures are connection-scoped: logged, counted,
    /// surfaced as a domain error event, and the relay keeps serving.
    pub async fn request_sync(&self, conn: ConnectionId, since_micros: u64) {
        let Some(handle) = self.registry.handle_of(conn) else {
            tracing::debug!(conn = %conn, "sync from unregistered connection");
            return;
        };

        let rooms = self.registry.rooms_of(conn);
        if rooms.len() != 2 {
            tracing::debug!(conn = %conn, memberships = rooms.len(), "sync without subscription");
            handle.send(ServerEvent::Error(DomainError::subscription_required()));
            return;
        }
        // Index 0 is the default room; index 1 the subscribed topic.
        let topic = rooms[1].clone();
        let now = micros_now();

        if let Err(e) = self.breaker.check() {
            tracing::warn!(conn = %conn, topic = %topic, "sync rejected: {}", e);
            handle.send(ServerEvent::Error(DomainError::store_unavailable(e)));
            return;
        }

        let query = self.store.messages_between(&topic, since_micros, now);
        let messages = match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(messages)) => {
                self.breaker.record_success();
                messages
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(conn = %conn, topic = %topic, "sync query failed: {}", e);
                handle.send(ServerEvent::Error(DomainError::store_unavailable(e)));
                return;
            }
            Err(_) => {
                self.breaker.record_failure();
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    conn = %conn,
                    topic = %topic,
                    timeout_secs = self.query_timeout.as_secs(),
                    "sync query timed out"
                );
                handle.send(ServerEvent::Error(DomainError::store_unavailable(
                    StoreError::Timeout,
                )));
                return;
            }
        };

        tracing::debug!(
            conn = %conn,
            topic = %topic,
            since_micros,
            now_micros = now,
            count = messages.len(),
            "sync replay"
        );

        for stored in messages {
            handle.send(ServerEvent::Message(stored.message));
            self.metrics.messages_replayed.fetch_add(1, Ordering::Relaxed);
        }
        self.metrics.syncs_total.fetch_add(1, Ordering::Relaxed);
    }
}
