//! Main broker coordination.
//!
//! The [`Broker`] wires the registry, subscription manager, sync
//! coordinator, and fanout dispatcher over a shared store adapter, and is
//! the programmatic boundary the transport layer and in-process
//! collaborators talk to.

use crate::breaker::StoreBreaker;
use crate::config::Config;
use crate::error::PublishError;
use crate::fanout::FanoutDispatcher;
use crate::notify::spawn_notification_task;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::session::{Session, SessionAction};
use crate::store::MessageStore;
use crate::subscription::SubscriptionManager;
use crate::sync::SyncCoordinator;
use dashmap::DashMap;
use relay_types::{ClientEvent, ConnectionId, ServerEvent, StoredMessage, Topic, TopicMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Operational metrics for monitoring broker activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Total connections registered.
    pub connections_total: AtomicU64,
    /// Total successful topic subscriptions.
    pub subscriptions_total: AtomicU64,
    /// Total messages persisted via publish.
    pub publishes_total: AtomicU64,
    /// Total sync requests served successfully.
    pub syncs_total: AtomicU64,
    /// Total messages delivered by live fanout.
    pub messages_delivered: AtomicU64,
    /// Total messages replayed by sync.
    pub messages_replayed: AtomicU64,
    /// Total generic notices sent.
    pub notices_sent: AtomicU64,
    /// Total store failures observed.
    pub store_errors: AtomicU64,
}

/// The topic-relay broker.
pub struct Broker {
    config: Config,
    store: Arc<dyn MessageStore>,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<BrokerMetrics>,
    subscriptions: SubscriptionManager,
    sync: SyncCoordinator,
    fanout: Arc<FanoutDispatcher>,
    sessions: DashMap<ConnectionId, Session>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("config", &self.config)
            .field("connections", &self.registry.len())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl Broker {
    /// Create a broker over the given config and store adapter.
    pub fn new(config: Config, store: Arc<dyn MessageStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let breaker = Arc::new(StoreBreaker::new(&config.limits));
        let metrics = Arc::new(BrokerMetrics::default());

        let subscriptions = SubscriptionManager::new(registry.clone());
        let sync = SyncCoordinator::new(
            registry.clone(),
            store.clone(),
            breaker.clone(),
            metrics.clone(),
            Duration::from_secs(config.broker.store_query_timeout_secs),
        );
        let fanout = Arc::new(FanoutDispatcher::new(
            registry.clone(),
            store.clone(),
            breaker,
            metrics.clone(),
            config.broker.max_body_bytes,
        ));

        Self {
            config,
            store,
            registry,
            metrics,
            subscriptions,
            sync,
            fanout,
            sessions: DashMap::new(),
        }
    }

    /// The broker configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operational metrics.
    pub fn metrics(&self) -> &BrokerMetrics {
        &self.metrics
    }

    /// Register a new connection.
    ///
    /// Returns the assigned id and the receiving half of the connection's
    /// outbound event channel, which the transport drains to the socket.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        self.registry.register(ConnectionHandle::new(id, tx));
        self.sessions.insert(id, Session::new());
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);

        tracing::info!(conn = %id, "new connection");
        (id, rx)
    }

    /// Tear down a connection: session and all room memberships.
    pub fn disconnect(&self, conn: ConnectionId) {
        self.sessions.remove(&conn);
        self.registry.remove(conn);
        tracing::info!(conn = %conn, "disconnected");
    }

    /// Handle one client event for a connection.
    pub async fn handle_event(&self, conn: ConnectionId, event: ClientEvent) {
        let enabled = self.config.broker.enabled;

        // Dispatch under the session guard, run async follow-ups outside it.
        let action = {
            let Some(session) = self.sessions.get(&conn) else {
                tracing::debug!(conn = %conn, "event for unknown session");
                return;
            };
            session.dispatch(event, enabled)
        };

        match action {
            SessionAction::None => {}
            SessionAction::Subscribe(topic) => {
                if self.subscriptions.subscribe(conn, topic.clone()) {
                    if let Some(mut session) = self.sessions.get_mut(&conn) {
                        session.mark_subscribed(topic);
                    }
                    self.metrics
                        .subscriptions_total
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
            SessionAction::Sync(since_micros) => {
                self.sync.request_sync(conn, since_micros).await;
            }
            SessionAction::Publish(message) => {
                let handle = self.registry.handle_of(conn);
                // Failures are surfaced to the submitter as error events.
                let _ = self.fanout.publish(handle.as_ref(), message).await;
            }
            SessionAction::Close => {
                self.disconnect(conn);
            }
        }
    }

    /// Persist and fan out a message on behalf of an in-process
    /// collaborator (no submitting connection).
    pub async fn publish_to_topic(
        &self,
        message: TopicMessage,
    ) -> Result<StoredMessage, PublishError> {
        self.fanout.publish(None, message).await
    }

    /// Broadcast a named event to every member of a room, without
    /// subscription gating. Returns the number of recipients.
    pub fn broadcast_to_room(
        &self,
        room: &Topic,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        self.fanout.broadcast_to_room(room, event, payload)
    }

    /// Spawn the task that forwards store change notifications into the
    /// fanout dispatcher. Required for live delivery of messages appended
    /// to the store by other producers; local publishes deliver directly.
    pub fn spawn_notification_task(&self) -> tokio::task::JoinHandle<()> {
        spawn_notification_task(self.store.clone(), self.fanout.clone())
    }
}
