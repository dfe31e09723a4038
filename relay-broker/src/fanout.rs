//! Fanout dispatcher: live delivery and generic room broadcasts.

use crate::breaker::StoreBreaker;
use crate::error::PublishError;
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::server::BrokerMetrics;
use crate::store::MessageStore;
use relay_types::{DomainError, ServerEvent, StoredMessage, Topic, TopicMessage};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persists submitted messages and fans out stored messages to every
/// current subscriber of their target topic.
///
/// Locally published messages are delivered right after the append
/// succeeds, to the subscribers of that moment. The store's change
/// notification stream covers messages appended by other producers; seqs
/// appended here are marked in `local_seqs` so the notification path does
/// not deliver them a second time to subscribers that arrived later.
pub struct FanoutDispatcher {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
    breaker: Arc<StoreBreaker>,
    metrics: Arc<BrokerMetrics>,
    max_body_bytes: usize,
    local_seqs: Mutex<HashSet<u64>>,
}

impl FanoutDispatcher {
    /// Create a dispatcher over the shared broker state.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
        breaker: Arc<StoreBreaker>,
        metrics: Arc<BrokerMetrics>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            registry,
            store,
            breaker,
            metrics,
            max_body_bytes,
            local_seqs: Mutex::new(HashSet::new()),
        }
    }

    /// Validate, persist, and deliver a submitted message.
    ///
    /// `submitter` is the connection that sent the message, when there is
    /// one; it receives the domain error if validation or the append fails.
    /// Delivery happens here, after the append succeeds; later replay of
    /// the same message is the sync coordinator's job.
    pub async fn publish(
        &self,
        submitter: Option<&ConnectionHandle>,
        message: TopicMessage,
    ) -> Result<StoredMessage, PublishError> {
        if let Err(reason) = validate_message(&message, self.max_body_bytes) {
            tracing::debug!(topic = %message.to, "rejecting publish: {}", reason);
            if let Some(handle) = submitter {
                handle.send(ServerEvent::Error(DomainError::invalid_payload(&reason)));
            }
            return Err(PublishError::Invalid(reason));
        }

        if let Err(e) = self.breaker.check() {
            tracing::warn!(topic = %message.to, "publish rejected: {}", e);
            if let Some(handle) = submitter {
                handle.send(ServerEvent::Error(DomainError::store_unavailable(&e)));
            }
            return Err(e.into());
        }

        // The marker set stays locked across the append, so the
        // notification task cannot observe the new seq before its marker
        // exists.
        let mut local = self.local_seqs.lock().await;
        match self.store.append(message).await {
            Ok(stored) => {
                local.insert(stored.seq);
                drop(local);
                self.breaker.record_success();
                self.metrics.publishes_total.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    topic = %stored.message.to,
                    seq = stored.seq,
                    "message stored"
                );
                let room = stored.message.to.clone();
                self.deliver(stored.message.clone(), &room);
                Ok(stored)
            }
            Err(e) => {
                drop(local);
                self.breaker.record_failure();
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!("message append failed: {}", e);
                if let Some(handle) = submitter {
                    handle.send(ServerEvent::Error(DomainError::store_unavailable(&e)));
                }
                Err(e.into())
            }
        }
    }

    /// Handle a store change notification: deliver only, never re-persist.
    ///
    /// Appends made through [`Self::publish`] were already delivered there
    /// and are skipped; everything else came from another producer.
    pub async fn on_store_notification(&self, stored: StoredMessage) {
        {
            let mut local = self.local_seqs.lock().await;
            if local.remove(&stored.seq) {
                // Local markers below this seq were lagged over on the
                // notification stream and will never match; drop them.
                local.retain(|s| *s > stored.seq);
                return;
            }
        }
        let room = stored.message.to.clone();
        self.deliver(stored.message, &room);
    }

    /// Deliver a message to every current subscriber of `room`.
    pub fn deliver(&self, message: TopicMessage, room: &Topic) {
        let members = self.registry.members_of(room);
        tracing::debug!(topic = %room, subscribers = members.len(), "fanout");
        for handle in members {
            if handle.send(ServerEvent::Message(message.clone())) {
                self.metrics
                    .messages_delivered
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Generic ungated broadcast of a named event to every member of a
    /// room. Used for the peripheral one-shot notices (ledger tx/block,
    /// sync status); no subscription validation applies.
    ///
    /// Returns the number of connections the notice was sent to.
    pub fn broadcast_to_room(
        &self,
        room: &Topic,
        event: &str,
        payload: serde_json::Value,
    ) -> usize {
        let members = self.registry.members_of(room);
        let mut sent = 0;
        for handle in &members {
            if handle.send(ServerEvent::Notice {
                event: event.to_string(),
                payload: payload.clone(),
            }) {
                sent += 1;
            }
        }
        self.metrics
            .notices_sent
            .fetch_add(sent as u64, Ordering::Relaxed);
        sent
    }
}

/// Shape validation for submitted messages.
fn validate_message(message: &TopicMessage, max_body_bytes: usize) -> Result<(), String> {
    if message.from.is_empty() {
        return Err("missing sender".into());
    }
    if message.to.is_empty() {
        return Err("missing topic".into());
    }
    if message.body.len() > max_body_bytes {
        return Err(format!(
            "body too large: {} > {max_body_bytes}",
            message.body.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::registry::ConnectionHandle;
    use crate::store::MemoryStore;
    use relay_types::{ConnectionId, ErrorCode};
    use tokio::sync::mpsc;

    fn msg(topic: &str, ts: u64) -> TopicMessage {
        TopicMessage {
            from: "x".into(),
            to: Topic::from(topic),
            body: "hi".into(),
            timestamp_micros: ts,
        }
    }

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        fanout: FanoutDispatcher,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let store: Arc<dyn MessageStore> = Arc::new(MemoryStore::new());
        let breaker = Arc::new(StoreBreaker::new(&LimitsConfig::default()));
        let fanout = FanoutDispatcher::new(
            registry.clone(),
            store,
            breaker,
            Arc::new(BrokerMetrics::default()),
            1024,
        );
        Fixture { registry, fanout }
    }

    fn connect(registry: &ConnectionRegistry) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(ConnectionHandle::new(id, tx));
        (id, rx)
    }

    #[test]
    fn validate_accepts_well_formed() {
        assert!(validate_message(&msg("t", 1), 1024).is_ok());
    }

    #[test]
    fn validate_rejects_missing_sender() {
        let mut m = msg("t", 1);
        m.from.clear();
        assert_eq!(validate_message(&m, 1024).unwrap_err(), "missing sender");
    }

    #[test]
    fn validate_rejects_missing_topic() {
        let m = msg("", 1);
        assert_eq!(validate_message(&m, 1024).unwrap_err(), "missing topic");
    }

    #[test]
    fn validate_rejects_oversized_body() {
        let mut m = msg("t", 1);
        m.body = "x".repeat(2048);
        assert!(validate_message(&m, 1024).unwrap_err().starts_with("body too large"));
    }

    #[tokio::test]
    async fn deliver_reaches_only_target_room() {
        // P5: delivered to subscribers of T, not of T2.
        let fx = fixture();
        let (sub, mut sub_rx) = connect(&fx.registry);
        let (other, mut other_rx) = connect(&fx.registry);
        fx.registry.join(sub, Topic::from("t"));
        fx.registry.join(other, Topic::from("t2"));

        fx.fanout.deliver(msg("t", 1), &Topic::from("t"));

        assert!(matches!(sub_rx.try_recv().unwrap(), ServerEvent::Message(_)));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notification_delivers_without_repersisting() {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let breaker = Arc::new(StoreBreaker::new(&LimitsConfig::default()));
        let fanout = FanoutDispatcher::new(
            registry.clone(),
            store.clone(),
            breaker,
            Arc::new(BrokerMetrics::default()),
            1024,
        );
        let (sub, mut rx) = connect(&registry);
        registry.join(sub, Topic::from("t"));

        fanout
            .on_store_notification(StoredMessage {
                message: msg("t", 1),
                seq: 7,
            })
            .await;

        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Message(_)));
        assert!(store.is_empty(), "notification path must not persist");
    }

    #[tokio::test]
    async fn publish_delivers_directly_to_current_subscribers() {
        let fx = fixture();
        let (sub, mut rx) = connect(&fx.registry);
        fx.registry.join(sub, Topic::from("t"));

        fx.fanout.publish(None, msg("t", 1)).await.unwrap();

        assert!(matches!(rx.try_recv().unwrap(), ServerEvent::Message(_)));
    }

    #[tokio::test]
    async fn late_notification_for_local_publish_is_skipped() {
        // A subscriber that arrives after the publish gets the message via
        // sync replay; the notification for that append must not deliver it
        // a second time.
        let fx = fixture();
        let stored = fx.fanout.publish(None, msg("t", 1000)).await.unwrap();

        let (sub, mut rx) = connect(&fx.registry);
        fx.registry.join(sub, Topic::from("t"));

        fx.fanout.on_store_notification(stored).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_publish_reports_to_submitter_only() {
        let fx = fixture();
        let (sub, mut sub_rx) = connect(&fx.registry);
        fx.registry.join(sub, Topic::from("t"));
        let (publisher, mut pub_rx) = connect(&fx.registry);
        let handle = fx.registry.handle_of(publisher).unwrap();

        let mut bad = msg("t", 1);
        bad.from.clear();
        let result = fx.fanout.publish(Some(&handle), bad).await;

        assert!(result.is_err());
        match pub_rx.try_recv().unwrap() {
            ServerEvent::Error(err) => assert_eq!(err.code, ErrorCode::InvalidPayload),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(sub_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_persists_to_store() {
        let fx = fixture();
        let stored = fx.fanout.publish(None, msg("t", 42)).await.unwrap();
        assert_eq!(stored.message.timestamp_micros, 42);
        assert!(stored.seq > 0);
    }

    #[tokio::test]
    async fn broadcast_to_room_is_ungated() {
        let fx = fixture();
        let (a, mut a_rx) = connect(&fx.registry);
        let (b, mut b_rx) = connect(&fx.registry);
        fx.registry.join(a, Topic::from("inv"));
        fx.registry.join(b, Topic::from("inv"));
        let (_c, mut c_rx) = connect(&fx.registry);

        let sent = fx.fanout.broadcast_to_room(
            &Topic::from("inv"),
            "tx",
            serde_json::json!({ "txid": "ab" }),
        );

        assert_eq!(sent, 2);
        for rx in [&mut a_rx, &mut b_rx] {
            match rx.try_recv().unwrap() {
                ServerEvent::Notice { event, payload } => {
                    assert_eq!(event, "tx");
                    assert_eq!(payload["txid"], "ab");
                }
                other => panic!("expected notice, got {other:?}"),
            }
        }
        assert!(c_rx.try_recv().is_err());
    }
}
