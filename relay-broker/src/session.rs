//! Per-connection session state machine.
//!
//! States are `Connected` and `Subscribed`; the only forward transition is
//! a successful subscribe. Operations invalid in the current state are
//! ignored per the subscription contract (the sync coordinator re-validates
//! membership itself and answers with a domain error).

use relay_types::{ClientEvent, Topic, TopicMessage};

/// Session state machine states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no topic chosen yet.
    Connected,
    /// Bound to a topic for the rest of the connection's lifetime.
    Subscribed {
        /// The subscribed topic.
        topic: Topic,
    },
}

/// The follow-up the broker must run for a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing to do; the event was ignored in this state.
    None,
    /// Attempt the one-shot topic subscription.
    Subscribe(Topic),
    /// Run a sync replay from the given timestamp.
    Sync(u64),
    /// Persist and fan out a submitted message.
    Publish(TopicMessage),
    /// Tear the connection down.
    Close,
}

/// A per-connection session.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Session {
    /// Create a session in the initial state.
    pub fn new() -> Self {
        Self {
            state: SessionState::Connected,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Map an incoming event to the action valid in the current state.
    ///
    /// `broker_enabled` reflects the subsystem toggle: when false, sync and
    /// publish are ignored while subscribe (a plain room join) and
    /// disconnect still work.
    pub fn dispatch(&self, event: ClientEvent, broker_enabled: bool) -> SessionAction {
        match (&self.state, event) {
            (SessionState::Connected, ClientEvent::Subscribe { topic }) => {
                SessionAction::Subscribe(topic)
            }
            (SessionState::Subscribed { topic: bound }, ClientEvent::Subscribe { topic }) => {
                tracing::debug!(bound = %bound, requested = %topic, "ignoring resubscribe");
                SessionAction::None
            }
            (_, ClientEvent::Sync { since_micros }) if broker_enabled => {
                SessionAction::Sync(since_micros)
            }
            (_, ClientEvent::Publish { message }) if broker_enabled => {
                SessionAction::Publish(message)
            }
            (_, ClientEvent::Disconnect) => SessionAction::Close,
            (_, event) => {
                tracing::debug!(?event, "ignoring event while broker disabled");
                SessionAction::None
            }
        }
    }

    /// Record a successful subscription.
    pub fn mark_subscribed(&mut self, topic: Topic) {
        self.state = SessionState::Subscribed { topic };
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
