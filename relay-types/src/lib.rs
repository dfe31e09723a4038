//! # topic-relay-types
//!
//! Wire format types for the topic-relay message broker.
//!
//! This crate provides the foundational types shared by the broker and its
//! clients:
//! - [`ConnectionId`], [`Topic`] - Identity and room-name types
//! - [`TopicMessage`], [`StoredMessage`] - The relayed message record
//! - [`ClientEvent`], [`ServerEvent`] - Protocol events
//! - [`WireError`] - Codec error type

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod message;

pub use error::WireError;
pub use events::{ClientEvent, DomainError, ErrorCode, ServerEvent};
pub use ids::{ConnectionId, Topic};
pub use message::{StoredMessage, TopicMessage};
