//! # topic-relay-broker
//!
//! Topic subscription and synchronization broker for topic-relay.
//!
//! This crate implements the broker core that:
//! - Enforces a one-active-topic-per-connection subscription discipline
//! - Persists published messages through a pluggable store adapter
//! - Fans out new messages to every subscriber of their target topic
//! - Serves historical replay as a bounded `[since, now)` range query,
//!   unicast to the requester only
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                      ┌── Client B
//!            │   transport (ext.)   │
//!            ├──────────────────────┤
//!            │                      │
//!        ┌───┴──────────────────────┴───┐
//!        │         Broker               │
//!        │  sessions → registry         │
//!        │  publish ─► MessageStore ─┐  │
//!        │  fanout  ◄── change feed ─┘  │
//!        └──────────────────────────────┘
//! ```
//!
//! The transport layer is an external collaborator: the broker speaks to it
//! through [`registry::ConnectionHandle`] channels and the
//! [`relay_types::ClientEvent`] / [`relay_types::ServerEvent`] protocol.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod breaker;
pub mod config;
pub mod error;
pub mod fanout;
pub mod notify;
pub mod registry;
pub mod server;
pub mod session;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod time;
