//! Local storage layer for FarmTrack
//!
//! This crate provides the on-device key-value store, typed record
//! collections, and the outbox of writes waiting to reach the remote store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collections;
pub mod kv;
pub mod outbox;

pub use collections::{Keyed, LocalCollection};
pub use kv::{KvConfig, KvError, KvStore};
pub use outbox::{Outbox, OutboxError, PendingKind, PendingWrite};
