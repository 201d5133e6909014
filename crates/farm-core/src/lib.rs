//! Core farm-management logic for FarmTrack
//!
//! This crate holds the domain model and the offline-first record flow:
//! the session gate, profile ensure-or-create, the farmer-id resolution
//! ladder, farmland and crop repositories that fall back to on-device
//! storage, and the reconciliation pass that later promotes local-only
//! records to the remote store.
//!
//! # Store precedence
//!
//! Every read and write goes through one repository with a single
//! [`config::SourcePrecedence`]. Results carry a [`models::StoreSource`] so
//! callers always know which replica answered, and deletes are routed back
//! to exactly that replica.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dashboard;
pub mod error;
pub mod farmer_id;
pub mod identity;
pub mod local;
pub mod models;
pub mod profile;
pub mod records;
pub mod remote;
pub mod session;
pub mod sync;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{FarmConfig, LadderConfig, SourcePrecedence};
pub use error::{FarmError, Result};
pub use models::{
    Crop, DashboardSummary, Farmer, Farmland, RecordRef, SoilType, Sourced, StoreSource,
    UserIdentity,
};
pub use records::WriteOutcome;
pub use remote::{PostgrestStore, RemoteError, RemoteStore, UnconfiguredRemote};
