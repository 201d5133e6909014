//! Client for the hosted relational service
//!
//! This crate provides the HTTP plumbing FarmTrack uses to reach its hosted
//! database: service configuration, a PostgREST-style request builder and
//! client, and the retry policy shared by every remote call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod rest;
pub mod retry;

pub use config::{ConfigError, ServiceConfig};
pub use rest::{HttpMethod, RestClient, RestError, RestRequest, RestResponse};
pub use retry::RetryConfig;

/// Result type for REST operations
pub type Result<T> = std::result::Result<T, RestError>;
