//! Error types for farm operations

use storage::{KvError, OutboxError};
use thiserror::Error;

use crate::identity::IdentityError;
use crate::remote::RemoteError;
use crate::session::SessionError;
use crate::validation::ValidationError;

/// Errors returned by the farm services
#[derive(Debug, Error)]
pub enum FarmError {
    /// User input was rejected before any store was touched
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The remote store failed and no local fallback applies
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// On-device storage failed
    #[error("Local storage error: {0}")]
    Storage(#[from] KvError),

    /// The outbox could not be read or written
    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),

    /// Sign-in or sign-up failed
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// The session could not be read or written
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A local delete targeted a record that does not exist
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Every step of the farmer-id ladder failed
    #[error("Could not resolve a farmer profile id after {} attempts", diagnostics.len())]
    ResolutionFailed {
        /// One line per attempted step
        diagnostics: Vec<String>,
    },
}

/// Result type for farm operations
pub type Result<T> = std::result::Result<T, FarmError>;
