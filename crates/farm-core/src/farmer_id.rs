//! Farmer-id resolution ladder
//!
//! Obtains the remote profile id an identity's farmland must reference.
//! Steps run in order, each only after the previous one failed:
//!
//! 1. [`ResolutionStep::Lookup`]: find the identity's profile
//! 2. [`ResolutionStep::Insert`]: insert a placeholder profile
//! 3. [`ResolutionStep::InsertDetached`]: insert a profile whose owner
//!    reference is a fresh id (off unless [`LadderConfig::allow_detached_owner`])
//! 4. [`ResolutionStep::Rpc`]: call the `create_farmer` procedure
//!
//! Each step is a single remote call wrapped in the store's retry policy.

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LadderConfig;
use crate::error::{FarmError, Result};
use crate::models::{NewFarmer, UserIdentity};
use crate::remote::{RemoteError, RemoteStore};

/// One rung of the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionStep {
    /// Profile lookup by identity
    Lookup,
    /// Placeholder profile insert
    Insert,
    /// Insert with an owner reference unrelated to the identity
    InsertDetached,
    /// Server-side `create_farmer` procedure
    Rpc,
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStep::Lookup => write!(f, "lookup"),
            ResolutionStep::Insert => write!(f, "insert"),
            ResolutionStep::InsertDetached => write!(f, "insert-detached"),
            ResolutionStep::Rpc => write!(f, "rpc"),
        }
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmerIdResolution {
    /// Remote profile id
    pub farmer_id: String,
    /// Step that produced the id
    pub step: ResolutionStep,
    /// Whether the profile's owner reference is the signed-in identity
    pub ownership_verified: bool,
    /// One line per attempted step
    pub diagnostics: Vec<String>,
}

/// Runs the ladder against a remote store
pub struct FarmerIdResolver {
    remote: Arc<dyn RemoteStore>,
    config: LadderConfig,
}

impl FarmerIdResolver {
    /// Create a resolver
    pub fn new(remote: Arc<dyn RemoteStore>, config: LadderConfig) -> Self {
        Self { remote, config }
    }

    /// Steps that will be attempted, in order
    pub fn steps(&self) -> Vec<ResolutionStep> {
        let mut steps = vec![ResolutionStep::Lookup, ResolutionStep::Insert];
        if self.config.allow_detached_owner {
            steps.push(ResolutionStep::InsertDetached);
        }
        if self.config.use_rpc {
            steps.push(ResolutionStep::Rpc);
        }
        steps
    }

    /// Resolve the remote profile id for an identity
    pub async fn resolve(&self, identity: &UserIdentity) -> Result<FarmerIdResolution> {
        let mut diagnostics = Vec::new();

        for step in self.steps() {
            match self.attempt(step, identity).await {
                Ok(Some(farmer_id)) => {
                    diagnostics.push(format!("{}: resolved {}", step, farmer_id));
                    let ownership_verified = step != ResolutionStep::InsertDetached;
                    if ownership_verified {
                        tracing::debug!(user_id = %identity.id, %farmer_id, %step, "resolved farmer id");
                    } else {
                        tracing::warn!(
                            user_id = %identity.id,
                            %farmer_id,
                            "farmer id resolved with a detached owner reference"
                        );
                    }
                    return Ok(FarmerIdResolution {
                        farmer_id,
                        step,
                        ownership_verified,
                        diagnostics,
                    });
                }
                Ok(None) => {
                    diagnostics.push(format!("{}: no profile found", step));
                    tracing::debug!(user_id = %identity.id, %step, "no profile found");
                }
                Err(err) => {
                    diagnostics.push(format!("{}: {}", step, err));
                    tracing::debug!(user_id = %identity.id, %step, %err, "resolution step failed");
                }
            }
        }

        tracing::warn!(user_id = %identity.id, attempts = diagnostics.len(), "farmer id resolution exhausted");
        Err(FarmError::ResolutionFailed { diagnostics })
    }

    async fn attempt(
        &self,
        step: ResolutionStep,
        identity: &UserIdentity,
    ) -> std::result::Result<Option<String>, RemoteError> {
        let placeholder = NewFarmer::placeholder(identity);
        let key = Uuid::new_v4().to_string();

        match step {
            ResolutionStep::Lookup => {
                Ok(self.remote.find_farmer(&identity.id).await?.map(|farmer| farmer.id))
            }
            ResolutionStep::Insert => {
                Ok(Some(self.remote.insert_farmer(&placeholder, &key).await?.id))
            }
            ResolutionStep::InsertDetached => {
                let detached = NewFarmer { user_id: Uuid::new_v4().to_string(), ..placeholder };
                Ok(Some(self.remote.insert_farmer(&detached, &key).await?.id))
            }
            ResolutionStep::Rpc => Ok(Some(self.remote.create_farmer_rpc(&placeholder).await?)),
        }
    }
}
