//! Farmer profile ensure-or-create
//!
//! Every identity needs a profile before it can own farmland. The profile
//! is looked up remotely, created remotely with placeholder contact fields
//! when missing, and synthesized locally when the remote store cannot be
//! used. A synthesized profile is queued in the outbox so a later
//! reconciliation pass can promote it.

use std::sync::Arc;
use storage::{PendingKind, PendingWrite};
use uuid::Uuid;

use crate::config::SourcePrecedence;
use crate::error::Result;
use crate::local::LocalStore;
use crate::models::{Farmer, NewFarmer, Sourced, StoreSource, UserIdentity};
use crate::remote::{RemoteError, RemoteStore};
use crate::validation::ProfileForm;

/// Finds, creates and edits farmer profiles
pub struct ProfileService {
    remote: Arc<dyn RemoteStore>,
    local: LocalStore,
    precedence: SourcePrecedence,
}

impl ProfileService {
    /// Create a profile service
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStore, precedence: SourcePrecedence) -> Self {
        Self { remote, local, precedence }
    }

    /// Return the identity's profile, creating one if needed
    ///
    /// Never fails because of the remote store: when it is unreachable,
    /// unconfigured or rejects the insert, the local profile is returned,
    /// synthesizing it first if this device has none.
    pub async fn ensure(&self, identity: &UserIdentity) -> Result<Sourced<Farmer>> {
        if self.precedence == SourcePrecedence::LocalFirst {
            if let Some(existing) = self.local.profile(&identity.id)? {
                return Ok(Sourced::local(existing));
            }
        }

        let key = Uuid::new_v4().to_string();
        let failure = match self.remote.find_farmer(&identity.id).await {
            Ok(Some(farmer)) => return Ok(Sourced::remote(farmer)),
            Ok(None) => {
                match self.remote.insert_farmer(&NewFarmer::placeholder(identity), &key).await {
                    Ok(farmer) => {
                        tracing::info!(user_id = %identity.id, farmer_id = %farmer.id, "created remote profile");
                        return Ok(Sourced::remote(farmer));
                    }
                    Err(err) => err,
                }
            }
            Err(err) => err,
        };

        self.local_fallback(identity, &failure, key)
    }

    /// `key` is the one any failed insert was sent with, so a replay of the
    /// queued profile cannot create a second row
    fn local_fallback(
        &self,
        identity: &UserIdentity,
        reason: &RemoteError,
        key: String,
    ) -> Result<Sourced<Farmer>> {
        if let Some(existing) = self.local.profile(&identity.id)? {
            tracing::debug!(user_id = %identity.id, %reason, "using local profile");
            return Ok(Sourced::local(existing));
        }

        let farmer = NewFarmer::placeholder(identity).into_local();
        self.local.save_profile(&farmer)?;
        self.local
            .outbox()
            .enqueue(PendingWrite::with_key(PendingKind::Farmer, farmer.id.clone(), None, key))?;

        tracing::warn!(
            user_id = %identity.id,
            farmer_id = %farmer.id,
            %reason,
            "remote profile unavailable, created local profile"
        );
        Ok(Sourced::local(farmer))
    }

    /// Find the identity's profile without creating one
    pub async fn find(&self, identity: &UserIdentity) -> Result<Option<Sourced<Farmer>>> {
        let local = self.local.profile(&identity.id)?;

        if self.precedence == SourcePrecedence::LocalFirst {
            if let Some(existing) = local {
                return Ok(Some(Sourced::local(existing)));
            }
            return match self.remote.find_farmer(&identity.id).await {
                Ok(found) => Ok(found.map(Sourced::remote)),
                Err(err) => {
                    tracing::debug!(user_id = %identity.id, %err, "remote profile lookup failed");
                    Ok(None)
                }
            };
        }

        match self.remote.find_farmer(&identity.id).await {
            Ok(Some(farmer)) => Ok(Some(Sourced::remote(farmer))),
            Ok(None) => Ok(local.map(Sourced::local)),
            Err(err) => {
                tracing::debug!(user_id = %identity.id, %err, "remote profile lookup failed");
                Ok(local.map(Sourced::local))
            }
        }
    }

    /// Whether the identity has a profile in either replica
    pub async fn has_profile(&self, identity: &UserIdentity) -> Result<bool> {
        Ok(self.find(identity).await?.is_some())
    }

    /// Overwrite the profile's editable fields in the replica it came from
    ///
    /// The form is validated first; nothing is written when it fails.
    pub async fn update(&self, profile: &Sourced<Farmer>, form: &ProfileForm) -> Result<Sourced<Farmer>> {
        let update = form.validate()?;

        let mut farmer = profile.data.clone();
        farmer.apply(&update);

        match profile.source {
            StoreSource::Remote => {
                self.remote.update_farmer(&farmer.id, &update).await?;
                tracing::info!(farmer_id = %farmer.id, "updated remote profile");
                Ok(Sourced::remote(farmer))
            }
            StoreSource::Local => {
                self.local.save_profile(&farmer)?;
                tracing::info!(farmer_id = %farmer.id, "updated local profile");
                Ok(Sourced::local(farmer))
            }
        }
    }
}
