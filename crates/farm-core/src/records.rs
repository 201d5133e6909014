//! Farmland and crop repository
//!
//! One repository owns the choice of replica for every record operation:
//!
//! - Writes validate first, then try the remote store. When the remote
//!   store fails, or the owning profile only exists locally, the record is
//!   prepended to the local list and queued in the outbox. The outcome says
//!   which of the two happened.
//! - Reads follow the configured [`SourcePrecedence`] and report the
//!   replica that answered.
//! - Deletes go only to the replica named in the [`RecordRef`].

use std::sync::Arc;
use storage::{PendingKind, PendingWrite};
use uuid::Uuid;

use crate::config::SourcePrecedence;
use crate::error::{FarmError, Result};
use crate::local::LocalStore;
use crate::models::{Crop, Farmer, Farmland, RecordRef, Sourced, StoreSource};
use crate::remote::RemoteStore;
use crate::validation::{CropForm, FarmlandForm};

/// Reason recorded when the owning profile only exists on this device
pub const LOCAL_PROFILE_REASON: &str = "profile exists only on this device";

/// Where a write landed
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// Stored in the remote store
    Saved(T),
    /// Stored on this device and queued for promotion
    SavedLocally {
        /// The stored record
        record: T,
        /// Why the remote store was not used
        reason: String,
    },
}

impl<T> WriteOutcome<T> {
    /// The stored record
    pub fn record(&self) -> &T {
        match self {
            WriteOutcome::Saved(record) => record,
            WriteOutcome::SavedLocally { record, .. } => record,
        }
    }

    /// Take the stored record
    pub fn into_record(self) -> T {
        match self {
            WriteOutcome::Saved(record) => record,
            WriteOutcome::SavedLocally { record, .. } => record,
        }
    }

    /// Replica holding the record
    pub fn source(&self) -> StoreSource {
        match self {
            WriteOutcome::Saved(_) => StoreSource::Remote,
            WriteOutcome::SavedLocally { .. } => StoreSource::Local,
        }
    }

    /// Whether the record only reached this device
    pub fn is_local(&self) -> bool {
        self.source() == StoreSource::Local
    }
}

/// Record operations across both replicas
pub struct FarmRepository {
    remote: Arc<dyn RemoteStore>,
    local: LocalStore,
    precedence: SourcePrecedence,
}

impl FarmRepository {
    /// Create a repository
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStore, precedence: SourcePrecedence) -> Self {
        Self { remote, local, precedence }
    }

    /// The configured precedence
    pub fn precedence(&self) -> SourcePrecedence {
        self.precedence
    }

    // =========================================================================
    // Farmland
    // =========================================================================

    /// Create a parcel owned by `profile`
    ///
    /// Returns a validation error without touching either replica when the
    /// form is invalid. Submitting the same form twice creates two parcels.
    pub async fn create_farmland(
        &self,
        profile: &Sourced<Farmer>,
        form: &FarmlandForm,
    ) -> Result<WriteOutcome<Farmland>> {
        let farmland = form.validate(&profile.data.id)?;
        let key = Uuid::new_v4().to_string();

        let reason = match profile.source {
            StoreSource::Remote => {
                match self.remote.insert_farmland(&farmland, &key).await {
                    Ok(saved) => {
                        tracing::info!(farmland_id = %saved.id, farmer_id = %saved.farmer_id, "created farmland");
                        return Ok(WriteOutcome::Saved(saved));
                    }
                    Err(err) => {
                        tracing::warn!(farmer_id = %farmland.farmer_id, %err, "farmland insert failed, saving locally");
                        err.to_string()
                    }
                }
            }
            StoreSource::Local => LOCAL_PROFILE_REASON.to_string(),
        };

        let record = farmland.into_local();
        self.local.farmlands(&record.farmer_id).prepend(record.clone())?;
        self.local.outbox().enqueue(PendingWrite::with_key(
            PendingKind::Farmland,
            record.id.clone(),
            Some(record.farmer_id.clone()),
            key,
        ))?;

        tracing::info!(farmland_id = %record.id, %reason, "saved farmland locally");
        Ok(WriteOutcome::SavedLocally { record, reason })
    }

    /// Parcels owned by `profile`, newest first
    pub async fn list_farmlands(&self, profile: &Sourced<Farmer>) -> Result<Sourced<Vec<Farmland>>> {
        let farmer_id = &profile.data.id;
        let local = self.local.farmlands(farmer_id);

        if profile.is_local() {
            return Ok(Sourced::local(local.list()?));
        }

        match self.precedence {
            SourcePrecedence::RemoteFirst => match self.remote.list_farmlands(farmer_id).await {
                Ok(rows) => Ok(Sourced::remote(rows)),
                Err(err) => {
                    tracing::warn!(%farmer_id, %err, "listing farmland from local storage");
                    Ok(Sourced::local(local.list()?))
                }
            },
            SourcePrecedence::LocalFirst => {
                let rows = local.list()?;
                if !rows.is_empty() {
                    return Ok(Sourced::local(rows));
                }
                match self.remote.list_farmlands(farmer_id).await {
                    Ok(rows) => Ok(Sourced::remote(rows)),
                    Err(err) => {
                        tracing::debug!(%farmer_id, %err, "remote farmland listing failed");
                        Ok(Sourced::local(rows))
                    }
                }
            }
        }
    }

    /// Delete a parcel from the replica it was read from
    pub async fn delete_farmland(&self, record: &RecordRef) -> Result<()> {
        match record.source {
            StoreSource::Remote => {
                if !self.remote.delete_farmland(&record.id).await? {
                    return Err(FarmError::RecordNotFound(record.id.clone()));
                }
            }
            StoreSource::Local => {
                if !self.local.remove_farmland(&record.id)? {
                    return Err(FarmError::RecordNotFound(record.id.clone()));
                }
                self.local.outbox().discard_record(PendingKind::Farmland, &record.id)?;
            }
        }
        tracing::info!(farmland_id = %record.id, source = %record.source, "deleted farmland");
        Ok(())
    }

    // =========================================================================
    // Crops
    // =========================================================================

    /// Add a crop to the shared catalogue
    pub async fn create_crop(&self, form: &CropForm) -> Result<WriteOutcome<Crop>> {
        let crop = form.validate()?;

        let key = Uuid::new_v4().to_string();
        let reason = match self.remote.insert_crop(&crop, &key).await {
            Ok(saved) => {
                tracing::info!(crop_id = %saved.id, "created crop");
                return Ok(WriteOutcome::Saved(saved));
            }
            Err(err) => {
                tracing::warn!(%err, "crop insert failed, saving locally");
                err.to_string()
            }
        };

        let record = crop.into_local();
        self.local.crops().prepend(record.clone())?;
        self.local
            .outbox()
            .enqueue(PendingWrite::with_key(PendingKind::Crop, record.id.clone(), None, key))?;

        Ok(WriteOutcome::SavedLocally { record, reason })
    }

    /// The crop catalogue, newest first
    pub async fn list_crops(&self) -> Result<Sourced<Vec<Crop>>> {
        let local = self.local.crops();

        match self.precedence {
            SourcePrecedence::RemoteFirst => match self.remote.list_crops().await {
                Ok(rows) => Ok(Sourced::remote(rows)),
                Err(err) => {
                    tracing::warn!(%err, "listing crops from local storage");
                    Ok(Sourced::local(local.list()?))
                }
            },
            SourcePrecedence::LocalFirst => {
                let rows = local.list()?;
                if !rows.is_empty() {
                    return Ok(Sourced::local(rows));
                }
                match self.remote.list_crops().await {
                    Ok(rows) => Ok(Sourced::remote(rows)),
                    Err(err) => {
                        tracing::debug!(%err, "remote crop listing failed");
                        Ok(Sourced::local(rows))
                    }
                }
            }
        }
    }

    /// Delete a crop from the replica it was read from
    pub async fn delete_crop(&self, record: &RecordRef) -> Result<()> {
        match record.source {
            StoreSource::Remote => {
                if !self.remote.delete_crop(&record.id).await? {
                    return Err(FarmError::RecordNotFound(record.id.clone()));
                }
            }
            StoreSource::Local => {
                if !self.local.crops().remove(&record.id)? {
                    return Err(FarmError::RecordNotFound(record.id.clone()));
                }
                self.local.outbox().discard_record(PendingKind::Crop, &record.id)?;
            }
        }
        tracing::info!(crop_id = %record.id, source = %record.source, "deleted crop");
        Ok(())
    }
}
