//! Reconciliation of local-only records
//!
//! A pass promotes what the outbox holds for one identity:
//!
//! 1. Probe the remote store; skip the pass if it is unreachable.
//! 2. Promote the identity's local profile, adopting an existing remote
//!    profile when there is one, and move its parcels and outbox entries
//!    over to the remote profile id.
//! 3. Push pending parcels and crops oldest first, reusing each entry's
//!    idempotency key so a replay cannot create a duplicate.
//!
//! Promoted records leave local storage. Failed ones stay queued with the
//! error recorded.

use std::collections::HashSet;
use std::sync::Arc;
use storage::{PendingKind, PendingWrite};
use uuid::Uuid;

use crate::error::Result;
use crate::local::LocalStore;
use crate::models::{Farmer, UserIdentity};
use crate::remote::{RemoteError, RemoteStore};

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Records promoted to the remote store
    pub promoted: usize,
    /// Promotion attempts that failed
    pub failed: usize,
    /// Entries still queued after the pass
    pub remaining: usize,
    /// Whether the pass was skipped because the remote store is unreachable
    pub skipped: bool,
    /// Remote profile the local profile was promoted to, if any
    pub promoted_profile: Option<Farmer>,
}

/// Promotes local-only records to the remote store
pub struct Reconciler {
    remote: Arc<dyn RemoteStore>,
    local: LocalStore,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    /// Run one reconciliation pass for an identity
    pub async fn run(&self, identity: &UserIdentity) -> Result<SyncReport> {
        let outbox = self.local.outbox();
        let mut report = SyncReport::default();

        if let Err(err) = self.remote.probe().await {
            tracing::info!(%err, "remote store unreachable, skipping reconciliation");
            report.skipped = true;
            report.remaining = outbox.len()?;
            return Ok(report);
        }

        if let Some(local_profile) = self.local.profile(&identity.id)? {
            match self.promote_profile(&local_profile).await? {
                Ok(remote_profile) => {
                    report.promoted += 1;
                    report.promoted_profile = Some(remote_profile);
                }
                Err(err) => {
                    tracing::warn!(farmer_id = %local_profile.id, %err, "profile promotion failed");
                    if let Some(entry) = outbox.find_record(PendingKind::Farmer, &local_profile.id)? {
                        outbox.record_failure(&entry.idempotency_key, err.to_string())?;
                    }
                    // Owned records cannot be pushed without a remote owner
                    report.failed += 1;
                    report.remaining = outbox.len()?;
                    return Ok(report);
                }
            }
        }

        // Parcels of other identities' local profiles wait for their own pass
        let unpromoted_owners: HashSet<String> = self.local.local_profile_ids()?.into_iter().collect();

        for entry in outbox.pending()? {
            let result = match entry.kind {
                PendingKind::Farmer => continue,
                PendingKind::Farmland => match entry.owner_id.as_deref() {
                    Some(owner) if unpromoted_owners.contains(owner) => continue,
                    Some(owner) => self.push_farmland(&entry, owner).await?,
                    None => {
                        tracing::warn!(record_id = %entry.record_id, "dropping ownerless farmland entry");
                        outbox.complete(&entry.idempotency_key)?;
                        continue;
                    }
                },
                PendingKind::Crop => self.push_crop(&entry).await?,
            };

            match result {
                Ok(true) => {
                    outbox.complete(&entry.idempotency_key)?;
                    report.promoted += 1;
                }
                Ok(false) => {
                    // Deleted locally after it was queued
                    outbox.complete(&entry.idempotency_key)?;
                }
                Err(err) => {
                    tracing::warn!(kind = %entry.kind, record_id = %entry.record_id, %err, "promotion failed");
                    outbox.record_failure(&entry.idempotency_key, err.to_string())?;
                    report.failed += 1;
                }
            }
        }

        report.remaining = outbox.len()?;
        tracing::info!(
            promoted = report.promoted,
            failed = report.failed,
            remaining = report.remaining,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Promote a local profile; the inner error is the remote failure
    async fn promote_profile(
        &self,
        local_profile: &Farmer,
    ) -> Result<std::result::Result<Farmer, RemoteError>> {
        let entry = self.local.outbox().find_record(PendingKind::Farmer, &local_profile.id)?;

        let found = match self.remote.find_farmer(&local_profile.user_id).await {
            Ok(found) => found,
            Err(err) => return Ok(Err(err)),
        };

        let remote_profile = match found {
            Some(existing) => {
                tracing::info!(farmer_id = %existing.id, "adopting existing remote profile");
                existing
            }
            None => {
                let key = match &entry {
                    Some(entry) => entry.idempotency_key.clone(),
                    None => Uuid::new_v4().to_string(),
                };
                match self.remote.insert_farmer(&local_profile.to_new(), &key).await {
                    Ok(inserted) => inserted,
                    Err(err) => return Ok(Err(err)),
                }
            }
        };

        self.rehome(local_profile, &remote_profile, entry.as_ref())?;
        Ok(Ok(remote_profile))
    }

    fn rehome(
        &self,
        local_profile: &Farmer,
        remote_profile: &Farmer,
        entry: Option<&PendingWrite>,
    ) -> Result<()> {
        let outbox = self.local.outbox();
        let moved = self.local.reassign_farmlands(&local_profile.id, &remote_profile.id)?;
        let retargeted = outbox.retarget_owner(&local_profile.id, &remote_profile.id)?;
        if let Some(entry) = entry {
            outbox.complete(&entry.idempotency_key)?;
        }
        self.local.remove_profile(&local_profile.user_id)?;

        tracing::info!(
            local_id = %local_profile.id,
            remote_id = %remote_profile.id,
            moved,
            retargeted,
            "promoted local profile"
        );
        Ok(())
    }

    /// Push one parcel; `Ok(false)` when it no longer exists locally
    async fn push_farmland(
        &self,
        entry: &PendingWrite,
        owner: &str,
    ) -> Result<std::result::Result<bool, RemoteError>> {
        let parcels = self.local.farmlands(owner);
        let Some(record) = parcels.find(&entry.record_id)? else {
            return Ok(Ok(false));
        };

        match self.remote.insert_farmland(&record.to_new(), &entry.idempotency_key).await {
            Ok(saved) => {
                parcels.remove(&record.id)?;
                tracing::debug!(local_id = %record.id, remote_id = %saved.id, "promoted farmland");
                Ok(Ok(true))
            }
            Err(err) => Ok(Err(err)),
        }
    }

    /// Push one crop; `Ok(false)` when it no longer exists locally
    async fn push_crop(&self, entry: &PendingWrite) -> Result<std::result::Result<bool, RemoteError>> {
        let crops = self.local.crops();
        let Some(record) = crops.find(&entry.record_id)? else {
            return Ok(Ok(false));
        };

        match self.remote.insert_crop(&record.to_new(), &entry.idempotency_key).await {
            Ok(saved) => {
                crops.remove(&record.id)?;
                tracing::debug!(local_id = %record.id, remote_id = %saved.id, "promoted crop");
                Ok(Ok(true))
            }
            Err(err) => Ok(Err(err)),
        }
    }
}
