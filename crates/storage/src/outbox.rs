//! Outbox of writes that only reached local storage
//!
//! When a record is saved locally because the remote store was unreachable
//! or rejected it, an entry is queued here. A reconciliation pass later
//! replays the entries against the remote store using the idempotency key
//! minted at enqueue time, so a replay that times out after the server
//! committed cannot create a second copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::collections::{Keyed, LocalCollection};
use crate::kv::{KvError, KvStore};

/// Storage key of the outbox
pub const OUTBOX_KEY: &str = "outbox";

/// Outbox error types
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// No entry with the given idempotency key
    #[error("Pending write not found: {0}")]
    NotFound(String),
}

/// Result type for outbox operations
pub type Result<T> = std::result::Result<T, OutboxError>;

/// Kind of record a pending write refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// A farmer profile
    Farmer,
    /// A farmland parcel
    Farmland,
    /// A crop variety
    Crop,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Farmer => write!(f, "farmer"),
            PendingKind::Farmland => write!(f, "farmland"),
            PendingKind::Crop => write!(f, "crop"),
        }
    }
}

/// A locally saved record waiting to be promoted to the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    /// Key sent with every promotion attempt
    pub idempotency_key: String,
    /// Record kind
    pub kind: PendingKind,
    /// Local identifier of the record
    pub record_id: String,
    /// Owning farmer id, for owned records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// When the record was saved locally
    pub queued_at: DateTime<Utc>,
    /// Number of failed promotion attempts
    pub attempts: u32,
    /// Last promotion error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingWrite {
    /// Create a new pending write with a fresh idempotency key
    pub fn new(kind: PendingKind, record_id: impl Into<String>, owner_id: Option<String>) -> Self {
        Self::with_key(kind, record_id, owner_id, Uuid::new_v4().to_string())
    }

    /// Create a pending write that continues a write already attempted
    /// under `idempotency_key`
    pub fn with_key(
        kind: PendingKind,
        record_id: impl Into<String>,
        owner_id: Option<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            kind,
            record_id: record_id.into(),
            owner_id,
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

impl Keyed for PendingWrite {
    fn key(&self) -> &str {
        &self.idempotency_key
    }
}

/// Persistent queue of pending writes
pub struct Outbox {
    entries: LocalCollection<PendingWrite>,
}

impl Outbox {
    /// Open the outbox in the given store
    pub fn new(kv: KvStore) -> Self {
        Self { entries: LocalCollection::new(kv, &[OUTBOX_KEY]) }
    }

    /// Queue a pending write
    pub fn enqueue(&self, write: PendingWrite) -> Result<()> {
        tracing::debug!(
            kind = %write.kind,
            record_id = %write.record_id,
            key = %write.idempotency_key,
            "queued local write for promotion"
        );
        self.entries.prepend(write)?;
        Ok(())
    }

    /// All pending writes, oldest first
    pub fn pending(&self) -> Result<Vec<PendingWrite>> {
        let mut entries = self.entries.list()?;
        entries.reverse();
        Ok(entries)
    }

    /// Pending writes of one kind, oldest first
    pub fn pending_of(&self, kind: PendingKind) -> Result<Vec<PendingWrite>> {
        Ok(self.pending()?.into_iter().filter(|w| w.kind == kind).collect())
    }

    /// Find the pending write for a record
    pub fn find_record(&self, kind: PendingKind, record_id: &str) -> Result<Option<PendingWrite>> {
        Ok(self
            .entries
            .list()?
            .into_iter()
            .find(|w| w.kind == kind && w.record_id == record_id))
    }

    /// Record a failed promotion attempt
    pub fn record_failure(&self, idempotency_key: &str, error: impl Into<String>) -> Result<()> {
        let mut entry = self
            .entries
            .find(idempotency_key)?
            .ok_or_else(|| OutboxError::NotFound(idempotency_key.to_string()))?;
        entry.attempts += 1;
        entry.last_error = Some(error.into());
        self.entries.upsert(entry)?;
        Ok(())
    }

    /// Remove a write that reached the remote store
    pub fn complete(&self, idempotency_key: &str) -> Result<bool> {
        Ok(self.entries.remove(idempotency_key)?)
    }

    /// Drop any pending write for a record (e.g. after a local delete)
    pub fn discard_record(&self, kind: PendingKind, record_id: &str) -> Result<bool> {
        match self.find_record(kind, record_id)? {
            Some(entry) => self.complete(&entry.idempotency_key),
            None => Ok(false),
        }
    }

    /// Point every entry owned by `old_owner` at `new_owner`
    ///
    /// Returns the number of entries owned by `new_owner` afterwards.
    pub fn retarget_owner(&self, old_owner: &str, new_owner: &str) -> Result<usize> {
        let rewritten = self.entries.map_all(|mut entry| {
            if entry.owner_id.as_deref() == Some(old_owner) {
                entry.owner_id = Some(new_owner.to_string());
            }
            entry
        })?;
        Ok(rewritten
            .iter()
            .filter(|entry| entry.owner_id.as_deref() == Some(new_owner))
            .count())
    }

    /// Number of pending writes
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.len()?)
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries.is_empty()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> Outbox {
        Outbox::new(KvStore::in_memory().unwrap())
    }

    #[test]
    fn test_pending_is_oldest_first() {
        let outbox = outbox();
        let first = PendingWrite::new(PendingKind::Farmland, "a", Some("f1".to_string()));
        let second = PendingWrite::new(PendingKind::Crop, "b", None);

        outbox.enqueue(first.clone()).unwrap();
        outbox.enqueue(second.clone()).unwrap();

        let pending = outbox.pending().unwrap();
        assert_eq!(pending[0].record_id, "a");
        assert_eq!(pending[1].record_id, "b");
        assert_eq!(outbox.pending_of(PendingKind::Crop).unwrap().len(), 1);
    }

    #[test]
    fn test_idempotency_keys_are_unique() {
        let a = PendingWrite::new(PendingKind::Farmland, "a", None);
        let b = PendingWrite::new(PendingKind::Farmland, "a", None);
        assert_ne!(a.idempotency_key, b.idempotency_key);
    }

    #[test]
    fn test_with_key_keeps_given_key() {
        let write = PendingWrite::with_key(PendingKind::Crop, "c", None, "key-from-first-attempt");
        assert_eq!(write.idempotency_key, "key-from-first-attempt");
        assert_eq!(write.attempts, 0);
    }

    #[test]
    fn test_record_failure_keeps_key() {
        let outbox = outbox();
        let write = PendingWrite::new(PendingKind::Farmland, "a", None);
        let key = write.idempotency_key.clone();
        outbox.enqueue(write).unwrap();

        outbox.record_failure(&key, "HTTP 503").unwrap();
        outbox.record_failure(&key, "HTTP 504").unwrap();

        let entry = outbox.pending().unwrap().remove(0);
        assert_eq!(entry.idempotency_key, key);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.last_error.as_deref(), Some("HTTP 504"));
    }

    #[test]
    fn test_record_failure_unknown_key() {
        let outbox = outbox();
        let result = outbox.record_failure("missing", "boom");
        assert!(matches!(result, Err(OutboxError::NotFound(_))));
    }

    #[test]
    fn test_complete_and_discard() {
        let outbox = outbox();
        let write = PendingWrite::new(PendingKind::Farmland, "a", None);
        let key = write.idempotency_key.clone();
        outbox.enqueue(write).unwrap();
        outbox.enqueue(PendingWrite::new(PendingKind::Crop, "c", None)).unwrap();

        assert!(outbox.complete(&key).unwrap());
        assert!(outbox.discard_record(PendingKind::Crop, "c").unwrap());
        assert!(!outbox.discard_record(PendingKind::Crop, "c").unwrap());
        assert!(outbox.is_empty().unwrap());
    }

    #[test]
    fn test_retarget_owner() {
        let outbox = outbox();
        outbox
            .enqueue(PendingWrite::new(PendingKind::Farmland, "a", Some("local-1".to_string())))
            .unwrap();
        outbox
            .enqueue(PendingWrite::new(PendingKind::Farmland, "b", Some("other".to_string())))
            .unwrap();

        let changed = outbox.retarget_owner("local-1", "remote-9").unwrap();
        assert_eq!(changed, 1);

        let owners: Vec<Option<String>> =
            outbox.pending().unwrap().into_iter().map(|w| w.owner_id).collect();
        assert_eq!(owners, vec![Some("remote-9".to_string()), Some("other".to_string())]);
    }
}
