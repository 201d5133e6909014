//! On-device fallback store
//!
//! Key layout:
//! - `farmers:<user_id>`: the local profile of an identity
//! - `farmlands:<farmer_id>`: parcels of one farmer, newest first
//! - `crops`: the crop catalogue, newest first
//! - `outbox`: writes waiting to reach the remote store

use storage::kv::Result;
use storage::{KvStore, LocalCollection, Outbox};

use crate::models::{Crop, Farmer, Farmland};

/// Key scope of local profiles
pub const FARMERS_SCOPE: &str = "farmers";
/// Key scope of local parcel lists
pub const FARMLANDS_SCOPE: &str = "farmlands";
/// Key of the local crop list
pub const CROPS_KEY: &str = "crops";

/// Local replica of farm records
#[derive(Clone)]
pub struct LocalStore {
    kv: KvStore,
}

impl LocalStore {
    /// Wrap a key-value store
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// The underlying key-value store
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// Local profile of an identity
    pub fn profile(&self, user_id: &str) -> Result<Option<Farmer>> {
        self.kv.get_scoped(&[FARMERS_SCOPE, user_id])
    }

    /// Store a profile under its identity
    pub fn save_profile(&self, farmer: &Farmer) -> Result<()> {
        self.kv.set_scoped(&[FARMERS_SCOPE, farmer.user_id.as_str()], farmer)
    }

    /// Drop the local profile of an identity
    pub fn remove_profile(&self, user_id: &str) -> Result<bool> {
        self.kv.remove_scoped(&[FARMERS_SCOPE, user_id])
    }

    /// Ids of every profile that exists only on this device
    pub fn local_profile_ids(&self) -> Result<Vec<String>> {
        let prefix = format!("{}{}", FARMERS_SCOPE, storage::kv::SCOPE_SEPARATOR);
        let mut ids = Vec::new();
        for key in self.kv.keys_with_prefix(&prefix)? {
            if let Some(farmer) = self.kv.get::<Farmer>(&key)? {
                ids.push(farmer.id);
            }
        }
        Ok(ids)
    }

    /// Parcels of one farmer
    pub fn farmlands(&self, farmer_id: &str) -> LocalCollection<Farmland> {
        LocalCollection::new(self.kv.clone(), &[FARMLANDS_SCOPE, farmer_id])
    }

    /// Remove a parcel from whichever farmer's list holds it
    pub fn remove_farmland(&self, id: &str) -> Result<bool> {
        let prefix = format!("{}{}", FARMLANDS_SCOPE, storage::kv::SCOPE_SEPARATOR);
        for key in self.kv.keys_with_prefix(&prefix)? {
            let owner = &key[prefix.len()..];
            if self.farmlands(owner).remove(id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move every parcel of `old_owner` to `new_owner`, keeping list order
    ///
    /// Returns the number of parcels moved.
    pub fn reassign_farmlands(&self, old_owner: &str, new_owner: &str) -> Result<usize> {
        let source = self.farmlands(old_owner);
        let moved = source.list()?;
        if moved.is_empty() {
            return Ok(0);
        }

        let target = self.farmlands(new_owner);
        // Prepend oldest first so the newest ends up at the front
        for mut farmland in moved.iter().rev().cloned() {
            farmland.farmer_id = new_owner.to_string();
            target.prepend(farmland)?;
        }
        source.clear()?;
        Ok(moved.len())
    }

    /// The crop catalogue
    pub fn crops(&self) -> LocalCollection<Crop> {
        LocalCollection::new(self.kv.clone(), &[CROPS_KEY])
    }

    /// Writes waiting for promotion
    pub fn outbox(&self) -> Outbox {
        Outbox::new(self.kv.clone())
    }
}
