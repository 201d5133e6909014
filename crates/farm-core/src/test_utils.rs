//! Testing utilities
//!
//! [`MemoryRemote`] is an in-memory [`RemoteStore`] whose reachability and
//! write acceptance can be switched at runtime, used to exercise the
//! fallback and reconciliation paths without a network.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::identity::{DEMO_EMAIL, DEMO_NAME, DEMO_USER_ID};
use crate::models::{
    Crop, DashboardSummary, Farmer, FarmerUpdate, Farmland, NewCrop, NewFarmer, NewFarmland,
    UserIdentity,
};
use crate::remote::{RemoteError, RemoteStore, Result};
use crate::validation::{CropForm, FarmlandForm};

/// The demo identity
pub fn demo_identity() -> UserIdentity {
    UserIdentity::new(DEMO_USER_ID, DEMO_EMAIL, DEMO_NAME)
}

/// A valid farmland form
pub fn farmland_form(name: &str) -> FarmlandForm {
    FarmlandForm {
        name: name.to_string(),
        location: "Valley Road".to_string(),
        size: "2.5".to_string(),
        soil_type: "Loamy".to_string(),
    }
}

/// A valid crop form
pub fn crop_form(name: &str) -> CropForm {
    CropForm {
        name: name.to_string(),
        variety: "Hybrid".to_string(),
        growth_period_days: "120".to_string(),
        water_requirement: "Medium".to_string(),
        ideal_temperature: "20-30C".to_string(),
    }
}

#[derive(Default)]
struct Tables {
    farmers: Vec<Farmer>,
    farmlands: Vec<Farmland>,
    crops: Vec<Crop>,
    // idempotency key -> id of the row it created
    applied: HashMap<String, String>,
}

/// In-memory remote store
pub struct MemoryRemote {
    tables: Mutex<Tables>,
    reachable: AtomicBool,
    accept_writes: AtomicBool,
    rpc_enabled: AtomicBool,
    lose_next_response: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            reachable: AtomicBool::new(true),
            accept_writes: AtomicBool::new(true),
            rpc_enabled: AtomicBool::new(true),
            lose_next_response: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryRemote {
    /// A reachable, empty store that accepts writes
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the network going up or down
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulate writes being rejected (e.g. row-level security)
    pub fn set_accept_writes(&self, accept: bool) {
        self.accept_writes.store(accept, Ordering::SeqCst);
    }

    /// Enable or disable the `create_farmer` procedure
    pub fn set_rpc_enabled(&self, enabled: bool) {
        self.rpc_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Commit the next insert but answer it as if the connection dropped
    pub fn lose_next_response(&self) {
        self.lose_next_response.store(true, Ordering::SeqCst);
    }

    /// Number of calls made, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Insert a profile for an identity directly
    pub fn seed_farmer(&self, identity: &UserIdentity) -> Farmer {
        let farmer = NewFarmer::placeholder(identity).into_local();
        self.tables.lock().farmers.push(farmer.clone());
        farmer
    }

    /// Stored profiles
    pub fn farmers(&self) -> Vec<Farmer> {
        self.tables.lock().farmers.clone()
    }

    /// Stored parcels
    pub fn farmlands(&self) -> Vec<Farmland> {
        self.tables.lock().farmlands.clone()
    }

    /// Stored crops
    pub fn crops(&self) -> Vec<Crop> {
        self.tables.lock().crops.clone()
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("simulated network failure".to_string()))
        }
    }

    fn deliver<T>(&self, row: T) -> Result<T> {
        if self.lose_next_response.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("response lost after commit".to_string()));
        }
        Ok(row)
    }

    fn enter_write(&self) -> Result<()> {
        self.enter()?;
        if self.accept_writes.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Rejected {
                status: 403,
                code: "42501".to_string(),
                message: "simulated row-level security rejection".to_string(),
            })
        }
    }
}

fn newest_first<T>(mut rows: Vec<T>, created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created(row)));
    rows
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn probe(&self) -> Result<()> {
        self.enter()
    }

    async fn find_farmer(&self, user_id: &str) -> Result<Option<Farmer>> {
        self.enter()?;
        Ok(self.tables.lock().farmers.iter().find(|f| f.user_id == user_id).cloned())
    }

    async fn insert_farmer(&self, farmer: &NewFarmer, idempotency_key: &str) -> Result<Farmer> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        if let Some(id) = tables.applied.get(idempotency_key) {
            if let Some(existing) = tables.farmers.iter().find(|f| &f.id == id) {
                return Ok(existing.clone());
            }
        }
        let row = farmer.clone().into_local();
        tables.applied.insert(idempotency_key.to_string(), row.id.clone());
        tables.farmers.push(row.clone());
        self.deliver(row)
    }

    async fn update_farmer(&self, farmer_id: &str, update: &FarmerUpdate) -> Result<()> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        match tables.farmers.iter_mut().find(|f| f.id == farmer_id) {
            Some(farmer) => {
                farmer.apply(update);
                Ok(())
            }
            None => Err(RemoteError::Rejected {
                status: 404,
                code: "PGRST116".to_string(),
                message: format!("no farmer {}", farmer_id),
            }),
        }
    }

    async fn create_farmer_rpc(&self, farmer: &NewFarmer) -> Result<String> {
        self.enter()?;
        if !self.rpc_enabled.load(Ordering::SeqCst) {
            return Err(RemoteError::Rejected {
                status: 404,
                code: "PGRST202".to_string(),
                message: "function create_farmer not found".to_string(),
            });
        }
        let row = farmer.clone().into_local();
        let id = row.id.clone();
        self.tables.lock().farmers.push(row);
        Ok(id)
    }

    async fn list_farmlands(&self, farmer_id: &str) -> Result<Vec<Farmland>> {
        self.enter()?;
        let rows: Vec<Farmland> = self
            .tables
            .lock()
            .farmlands
            .iter()
            .filter(|f| f.farmer_id == farmer_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |f| f.created_at))
    }

    async fn insert_farmland(
        &self,
        farmland: &NewFarmland,
        idempotency_key: &str,
    ) -> Result<Farmland> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        if let Some(id) = tables.applied.get(idempotency_key) {
            if let Some(existing) = tables.farmlands.iter().find(|f| &f.id == id) {
                return Ok(existing.clone());
            }
        }
        if !tables.farmers.iter().any(|f| f.id == farmland.farmer_id) {
            return Err(RemoteError::Rejected {
                status: 409,
                code: "23503".to_string(),
                message: "farmlands_farmer_id_fkey".to_string(),
            });
        }
        let row = farmland.clone().into_local();
        tables.applied.insert(idempotency_key.to_string(), row.id.clone());
        tables.farmlands.push(row.clone());
        self.deliver(row)
    }

    async fn delete_farmland(&self, id: &str) -> Result<bool> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        let before = tables.farmlands.len();
        tables.farmlands.retain(|f| f.id != id);
        Ok(tables.farmlands.len() < before)
    }

    async fn list_crops(&self) -> Result<Vec<Crop>> {
        self.enter()?;
        let rows = self.tables.lock().crops.clone();
        Ok(newest_first(rows, |c| c.created_at))
    }

    async fn insert_crop(&self, crop: &NewCrop, idempotency_key: &str) -> Result<Crop> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        if let Some(id) = tables.applied.get(idempotency_key) {
            if let Some(existing) = tables.crops.iter().find(|c| &c.id == id) {
                return Ok(existing.clone());
            }
        }
        let row = crop.clone().into_local();
        tables.applied.insert(idempotency_key.to_string(), row.id.clone());
        tables.crops.push(row.clone());
        self.deliver(row)
    }

    async fn delete_crop(&self, id: &str) -> Result<bool> {
        self.enter_write()?;
        let mut tables = self.tables.lock();
        let before = tables.crops.len();
        tables.crops.retain(|c| c.id != id);
        Ok(tables.crops.len() < before)
    }

    async fn farmer_dashboard(&self, farmer_id: &str) -> Result<DashboardSummary> {
        self.enter()?;
        let tables = self.tables.lock();
        let owned: Vec<&Farmland> =
            tables.farmlands.iter().filter(|f| f.farmer_id == farmer_id).collect();
        Ok(DashboardSummary {
            farmland_count: owned.len() as u64,
            total_hectares: owned.iter().map(|f| f.size_hectares).sum(),
            crop_count: tables.crops.len() as u64,
        })
    }
}
