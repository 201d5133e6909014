//! Remote record store
//!
//! [`RemoteStore`] is the seam between the farm services and the hosted
//! relational service. [`PostgrestStore`] talks to the real service through
//! [`RestClient`]; [`UnconfiguredRemote`] stands in when no service URL or
//! key is configured, so every remote call fails fast and the services take
//! their local fallback path.

use async_trait::async_trait;
use postgrest_client::{RestClient, RestError, RestRequest, RetryConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{
    Crop, DashboardSummary, Farmer, FarmerUpdate, Farmland, NewCrop, NewFarmer, NewFarmland,
};

/// Table of farmer profiles
pub const FARMERS_TABLE: &str = "farmers";
/// Table of farmland parcels
pub const FARMLANDS_TABLE: &str = "farmlands";
/// Table of crop varieties
pub const CROPS_TABLE: &str = "crops";
/// Procedure creating a farmer profile server-side
pub const CREATE_FARMER_FN: &str = "create_farmer";
/// Procedure computing dashboard numbers for a farmer
pub const DASHBOARD_FN: &str = "get_farmer_dashboard";

/// Remote store error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No service URL or key is configured
    #[error("Remote store is not configured")]
    Unconfigured,

    /// The service could not be reached or is temporarily unavailable
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),

    /// The service refused the request (constraint, permission, bad input)
    #[error("Remote store rejected the request ({status} {code}): {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Service error code
        code: String,
        /// Service error message
        message: String,
    },

    /// The service answered with something that is not the expected shape
    #[error("Unexpected response from remote store: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the remote store could not be used at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unconfigured | RemoteError::Unreachable(_))
    }
}

impl From<RestError> for RemoteError {
    fn from(err: RestError) -> Self {
        if err.code() == "ParseError" && err.status() != 0 {
            RemoteError::Decode(err.message().to_string())
        } else if err.is_network_error() {
            RemoteError::Unreachable(err.to_string())
        } else {
            RemoteError::Rejected {
                status: err.status(),
                code: err.code().to_string(),
                message: err.message().to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

/// Result type for remote store operations
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Operations the farm services need from the hosted store
///
/// Inserts take an idempotency key. Callers mint it once per logical write
/// and reuse it when the same write is replayed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Cheap read that succeeds only if the store is reachable
    async fn probe(&self) -> Result<()>;

    /// Profile belonging to an identity, if any
    async fn find_farmer(&self, user_id: &str) -> Result<Option<Farmer>>;

    /// Insert a profile row
    async fn insert_farmer(&self, farmer: &NewFarmer, idempotency_key: &str) -> Result<Farmer>;

    /// Overwrite the editable fields of a profile
    async fn update_farmer(&self, farmer_id: &str, update: &FarmerUpdate) -> Result<()>;

    /// Create a profile through the server-side procedure, returning its id
    async fn create_farmer_rpc(&self, farmer: &NewFarmer) -> Result<String>;

    /// Parcels owned by a farmer, newest first
    async fn list_farmlands(&self, farmer_id: &str) -> Result<Vec<Farmland>>;

    /// Insert a parcel row
    async fn insert_farmland(&self, farmland: &NewFarmland, idempotency_key: &str)
        -> Result<Farmland>;

    /// Delete a parcel; `false` when no row had that id
    async fn delete_farmland(&self, id: &str) -> Result<bool>;

    /// The crop catalogue, newest first
    async fn list_crops(&self) -> Result<Vec<Crop>>;

    /// Insert a crop row
    async fn insert_crop(&self, crop: &NewCrop, idempotency_key: &str) -> Result<Crop>;

    /// Delete a crop; `false` when no row had that id
    async fn delete_crop(&self, id: &str) -> Result<bool>;

    /// Dashboard numbers computed server-side
    async fn farmer_dashboard(&self, farmer_id: &str) -> Result<DashboardSummary>;
}

// =============================================================================
// PostgREST implementation
// =============================================================================

/// [`RemoteStore`] backed by the hosted service's REST interface
///
/// Every call goes through the shared retry policy, so transient failures
/// are retried with backoff and rejections are returned immediately.
#[derive(Debug, Clone)]
pub struct PostgrestStore {
    client: RestClient,
    retry: RetryConfig,
}

impl PostgrestStore {
    /// Create a store over a client with the given retry policy
    pub fn new(client: RestClient, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// The underlying REST client
    pub fn client(&self) -> &RestClient {
        &self.client
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RestRequest) -> Result<T> {
        let response = self.client.execute_with_retry::<T>(request, &self.retry).await?;
        Ok(response.data)
    }

    async fn send(&self, request: RestRequest) -> Result<()> {
        self.client.execute_empty_with_retry(request, &self.retry).await?;
        Ok(())
    }

    // A zero-row delete still answers 204, so ask for the deleted rows back
    async fn delete_row(&self, table: &str, id: &str) -> Result<bool> {
        let request = RestRequest::delete(table).eq("id", id).return_representation();
        let rows: Vec<Value> = self.fetch(request).await?;
        Ok(!rows.is_empty())
    }

    async fn insert_row<B, T>(&self, table: &str, row: &B, idempotency_key: &str) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = RestRequest::insert(table)
            .return_representation()
            .idempotency_key(idempotency_key)
            .json_body(row)?;

        let rows: Vec<T> = self.fetch(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode(format!("insert into {} returned no rows", table)))
    }
}

/// Extract the profile id from a `create_farmer` response
///
/// The procedure may return the bare id, a row object, or a one-row array.
fn farmer_id_from(value: Value) -> Result<String> {
    match value {
        Value::String(id) => Ok(id),
        Value::Object(row) => match row.get("id").and_then(Value::as_str) {
            Some(id) => Ok(id.to_string()),
            None => Err(RemoteError::Decode(format!("{} returned no id", CREATE_FARMER_FN))),
        },
        Value::Array(rows) => match rows.into_iter().next() {
            Some(row) => farmer_id_from(row),
            None => Err(RemoteError::Decode(format!("{} returned no rows", CREATE_FARMER_FN))),
        },
        other => Err(RemoteError::Decode(format!("{} returned {}", CREATE_FARMER_FN, other))),
    }
}

#[async_trait]
impl RemoteStore for PostgrestStore {
    async fn probe(&self) -> Result<()> {
        let request = RestRequest::select(FARMERS_TABLE).columns("id").limit(1);
        let _: Vec<Value> = self.fetch(request).await?;
        Ok(())
    }

    async fn find_farmer(&self, user_id: &str) -> Result<Option<Farmer>> {
        let request = RestRequest::select(FARMERS_TABLE).columns("*").eq("user_id", user_id).limit(1);
        let rows: Vec<Farmer> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_farmer(&self, farmer: &NewFarmer, idempotency_key: &str) -> Result<Farmer> {
        self.insert_row(FARMERS_TABLE, farmer, idempotency_key).await
    }

    async fn update_farmer(&self, farmer_id: &str, update: &FarmerUpdate) -> Result<()> {
        let request = RestRequest::update(FARMERS_TABLE).eq("id", farmer_id).json_body(update)?;
        self.send(request).await
    }

    async fn create_farmer_rpc(&self, farmer: &NewFarmer) -> Result<String> {
        let request = RestRequest::rpc(CREATE_FARMER_FN).json_body(&json!({
            "p_user_id": farmer.user_id,
            "p_name": farmer.name,
            "p_email": farmer.email,
            "p_contact_number": farmer.contact_number,
            "p_address": farmer.address,
        }))?;
        let value: Value = self.fetch(request).await?;
        farmer_id_from(value)
    }

    async fn list_farmlands(&self, farmer_id: &str) -> Result<Vec<Farmland>> {
        let request = RestRequest::select(FARMLANDS_TABLE)
            .columns("*")
            .eq("farmer_id", farmer_id)
            .order("created_at", false);
        self.fetch(request).await
    }

    async fn insert_farmland(
        &self,
        farmland: &NewFarmland,
        idempotency_key: &str,
    ) -> Result<Farmland> {
        self.insert_row(FARMLANDS_TABLE, farmland, idempotency_key).await
    }

    async fn delete_farmland(&self, id: &str) -> Result<bool> {
        self.delete_row(FARMLANDS_TABLE, id).await
    }

    async fn list_crops(&self) -> Result<Vec<Crop>> {
        let request = RestRequest::select(CROPS_TABLE).columns("*").order("created_at", false);
        self.fetch(request).await
    }

    async fn insert_crop(&self, crop: &NewCrop, idempotency_key: &str) -> Result<Crop> {
        self.insert_row(CROPS_TABLE, crop, idempotency_key).await
    }

    async fn delete_crop(&self, id: &str) -> Result<bool> {
        self.delete_row(CROPS_TABLE, id).await
    }

    async fn farmer_dashboard(&self, farmer_id: &str) -> Result<DashboardSummary> {
        let request = RestRequest::rpc(DASHBOARD_FN).json_body(&json!({ "p_farmer_id": farmer_id }))?;
        let value: Value = self.fetch(request).await?;
        // Set-returning procedures answer with a one-row array
        let row = match value {
            Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
            other => other,
        };
        if row.is_null() {
            return Ok(DashboardSummary::default());
        }
        Ok(serde_json::from_value(row)?)
    }
}

// =============================================================================
// Unconfigured
// =============================================================================

/// [`RemoteStore`] used when no service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemote;

#[async_trait]
impl RemoteStore for UnconfiguredRemote {
    async fn probe(&self) -> Result<()> {
        Err(RemoteError::Unconfigured)
    }

    async fn find_farmer(&self, _user_id: &str) -> Result<Option<Farmer>> {
        Err(RemoteError::Unconfigured)
    }

    async fn insert_farmer(&self, _farmer: &NewFarmer, _idempotency_key: &str) -> Result<Farmer> {
        Err(RemoteError::Unconfigured)
    }

    async fn update_farmer(&self, _farmer_id: &str, _update: &FarmerUpdate) -> Result<()> {
        Err(RemoteError::Unconfigured)
    }

    async fn create_farmer_rpc(&self, _farmer: &NewFarmer) -> Result<String> {
        Err(RemoteError::Unconfigured)
    }

    async fn list_farmlands(&self, _farmer_id: &str) -> Result<Vec<Farmland>> {
        Err(RemoteError::Unconfigured)
    }

    async fn insert_farmland(
        &self,
        _farmland: &NewFarmland,
        _idempotency_key: &str,
    ) -> Result<Farmland> {
        Err(RemoteError::Unconfigured)
    }

    async fn delete_farmland(&self, _id: &str) -> Result<bool> {
        Err(RemoteError::Unconfigured)
    }

    async fn list_crops(&self) -> Result<Vec<Crop>> {
        Err(RemoteError::Unconfigured)
    }

    async fn insert_crop(&self, _crop: &NewCrop, _idempotency_key: &str) -> Result<Crop> {
        Err(RemoteError::Unconfigured)
    }

    async fn delete_crop(&self, _id: &str) -> Result<bool> {
        Err(RemoteError::Unconfigured)
    }

    async fn farmer_dashboard(&self, _farmer_id: &str) -> Result<DashboardSummary> {
        Err(RemoteError::Unconfigured)
    }
}
