//! FarmTrack
//!
//! Offline-first farm records: farmer profiles, farmland parcels and a crop
//! catalogue kept in a hosted relational service, with on-device storage
//! taking over whenever the service is unconfigured, unreachable or
//! refuses a write.
//!
//! [`FarmTrack::open`] wires every service from one [`AppConfig`]:
//!
//! ```no_run
//! use farmtrack::{AppConfig, FarmTrack};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let app = FarmTrack::open(AppConfig::from_env()?)?;
//! let signed_in = app.auth().sign_in("test@example.com", "password123").await?;
//! let profile = app.profiles().ensure(&signed_in.identity).await?;
//! let parcels = app.records().list_farmlands(&profile).await?;
//! println!("{} parcels from the {} store", parcels.data.len(), parcels.source);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use thiserror::Error;

use farm_core::config::SettingsError;
use farm_core::dashboard::DashboardService;
use farm_core::farmer_id::FarmerIdResolver;
use farm_core::identity::{IdentityProvider, LocalIdentityProvider};
use farm_core::local::LocalStore;
use farm_core::profile::ProfileService;
use farm_core::records::FarmRepository;
use farm_core::session::{Access, AuthService, SessionError, SessionGate, SessionStore};
use farm_core::sync::Reconciler;
use postgrest_client::{RestClient, RestError, ServiceConfig};
use storage::{KvConfig, KvError, KvStore};

pub use farm_core;
pub use postgrest_client;
pub use storage;

pub use farm_core::{FarmConfig, SourcePrecedence};

/// Environment variable holding the on-device database path
pub const DATA_PATH_ENV: &str = "FARMTRACK_DATA_PATH";

/// Errors opening the application
#[derive(Debug, Error)]
pub enum AppError {
    /// The on-device store could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// The HTTP client could not be built
    #[error("Client error: {0}")]
    Client(#[from] RestError),

    /// A setting could not be parsed
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The session could not be read
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type for application setup
pub type Result<T> = std::result::Result<T, AppError>;

/// Everything needed to open the application
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// On-device store
    pub storage: KvConfig,
    /// Hosted service; `None` runs entirely on-device
    pub service: Option<ServiceConfig>,
    /// Precedence, farmer-id ladder and retry policy
    pub farm: FarmConfig,
}

impl AppConfig {
    /// Read configuration from the process environment
    ///
    /// A missing service URL or key leaves the service unconfigured rather
    /// than failing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through a lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut storage = KvConfig::default();
        if let Some(path) = lookup(DATA_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            storage = KvConfig::new(path.trim());
        }

        let service = match ServiceConfig::from_lookup(&lookup) {
            Ok(service) => Some(service),
            Err(err) => {
                tracing::info!(%err, "hosted service not configured, running on-device only");
                None
            }
        };

        Ok(Self { storage, service, farm: FarmConfig::from_lookup(&lookup)? })
    }

    /// Set the on-device store
    pub fn with_storage(mut self, storage: KvConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set the hosted service
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the farm service configuration
    pub fn with_farm(mut self, farm: FarmConfig) -> Self {
        self.farm = farm;
        self
    }

    /// Whether a usable hosted service is configured
    pub fn remote_configured(&self) -> bool {
        self.service.as_ref().is_some_and(ServiceConfig::is_configured)
    }
}

/// The wired application
pub struct FarmTrack {
    kv: KvStore,
    remote: Arc<dyn farm_core::RemoteStore>,
    remote_configured: bool,
    profiles: Arc<ProfileService>,
    auth: AuthService,
    gate: SessionGate,
    records: FarmRepository,
    resolver: FarmerIdResolver,
    reconciler: Reconciler,
    dashboard: DashboardService,
}

impl FarmTrack {
    /// Open the on-device store and connect to the configured service
    ///
    /// Uses the in-memory [`LocalIdentityProvider`] seeded with the demo
    /// account.
    pub fn open(config: AppConfig) -> Result<Self> {
        let kv = KvStore::new(config.storage.clone())?;

        let remote_configured = config.remote_configured();
        let remote: Arc<dyn farm_core::RemoteStore> = match config.service {
            Some(service) if remote_configured => {
                tracing::info!(url = %service.service_url, "using hosted service");
                let client = RestClient::new(service)?;
                Arc::new(farm_core::PostgrestStore::new(client, config.farm.retry.clone()))
            }
            _ => Arc::new(farm_core::UnconfiguredRemote),
        };

        Ok(Self::with_parts(
            kv,
            remote,
            remote_configured,
            Arc::new(LocalIdentityProvider::with_demo_account()),
            config.farm,
        ))
    }

    /// Wire the application from already-built parts
    pub fn with_parts(
        kv: KvStore,
        remote: Arc<dyn farm_core::RemoteStore>,
        remote_configured: bool,
        identity: Arc<dyn IdentityProvider>,
        farm: FarmConfig,
    ) -> Self {
        let local = LocalStore::new(kv.clone());
        let sessions = SessionStore::new(kv.clone());
        let profiles =
            Arc::new(ProfileService::new(remote.clone(), local.clone(), farm.precedence));

        Self {
            auth: AuthService::new(identity, sessions.clone(), profiles.clone()),
            gate: SessionGate::new(sessions),
            records: FarmRepository::new(remote.clone(), local.clone(), farm.precedence),
            resolver: FarmerIdResolver::new(remote.clone(), farm.ladder),
            reconciler: Reconciler::new(remote.clone(), local.clone()),
            dashboard: DashboardService::new(remote.clone(), local),
            profiles,
            remote,
            remote_configured,
            kv,
        }
    }

    /// Startup session check
    pub fn access(&self) -> Result<Access> {
        Ok(self.gate.check(self.remote_configured)?)
    }

    /// Whether a usable hosted service is configured
    pub fn is_remote_configured(&self) -> bool {
        self.remote_configured
    }

    /// The remote store in use
    pub fn remote(&self) -> &Arc<dyn farm_core::RemoteStore> {
        &self.remote
    }

    /// Sign-in, sign-up and sign-out
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Farmer profiles
    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    /// Farmland and crop records
    pub fn records(&self) -> &FarmRepository {
        &self.records
    }

    /// Farmer-id resolution ladder
    pub fn resolver(&self) -> &FarmerIdResolver {
        &self.resolver
    }

    /// Promotion of local-only records
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Dashboard numbers
    pub fn dashboard(&self) -> &DashboardService {
        &self.dashboard
    }

    /// Flush on-device writes to disk
    pub fn flush(&self) -> Result<()> {
        Ok(self.kv.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_config_without_service() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.service.is_none());
        assert!(!config.remote_configured());
        assert_eq!(config.farm.precedence, SourcePrecedence::RemoteFirst);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = AppConfig::from_lookup(lookup(&[
            ("FARMTRACK_SERVICE_URL", "https://abc.supabase.co"),
            ("FARMTRACK_SERVICE_KEY", "anon-key"),
            ("FARMTRACK_PRECEDENCE", "local-first"),
            (DATA_PATH_ENV, "/tmp/farmtrack-test.db"),
        ]))
        .unwrap();

        assert!(config.remote_configured());
        assert_eq!(config.farm.precedence, SourcePrecedence::LocalFirst);
        assert_eq!(config.storage.path, "/tmp/farmtrack-test.db");
    }

    #[test]
    fn test_placeholder_service_is_unconfigured() {
        let config = AppConfig::default().with_service(ServiceConfig::default());
        assert!(!config.remote_configured());
    }

    #[test]
    fn test_bad_precedence_fails() {
        let result = AppConfig::from_lookup(lookup(&[("FARMTRACK_PRECEDENCE", "sideways")]));
        assert!(matches!(result, Err(AppError::Settings(_))));
    }
}
