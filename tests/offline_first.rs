//! Offline-First Integration Tests
//!
//! End-to-end record flows through the application facade: fallback to
//! on-device storage while the hosted service is down, source-routed
//! deletes, and reconciliation once the service returns.

use farm_core::identity::LocalIdentityProvider;
use farm_core::records::WriteOutcome;
use farm_core::test_utils::{crop_form, demo_identity, farmland_form, MemoryRemote};
use farm_core::{FarmConfig, FarmError, SourcePrecedence, StoreSource};
use farmtrack::FarmTrack;
use std::sync::Arc;
use storage::KvStore;

fn app_with(remote: Arc<MemoryRemote>, farm: FarmConfig) -> FarmTrack {
    FarmTrack::with_parts(
        KvStore::in_memory().unwrap(),
        remote,
        true,
        Arc::new(LocalIdentityProvider::with_demo_account()),
        farm,
    )
}

/// Offline work is promoted intact once the service is back
#[tokio::test]
async fn test_offline_session_reconciles() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_reachable(false);
    let app = app_with(remote.clone(), FarmConfig::default());

    let signed_in = app.auth().sign_in("test@example.com", "password123").await.unwrap();
    let profile = signed_in.profile.unwrap();
    assert!(profile.is_local());

    for name in ["North Field", "River Plot"] {
        let outcome = app.records().create_farmland(&profile, &farmland_form(name)).await.unwrap();
        assert!(outcome.is_local());
    }
    app.records().create_crop(&crop_form("Sorghum")).await.unwrap();

    let summary = app.dashboard().summary(&profile).await.unwrap();
    assert_eq!(summary.source, StoreSource::Local);
    assert_eq!(summary.data.farmland_count, 2);

    // Still offline: nothing moves
    let report = app.reconciler().run(&signed_in.identity).await.unwrap();
    assert!(report.skipped);
    assert_eq!(report.remaining, 4);

    remote.set_reachable(true);
    let report = app.reconciler().run(&signed_in.identity).await.unwrap();
    assert_eq!(report.promoted, 4);
    assert_eq!(report.remaining, 0);

    let profile = app.profiles().ensure(&signed_in.identity).await.unwrap();
    assert_eq!(profile.source, StoreSource::Remote);

    let listed = app.records().list_farmlands(&profile).await.unwrap();
    assert_eq!(listed.source, StoreSource::Remote);
    assert_eq!(listed.data.len(), 2);

    let summary = app.dashboard().summary(&profile).await.unwrap();
    assert_eq!(summary.source, StoreSource::Remote);
    assert_eq!(summary.data.total_hectares, 5.0);
    assert_eq!(summary.data.crop_count, 1);
}

/// A remote profile with an outage mid-session keeps remote and local records apart
#[tokio::test]
async fn test_delete_routes_to_recorded_source() {
    let remote = Arc::new(MemoryRemote::new());
    let app = app_with(remote.clone(), FarmConfig::default());
    let profile = app.profiles().ensure(&demo_identity()).await.unwrap();
    assert_eq!(profile.source, StoreSource::Remote);

    let saved = app.records().create_farmland(&profile, &farmland_form("Remote")).await.unwrap();
    assert!(matches!(saved, WriteOutcome::Saved(_)));

    remote.set_reachable(false);
    let local = app.records().create_farmland(&profile, &farmland_form("Local")).await.unwrap();
    assert!(local.is_local());

    let listed_local = app.records().list_farmlands(&profile).await.unwrap();
    assert_eq!(listed_local.source, StoreSource::Local);
    let calls = remote.call_count();
    app.records().delete_farmland(&listed_local.refs()[0]).await.unwrap();
    assert_eq!(remote.call_count(), calls);
    assert_eq!(remote.farmlands().len(), 1);

    remote.set_reachable(true);
    let listed_remote = app.records().list_farmlands(&profile).await.unwrap();
    assert_eq!(listed_remote.source, StoreSource::Remote);
    app.records().delete_farmland(&listed_remote.refs()[0]).await.unwrap();
    assert!(remote.farmlands().is_empty());
}

/// Validation failures never reach the service
#[tokio::test]
async fn test_validation_precedes_network() {
    let remote = Arc::new(MemoryRemote::new());
    let app = app_with(remote.clone(), FarmConfig::default());
    let profile = app.profiles().ensure(&demo_identity()).await.unwrap();
    let calls = remote.call_count();

    let mut form = farmland_form("North Field");
    form.size = "0".to_string();
    let err = app.records().create_farmland(&profile, &form).await.unwrap_err();

    match err {
        FarmError::Validation(errors) => {
            assert_eq!(errors.field("size"), Some("Size must be a positive number"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(remote.call_count(), calls);
}

/// Local-first reads keep serving the device copy while one exists
#[tokio::test]
async fn test_local_first_precedence() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_reachable(false);
    let app = app_with(remote.clone(), FarmConfig::default().with_precedence(SourcePrecedence::LocalFirst));

    let offline = app.profiles().ensure(&demo_identity()).await.unwrap();
    assert!(offline.is_local());

    // The service comes back and already knows this identity
    remote.set_reachable(true);
    remote.seed_farmer(&demo_identity());

    let profile = app.profiles().ensure(&demo_identity()).await.unwrap();
    assert_eq!(profile, offline);
}

/// The farmer-id ladder resolves through the facade
#[tokio::test]
async fn test_resolver_through_facade() {
    let remote = Arc::new(MemoryRemote::new());
    let app = app_with(remote.clone(), FarmConfig::default());

    let resolution = app.resolver().resolve(&demo_identity()).await.unwrap();
    assert!(resolution.ownership_verified);
    assert_eq!(remote.farmers()[0].id, resolution.farmer_id);

    let again = app.resolver().resolve(&demo_identity()).await.unwrap();
    assert_eq!(again.farmer_id, resolution.farmer_id);
    assert_eq!(remote.farmers().len(), 1);
}
