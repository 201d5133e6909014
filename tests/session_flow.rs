//! Session Flow Integration Tests
//!
//! Sign-in, persistence across restarts and the startup session check,
//! exercised through the application facade with an on-disk store.

use farm_core::identity::{DEMO_EMAIL, DEMO_PASSWORD, DEMO_USER_ID};
use farm_core::session::Access;
use farm_core::StoreSource;
use farmtrack::{AppConfig, FarmTrack};
use postgrest_client::ServiceConfig;
use serde_json::json;
use storage::KvConfig;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn on_disk(dir: &TempDir) -> AppConfig {
    let path = dir.path().join("farmtrack.db");
    AppConfig::default().with_storage(KvConfig::new(path.to_string_lossy()))
}

/// Session survives a restart of the application
#[tokio::test]
async fn test_session_persists_across_restart() {
    let dir = TempDir::new().unwrap();

    {
        let app = FarmTrack::open(on_disk(&dir)).unwrap();
        assert_eq!(app.access().unwrap(), Access::Unconfigured);

        let signed_in = app.auth().sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        assert_eq!(signed_in.identity.id, DEMO_USER_ID);
        app.flush().unwrap();
    }

    {
        let app = FarmTrack::open(on_disk(&dir)).unwrap();
        match app.access().unwrap() {
            Access::Authenticated(identity) => assert_eq!(identity.id, DEMO_USER_ID),
            other => panic!("expected an authenticated session, got {other:?}"),
        }

        app.auth().sign_out().unwrap();
        assert_eq!(app.access().unwrap(), Access::Unconfigured);
    }
}

/// Without a session, a configured service sends the viewer to login
#[tokio::test]
async fn test_configured_service_redirects_to_login() {
    let dir = TempDir::new().unwrap();
    let config = on_disk(&dir).with_service(ServiceConfig::new("https://abc.supabase.co", "anon-key"));

    let app = FarmTrack::open(config).unwrap();

    assert!(app.is_remote_configured());
    assert_eq!(app.access().unwrap(), Access::RedirectToLogin);
}

/// Placeholder credentials count as unconfigured
#[tokio::test]
async fn test_placeholder_service_is_unconfigured() {
    let dir = TempDir::new().unwrap();
    let app = FarmTrack::open(on_disk(&dir).with_service(ServiceConfig::default())).unwrap();

    assert!(!app.is_remote_configured());
    assert_eq!(app.access().unwrap(), Access::Unconfigured);
}

/// Sign-in creates the remote profile through the REST interface
#[tokio::test]
async fn test_sign_in_creates_remote_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/farmers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/farmers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "f-1",
            "created_at": "2024-03-01T10:00:00+00:00",
            "user_id": DEMO_USER_ID,
            "name": "Test User",
            "contact_number": "000-000-0000",
            "address": "No address provided",
            "email": DEMO_EMAIL
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let app = FarmTrack::open(on_disk(&dir).with_service(ServiceConfig::new(server.uri(), "anon-key")))
        .unwrap();

    let signed_in = app.auth().sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    let profile = signed_in.profile.unwrap();

    assert_eq!(profile.source, StoreSource::Remote);
    assert_eq!(profile.data.id, "f-1");
}

/// A failed profile ensure does not fail sign-in
#[tokio::test]
async fn test_sign_in_survives_service_outage() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/farmers"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = on_disk(&dir).with_service(ServiceConfig::new(server.uri(), "anon-key"));
    config.farm = config.farm.with_retry(postgrest_client::RetryConfig::none());
    let app = FarmTrack::open(config).unwrap();

    let signed_in = app.auth().sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    assert!(signed_in.profile.unwrap().is_local());
    assert!(matches!(app.access().unwrap(), Access::Authenticated(_)));
}
