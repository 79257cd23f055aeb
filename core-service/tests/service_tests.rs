//! Integration tests for the import service façade
//!
//! These tests verify the request-facing flow:
//! - Request verification gating every entry point
//! - Starting an import and polling it to completion
//! - Finished status consumed on first observation
//! - Bootstrap with the desktop adapters

use async_trait::async_trait;
use bridge_desktop::{MemoryBlobStore, MemoryKeyValueStore};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::picker::{ItemsPage, MediaItem, MediaType, PickerService, RemoteSession};
use bridge_traits::time::SystemClock;
use core_auth::{AccessGrant, AuthError, IdentityProvider, RequestAuthenticator, VerifiedRequest};
use core_import::JobState;
use core_runtime::ImportConfig;
use core_service::{CheckStatusResponse, ImportDependencies, ImportService, ServiceError};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Mocks and fakes
// ============================================================================

mock! {
    Identity {}

    #[async_trait]
    impl IdentityProvider for Identity {
        fn authorization_url(&self, redirect_url: &str) -> core_auth::Result<String>;
        async fn exchange(&self, code: &str, redirect_url: &str) -> core_auth::Result<AccessGrant>;
    }
}

mock! {
    Authenticator {}

    #[async_trait]
    impl RequestAuthenticator for Authenticator {
        async fn verify(&self, headers: &HashMap<String, String>) -> core_auth::Result<VerifiedRequest>;
    }
}

fn item(id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        created_at: "2024-07-04T18:00:00Z".to_string(),
        media_type: MediaType::Video,
        source_url: format!("https://video.example.com/{}", id),
        mime_type: "video/mp4".to_string(),
        filename: format!("{}.mp4", id),
        width: 1920,
        height: 1080,
    }
}

/// Picker whose session flips to selected on demand
struct TogglePicker {
    selected: AtomicBool,
}

#[async_trait]
impl PickerService for TogglePicker {
    async fn create_session(&self, access_token: &str) -> BridgeResult<RemoteSession> {
        if access_token != "ya29.granted" {
            return Err(BridgeError::Unauthorized("status 401".to_string()));
        }
        Ok(RemoteSession {
            id: "sess-9".to_string(),
            picker_uri: "https://photos.google.com/picker/sess-9".to_string(),
            poll_interval_seconds: 5,
            media_selected: false,
        })
    }

    async fn get_session(&self, _access_token: &str, session_id: &str) -> BridgeResult<RemoteSession> {
        Ok(RemoteSession {
            id: session_id.to_string(),
            picker_uri: String::new(),
            poll_interval_seconds: 5,
            media_selected: self.selected.load(Ordering::SeqCst),
        })
    }

    async fn list_items(
        &self,
        _access_token: &str,
        _session_id: &str,
        page_token: Option<&str>,
    ) -> BridgeResult<ItemsPage> {
        Ok(match page_token {
            None => ItemsPage {
                items: vec![item("clip-1")],
                next_page_token: Some("next".to_string()),
            },
            Some(_) => ItemsPage {
                items: vec![item("clip-2")],
                next_page_token: None,
            },
        })
    }
}

struct EchoHttp;

#[async_trait]
impl HttpClient for EchoHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(200, request.url.into_bytes()))
    }
}

fn config() -> ImportConfig {
    ImportConfig::builder()
        .oauth_client("client-id", "client-secret")
        .access("https://team.cloudflareaccess.com", "aud-tag")
        .queue_workers(1)
        .build()
        .unwrap()
}

fn headers() -> HashMap<String, String> {
    HashMap::from([(
        "cf-access-jwt-assertion".to_string(),
        "header.payload.sig".to_string(),
    )])
}

fn authenticator_for(subject: Option<&'static str>) -> MockAuthenticator {
    let mut authenticator = MockAuthenticator::new();
    authenticator.expect_verify().returning(move |_| {
        Ok(VerifiedRequest {
            subject: subject.map(str::to_string),
            email: Some("user@example.com".to_string()),
        })
    });
    authenticator
}

struct Fixture {
    service: ImportService,
    picker: Arc<TogglePicker>,
    blobs: Arc<MemoryBlobStore>,
}

fn fixture(identity: MockIdentity, authenticator: MockAuthenticator) -> Fixture {
    let picker = Arc::new(TogglePicker {
        selected: AtomicBool::new(false),
    });
    let blobs = Arc::new(MemoryBlobStore::new());

    let deps = ImportDependencies {
        http_client: Arc::new(EchoHttp),
        blob_store: blobs.clone(),
        kv_store: Arc::new(MemoryKeyValueStore::new()),
        picker: picker.clone(),
        identity: Arc::new(identity),
        authenticator: Arc::new(authenticator),
        clock: Arc::new(SystemClock),
    };

    Fixture {
        service: ImportService::new(deps, &config()),
        picker,
        blobs,
    }
}

fn granting_identity() -> MockIdentity {
    let mut identity = MockIdentity::new();
    identity
        .expect_exchange()
        .withf(|code, redirect| code == "auth-code" && redirect == "https://app.test/cb")
        .returning(|_, _| Ok(AccessGrant::new("ya29.granted", 3600)));
    identity
}

async fn poll_until_finished(service: &ImportService) -> CheckStatusResponse {
    for _ in 0..200 {
        let response = service.check_status(&headers()).await.unwrap();
        if response.body().is_some_and(|b| b.finished) {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("import did not finish");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_authorization_url_delegates_to_identity_provider() {
    let mut identity = MockIdentity::new();
    identity
        .expect_authorization_url()
        .withf(|redirect| redirect == "https://app.test/cb")
        .returning(|_| Ok("https://accounts.example.com/auth?client_id=x".to_string()));

    let f = fixture(identity, MockAuthenticator::new());

    assert_eq!(
        f.service.authorization_url("https://app.test/cb").unwrap(),
        "https://accounts.example.com/auth?client_id=x"
    );
}

#[tokio::test]
async fn test_check_status_forbidden_without_credential() {
    let mut authenticator = MockAuthenticator::new();
    authenticator
        .expect_verify()
        .returning(|_| Err(AuthError::MissingCredential("cf-access-jwt-assertion".into())));

    let f = fixture(MockIdentity::new(), authenticator);
    let response = f.service.check_status(&HashMap::new()).await.unwrap();

    assert_eq!(response, CheckStatusResponse::Forbidden);
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_missing_subject_is_rejected() {
    let f = fixture(MockIdentity::new(), authenticator_for(None));

    let response = f.service.check_status(&headers()).await.unwrap();
    assert_eq!(response.status_code(), 403);

    let err = f
        .service
        .begin_import(&headers(), "auth-code", "https://app.test/cb")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MissingSubject));
}

#[tokio::test]
async fn test_check_status_not_found_without_import() {
    let f = fixture(MockIdentity::new(), authenticator_for(Some("user-1")));

    let response = f.service.check_status(&headers()).await.unwrap();

    assert_eq!(response, CheckStatusResponse::NotFound);
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_waiting_until_user_picks() {
    let f = fixture(granting_identity(), authenticator_for(Some("user-1")));

    let uri = f
        .service
        .begin_import(&headers(), "auth-code", "https://app.test/cb")
        .await
        .unwrap();
    assert_eq!(uri, "https://photos.google.com/picker/sess-9");

    let response = f.service.check_status(&headers()).await.unwrap();
    assert_eq!(response.status_code(), 200);
    let body = response.body().unwrap();
    assert_eq!(body.message, "waiting");
    assert!(!body.finished);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let job = f
        .service
        .driver()
        .jobs()
        .load("user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.state, JobState::AwaitingSelection);
    assert_eq!(job.remote_session_id, "sess-9");
    assert!(job.pending_items.is_empty());
    assert!(job.token_expires_at.is_some());

    f.service.shutdown().await;
}

#[tokio::test]
async fn test_import_runs_to_completion_through_polling() {
    let f = fixture(granting_identity(), authenticator_for(Some("user-1")));
    f.service
        .begin_import(&headers(), "auth-code", "https://app.test/cb")
        .await
        .unwrap();

    f.picker.selected.store(true, Ordering::SeqCst);
    let response = poll_until_finished(&f.service).await;
    assert_eq!(response.status_code(), 200);

    // The finished status is consumed by the poll that saw it
    assert_eq!(
        f.service.check_status(&headers()).await.unwrap(),
        CheckStatusResponse::NotFound
    );
    assert_eq!(
        f.blobs.keys().await,
        vec![
            "2024-07-04T18:00:00Z-clip-1.mp4".to_string(),
            "2024-07-04T18:00:00Z-clip-2.mp4".to_string()
        ]
    );
    assert!(f
        .service
        .driver()
        .jobs()
        .load("user-1")
        .await
        .unwrap()
        .is_none());

    f.service.shutdown().await;
}

#[tokio::test]
async fn test_rejected_code_is_forbidden() {
    let mut identity = MockIdentity::new();
    identity
        .expect_exchange()
        .returning(|_, _| Err(AuthError::InvalidAuthCode("invalid_grant".into())));

    let f = fixture(identity, authenticator_for(Some("user-1")));
    let err = f
        .service
        .begin_import(&headers(), "stale", "https://app.test/cb")
        .await
        .unwrap_err();

    assert!(err.is_forbidden());
    assert!(f.service.driver().jobs().load("user-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_import_replaces_previous_job() {
    let f = fixture(granting_identity(), authenticator_for(Some("user-1")));

    f.service
        .begin_import(&headers(), "auth-code", "https://app.test/cb")
        .await
        .unwrap();
    let first = f.service.driver().jobs().load("user-1").await.unwrap().unwrap();

    f.service
        .begin_import(&headers(), "auth-code", "https://app.test/cb")
        .await
        .unwrap();
    let second = f.service.driver().jobs().load("user-1").await.unwrap().unwrap();

    assert_ne!(first.job_id, second.job_id);
    f.service.shutdown().await;
}

#[tokio::test]
async fn test_bootstrap_with_desktop_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let config = ImportConfig::builder()
        .oauth_client("client-id", "client-secret")
        .access("https://team.cloudflareaccess.com", "aud-tag")
        .blob_dir(dir.path().join("blobs"))
        .database_path(dir.path().join("state.db"))
        .build()
        .unwrap();

    let service = core_service::bootstrap(config).await.unwrap();
    let url = service
        .authorization_url("https://app.test/cb")
        .unwrap();

    assert!(url.contains("client_id=client-id"));
    assert!(url.contains("access_type=offline"));
    service.shutdown().await;
}
