//! Import service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, blob storage,
//! key-value storage) together with the identity provider, the request
//! authenticator and the picker client into a single [`ImportService`]. Server
//! hosts typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) and call [`bootstrap`]; embedders with their own adapters
//! build [`ImportDependencies`] by hand.
//!
//! The HTTP routing layer is the host's concern. Each entry point here maps to
//! one route: `/login` → [`ImportService::authorization_url`],
//! `/oauth_callback` → [`ImportService::begin_import`], `/check_status` →
//! [`ImportService::check_status`].

pub mod error;

pub use error::{Result, ServiceError};

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    error::BridgeError,
    http::HttpClient,
    picker::PickerService,
    storage::{BlobStore, KeyValueStore},
    time::{Clock, SystemClock},
};
use core_auth::{
    AuthError, GoogleOAuthClient, IdentityProvider, JwtAuthenticator, RequestAuthenticator,
};
use core_import::{
    EnqueueOutcome, JobDriver, JobRecord, JobStateStore, StatusRecord, StatusStore, StepQueue,
    TransferWorker,
};
use core_runtime::ImportConfig;
use provider_google_photos::GooglePhotosPicker;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
use bridge_desktop::{ReqwestHttpClient, SqliteKeyValueStore, TokioBlobStore};

/// Aggregated handle to every collaborator the import core requires.
pub struct ImportDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub blob_store: Arc<dyn BlobStore>,
    pub kv_store: Arc<dyn KeyValueStore>,
    pub picker: Arc<dyn PickerService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub authenticator: Arc<dyn RequestAuthenticator>,
    pub clock: Arc<dyn Clock>,
}

impl ImportDependencies {
    /// Build the default Google collaborators on top of explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        blob_store: Arc<dyn BlobStore>,
        kv_store: Arc<dyn KeyValueStore>,
        config: &ImportConfig,
    ) -> Self {
        let picker = GooglePhotosPicker::with_base_url(
            Arc::clone(&http_client),
            config.picker_api_base.clone(),
        );
        let identity = GoogleOAuthClient::new(config.oauth.clone(), Arc::clone(&http_client));
        let authenticator =
            JwtAuthenticator::new(config.access.clone(), Arc::clone(&http_client));

        Self {
            http_client,
            blob_store,
            kv_store,
            picker: Arc::new(picker),
            identity: Arc::new(identity),
            authenticator: Arc::new(authenticator),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Body of a `200` status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBody {
    pub message: String,
    pub finished: bool,
    pub retryable: bool,
}

impl From<StatusRecord> for StatusBody {
    fn from(status: StatusRecord) -> Self {
        Self {
            message: status.message,
            finished: status.finished,
            retryable: status.retryable,
        }
    }
}

/// Outcome of a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatusResponse {
    Ok(StatusBody),
    /// No import for this owner
    NotFound,
    /// Request failed verification
    Forbidden,
}

impl CheckStatusResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            CheckStatusResponse::Ok(_) => 200,
            CheckStatusResponse::NotFound => 404,
            CheckStatusResponse::Forbidden => 403,
        }
    }

    pub fn body(&self) -> Option<&StatusBody> {
        match self {
            CheckStatusResponse::Ok(body) => Some(body),
            _ => None,
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct ImportService {
    deps: Arc<ImportDependencies>,
    driver: Arc<JobDriver>,
    queue: Arc<StepQueue>,
    jobs: JobStateStore,
    statuses: StatusStore,
}

impl ImportService {
    /// Create the service and start its step workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(deps: ImportDependencies, config: &ImportConfig) -> Self {
        let jobs = JobStateStore::with_prefix(
            Arc::clone(&deps.kv_store),
            config.storage.job_prefix.clone(),
        );
        let statuses = StatusStore::with_prefix(
            Arc::clone(&deps.kv_store),
            config.storage.status_prefix.clone(),
        );
        let transfer = TransferWorker::new(
            Arc::clone(&deps.http_client),
            Arc::clone(&deps.blob_store),
        );

        let driver = Arc::new(JobDriver::new(
            Arc::clone(&deps.picker),
            Arc::new(transfer),
            jobs.clone(),
            statuses.clone(),
            Arc::clone(&deps.clock),
            config.driver.clone(),
        ));
        let queue = StepQueue::start(
            Arc::clone(&driver),
            config.queue.workers,
            config.queue.capacity,
        );

        Self {
            deps: Arc::new(deps),
            driver,
            queue: Arc::new(queue),
            jobs,
            statuses,
        }
    }

    /// Access the collaborators being used by the service.
    pub fn dependencies(&self) -> Arc<ImportDependencies> {
        Arc::clone(&self.deps)
    }

    /// Driver for hosts that run steps on their own schedule.
    pub fn driver(&self) -> Arc<JobDriver> {
        Arc::clone(&self.driver)
    }

    /// Consent URL to redirect the user to.
    pub fn authorization_url(&self, redirect_url: &str) -> Result<String> {
        Ok(self.deps.identity.authorization_url(redirect_url)?)
    }

    /// Exchange the authorization code, open a picker session and start a
    /// fresh job for the caller, replacing any previous one.
    ///
    /// Returns the picker URI to redirect the user to.
    #[instrument(skip(self, headers, code, redirect_url))]
    pub async fn begin_import(
        &self,
        headers: &HashMap<String, String>,
        code: &str,
        redirect_url: &str,
    ) -> Result<String> {
        let owner_id = self.owner_id(headers).await?;

        let grant = self.deps.identity.exchange(code, redirect_url).await?;
        let session = self
            .deps
            .picker
            .create_session(&grant.access_token)
            .await
            .map_err(|e| match e {
                BridgeError::Unauthorized(msg) => {
                    ServiceError::Auth(AuthError::InvalidCredential(msg))
                }
                other => ServiceError::Picker(other.to_string()),
            })?;

        let job = JobRecord::new(
            owner_id.as_str(),
            session.id.as_str(),
            grant.access_token,
            self.deps.clock.unix_timestamp(),
        )
        .with_token_expiry(grant.expires_at.timestamp());

        self.jobs.save(&job).await?;
        self.statuses
            .publish(&StatusRecord::waiting(owner_id.as_str()))
            .await?;
        self.queue.enqueue(&owner_id);

        info!(
            owner_id = %owner_id,
            job_id = %job.job_id,
            session_id = %session.id,
            "Import started"
        );
        Ok(session.picker_uri)
    }

    /// Report progress for the caller and schedule one driver step.
    ///
    /// A finished status is deleted once it has been returned, so the poll
    /// after completion sees `NotFound`.
    #[instrument(skip(self, headers))]
    pub async fn check_status(
        &self,
        headers: &HashMap<String, String>,
    ) -> Result<CheckStatusResponse> {
        let owner_id = match self.owner_id(headers).await {
            Ok(owner_id) => owner_id,
            Err(e) if e.is_forbidden() || matches!(e, ServiceError::MissingSubject) => {
                debug!(error = %e, "Status request rejected");
                return Ok(CheckStatusResponse::Forbidden);
            }
            Err(e) => return Err(e),
        };

        self.queue.enqueue(&owner_id);

        let Some(status) = self.statuses.get(&owner_id).await? else {
            return Ok(CheckStatusResponse::NotFound);
        };

        if status.finished {
            self.statuses.delete(&owner_id).await?;
            debug!(owner_id = %owner_id, "Finished status observed");
        }

        Ok(CheckStatusResponse::Ok(status.into()))
    }

    /// Schedule a step without a status read, for cron-style triggers.
    pub fn enqueue_step(&self, owner_id: &str) -> EnqueueOutcome {
        self.queue.enqueue(owner_id)
    }

    /// Stop the step workers.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    async fn owner_id(&self, headers: &HashMap<String, String>) -> Result<String> {
        let verified = self.deps.authenticator.verify(headers).await?;
        match verified.subject() {
            Some(subject) => Ok(subject.to_string()),
            None => {
                warn!("Verified request carried no subject");
                Err(ServiceError::MissingSubject)
            }
        }
    }
}

/// Convenience bootstrapper for server hosts.
///
/// ```ignore
/// use core_service::bootstrap;
/// use core_runtime::ImportConfig;
///
/// let service = bootstrap(ImportConfig::from_env()?).await?;
/// let uri = service.authorization_url("https://app.example.com/oauth_callback")?;
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap(config: ImportConfig) -> Result<ImportService> {
    config.validate()?;

    let http_client = ReqwestHttpClient::with_timeout(config.http_timeout)
        .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;
    let blob_store = TokioBlobStore::new(config.storage.blob_dir.clone())
        .await
        .map_err(|e| ServiceError::CapabilityMissing {
            capability: "blob_store".to_string(),
            message: e.to_string(),
        })?;
    let kv_store = SqliteKeyValueStore::new(config.storage.database_path.clone())
        .await
        .map_err(|e| ServiceError::CapabilityMissing {
            capability: "kv_store".to_string(),
            message: e.to_string(),
        })?;

    let deps = ImportDependencies::new(
        Arc::new(http_client),
        Arc::new(blob_store),
        Arc::new(kv_store),
        &config,
    );

    info!(
        blob_dir = %config.storage.blob_dir.display(),
        workers = config.queue.workers,
        "Import service ready"
    );
    Ok(ImportService::new(deps, &config))
}
