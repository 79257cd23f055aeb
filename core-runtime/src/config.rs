//! # Import Configuration
//!
//! Settings for the picker import pipeline.
//!
//! ## Overview
//!
//! `ImportConfig` is assembled with [`ImportConfigBuilder`] and validated
//! fail-fast: a missing OAuth client, an empty access audience, or nonsensical
//! driver tuning is rejected at build time with an actionable message instead
//! of surfacing later as a confusing runtime failure.
//!
//! Bridges (HTTP client, stores) are not part of this struct; `core-service`
//! wires them from these settings.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ImportConfig;
//!
//! let config = ImportConfig::builder()
//!     .oauth_client("client-id", "client-secret")
//!     .access("https://team.cloudflareaccess.com", "aud-tag")
//!     .blob_dir("/var/lib/picker-import/blobs")
//!     .database_path("/var/lib/picker-import/state.db")
//!     .build()?;
//! ```
//!
//! Or from the environment (a `.env` file is honoured):
//!
//! ```ignore
//! let config = ImportConfig::from_env()?;
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PICKER_API_BASE: &str = "https://photospicker.googleapis.com";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const PICKER_SCOPE: &str = "https://www.googleapis.com/auth/photospicker.mediaitems.readonly";

/// OAuth client settings for the identity provider
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Settings for verifying the access JWT on incoming requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSettings {
    /// Team domain, e.g. `https://team.cloudflareaccess.com`; also the issuer
    pub team_domain: String,
    /// Expected `aud` claim
    pub audience: String,
    /// Header carrying the JWT
    pub jwt_header: String,
}

impl AccessSettings {
    /// JWKS endpoint under the team domain
    pub fn certs_url(&self) -> String {
        format!(
            "{}/cdn-cgi/access/certs",
            self.team_domain.trim_end_matches('/')
        )
    }
}

/// Durable storage locations and key prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub blob_dir: PathBuf,
    pub database_path: PathBuf,
    pub job_prefix: String,
    pub status_prefix: String,
}

/// Job driver tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Items transferred per step; `None` drains the queue in one step
    pub items_per_step: Option<usize>,
    /// Consecutive failed steps before the job stops retrying
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            items_per_step: None,
            max_attempts: 10,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(300),
        }
    }
}

/// Background step queue sizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 256,
        }
    }
}

/// Complete configuration for the import pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportConfig {
    pub picker_api_base: String,
    pub http_timeout: Duration,
    pub oauth: OAuthSettings,
    pub access: AccessSettings,
    pub storage: StorageSettings,
    pub driver: DriverSettings,
    pub queue: QueueSettings,
}

impl ImportConfig {
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::default()
    }

    /// Load configuration from process environment variables
    ///
    /// Reads a `.env` file first if one is present. See
    /// [`ImportConfig::from_lookup`] for the variable names.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// | Variable | Required | Default |
    /// |----------|----------|---------|
    /// | `OAUTH_CLIENT_ID` | yes | |
    /// | `OAUTH_CLIENT_SECRET` | yes | |
    /// | `ACCESS_TEAM_DOMAIN` | yes | |
    /// | `ACCESS_AUD_TAG` | yes | |
    /// | `PICKER_API_BASE` | no | Google Photos Picker |
    /// | `PICKER_BLOB_DIR` | no | `./data/blobs` |
    /// | `PICKER_DATABASE_PATH` | no | `./data/state.db` |
    /// | `PICKER_ITEMS_PER_STEP` | no | unbounded |
    /// | `PICKER_MAX_ATTEMPTS` | no | 10 |
    /// | `PICKER_BACKOFF_BASE_SECS` | no | 2 |
    /// | `PICKER_BACKOFF_MAX_SECS` | no | 300 |
    /// | `PICKER_QUEUE_WORKERS` | no | 4 |
    /// | `PICKER_QUEUE_CAPACITY` | no | 256 |
    /// | `PICKER_HTTP_TIMEOUT_SECS` | no | 30 |
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} must be set", key)))
        };
        let parsed = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        Error::Config(format!("{} must be a number, got {:?}: {}", key, raw, e))
                    })
                })
                .transpose()
        };

        let mut builder = ImportConfig::builder()
            .oauth_client(required("OAUTH_CLIENT_ID")?, required("OAUTH_CLIENT_SECRET")?)
            .access(required("ACCESS_TEAM_DOMAIN")?, required("ACCESS_AUD_TAG")?);

        if let Some(base) = lookup("PICKER_API_BASE") {
            builder = builder.picker_api_base(base);
        }
        if let Some(dir) = lookup("PICKER_BLOB_DIR") {
            builder = builder.blob_dir(dir);
        }
        if let Some(path) = lookup("PICKER_DATABASE_PATH") {
            builder = builder.database_path(path);
        }
        if let Some(n) = parsed("PICKER_ITEMS_PER_STEP")? {
            builder = builder.items_per_step(n as usize);
        }
        if let Some(n) = parsed("PICKER_MAX_ATTEMPTS")? {
            builder = builder.max_attempts(n as u32);
        }
        if let Some(secs) = parsed("PICKER_BACKOFF_BASE_SECS")? {
            builder = builder.backoff_base(Duration::from_secs(secs));
        }
        if let Some(secs) = parsed("PICKER_BACKOFF_MAX_SECS")? {
            builder = builder.backoff_max(Duration::from_secs(secs));
        }
        if let Some(n) = parsed("PICKER_QUEUE_WORKERS")? {
            builder = builder.queue_workers(n as usize);
        }
        if let Some(n) = parsed("PICKER_QUEUE_CAPACITY")? {
            builder = builder.queue_capacity(n as usize);
        }
        if let Some(secs) = parsed("PICKER_HTTP_TIMEOUT_SECS")? {
            builder = builder.http_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.trim().is_empty() || self.oauth.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client id and secret are required to exchange authorization codes"
                    .to_string(),
            ));
        }

        if !self.access.team_domain.starts_with("https://") {
            return Err(Error::Config(format!(
                "Access team domain must be an https URL, got {:?}",
                self.access.team_domain
            )));
        }

        if self.access.audience.trim().is_empty() {
            return Err(Error::Config(
                "Access audience tag cannot be empty".to_string(),
            ));
        }

        let (job, status) = (&self.storage.job_prefix, &self.storage.status_prefix);
        if job.starts_with(status.as_str()) || status.starts_with(job.as_str()) {
            return Err(Error::Config(format!(
                "Job and status key prefixes must not overlap, got {:?} and {:?}",
                job, status
            )));
        }

        if self.driver.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.driver.items_per_step == Some(0) {
            return Err(Error::Config(
                "items_per_step must be at least 1 when set".to_string(),
            ));
        }

        if self.driver.backoff_base > self.driver.backoff_max {
            return Err(Error::Config(
                "Backoff base delay exceeds the maximum delay".to_string(),
            ));
        }

        if self.queue.workers == 0 || self.queue.capacity == 0 {
            return Err(Error::Config(
                "Step queue needs at least one worker and a non-zero capacity".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`ImportConfig`]
#[derive(Default)]
pub struct ImportConfigBuilder {
    picker_api_base: Option<String>,
    http_timeout: Option<Duration>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: Option<String>,
    token_url: Option<String>,
    team_domain: Option<String>,
    audience: Option<String>,
    jwt_header: Option<String>,
    blob_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    job_prefix: Option<String>,
    status_prefix: Option<String>,
    driver: DriverSettings,
    queue: QueueSettings,
}

impl ImportConfigBuilder {
    pub fn picker_api_base(mut self, base: impl Into<String>) -> Self {
        self.picker_api_base = Some(base.into());
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn oauth_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self.client_secret = Some(secret.into());
        self
    }

    /// Override the identity provider endpoints
    pub fn oauth_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self.token_url = Some(token_url.into());
        self
    }

    pub fn access(mut self, team_domain: impl Into<String>, audience: impl Into<String>) -> Self {
        self.team_domain = Some(team_domain.into());
        self.audience = Some(audience.into());
        self
    }

    pub fn jwt_header(mut self, header: impl Into<String>) -> Self {
        self.jwt_header = Some(header.into());
        self
    }

    pub fn blob_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blob_dir = Some(dir.into());
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn key_prefixes(mut self, job: impl Into<String>, status: impl Into<String>) -> Self {
        self.job_prefix = Some(job.into());
        self.status_prefix = Some(status.into());
        self
    }

    pub fn items_per_step(mut self, n: usize) -> Self {
        self.driver.items_per_step = Some(n);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.driver.max_attempts = n;
        self
    }

    pub fn backoff_base(mut self, delay: Duration) -> Self {
        self.driver.backoff_base = delay;
        self
    }

    pub fn backoff_max(mut self, delay: Duration) -> Self {
        self.driver.backoff_max = delay;
        self
    }

    pub fn queue_workers(mut self, n: usize) -> Self {
        self.queue.workers = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue.capacity = n;
        self
    }

    /// Build and validate
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required settings are missing or the
    /// combination is invalid.
    pub fn build(self) -> Result<ImportConfig> {
        let client_id = self.client_id.ok_or_else(|| {
            Error::Config("OAuth client id is required (set OAUTH_CLIENT_ID)".to_string())
        })?;
        let client_secret = self.client_secret.ok_or_else(|| {
            Error::Config("OAuth client secret is required (set OAUTH_CLIENT_SECRET)".to_string())
        })?;
        let team_domain = self.team_domain.ok_or_else(|| {
            Error::Config("Access team domain is required (set ACCESS_TEAM_DOMAIN)".to_string())
        })?;
        let audience = self.audience.ok_or_else(|| {
            Error::Config("Access audience is required (set ACCESS_AUD_TAG)".to_string())
        })?;

        let config = ImportConfig {
            picker_api_base: self
                .picker_api_base
                .unwrap_or_else(|| DEFAULT_PICKER_API_BASE.to_string()),
            http_timeout: self.http_timeout.unwrap_or(Duration::from_secs(30)),
            oauth: OAuthSettings {
                client_id,
                client_secret,
                auth_url: self.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
                token_url: self.token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                scopes: vec![PICKER_SCOPE.to_string()],
            },
            access: AccessSettings {
                team_domain,
                audience,
                jwt_header: self
                    .jwt_header
                    .unwrap_or_else(|| "cf-access-jwt-assertion".to_string()),
            },
            storage: StorageSettings {
                blob_dir: self
                    .blob_dir
                    .unwrap_or_else(|| PathBuf::from("data").join("blobs")),
                database_path: self
                    .database_path
                    .unwrap_or_else(|| PathBuf::from("data").join("state.db")),
                job_prefix: self.job_prefix.unwrap_or_else(|| "job:".to_string()),
                status_prefix: self.status_prefix.unwrap_or_else(|| "status:".to_string()),
            },
            driver: self.driver,
            queue: self.queue,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> ImportConfigBuilder {
        ImportConfig::builder()
            .oauth_client("client", "secret")
            .access("https://team.example.com", "aud")
    }

    #[test]
    fn test_builder_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.picker_api_base, DEFAULT_PICKER_API_BASE);
        assert_eq!(config.oauth.scopes, vec![PICKER_SCOPE.to_string()]);
        assert_eq!(config.storage.job_prefix, "job:");
        assert_eq!(config.storage.status_prefix, "status:");
        assert_eq!(config.driver.items_per_step, None);
        assert_eq!(config.access.jwt_header, "cf-access-jwt-assertion");
        assert_eq!(
            config.access.certs_url(),
            "https://team.example.com/cdn-cgi/access/certs"
        );
    }

    #[test]
    fn test_debug_hides_client_secret() {
        let config = ImportConfig::builder()
            .oauth_client("client", "GOCSPX-very-secret")
            .access("https://team.example.com", "aud")
            .build()
            .unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("GOCSPX-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("client"));
    }

    #[test]
    fn test_missing_oauth_client_fails() {
        let result = ImportConfig::builder()
            .access("https://team.example.com", "aud")
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("OAUTH_CLIENT_ID")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_tuning() {
        assert!(minimal().max_attempts(0).build().is_err());
        assert!(minimal().items_per_step(0).build().is_err());
        assert!(minimal().queue_workers(0).build().is_err());
        assert!(minimal().key_prefixes("same:", "same:").build().is_err());
        assert!(minimal().key_prefixes("s", "st").build().is_err());
        assert!(minimal().key_prefixes("job:", "").build().is_err());
        assert!(minimal().key_prefixes("job/", "status/").build().is_ok());
        assert!(minimal()
            .backoff_base(Duration::from_secs(60))
            .backoff_max(Duration::from_secs(1))
            .build()
            .is_err());
        assert!(ImportConfig::builder()
            .oauth_client("client", "secret")
            .access("http://insecure.example.com", "aud")
            .build()
            .is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("OAUTH_CLIENT_ID", "id"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("ACCESS_TEAM_DOMAIN", "https://team.example.com"),
            ("ACCESS_AUD_TAG", "aud"),
            ("PICKER_ITEMS_PER_STEP", "5"),
            ("PICKER_MAX_ATTEMPTS", "3"),
            ("PICKER_QUEUE_WORKERS", "2"),
        ]
        .into_iter()
        .collect();

        let config = ImportConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.oauth.client_id, "id");
        assert_eq!(config.driver.items_per_step, Some(5));
        assert_eq!(config.driver.max_attempts, 3);
        assert_eq!(config.queue.workers, 2);
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric() {
        let vars: HashMap<&str, &str> = [
            ("OAUTH_CLIENT_ID", "id"),
            ("OAUTH_CLIENT_SECRET", "secret"),
            ("ACCESS_TEAM_DOMAIN", "https://team.example.com"),
            ("ACCESS_AUD_TAG", "aud"),
            ("PICKER_MAX_ATTEMPTS", "lots"),
        ]
        .into_iter()
        .collect();

        let result = ImportConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
