//! Request authentication via an access-proxy JWT
//!
//! Every entry point requires a verified request before it touches job state.
//! The proxy in front of the service signs an assertion (RS256 or ES256) and
//! forwards it in a header; signing keys are published as a JWKS under the
//! team domain and rotated by the proxy, so they are cached for a bounded time
//! and refetched when an unknown `kid` shows up.

use crate::error::{AuthError, Result};
use crate::types::VerifiedRequest;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use core_runtime::config::AccessSettings;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

const DEFAULT_KEY_TTL: Duration = Duration::from_secs(3600);

/// Verifies incoming request headers and yields the caller's identity
#[async_trait]
pub trait RequestAuthenticator: Send + Sync {
    /// # Errors
    ///
    /// [`AuthError::MissingCredential`] when the assertion header is absent,
    /// [`AuthError::InvalidCredential`] when signature, issuer, audience or
    /// expiry checks fail, [`AuthError::KeysUnavailable`] when the JWKS cannot
    /// be fetched.
    async fn verify(&self, headers: &HashMap<String, String>) -> Result<VerifiedRequest>;
}

#[derive(Debug, Clone, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    // RSA
    n: Option<String>,
    e: Option<String>,
    // EC
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: Option<String>,
    email: Option<String>,
}

struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// JWKS-backed verifier for the access-proxy assertion
pub struct JwtAuthenticator {
    settings: AccessSettings,
    http_client: Arc<dyn HttpClient>,
    cache: RwLock<Option<KeyCache>>,
    key_ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(settings: AccessSettings, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            settings,
            http_client,
            cache: RwLock::new(None),
            key_ttl: DEFAULT_KEY_TTL,
        }
    }

    pub fn with_key_ttl(mut self, ttl: Duration) -> Self {
        self.key_ttl = ttl;
        self
    }

    fn find_assertion<'a>(&self, headers: &'a HashMap<String, String>) -> Option<&'a str> {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.settings.jwt_header))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, DecodingKey>> {
        let url = self.settings.certs_url();
        let response = self
            .http_client
            .execute(HttpRequest::get(url.clone()))
            .await
            .map_err(|e| AuthError::KeysUnavailable(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.is_success() {
            return Err(AuthError::KeysUnavailable(format!(
                "JWKS endpoint returned {}",
                response.status
            )));
        }

        let jwks: Jwks = response
            .json()
            .map_err(|e| AuthError::KeysUnavailable(format!("Failed to parse JWKS: {}", e)))?;

        let mut keys = HashMap::new();
        for (index, jwk) in jwks.keys.iter().enumerate() {
            match jwk_to_decoding_key(jwk) {
                Ok(key) => {
                    let kid = jwk.kid.clone().unwrap_or_else(|| format!("#{}", index));
                    keys.insert(kid, key);
                }
                Err(e) => warn!(kid = ?jwk.kid, error = %e, "Skipping unusable JWK"),
            }
        }

        if keys.is_empty() {
            return Err(AuthError::KeysUnavailable(
                "JWKS contained no usable keys".to_string(),
            ));
        }

        debug!(count = keys.len(), "Refreshed signing keys");
        Ok(keys)
    }

    /// Look up the key for `kid`, refreshing the cache when it is stale or
    /// does not know the key.
    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.key_ttl {
                    if let Some(key) = select_key(&cached.keys, kid) {
                        return Ok(key);
                    }
                }
            }
        }

        let keys = self.fetch_keys().await?;
        let selected = select_key(&keys, kid);

        *self.cache.write().await = Some(KeyCache {
            keys,
            fetched_at: Instant::now(),
        });

        selected.ok_or_else(|| {
            AuthError::InvalidCredential(format!(
                "No signing key matches kid {}",
                kid.unwrap_or("<none>")
            ))
        })
    }
}

fn select_key(keys: &HashMap<String, DecodingKey>, kid: Option<&str>) -> Option<DecodingKey> {
    match kid {
        Some(kid) => keys.get(kid).cloned(),
        // Without a kid only an unambiguous single key is acceptable
        None if keys.len() == 1 => keys.values().next().cloned(),
        None => None,
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey> {
    let missing = |what: &str| AuthError::KeysUnavailable(format!("{} key missing {}", jwk.kty, what));

    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("modulus"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("exponent"))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| AuthError::KeysUnavailable(format!("Bad RSA key: {}", e)))
        }
        "EC" => {
            let crv = jwk.crv.as_deref().ok_or_else(|| missing("curve"))?;
            if crv != "P-256" {
                return Err(AuthError::KeysUnavailable(format!(
                    "Unsupported EC curve: {}",
                    crv
                )));
            }
            let x = jwk.x.as_deref().ok_or_else(|| missing("x coordinate"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y coordinate"))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| AuthError::KeysUnavailable(format!("Bad EC key: {}", e)))
        }
        other => Err(AuthError::KeysUnavailable(format!(
            "Unsupported key type: {}",
            other
        ))),
    }
}

#[async_trait]
impl RequestAuthenticator for JwtAuthenticator {
    #[instrument(skip(self, headers))]
    async fn verify(&self, headers: &HashMap<String, String>) -> Result<VerifiedRequest> {
        let token = self.find_assertion(headers).ok_or_else(|| {
            AuthError::MissingCredential(format!("{} header not present", self.settings.jwt_header))
        })?;

        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidCredential(format!("Malformed token header: {}", e)))?;

        if !matches!(header.alg, Algorithm::RS256 | Algorithm::ES256) {
            return Err(AuthError::InvalidCredential(format!(
                "Unsupported algorithm: {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_issuer(&[self.settings.team_domain.trim_end_matches('/')]);
        validation.validate_nbf = true;

        let data = decode::<AccessClaims>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, "Assertion rejected");
            AuthError::InvalidCredential(e.to_string())
        })?;

        Ok(VerifiedRequest {
            subject: data.claims.sub,
            email: data.claims.email,
        })
    }
}
