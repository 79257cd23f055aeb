//! Credential types shared by the identity provider and request verifier.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access token obtained from an authorization-code exchange
///
/// There is no refresh token: when the grant expires the user starts a new
/// import.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(access_token: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity asserted by a verified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    /// Stable subject identifier; used as the owner id for import jobs
    pub subject: Option<String>,
    pub email: Option<String>,
}

impl VerifiedRequest {
    /// Subject, ignoring empty strings
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_debug_hides_token() {
        let grant = AccessGrant::new("ya29.secret", 3600);
        let rendered = format!("{:?}", grant);

        assert!(!rendered.contains("ya29.secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_grant_expiry_is_relative_to_issue() {
        let before = Utc::now();
        let grant = AccessGrant::new("t", 60);

        assert!(grant.expires_at >= before + Duration::seconds(60));
        assert!(grant.expires_at <= Utc::now() + Duration::seconds(60));
    }

    #[test]
    fn test_empty_subject_is_absent() {
        let request = VerifiedRequest {
            subject: Some(String::new()),
            email: None,
        };
        assert_eq!(request.subject(), None);
    }
}
