//! # Authentication Module
//!
//! Credentials for the import flow:
//!
//! - [`oauth`]: the identity provider's authorization-code flow, producing
//!   the short-lived [`AccessGrant`] used against the picker API
//! - [`access`]: verification of the access-proxy JWT carried by every
//!   incoming request, yielding the caller's subject
//!
//! There is no token refresh; a grant lives as long as the job that holds it.

pub mod access;
pub mod error;
pub mod oauth;
pub mod types;

pub use access::{JwtAuthenticator, RequestAuthenticator};
pub use error::{AuthError, Result};
pub use oauth::{GoogleOAuthClient, IdentityProvider};
pub use types::{AccessGrant, VerifiedRequest};
