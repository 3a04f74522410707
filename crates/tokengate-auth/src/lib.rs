//! RS256 bearer token validation for tokengate.
//!
//! This crate validates `Authorization: Bearer <jwt>` credentials, including:
//!
//! - Bearer credential extraction
//! - Compact JWT decoding (base64url + JSON)
//! - Header, audience, issuer and expiration checks
//! - JWKS (JSON Web Key Set) fetching and caching per issuer
//! - RS256 signature verification
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   HTTP adapter   │────▶│  Authenticator   │
//! │   (caller)       │     │  extract+decode  │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │    Validator     │
//!                          │ header ▸ payload │
//!                          │   ▸ signature    │
//!                          └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │   KeyResolver    │
//!                          │   (trait)        │
//!                          └────────┬─────────┘
//!                                   │ HTTPS
//!                          ┌────────▼─────────┐
//!                          │ issuer JWKS      │
//!                          │ endpoint         │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use reqwest::header::HeaderMap;
//! use tokengate_auth::{AuthConfig, Authenticator, JwksKeyResolver};
//!
//! # async fn example(headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig {
//!     issuer: "https://securetoken.example.com/my-project".to_string(),
//!     audience: "my-project".to_string(),
//!     ..AuthConfig::default()
//! };
//!
//! let resolver = JwksKeyResolver::new(config.clone())?;
//! let authenticator = Authenticator::new(config.context(), resolver);
//!
//! // In a request handler:
//! match authenticator.authenticate(&headers).await {
//!     Ok(token) => println!("subject: {}", token.payload().subject),
//!     Err(err) => eprintln!("{} ({}): {}", err.http_status_code(), err.category(), err),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::time::Duration;

use serde::Deserialize;

pub mod base64url;
pub mod bearer;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod token;
pub mod validator;

pub use bearer::RequestHeaders;
pub use error::{AuthError, Result};
pub use jwks::JwksKeyResolver;
pub use keys::{KeyResolver, KeySet, RawKey, SigningKey, StaticKeyResolver};
pub use token::{Header, Payload, Signature, Token};
pub use validator::{ValidationContext, Validator};

/// Configuration for bearer token validation.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected JWT issuer (`iss` claim), also the base of the JWKS URL.
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,

    /// Expected JWT audience (`aud` claim).
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,

    /// Path appended to the issuer to locate its key set.
    #[serde(default = "AuthConfig::default_jwks_path")]
    pub jwks_path: String,

    /// How long a fetched key set is reused, in seconds.
    #[serde(default = "AuthConfig::default_jwks_refresh")]
    pub jwks_refresh_seconds: u64,

    /// How long a failed key-set fetch is reported without retrying, in
    /// seconds. Zero disables failure caching.
    #[serde(default = "AuthConfig::default_jwks_retry")]
    pub jwks_retry_seconds: u64,

    /// Key-set request timeout in seconds.
    #[serde(default = "AuthConfig::default_http_timeout")]
    pub http_timeout_seconds: u64,
}

impl AuthConfig {
    fn default_issuer() -> String {
        "https://securetoken.example.com".to_string()
    }

    fn default_audience() -> String {
        "tokengate".to_string()
    }

    fn default_jwks_path() -> String {
        "/.well-known/jwks.json".to_string()
    }

    const fn default_jwks_refresh() -> u64 {
        300
    }

    const fn default_jwks_retry() -> u64 {
        5
    }

    const fn default_http_timeout() -> u64 {
        10
    }

    /// Get the JWKS endpoint URL for `issuer`.
    #[must_use]
    pub fn jwks_url(&self, issuer: &str) -> String {
        format!("{}{}", issuer.trim_end_matches('/'), self.jwks_path)
    }

    /// Get the key-set cache lifetime as a `Duration`.
    #[must_use]
    pub const fn jwks_refresh(&self) -> Duration {
        Duration::from_secs(self.jwks_refresh_seconds)
    }

    /// Get the failed-fetch cache lifetime as a `Duration`.
    #[must_use]
    pub const fn jwks_retry(&self) -> Duration {
        Duration::from_secs(self.jwks_retry_seconds)
    }

    /// Get the key-set request timeout as a `Duration`.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Build the validation context for the configured audience and issuer.
    #[must_use]
    pub fn context(&self) -> ValidationContext {
        ValidationContext::new(&self.audience, &self.issuer)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: Self::default_issuer(),
            audience: Self::default_audience(),
            jwks_path: Self::default_jwks_path(),
            jwks_refresh_seconds: Self::default_jwks_refresh(),
            jwks_retry_seconds: Self::default_jwks_retry(),
            http_timeout_seconds: Self::default_http_timeout(),
        }
    }
}

/// Authenticates requests end to end: extract, decode, validate.
#[derive(Debug)]
pub struct Authenticator<R> {
    context: ValidationContext,
    validator: Validator<R>,
}

impl<R: KeyResolver> Authenticator<R> {
    /// Create an authenticator for `context` resolving keys through `resolver`.
    #[must_use]
    pub const fn new(context: ValidationContext, resolver: R) -> Self {
        Self {
            context,
            validator: Validator::new(resolver),
        }
    }

    /// The audience and issuer tokens are checked against.
    #[must_use]
    pub const fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// The underlying validator.
    #[must_use]
    pub const fn validator(&self) -> &Validator<R> {
        &self.validator
    }

    /// Authenticate the bearer token carried by `headers`.
    ///
    /// # Errors
    ///
    /// Returns the first extraction, decoding or validation failure.
    pub async fn authenticate<H>(&self, headers: &H) -> Result<Token>
    where
        H: RequestHeaders + Sync + ?Sized,
    {
        let token = bearer::extract(headers)?;
        self.authenticate_token(token).await
    }

    /// Decode and validate a raw compact token.
    ///
    /// # Errors
    ///
    /// Returns the first decoding or validation failure.
    pub async fn authenticate_token(&self, token: &str) -> Result<Token> {
        let token = Token::decode(token)?;
        self.validator.validate(&token, &self.context).await?;
        Ok(token)
    }
}
