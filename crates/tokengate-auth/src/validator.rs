//! Token validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. header: `typ == "JWT"`, `alg == "RS256"`, non-empty `kid`
//! 2. payload: audience, issuer, expiration
//! 3. signature: resolve the issuer's keys, select by `kid`, verify RS256
//!
//! Steps 1 and 2 never touch the network, so a token that fails them never
//! causes a key-set fetch.

use chrono::{DateTime, Utc};
use jsonwebtoken::{crypto, Algorithm};

use crate::base64url;
use crate::error::{ExpirationError, HeaderError, PayloadError, Result, SignatureError};
use crate::keys::{KeyResolver, SigningKey};
use crate::token::{Header, Payload, Token};

const EXPECTED_TYPE: &str = "JWT";
const EXPECTED_ALGORITHM: &str = "RS256";

/// The audience and issuer a token must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    /// Required member of the `aud` claim.
    pub expected_audience: String,
    /// Required value of the `iss` claim.
    pub expected_issuer: String,
}

impl ValidationContext {
    /// Create a context from an audience and issuer.
    #[must_use]
    pub fn new(expected_audience: impl Into<String>, expected_issuer: impl Into<String>) -> Self {
        Self {
            expected_audience: expected_audience.into(),
            expected_issuer: expected_issuer.into(),
        }
    }
}

/// RS256 token validator backed by a [`KeyResolver`].
#[derive(Debug)]
pub struct Validator<R> {
    resolver: R,
}

impl<R: KeyResolver> Validator<R> {
    /// Create a validator that resolves keys through `resolver`.
    #[must_use]
    pub const fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// The underlying key resolver.
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Validate `token` against `context` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the first failing check as `Header`, `Payload`, `Expiration`,
    /// `Signature`, or `KeyResolution`.
    pub async fn validate(&self, token: &Token, context: &ValidationContext) -> Result<()> {
        self.validate_at(token, context, Utc::now()).await
    }

    /// Validate `token` against `context` as of `now`.
    ///
    /// # Errors
    ///
    /// See [`Validator::validate`].
    pub async fn validate_at(
        &self,
        token: &Token,
        context: &ValidationContext,
        now: DateTime<Utc>,
    ) -> Result<()> {
        check_header(token.header())?;
        check_payload(token.payload(), context)?;
        check_expiration(token.payload(), now)?;

        let key = self
            .resolve_key(&token.payload().issuer, &token.header().key_id)
            .await?;
        verify_signature(token, &key)
    }

    /// Fetch the issuer's key set and import the key matching `kid`.
    async fn resolve_key(&self, issuer: &str, kid: &str) -> Result<SigningKey> {
        let keys = self.resolver.fetch_key_set(issuer).await?;
        let raw = keys
            .iter()
            .find(|key| key.kid.as_deref() == Some(kid))
            .ok_or_else(|| SignatureError::NoMatchingKey {
                kid: kid.to_string(),
            })?;

        Ok(self.resolver.import_key(raw).await?)
    }
}

fn check_header(header: &Header) -> std::result::Result<(), HeaderError> {
    if header.token_type != EXPECTED_TYPE {
        return Err(HeaderError::InvalidType {
            actual: header.token_type.clone(),
        });
    }
    if header.algorithm != EXPECTED_ALGORITHM {
        return Err(HeaderError::InvalidAlgorithm {
            actual: header.algorithm.clone(),
        });
    }
    if header.key_id.is_empty() {
        return Err(HeaderError::MissingKeyId);
    }
    Ok(())
}

fn check_payload(
    payload: &Payload,
    context: &ValidationContext,
) -> std::result::Result<(), PayloadError> {
    if !payload
        .audiences
        .iter()
        .any(|aud| *aud == context.expected_audience)
    {
        return Err(PayloadError::InvalidAudience {
            expected: context.expected_audience.clone(),
            actual: payload.audiences.clone(),
        });
    }
    if payload.issuer != context.expected_issuer {
        return Err(PayloadError::InvalidIssuer {
            expected: context.expected_issuer.clone(),
            actual: payload.issuer.clone(),
        });
    }
    Ok(())
}

fn check_expiration(
    payload: &Payload,
    now: DateTime<Utc>,
) -> std::result::Result<(), ExpirationError> {
    if payload.expiration == 0 {
        return Err(ExpirationError::Missing);
    }
    let now = now.timestamp();
    if payload.expiration <= now {
        return Err(ExpirationError::Expired {
            expired_at: payload.expiration,
            now,
        });
    }
    Ok(())
}

fn verify_signature(token: &Token, key: &SigningKey) -> Result<()> {
    let kid = key.key_id().to_string();
    let signature = base64url::encode(token.signature().as_bytes());

    match crypto::verify(
        &signature,
        token.signing_input().as_bytes(),
        key.decoding_key(),
        Algorithm::RS256,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SignatureError::InvalidSignature { kid }.into()),
        Err(source) => Err(SignatureError::Verification { kid, source }.into()),
    }
}
