//! Signing keys and the key resolver contract.
//!
//! The validator only depends on [`KeyResolver`]. The HTTP-backed resolver
//! lives in [`crate::jwks`]; [`StaticKeyResolver`] serves fixed key sets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;

use crate::error::KeyResolutionError;

/// A JWKS document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeySet {
    /// The published keys.
    pub keys: Vec<RawKey>,
}

/// A single JWK, as published.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawKey {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// Key use (e.g., "sig").
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm (e.g., "RS256").
    pub alg: Option<String>,
    /// RSA modulus (base64url).
    pub n: Option<String>,
    /// RSA public exponent (base64url).
    pub e: Option<String>,
}

/// An imported RS256 public key.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    key: DecodingKey,
}

impl SigningKey {
    /// The key identifier.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The public key handle.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Source of issuer public keys.
///
/// Implementations may cache, but must be safe for concurrent lookups.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// Fetch the key descriptors published by `issuer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be retrieved or parsed.
    async fn fetch_key_set(&self, issuer: &str) -> Result<Vec<RawKey>, KeyResolutionError>;

    /// Turn a descriptor into a usable key.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is not an RS256 RSA key.
    async fn import_key(&self, raw: &RawKey) -> Result<SigningKey, KeyResolutionError> {
        import_rsa_key(raw)
    }
}

#[async_trait]
impl<T: KeyResolver + ?Sized> KeyResolver for Arc<T> {
    async fn fetch_key_set(&self, issuer: &str) -> Result<Vec<RawKey>, KeyResolutionError> {
        (**self).fetch_key_set(issuer).await
    }

    async fn import_key(&self, raw: &RawKey) -> Result<SigningKey, KeyResolutionError> {
        (**self).import_key(raw).await
    }
}

/// Import an RSA JWK for RS256 verification.
///
/// # Errors
///
/// Returns `UnsupportedKey` for non-RSA keys, keys restricted to another
/// algorithm or use, or keys missing `kid`/`n`/`e`, and `Import` when the
/// components are not valid base64url.
pub fn import_rsa_key(raw: &RawKey) -> Result<SigningKey, KeyResolutionError> {
    let kid = raw.kid.clone().unwrap_or_default();
    let unsupported = |reason: &str| KeyResolutionError::UnsupportedKey {
        kid: kid.clone(),
        reason: reason.to_string(),
    };

    if kid.is_empty() {
        return Err(unsupported("missing kid"));
    }
    if raw.kty != "RSA" {
        return Err(unsupported(&format!("key type {:?}", raw.kty)));
    }
    if let Some(alg) = raw.alg.as_deref().filter(|alg| *alg != "RS256") {
        return Err(unsupported(&format!("algorithm {alg:?}")));
    }
    if let Some(key_use) = raw.key_use.as_deref().filter(|key_use| *key_use != "sig") {
        return Err(unsupported(&format!("use {key_use:?}")));
    }
    let (Some(n), Some(e)) = (raw.n.as_deref(), raw.e.as_deref()) else {
        return Err(unsupported("missing RSA components"));
    };

    let key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
        KeyResolutionError::Import {
            kid: kid.clone(),
            reason: err.to_string(),
        }
    })?;

    Ok(SigningKey { key_id: kid, key })
}

/// A resolver over fixed, in-memory key sets keyed by issuer.
///
/// Useful for locally configured keys and as a test double: every
/// `fetch_key_set` call is counted.
#[derive(Debug, Default)]
pub struct StaticKeyResolver {
    key_sets: HashMap<String, Vec<RawKey>>,
    fetches: AtomicUsize,
}

impl StaticKeyResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the key set for an issuer, replacing any previous one.
    #[must_use]
    pub fn with_key_set(mut self, issuer: impl Into<String>, key_set: KeySet) -> Self {
        self.key_sets.insert(issuer.into(), key_set.keys);
        self
    }

    /// Register an issuer's key set from a JWKS JSON document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeySet` if the document does not parse.
    pub fn with_jwks_json(
        self,
        issuer: impl Into<String>,
        jwks: &str,
    ) -> Result<Self, KeyResolutionError> {
        let issuer = issuer.into();
        let key_set: KeySet =
            serde_json::from_str(jwks).map_err(|e| KeyResolutionError::InvalidKeySet {
                url: format!("inline:{issuer}"),
                reason: e.to_string(),
            })?;
        Ok(self.with_key_set(issuer, key_set))
    }

    /// Number of `fetch_key_set` calls served so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn fetch_key_set(&self, issuer: &str) -> Result<Vec<RawKey>, KeyResolutionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.key_sets
            .get(issuer)
            .cloned()
            .ok_or_else(|| KeyResolutionError::UnknownIssuer(issuer.to_string()))
    }
}
