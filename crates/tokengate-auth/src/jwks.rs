//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! This module fetches issuer key sets over HTTPS and caches them per issuer
//! for `jwks_refresh_seconds`. Failed fetches are cached for
//! `jwks_retry_seconds` so an outage does not turn every request into a
//! network round trip. Concurrent misses for the same issuer share a single
//! request and its outcome; misses for different issuers proceed
//! independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;

use crate::error::KeyResolutionError;
use crate::keys::{KeyResolver, KeySet, RawKey};
use crate::AuthConfig;

type FetchResult = Result<Vec<RawKey>, KeyResolutionError>;

/// Outcome of the last fetch for an issuer, with the time it completed.
struct CachedKeySet {
    result: FetchResult,
    fetched_at: Instant,
}

/// Key resolver that fetches `{issuer}{jwks_path}` and caches the result.
pub struct JwksKeyResolver {
    config: AuthConfig,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, CachedKeySet>>,
    inflight: Mutex<HashMap<String, Arc<OnceCell<FetchResult>>>>,
}

impl JwksKeyResolver {
    /// Create a new JWKS resolver with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `Client` if the HTTP client cannot be created.
    pub fn new(config: AuthConfig) -> Result<Self, KeyResolutionError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| KeyResolutionError::Client(e.to_string()))?;

        Ok(Self {
            config,
            client,
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Drop the cached key set or failure for `issuer`, forcing the next
    /// lookup to fetch.
    ///
    /// This is useful when a key rotation is detected.
    pub fn invalidate(&self, issuer: &str) {
        self.cache.write().remove(issuer);
    }

    fn ttl(&self, result: &FetchResult) -> Duration {
        if result.is_ok() {
            self.config.jwks_refresh()
        } else {
            self.config.jwks_retry()
        }
    }

    fn cached(&self, issuer: &str) -> Option<FetchResult> {
        let cache = self.cache.read();
        let entry = cache.get(issuer)?;
        (entry.fetched_at.elapsed() < self.ttl(&entry.result)).then(|| entry.result.clone())
    }

    /// Fetch the key set for `issuer` and store the outcome in the cache.
    async fn refresh_keys(&self, issuer: &str) -> FetchResult {
        let url = self.config.jwks_url(issuer);
        tracing::debug!(url = %url, "Fetching JWKS");

        let result = self.download(&url).await;
        match &result {
            Ok(keys) => {
                let skipped = keys.iter().filter(|key| key.kty != "RSA").count();
                if skipped > 0 {
                    tracing::warn!(url = %url, skipped, "Key set contains non-RSA keys");
                }
                tracing::debug!(url = %url, count = keys.len(), "Cached JWKS keys");
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "JWKS fetch failed"),
        }

        self.cache.write().insert(
            issuer.to_string(),
            CachedKeySet {
                result: result.clone(),
                fetched_at: Instant::now(),
            },
        );

        result
    }

    async fn download(&self, url: &str) -> FetchResult {
        let fetch_failed = |reason: String| KeyResolutionError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        let key_set: KeySet =
            serde_json::from_slice(&body).map_err(|e| KeyResolutionError::InvalidKeySet {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(key_set.keys)
    }
}

#[async_trait]
impl KeyResolver for JwksKeyResolver {
    async fn fetch_key_set(&self, issuer: &str) -> Result<Vec<RawKey>, KeyResolutionError> {
        if let Some(result) = self.cached(issuer) {
            return result;
        }

        let flight = {
            let mut inflight = self.inflight.lock();
            // A flight that finished since the first check has filled the cache.
            if let Some(result) = self.cached(issuer) {
                return result;
            }
            Arc::clone(inflight.entry(issuer.to_string()).or_default())
        };

        let result = flight
            .get_or_init(|| self.refresh_keys(issuer))
            .await
            .clone();

        let mut inflight = self.inflight.lock();
        if inflight
            .get(issuer)
            .is_some_and(|current| Arc::ptr_eq(current, &flight))
        {
            inflight.remove(issuer);
        }

        result
    }
}

impl std::fmt::Debug for JwksKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeyResolver")
            .field("config", &self.config)
            .field("cached_issuers", &self.cache.read().len())
            .field("inflight", &self.inflight.lock().len())
            .finish_non_exhaustive()
    }
}
