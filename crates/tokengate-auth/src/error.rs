//! Authentication error types.
//!
//! Every failure is terminal for the request that produced it. Variants carry
//! the offending values so callers can log or map them without string parsing.

use std::fmt;

use thiserror::Error;

use crate::base64url::Base64UrlError;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while authenticating a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header on the request.
    #[error("missing authorization credential")]
    MissingCredential,

    /// The `Authorization` header is not `<scheme> <value>`.
    #[error("malformed authorization credential")]
    MalformedCredential,

    /// The credential scheme is not `Bearer`.
    #[error("unsupported authorization scheme: {scheme}")]
    UnsupportedScheme {
        /// The scheme that was presented.
        scheme: String,
    },

    /// The token is not three base64url segments of JSON.
    #[error("token decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The signature segment could not be decoded.
    #[error("signature decode failed: {0}")]
    SignatureDecode(#[source] Base64UrlError),

    /// The token header failed a required check.
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),

    /// The audience or issuer claim does not match.
    #[error("invalid payload: {0}")]
    Payload(#[from] PayloadError),

    /// The expiration claim is missing or in the past.
    #[error("invalid expiration: {0}")]
    Expiration(#[from] ExpirationError),

    /// No key verifies the token.
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),

    /// The issuer's key set could not be fetched or imported.
    #[error("key resolution failed: {0}")]
    KeyResolution(#[from] KeyResolutionError),
}

impl AuthError {
    /// Machine-stable name of the failure kind.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedCredential => "malformed_credential",
            Self::UnsupportedScheme { .. } => "unsupported_scheme",
            Self::Decode(_) => "decode_error",
            Self::SignatureDecode(_) => "signature_decode_error",
            Self::Header(_) => "header_error",
            Self::Payload(_) => "payload_error",
            Self::Expiration(_) => "expiration_error",
            Self::Signature(_) => "signature_error",
            Self::KeyResolution(_) => "key_resolution_error",
        }
    }

    /// Human-readable description of the failure.
    #[must_use]
    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Returns the HTTP status code a transport adapter should answer with.
    ///
    /// All credential failures are reported as `401 Unauthorized`.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        401
    }

    /// Returns `true` if a later attempt could succeed, either with a fresh
    /// token or once the key-set endpoint recovers.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Expiration(_) | Self::KeyResolution(_))
    }
}

/// Which of the three token segments an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// The JOSE header.
    Header,
    /// The claims payload.
    Payload,
    /// The signature.
    Signature,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Payload => f.write_str("payload"),
            Self::Signature => f.write_str("signature"),
        }
    }
}

/// Structural decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The token does not have exactly three `.`-separated segments.
    #[error("expected 3 segments, found {0}")]
    SegmentCount(usize),

    /// A segment is empty.
    #[error("empty {0} segment")]
    EmptySegment(Segment),

    /// A segment is not valid base64url.
    #[error("{segment} is not base64url: {source}")]
    Base64 {
        /// The segment that failed.
        segment: Segment,
        /// The underlying codec error.
        source: Base64UrlError,
    },

    /// A segment is not the expected JSON shape.
    #[error("{segment} is not valid JSON: {source}")]
    Json {
        /// The segment that failed.
        segment: Segment,
        /// The underlying parser error.
        source: serde_json::Error,
    },
}

/// Header constraint failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// `typ` is not `JWT`.
    #[error("invalid type: expected JWT, found {actual:?}")]
    InvalidType {
        /// The `typ` value presented.
        actual: String,
    },

    /// `alg` is not `RS256`.
    #[error("invalid algorithm: expected RS256, found {actual:?}")]
    InvalidAlgorithm {
        /// The `alg` value presented.
        actual: String,
    },

    /// `kid` is missing or empty.
    #[error("missing key id")]
    MissingKeyId,
}

/// Audience and issuer mismatches.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// `aud` does not contain the expected audience.
    #[error("invalid audience: expected {expected:?} in {actual:?}")]
    InvalidAudience {
        /// The audience the caller requires.
        expected: String,
        /// The audiences the token carries.
        actual: Vec<String>,
    },

    /// `iss` differs from the expected issuer.
    #[error("invalid issuer: expected {expected:?}, found {actual:?}")]
    InvalidIssuer {
        /// The issuer the caller requires.
        expected: String,
        /// The issuer the token carries.
        actual: String,
    },
}

/// Expiration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpirationError {
    /// `exp` is absent or zero.
    #[error("missing expiration")]
    Missing,

    /// `exp` is not after the current time.
    #[error("expired at {expired_at}, now {now}")]
    Expired {
        /// The token's `exp`, in seconds since the epoch.
        expired_at: i64,
        /// The validation time, in seconds since the epoch.
        now: i64,
    },
}

/// Key selection and signature verification failures.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The issuer's key set has no key with the token's `kid`.
    #[error("no matching key for kid {kid:?}")]
    NoMatchingKey {
        /// The key identifier from the token header.
        kid: String,
    },

    /// The signature does not verify under the selected key.
    #[error("signature does not verify under key {kid:?}")]
    InvalidSignature {
        /// The key identifier used for verification.
        kid: String,
    },

    /// The verifier rejected the key or signature material outright.
    #[error("verification error under key {kid:?}: {source}")]
    Verification {
        /// The key identifier used for verification.
        kid: String,
        /// The underlying crypto error.
        source: jsonwebtoken::errors::Error,
    },
}

/// Failures of the key resolver.
///
/// Cloneable so that one failed fetch can be handed to every caller waiting
/// on it.
#[derive(Debug, Clone, Error)]
pub enum KeyResolutionError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// The key-set request failed or returned a non-success status.
    #[error("key set fetch from {url} failed: {reason}")]
    Fetch {
        /// The key-set URL.
        url: String,
        /// Transport or status description.
        reason: String,
    },

    /// The key-set response is not a JWKS document.
    #[error("malformed key set from {url}: {reason}")]
    InvalidKeySet {
        /// The key-set URL.
        url: String,
        /// Parser error description.
        reason: String,
    },

    /// No key set is known for this issuer.
    #[error("unknown issuer {0:?}")]
    UnknownIssuer(String),

    /// The key descriptor is not an RS256-capable RSA key.
    #[error("unsupported key {kid:?}: {reason}")]
    UnsupportedKey {
        /// The key identifier of the descriptor.
        kid: String,
        /// Why the descriptor was rejected.
        reason: String,
    },

    /// The RSA components could not be turned into a public key.
    #[error("failed to import key {kid:?}: {reason}")]
    Import {
        /// The key identifier of the descriptor.
        kid: String,
        /// The key parsing error description.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_unauthorized() {
        let errors = [
            AuthError::MissingCredential,
            AuthError::MalformedCredential,
            AuthError::UnsupportedScheme {
                scheme: "Basic".into(),
            },
            AuthError::Decode(DecodeError::SegmentCount(2)),
            AuthError::SignatureDecode(Base64UrlError::InvalidLength(5)),
            AuthError::Header(HeaderError::MissingKeyId),
            AuthError::Expiration(ExpirationError::Missing),
            AuthError::Signature(SignatureError::NoMatchingKey { kid: "k".into() }),
            AuthError::KeyResolution(KeyResolutionError::UnknownIssuer("i".into())),
        ];
        for err in errors {
            assert_eq!(err.http_status_code(), 401, "{}", err.category());
        }
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(
            AuthError::MissingCredential.category(),
            "missing_credential"
        );
        assert_eq!(
            AuthError::UnsupportedScheme {
                scheme: "Basic".into()
            }
            .category(),
            "unsupported_scheme"
        );
        assert_eq!(
            AuthError::from(PayloadError::InvalidIssuer {
                expected: "a".into(),
                actual: "b".into(),
            })
            .category(),
            "payload_error"
        );
    }

    #[test]
    fn detail_names_expected_and_actual() {
        let err = AuthError::from(HeaderError::InvalidAlgorithm {
            actual: "none".into(),
        });
        assert_eq!(
            err.detail(),
            "invalid header: invalid algorithm: expected RS256, found \"none\""
        );
    }

    #[test]
    fn retriable_kinds() {
        assert!(AuthError::from(ExpirationError::Missing).is_retriable());
        assert!(
            AuthError::from(KeyResolutionError::Client("tls".into())).is_retriable()
        );
        assert!(!AuthError::MissingCredential.is_retriable());
        assert!(!AuthError::from(HeaderError::MissingKeyId).is_retriable());
    }
}
