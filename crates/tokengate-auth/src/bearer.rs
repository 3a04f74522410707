//! Bearer credential extraction.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, AUTHORIZATION};

use crate::error::{AuthError, Result};

/// Read access to request headers.
pub trait RequestHeaders {
    /// The `Authorization` header value, if present.
    ///
    /// Values that are not valid UTF-8 are reported as `Some("")` so they fail
    /// as malformed rather than missing.
    fn authorization(&self) -> Option<&str>;
}

impl RequestHeaders for HeaderMap {
    fn authorization(&self) -> Option<&str> {
        self.get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default())
    }
}

impl RequestHeaders for HashMap<String, String> {
    fn authorization(&self) -> Option<&str> {
        self.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.as_str())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// - `MissingCredential` when the header is absent
/// - `MalformedCredential` when it is not exactly `<scheme> <value>`
/// - `UnsupportedScheme` when the scheme is not `Bearer` (case-sensitive)
pub fn extract<H: RequestHeaders + ?Sized>(headers: &H) -> Result<&str> {
    let credential = headers
        .authorization()
        .ok_or(AuthError::MissingCredential)?;

    let mut parts = credential.split(' ');
    let (Some(scheme), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedCredential);
    };
    if scheme.is_empty() || value.is_empty() {
        return Err(AuthError::MalformedCredential);
    }

    if scheme != "Bearer" {
        return Err(AuthError::UnsupportedScheme {
            scheme: scheme.to_string(),
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn extracts_bearer_token() {
        let map = headers("Bearer abc.def.ghi");
        assert_eq!(extract(&map).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn missing_header() {
        let err = extract(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
        assert_eq!(err.http_status_code(), 401);
    }

    #[test]
    fn basic_scheme_is_unsupported() {
        let err = extract(&headers("Basic abc123")).unwrap_err();
        assert!(
            matches!(err, AuthError::UnsupportedScheme { ref scheme } if scheme == "Basic")
        );
        assert_eq!(err.http_status_code(), 401);
    }

    #[test]
    fn scheme_is_case_sensitive() {
        let err = extract(&headers("bearer abc")).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme { .. }));
    }

    #[test]
    fn malformed_credentials() {
        for value in ["Bearer", "Bearer ", "Bearer a b", " abc", "Bearer  abc"] {
            let err = extract(&headers(value)).unwrap_err();
            assert!(
                matches!(err, AuthError::MalformedCredential),
                "{value:?}: {err}"
            );
        }
    }

    #[test]
    fn non_utf8_value_is_malformed() {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xff").unwrap());
        assert!(matches!(
            extract(&map).unwrap_err(),
            AuthError::MalformedCredential
        ));
    }

    #[test]
    fn plain_map_lookup_ignores_name_case() {
        let map = HashMap::from([("authorization".to_string(), "Bearer t".to_string())]);
        assert_eq!(extract(&map).unwrap(), "t");
    }
}
