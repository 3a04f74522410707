//! Base64URL codec used by the compact JWT serialization.
//!
//! Decoding translates the URL-safe alphabet to the standard one and restores
//! `=` padding before decoding, so both padded and unpadded segments are
//! accepted.

use base64::prelude::*;
use thiserror::Error;

/// Errors produced while decoding a base64url segment.
#[derive(Debug, Error)]
pub enum Base64UrlError {
    /// The unpadded length leaves a remainder of one character, which no
    /// byte sequence can encode to.
    #[error("invalid base64url length {0}")]
    InvalidLength(usize),

    /// The segment contains a character from the standard alphabet only.
    #[error("invalid base64url character {0:?}")]
    InvalidCharacter(char),

    /// The segment contains characters outside the alphabet or bad padding.
    #[error("invalid base64url: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Encode bytes as unpadded base64url.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url segment into raw bytes.
///
/// # Errors
///
/// Returns `InvalidCharacter` for `+` or `/`, `InvalidLength` when the
/// unpadded input length is `1 (mod 4)`, and `Decode` for any other malformed
/// input.
pub fn decode(segment: &str) -> Result<Vec<u8>, Base64UrlError> {
    let unpadded = segment.trim_end_matches('=');
    if let Some(c) = unpadded.chars().find(|c| matches!(c, '+' | '/')) {
        return Err(Base64UrlError::InvalidCharacter(c));
    }
    let mut standard: String = unpadded
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    match standard.len() % 4 {
        0 => {}
        1 => return Err(Base64UrlError::InvalidLength(standard.len())),
        rem => standard.push_str(&"=".repeat(4 - rem)),
    }

    Ok(BASE64_STANDARD.decode(standard)?)
}
