//! Token data model and decoding.
//!
//! A [`Token`] keeps the three encoded segments verbatim next to their decoded
//! forms. Signature verification runs over the encoded header and payload, so
//! the decoded JSON is never re-serialized.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::base64url;
use crate::error::{AuthError, DecodeError, Result, Segment};

/// Decoded JOSE header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Header {
    /// Signing algorithm (`alg`).
    #[serde(rename = "alg", default, deserialize_with = "null_as_default")]
    pub algorithm: String,
    /// Token type (`typ`).
    #[serde(rename = "typ", default, deserialize_with = "null_as_default")]
    pub token_type: String,
    /// Key identifier (`kid`).
    #[serde(rename = "kid", default, deserialize_with = "null_as_default")]
    pub key_id: String,
}

/// Decoded claims payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Payload {
    /// Issuer (`iss`).
    #[serde(rename = "iss", default, deserialize_with = "null_as_default")]
    pub issuer: String,
    /// Subject (`sub`).
    #[serde(rename = "sub", default, deserialize_with = "null_as_default")]
    pub subject: String,
    /// Audiences (`aud`), accepted as a single string or an array.
    #[serde(rename = "aud", default, deserialize_with = "deserialize_audiences")]
    pub audiences: Vec<String>,
    /// Expiration in whole seconds since the epoch (`exp`); zero when absent
    /// or null. Fractional values are truncated.
    #[serde(rename = "exp", default, deserialize_with = "deserialize_numeric_date")]
    pub expiration: i64,
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// NumericDate claim: integer or fractional seconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(i64),
    Fractional(f64),
}

#[allow(clippy::cast_possible_truncation)]
fn deserialize_numeric_date<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<NumericDate>::deserialize(deserializer)? {
        Some(NumericDate::Seconds(secs)) => secs,
        // `as` saturates out-of-range values.
        Some(NumericDate::Fractional(secs)) => secs.trunc() as i64,
        None => 0,
    })
}

/// Audience claim that can be either a string or array.
#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

fn deserialize_audiences<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Audience>::deserialize(deserializer)? {
        Some(Audience::Single(aud)) => vec![aud],
        Some(Audience::Multiple(auds)) => auds,
        None => Vec::new(),
    })
}

/// Decoded signature bytes.
///
/// Signatures that happen to be valid UTF-8 are kept as text, everything else
/// as raw bytes. Both forms expose the same bytes through [`Signature::as_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    /// The decoded bytes formed valid UTF-8.
    Text(String),
    /// The decoded bytes as-is.
    Raw(Vec<u8>),
}

impl Signature {
    fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(err) => Self::Raw(err.into_bytes()),
        }
    }

    /// The decoded signature bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Raw(bytes) => bytes,
        }
    }
}

/// A decoded, not yet validated, compact JWT.
#[derive(Debug, Clone)]
pub struct Token {
    header: Header,
    payload: Payload,
    signature: Signature,
    raw_header: String,
    raw_payload: String,
    raw_signature: String,
}

impl Token {
    /// Split and decode a compact token.
    ///
    /// Performs no I/O and no claim checks.
    ///
    /// # Errors
    ///
    /// Returns `Decode` when the token is not three non-empty base64url
    /// segments whose first two parse as JSON, and `SignatureDecode` when the
    /// signature segment has an impossible length or invalid characters.
    pub fn decode(token: &str) -> Result<Self> {
        let segments: Vec<&str> = token.split('.').collect();
        let [raw_header, raw_payload, raw_signature] = segments.as_slice() else {
            return Err(DecodeError::SegmentCount(segments.len()).into());
        };

        for (name, segment) in [
            (Segment::Header, raw_header),
            (Segment::Payload, raw_payload),
            (Segment::Signature, raw_signature),
        ] {
            if segment.is_empty() {
                return Err(DecodeError::EmptySegment(name).into());
            }
        }

        let header: Header = decode_json(Segment::Header, raw_header)?;
        let payload: Payload = decode_json(Segment::Payload, raw_payload)?;
        let signature = base64url::decode(raw_signature)
            .map(Signature::from_bytes)
            .map_err(AuthError::SignatureDecode)?;

        Ok(Self {
            header,
            payload,
            signature,
            raw_header: (*raw_header).to_string(),
            raw_payload: (*raw_payload).to_string(),
            raw_signature: (*raw_signature).to_string(),
        })
    }

    /// The decoded header.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// The decoded payload.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consume the token, keeping only its payload.
    #[must_use]
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// The decoded signature.
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The exact bytes the signature covers: `header "." payload` as encoded.
    #[must_use]
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.raw_header, self.raw_payload)
    }

    /// The original compact serialization.
    #[must_use]
    pub fn as_compact(&self) -> String {
        format!(
            "{}.{}.{}",
            self.raw_header, self.raw_payload, self.raw_signature
        )
    }
}

fn decode_json<T: DeserializeOwned>(segment: Segment, raw: &str) -> Result<T> {
    let bytes =
        base64url::decode(raw).map_err(|source| DecodeError::Base64 { segment, source })?;
    serde_json::from_slice(&bytes)
        .map_err(|source| DecodeError::Json { segment, source }.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn segment(value: &serde_json::Value) -> String {
        base64url::encode(&serde_json::to_vec(value).unwrap())
    }

    fn compact(header: &serde_json::Value, payload: &serde_json::Value, sig: &[u8]) -> String {
        format!(
            "{}.{}.{}",
            segment(header),
            segment(payload),
            base64url::encode(sig)
        )
    }

    #[test]
    fn decodes_header_and_payload() {
        let token = compact(
            &json!({"alg": "RS256", "typ": "JWT", "kid": "k1"}),
            &json!({"iss": "https://issuer", "sub": "user-1", "aud": ["a", "b"], "exp": 2_000_000_000}),
            &[0xff, 0x00, 0x10],
        );

        let decoded = Token::decode(&token).unwrap();
        assert_eq!(
            decoded.header(),
            &Header {
                algorithm: "RS256".into(),
                token_type: "JWT".into(),
                key_id: "k1".into(),
            }
        );
        assert_eq!(
            decoded.payload(),
            &Payload {
                issuer: "https://issuer".into(),
                subject: "user-1".into(),
                audiences: vec!["a".into(), "b".into()],
                expiration: 2_000_000_000,
            }
        );
        assert_eq!(decoded.as_compact(), token);
    }

    #[test]
    fn single_string_audience_becomes_one_element() {
        let token = compact(
            &json!({"alg": "RS256", "typ": "JWT", "kid": "k1"}),
            &json!({"aud": "only"}),
            b"sig",
        );
        let decoded = Token::decode(&token).unwrap();
        assert_eq!(decoded.payload().audiences, vec!["only".to_string()]);
        assert_eq!(decoded.payload().expiration, 0);
    }

    #[test]
    fn null_claims_read_as_absent() {
        let token = compact(
            &json!({"alg": "RS256", "typ": null, "kid": null}),
            &json!({"iss": null, "sub": null, "aud": null, "exp": null}),
            b"sig",
        );
        let decoded = Token::decode(&token).unwrap();
        assert_eq!(decoded.header().key_id, "");
        assert_eq!(decoded.header().token_type, "");
        assert_eq!(decoded.payload(), &Payload::default());
    }

    #[test]
    fn fractional_expiration_is_truncated() {
        let token = compact(
            &json!({"alg": "RS256"}),
            &json!({"exp": 1_792_327_277.5}),
            b"sig",
        );
        let decoded = Token::decode(&token).unwrap();
        assert_eq!(decoded.payload().expiration, 1_792_327_277);
    }

    #[test]
    fn non_numeric_expiration_is_decode_error() {
        let token = compact(&json!({"alg": "RS256"}), &json!({"exp": "soon"}), b"sig");
        assert!(matches!(
            Token::decode(&token).unwrap_err(),
            AuthError::Decode(DecodeError::Json {
                segment: Segment::Payload,
                ..
            })
        ));
    }

    #[test]
    fn into_payload_keeps_claims() {
        let token = compact(
            &json!({"alg": "RS256"}),
            &json!({"sub": "user-1", "exp": 5}),
            b"sig",
        );
        let payload = Token::decode(&token).unwrap().into_payload();
        assert_eq!(payload.subject, "user-1");
        assert_eq!(payload.expiration, 5);
    }

    #[test]
    fn signing_input_is_verbatim() {
        // Unusual whitespace in the header must survive untouched.
        let raw_header = base64url::encode(br#"{ "alg" : "RS256", "typ":"JWT", "kid":"k" }"#);
        let raw_payload = base64url::encode(br#"{"exp":1}"#);
        let token = format!("{raw_header}.{raw_payload}.c2ln");

        let decoded = Token::decode(&token).unwrap();
        assert_eq!(decoded.signing_input(), format!("{raw_header}.{raw_payload}"));
    }

    #[test]
    fn rejects_wrong_segment_count() {
        for token in ["a.b", "a.b.c.d", "abc"] {
            let err = Token::decode(token).unwrap_err();
            assert!(
                matches!(err, AuthError::Decode(DecodeError::SegmentCount(_))),
                "{token}: {err}"
            );
        }
    }

    #[test]
    fn rejects_empty_segment() {
        let err = Token::decode("..").unwrap_err();
        assert!(matches!(
            err,
            AuthError::Decode(DecodeError::EmptySegment(Segment::Header))
        ));

        let err = Token::decode("e30.e30.").unwrap_err();
        assert_eq!(err.to_string(), "token decode failed: empty signature segment");
    }

    #[test]
    fn non_json_segments_are_decode_errors() {
        let err = Token::decode("aaa.bbb.ccc").unwrap_err();
        assert!(matches!(err, AuthError::Decode(_)), "{err}");
        assert_eq!(err.category(), "decode_error");

        let not_json = base64url::encode(b"not json");
        let err = Token::decode(&format!("{not_json}.{not_json}.c2ln")).unwrap_err();
        assert!(matches!(
            err,
            AuthError::Decode(DecodeError::Json {
                segment: Segment::Header,
                ..
            })
        ));
    }

    #[test]
    fn bad_base64_payload_is_decode_error() {
        let header = segment(&json!({"alg": "RS256"}));
        let err = Token::decode(&format!("{header}.a.c2ln")).unwrap_err();
        assert!(matches!(
            err,
            AuthError::Decode(DecodeError::Base64 {
                segment: Segment::Payload,
                ..
            })
        ));
    }

    #[test]
    fn signature_with_remainder_of_one_is_signature_decode_error() {
        let header = segment(&json!({"alg": "RS256"}));
        let payload = segment(&json!({}));
        let err = Token::decode(&format!("{header}.{payload}.abcde")).unwrap_err();
        assert!(matches!(err, AuthError::SignatureDecode(_)));
        assert_eq!(err.category(), "signature_decode_error");
    }

    #[test]
    fn signature_keeps_text_or_raw_bytes() {
        let header = json!({"alg": "RS256"});
        let payload = json!({});

        let text = Token::decode(&compact(&header, &payload, b"plain")).unwrap();
        assert_eq!(text.signature(), &Signature::Text("plain".into()));

        let raw = Token::decode(&compact(&header, &payload, &[0xc3, 0x28])).unwrap();
        assert_eq!(raw.signature(), &Signature::Raw(vec![0xc3, 0x28]));
        assert_eq!(raw.signature().as_bytes(), &[0xc3, 0x28]);
    }
}
