//! Compact JWT parsing
//!
//! Splits a compact token into its three segments and decodes the header and
//! payload. Segments are accepted in either the URL-safe or the standard base64
//! alphabet, with or without padding, since identity providers are not uniform
//! about it.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};

use super::RawClaims;
use crate::error::ValidationError;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Decode a base64 segment, trying the URL-safe alphabet first
pub(crate) fn decode_base64(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT
        .decode(segment)
        .or_else(|url_err| STANDARD_LENIENT.decode(segment).map_err(|_| url_err))
}

/// A compact token split into its segments, borrowing from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactToken<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
    signing_input: &'a str,
}

impl<'a> CompactToken<'a> {
    /// Split `token` into header, payload and signature segments
    ///
    /// # Errors
    ///
    /// [`ValidationError::MalformedToken`] unless there are exactly three
    /// non-empty segments.
    pub fn parse(token: &'a str) -> Result<Self, ValidationError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ValidationError::MalformedToken);
        };

        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(ValidationError::MalformedToken);
        }

        // header.len() + '.' + payload.len() is always a char boundary
        let signing_input = &token[..header.len() + 1 + payload.len()];

        Ok(Self {
            header,
            payload,
            signature,
            signing_input,
        })
    }

    /// The exact bytes the signature covers: `<header>.<payload>`
    pub fn signing_input(&self) -> &'a [u8] {
        self.signing_input.as_bytes()
    }

    /// Raw signature segment as it appeared in the token
    pub fn signature_segment(&self) -> &'a str {
        self.signature
    }

    /// Signature re-encoded as unpadded base64url
    ///
    /// # Errors
    ///
    /// Returns the base64 error when the segment is not decodable in either
    /// alphabet.
    pub fn signature_b64url(&self) -> Result<String, base64::DecodeError> {
        decode_base64(self.signature).map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decode header and payload into JSON objects
    ///
    /// # Errors
    ///
    /// [`ValidationError::Decode`] when either segment is not base64, not
    /// JSON, or not an object. Claim types are not inspected here.
    pub fn decode(&self) -> Result<DecodedToken, ValidationError> {
        Ok(DecodedToken {
            header: decode_object("header", self.header)?,
            claims: decode_object("payload", self.payload)?,
        })
    }
}

/// Header and claims of a token that passed structural decoding
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    /// JOSE header
    pub header: Map<String, Value>,
    /// Payload claims, passed through untouched on success
    pub claims: RawClaims,
}

impl DecodedToken {
    /// Header `alg`
    pub fn alg(&self) -> Option<&Value> {
        self.header.get("alg")
    }

    /// Header `kid`, only when it is a string
    pub fn kid(&self) -> Option<&str> {
        self.header.get("kid").and_then(Value::as_str)
    }
}

fn decode_object(name: &str, segment: &str) -> Result<Map<String, Value>, ValidationError> {
    let bytes =
        decode_base64(segment).map_err(|e| ValidationError::Decode(format!("{name}: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ValidationError::Decode(format!(
            "{name}: expected a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(ValidationError::Decode(format!("{name}: {e}"))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a header/claim value for an error message
///
/// Strings render bare, absent values as `<missing>`, anything else as JSON.
pub(crate) fn display_value(value: Option<&Value>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
