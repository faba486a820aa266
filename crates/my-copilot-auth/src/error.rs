//! Validation error taxonomy
//!
//! Each variant corresponds to exactly one step of the validation sequence in
//! [`crate::jwt::TokenValidator`]. The `Display` text is the human-readable
//! message surfaced in [`crate::jwt::ValidationResult`]; [`ValidationError::kind`]
//! gives a stable tag for logs and metrics.

use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// The only signing algorithm accepted for inbound tokens
pub const EXPECTED_ALGORITHM: &str = "RS256";

/// Why a token was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Not exactly three non-empty dot-separated segments
    #[error("Invalid token format.")]
    MalformedToken,

    /// Header or payload segment is not base64-encoded JSON
    #[error("Error decoding token: {0}")]
    Decode(String),

    /// Header `alg` is not RS256
    #[error("Invalid algorithm. Expected: RS256, got: {actual}.")]
    InvalidAlgorithm {
        /// The `alg` value found in the header
        actual: String,
    },

    /// Payload `aud` does not equal the configured client id
    #[error("Invalid audience. Expected: {expected}, got: {actual}.")]
    InvalidAudience {
        /// Configured client id
        expected: String,
        /// The `aud` value found in the payload
        actual: String,
    },

    /// Payload `iss` does not equal the configured issuer
    #[error("Invalid issuer. Expected: {expected}, got: {actual}.")]
    InvalidIssuer {
        /// Configured issuer
        expected: String,
        /// The `iss` value found in the payload
        actual: String,
    },

    /// Current time is past `exp`
    #[error("Token is expired.")]
    TokenExpired,

    /// Current time is before `nbf`
    #[error("Token is not yet valid.")]
    TokenNotYetValid,

    /// No JWKS endpoint configured
    #[error("Public key endpoint is not defined.")]
    MissingKeyEndpoint,

    /// The key set could not be retrieved or parsed
    #[error("Error fetching JWKS: {0}")]
    JwksFetch(String),

    /// No key in the set carries the header's `kid`
    #[error("Public key not found in JWKS endpoint.")]
    KeyNotFound,

    /// The selected key could not be turned into an RS256 verification key
    #[error("Error importing public key: {0}")]
    KeyImport(String),

    /// Verification itself failed (as opposed to producing a negative answer)
    #[error("Error verifying signature: {0}")]
    SignatureVerification(String),

    /// The signature does not match the signed content
    #[error("Invalid signature. The token's signature does not match the expected value.")]
    InvalidSignature,
}

impl ValidationError {
    /// The stable tag for this error
    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            Self::MalformedToken => ValidationErrorKind::MalformedToken,
            Self::Decode(_) => ValidationErrorKind::DecodeError,
            Self::InvalidAlgorithm { .. } => ValidationErrorKind::InvalidAlgorithm,
            Self::InvalidAudience { .. } => ValidationErrorKind::InvalidAudience,
            Self::InvalidIssuer { .. } => ValidationErrorKind::InvalidIssuer,
            Self::TokenExpired => ValidationErrorKind::TokenExpired,
            Self::TokenNotYetValid => ValidationErrorKind::TokenNotYetValid,
            Self::MissingKeyEndpoint => ValidationErrorKind::MissingKeyEndpoint,
            Self::JwksFetch(_) => ValidationErrorKind::JwksFetchError,
            Self::KeyNotFound => ValidationErrorKind::KeyNotFound,
            Self::KeyImport(_) => ValidationErrorKind::KeyImportError,
            Self::SignatureVerification(_) => ValidationErrorKind::SignatureVerificationError,
            Self::InvalidSignature => ValidationErrorKind::InvalidSignature,
        }
    }
}

// Serialized as its message, matching the `error` string of a validation result.
impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stable tag for a [`ValidationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorKind {
    /// See [`ValidationError::MalformedToken`]
    MalformedToken,
    /// See [`ValidationError::Decode`]
    DecodeError,
    /// See [`ValidationError::InvalidAlgorithm`]
    InvalidAlgorithm,
    /// See [`ValidationError::InvalidAudience`]
    InvalidAudience,
    /// See [`ValidationError::InvalidIssuer`]
    InvalidIssuer,
    /// See [`ValidationError::TokenExpired`]
    TokenExpired,
    /// See [`ValidationError::TokenNotYetValid`]
    TokenNotYetValid,
    /// See [`ValidationError::MissingKeyEndpoint`]
    MissingKeyEndpoint,
    /// See [`ValidationError::JwksFetch`]
    JwksFetchError,
    /// See [`ValidationError::KeyNotFound`]
    KeyNotFound,
    /// See [`ValidationError::KeyImport`]
    KeyImportError,
    /// See [`ValidationError::SignatureVerification`]
    SignatureVerificationError,
    /// See [`ValidationError::InvalidSignature`]
    InvalidSignature,
}

impl ValidationErrorKind {
    /// Tag name as used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedToken => "MalformedToken",
            Self::DecodeError => "DecodeError",
            Self::InvalidAlgorithm => "InvalidAlgorithm",
            Self::InvalidAudience => "InvalidAudience",
            Self::InvalidIssuer => "InvalidIssuer",
            Self::TokenExpired => "TokenExpired",
            Self::TokenNotYetValid => "TokenNotYetValid",
            Self::MissingKeyEndpoint => "MissingKeyEndpoint",
            Self::JwksFetchError => "JwksFetchError",
            Self::KeyNotFound => "KeyNotFound",
            Self::KeyImportError => "KeyImportError",
            Self::SignatureVerificationError => "SignatureVerificationError",
            Self::InvalidSignature => "InvalidSignature",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
