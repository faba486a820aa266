//! JWT validation
//!
//! # Modules
//!
//! - `token` - compact token splitting and segment decoding
//! - `jwks` - key set documents, RSA key import, HTTP retrieval
//! - `cache` - per-endpoint key set cache with a TTL and rate-limited refresh
//! - `validator` - the ordered check pipeline
//!
//! Only the RS256 verification primitive comes from `jsonwebtoken`; claim
//! checks are done here so each failure maps to its own [`ValidationError`].
//!
//! [`ValidationError`]: crate::ValidationError

pub mod cache;
pub mod jwks;
pub mod token;
pub mod validator;

pub use cache::{CachedKeySetSource, DEFAULT_JWKS_CACHE_TTL, DEFAULT_MIN_REFRESH_INTERVAL};
pub use jwks::{
    DEFAULT_JWKS_TIMEOUT, HttpKeySetSource, Jwk, JwkSet, JwksError, KeyImportError, KeySetSource,
    MIN_RSA_MODULUS_BITS,
};
pub use token::{CompactToken, DecodedToken};
pub use validator::{Clock, FixedClock, SystemClock, TokenValidator, ValidationResult, validate};

/// Decoded token payload, passed through untouched on success
pub type RawClaims = serde_json::Map<String, serde_json::Value>;
