//! RS256 bearer-token validation against a remote JWKS
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. three non-empty segments
//! 2. header and payload decode to JSON objects
//! 3. `alg` is `RS256`
//! 4. `aud` equals the client id
//! 5. `iss` equals the issuer
//! 6. `exp` has not passed
//! 7. `nbf` has been reached
//! 8. a JWKS endpoint is configured
//! 9. the key set can be fetched
//! 10. a key with the header's `kid` exists, refreshing the key set once if
//!     it does not
//! 11. that key imports as an RSA verification key
//! 12. the signature verifies over `<header>.<payload>`
//!
//! No clock skew is tolerated. The claim checks never touch the network, so a
//! token rejected at steps 1-7 costs no JWKS request.
//!
//! `exp` and `nbf` are compared the way a loosely typed comparison would:
//! numeric strings count as numbers, and values with no numeric reading make
//! both time checks pass. `0`, `false`, `null` and `""` mean "not set".

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::Algorithm;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use super::RawClaims;
use super::cache::CachedKeySetSource;
use super::jwks::{HttpKeySetSource, JwkSet, JwksError, KeySetSource};
use super::token::{CompactToken, DecodedToken, display_value};
use crate::config::AuthSettings;
use crate::error::{EXPECTED_ALGORITHM, ValidationError};

/// Source of the current time in Unix seconds
pub trait Clock: Send + Sync + fmt::Debug {
    /// Seconds since the Unix epoch
    fn unix_now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now(&self) -> u64 {
        // A clock before 1970 reads as 0; every exp check then passes and nbf fails.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock frozen at a given Unix second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_now(&self) -> u64 {
        self.0
    }
}

/// Outcome of one validation
///
/// Serializes as `{ "isValid": bool, "payload"?: {..}, "error"?: "..." }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult(Result<RawClaims, ValidationError>);

impl ValidationResult {
    /// Whether the token was accepted
    pub fn is_valid(&self) -> bool {
        self.0.is_ok()
    }

    /// Decoded claims of an accepted token
    pub fn payload(&self) -> Option<&RawClaims> {
        self.0.as_ref().ok()
    }

    /// Why the token was rejected
    pub fn error(&self) -> Option<&ValidationError> {
        self.0.as_ref().err()
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<RawClaims, ValidationError> {
        self.0
    }
}

impl From<Result<RawClaims, ValidationError>> for ValidationResult {
    fn from(result: Result<RawClaims, ValidationError>) -> Self {
        Self(result)
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            is_valid: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            payload: Option<&'a RawClaims>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a ValidationError>,
        }

        Wire {
            is_valid: self.is_valid(),
            payload: self.payload(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

/// Validates bearer tokens for one client id, issuer and key endpoint
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use my_copilot_auth::{CachedKeySetSource, HttpKeySetSource, TokenValidator};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let keys = CachedKeySetSource::new(HttpKeySetSource::new()?);
/// let validator = TokenValidator::new(
///     "my-client-id",
///     "https://login.example.com/tenant/v2.0",
///     "https://login.example.com/tenant/discovery/v2.0/keys",
///     Arc::new(keys),
/// );
///
/// let claims = validator.verify("eyJhbGciOiJSUzI1NiJ9...").await?;
/// println!("hello {:?}", claims.get("name"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenValidator {
    client_id: String,
    issuer: String,
    jwks_endpoint: String,
    key_source: Arc<dyn KeySetSource>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    /// Validator using `key_source` and the system clock
    pub fn new(
        client_id: impl Into<String>,
        issuer: impl Into<String>,
        jwks_endpoint: impl Into<String>,
        key_source: Arc<dyn KeySetSource>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            issuer: issuer.into(),
            jwks_endpoint: jwks_endpoint.into(),
            key_source,
            clock: Arc::new(SystemClock),
        }
    }

    /// Validator backed by a cached HTTP key source built from `settings`
    ///
    /// # Errors
    ///
    /// [`JwksError::Client`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, JwksError> {
        let http = HttpKeySetSource::with_timeout(settings.jwks_timeout)?;
        let cached = CachedKeySetSource::with_ttl(http, settings.jwks_cache_ttl);
        Ok(Self::new(
            settings.client_id.clone(),
            settings.issuer.clone(),
            settings.jwks_endpoint.clone(),
            Arc::new(cached),
        ))
    }

    /// Replace the clock used for `exp`/`nbf`
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Expected audience
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Expected issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Key set endpoint
    pub fn jwks_endpoint(&self) -> &str {
        &self.jwks_endpoint
    }

    /// Validate `token`, never failing
    pub async fn validate(&self, token: &str) -> ValidationResult {
        self.verify(token).await.into()
    }

    /// Validate `token`, returning its claims
    ///
    /// # Errors
    ///
    /// The [`ValidationError`] of the first check that failed.
    pub async fn verify(&self, token: &str) -> Result<RawClaims, ValidationError> {
        let result = self.run(token).await;
        match &result {
            Ok(_) => debug!(jwks_uri = %self.jwks_endpoint, "Token accepted"),
            Err(e) => debug!(kind = %e.kind(), error = %e, "Token rejected"),
        }
        result
    }

    async fn run(&self, token: &str) -> Result<RawClaims, ValidationError> {
        let compact = CompactToken::parse(token)?;
        let decoded = compact.decode()?;

        self.check_claims(&decoded)?;

        if self.jwks_endpoint.is_empty() {
            return Err(ValidationError::MissingKeyEndpoint);
        }

        let mut jwks = self
            .key_source
            .fetch(&self.jwks_endpoint)
            .await
            .map_err(|e| ValidationError::JwksFetch(e.to_string()))?;

        // An unknown kid against a cached set may just mean the keys rotated.
        if let Some(kid) = decoded.kid()
            && jwks.find(kid).is_none()
        {
            debug!(
                kid,
                jwks_uri = %self.jwks_endpoint,
                "Key ID not in JWKS, asking for a refresh"
            );
            if let Some(fresh) = self
                .key_source
                .refresh(&self.jwks_endpoint)
                .await
                .map_err(|e| ValidationError::JwksFetch(e.to_string()))?
            {
                jwks = fresh;
            }
        }

        verify_signature(&compact, &decoded, &jwks)?;

        Ok(decoded.claims)
    }

    fn check_claims(&self, token: &DecodedToken) -> Result<(), ValidationError> {
        if token.alg().and_then(Value::as_str) != Some(EXPECTED_ALGORITHM) {
            return Err(ValidationError::InvalidAlgorithm {
                actual: display_value(token.alg()),
            });
        }

        let aud = token.claims.get("aud");
        if aud.and_then(Value::as_str) != Some(self.client_id.as_str()) {
            return Err(ValidationError::InvalidAudience {
                expected: self.client_id.clone(),
                actual: display_value(aud),
            });
        }

        let iss = token.claims.get("iss");
        if iss.and_then(Value::as_str) != Some(self.issuer.as_str()) {
            return Err(ValidationError::InvalidIssuer {
                expected: self.issuer.clone(),
                actual: display_value(iss),
            });
        }

        let now = self.clock.unix_now() as f64;

        if let Some(exp) = time_claim(token.claims.get("exp"))
            && now > exp
        {
            return Err(ValidationError::TokenExpired);
        }

        if let Some(nbf) = time_claim(token.claims.get("nbf"))
            && now < nbf
        {
            return Err(ValidationError::TokenNotYetValid);
        }

        Ok(())
    }
}

/// Numeric reading of a time claim, `None` when it is not set
///
/// `NaN` stands for "set, but not a number"; it fails every comparison.
fn time_claim(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(1.0),
        Value::Number(n) => n.as_f64().filter(|v| *v != 0.0),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(parse_number(s)),
        Value::Array(_) | Value::Object(_) => Some(f64::NAN),
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s.trim_start_matches(['+', '-']) {
        "Infinity" if s.starts_with('-') => f64::NEG_INFINITY,
        "Infinity" => f64::INFINITY,
        // Rust also accepts "inf" and "nan", which are not numbers here
        digits if digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') => {
            s.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

fn verify_signature(
    compact: &CompactToken<'_>,
    decoded: &DecodedToken,
    jwks: &JwkSet,
) -> Result<(), ValidationError> {
    let jwk = decoded
        .kid()
        .and_then(|kid| jwks.find(kid))
        .ok_or(ValidationError::KeyNotFound)?;

    let key = jwk
        .to_decoding_key()
        .map_err(|e| ValidationError::KeyImport(e.to_string()))?;

    let signature = compact
        .signature_b64url()
        .map_err(|e| ValidationError::SignatureVerification(e.to_string()))?;

    match jsonwebtoken::crypto::verify(&signature, compact.signing_input(), &key, Algorithm::RS256)
    {
        Ok(true) => Ok(()),
        Ok(false) => Err(ValidationError::InvalidSignature),
        Err(e) => Err(ValidationError::SignatureVerification(e.to_string())),
    }
}

/// Fetches with a fresh client on every call
#[derive(Debug)]
struct OneShotHttpSource;

#[async_trait::async_trait]
impl KeySetSource for OneShotHttpSource {
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, JwksError> {
        HttpKeySetSource::new()?.fetch(endpoint).await
    }
}

/// Validate `token` against `client_id`, `issuer` and the keys at `jwks_endpoint`
///
/// Fetches the key set on every call. Long-running callers should build a
/// [`TokenValidator`] with a [`CachedKeySetSource`] instead.
pub async fn validate(
    token: &str,
    client_id: &str,
    issuer: &str,
    jwks_endpoint: &str,
) -> ValidationResult {
    TokenValidator::new(client_id, issuer, jwks_endpoint, Arc::new(OneShotHttpSource))
        .validate(token)
        .await
}
