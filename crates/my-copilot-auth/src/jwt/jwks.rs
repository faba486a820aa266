//! JWKS (JSON Web Key Set) retrieval
//!
//! [`KeySetSource`] is the seam between the validator and the network. The
//! default implementation, [`HttpKeySetSource`], performs one GET per call;
//! wrap it in [`super::CachedKeySetSource`] to avoid refetching on every
//! request.
//!
//! Keys are kept as raw JSON so that a key with missing or malformed material
//! is only rejected once it is actually selected for a token.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

/// Default bound on a single JWKS request
pub const DEFAULT_JWKS_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache hint sent with every JWKS request
const JWKS_CACHE_HINT: &str = "max-age=3600";

/// Smallest RSA modulus accepted for verification, in bits
pub const MIN_RSA_MODULUS_BITS: usize = 1024;

/// A JSON Web Key Set document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    /// Keys published by the identity provider
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find the key whose `kid` equals `kid`
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid() == Some(kid))
    }
}

/// A single JSON Web Key, kept as its raw JSON members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jwk(Map<String, Value>);

impl Jwk {
    /// Wrap raw JSON members
    pub fn from_members(members: Map<String, Value>) -> Self {
        Self(members)
    }

    /// Key identifier
    pub fn kid(&self) -> Option<&str> {
        self.str_member("kid")
    }

    /// Key type (`RSA`, `EC`, ...)
    pub fn kty(&self) -> Option<&str> {
        self.str_member("kty")
    }

    /// Raw JSON members
    pub fn members(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_member(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Import this key for RS256 (RSASSA-PKCS1-v1_5 with SHA-256) verification
    ///
    /// # Errors
    ///
    /// [`KeyImportError`] if the key is not an RSA signing key usable with
    /// RS256, or its modulus/exponent are not valid base64url big-endian
    /// integers of a usable size.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, KeyImportError> {
        match self.kty() {
            Some("RSA") => {}
            Some(other) => return Err(KeyImportError::UnsupportedKeyType(other.to_string())),
            None => return Err(KeyImportError::MissingMember("kty")),
        }

        if let Some(alg) = self.str_member("alg")
            && alg != "RS256"
        {
            return Err(KeyImportError::AlgorithmMismatch(alg.to_string()));
        }

        if let Some(usage) = self.str_member("use")
            && usage != "sig"
        {
            return Err(KeyImportError::NotASigningKey(usage.to_string()));
        }

        let (n, modulus) = self.component("n")?;
        let (e, exponent) = self.component("e")?;

        let modulus_bits = modulus.len() * 8 - modulus[0].leading_zeros() as usize;
        if modulus_bits < MIN_RSA_MODULUS_BITS {
            return Err(KeyImportError::InvalidComponent {
                member: "n",
                reason: format!(
                    "modulus is {modulus_bits} bits, at least {MIN_RSA_MODULUS_BITS} required"
                ),
            });
        }
        if modulus[modulus.len() - 1] & 1 == 0 {
            return Err(KeyImportError::InvalidComponent {
                member: "n",
                reason: "modulus is even".to_string(),
            });
        }

        // Exponents above 64 bits are not used in practice and rejected by backends.
        if exponent.len() > 8 {
            return Err(KeyImportError::InvalidComponent {
                member: "e",
                reason: format!("exponent is {} bytes long", exponent.len()),
            });
        }
        let exponent_value = exponent
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        if exponent_value <= 1 || exponent_value % 2 == 0 {
            return Err(KeyImportError::InvalidComponent {
                member: "e",
                reason: format!("exponent {exponent_value} must be odd and greater than 1"),
            });
        }

        DecodingKey::from_rsa_components(n, e).map_err(|e| KeyImportError::Rejected(e.to_string()))
    }

    /// Raw member text plus its decoded big-endian bytes
    fn component(&self, name: &'static str) -> Result<(&str, Vec<u8>), KeyImportError> {
        let value = self
            .str_member(name)
            .filter(|v| !v.is_empty())
            .ok_or(KeyImportError::MissingMember(name))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| KeyImportError::InvalidComponent {
                member: name,
                reason: e.to_string(),
            })?;

        match bytes.first() {
            None => Err(KeyImportError::MissingMember(name)),
            Some(0) => Err(KeyImportError::InvalidComponent {
                member: name,
                reason: "leading zero byte".to_string(),
            }),
            Some(_) => Ok((value, bytes)),
        }
    }
}

/// Why a JWK could not be imported as an RS256 verification key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyImportError {
    /// `kty` is not `RSA`
    #[error("unsupported key type `{0}`, expected RSA")]
    UnsupportedKeyType(String),

    /// A required member is absent or empty
    #[error("missing key member `{0}`")]
    MissingMember(&'static str),

    /// Key declares an algorithm other than RS256
    #[error("key algorithm `{0}` cannot verify RS256 signatures")]
    AlgorithmMismatch(String),

    /// Key is published for something other than signatures
    #[error("key use `{0}` is not `sig`")]
    NotASigningKey(String),

    /// Modulus or exponent is not unpadded base64url
    #[error("invalid key member `{member}`: {reason}")]
    InvalidComponent {
        /// `n` or `e`
        member: &'static str,
        /// Decoder message
        reason: String,
    },

    /// The crypto backend refused the key material
    #[error("{0}")]
    Rejected(String),
}

/// Errors retrieving a key set
#[derive(Debug, Error)]
pub enum JwksError {
    /// Could not build the HTTP client
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Network failure or timeout
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("JWKS endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    /// Body is not a JWKS document
    #[error("invalid JWKS document: {0}")]
    Format(String),
}

/// Where the validator gets key sets from
#[async_trait]
pub trait KeySetSource: Send + Sync + fmt::Debug {
    /// Fetch the key set published at `endpoint`
    ///
    /// # Errors
    ///
    /// Any [`JwksError`] is reported by the validator as a fetch failure.
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, JwksError>;

    /// Fetch a newer key set than the last `fetch` returned, if there can be one
    ///
    /// Called when a token names a key the set does not contain. Sources that
    /// hit the network on every `fetch` have nothing newer and return `None`.
    ///
    /// # Errors
    ///
    /// Any [`JwksError`] is reported by the validator as a fetch failure.
    async fn refresh(&self, _endpoint: &str) -> Result<Option<JwkSet>, JwksError> {
        Ok(None)
    }
}

/// Fetches key sets over HTTP(S), one request per call
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// HTTP source with the default request timeout
    ///
    /// # Errors
    ///
    /// [`JwksError::Client`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, JwksError> {
        Self::with_timeout(DEFAULT_JWKS_TIMEOUT)
    }

    /// HTTP source with a custom request timeout
    ///
    /// # Errors
    ///
    /// [`JwksError::Client`] if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, JwksError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(JwksError::Client)?;
        Ok(Self { http_client })
    }

    /// Reuse an existing client (its timeout applies)
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self, endpoint: &str) -> Result<JwkSet, JwksError> {
        debug!(jwks_uri = %endpoint, "Fetching JWKS");

        let response = self
            .http_client
            .get(endpoint)
            .header(CACHE_CONTROL, HeaderValue::from_static(JWKS_CACHE_HINT))
            .send()
            .await
            .map_err(|e| {
                error!(jwks_uri = %endpoint, error = %e, "Failed to fetch JWKS");
                JwksError::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(jwks_uri = %endpoint, status = %status, "JWKS endpoint returned error status");
            return Err(JwksError::Status(status));
        }

        let body = response.bytes().await?;
        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            error!(jwks_uri = %endpoint, error = %e, "Failed to parse JWKS JSON");
            JwksError::Format(e.to_string())
        })?;

        debug!(jwks_uri = %endpoint, key_count = jwks.keys.len(), "Fetched JWKS");
        Ok(jwks)
    }
}
