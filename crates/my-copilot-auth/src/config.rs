//! Authentication settings
//!
//! Settings are built once at startup, validated there, and passed by value
//! into the validator and gate. Nothing in this crate reads the environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::jwt::{DEFAULT_JWKS_CACHE_TTL, DEFAULT_JWKS_TIMEOUT, JwksError};

/// Settings problems, all reported at startup
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required value is empty
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// JWKS endpoint does not parse as an absolute URL
    #[error("JWKS endpoint `{url}` is not a valid URL: {reason}")]
    InvalidEndpoint {
        /// Value as given
        url: String,
        /// Parser message
        reason: String,
    },

    /// JWKS endpoint is not http(s)
    #[error("JWKS endpoint `{0}` must use http or https")]
    UnsupportedScheme(String),

    /// JWKS request timeout of zero
    #[error("JWKS request timeout must be greater than zero")]
    ZeroTimeout,

    /// Production mode without authentication settings
    #[error("authentication settings are required in production mode")]
    MissingInProduction,

    /// Runtime mode string not recognised
    #[error("unknown runtime mode `{0}`, expected `development` or `production`")]
    UnknownMode(String),

    /// The JWKS HTTP client could not be created
    #[error("cannot build JWKS client: {0}")]
    KeySource(#[from] JwksError),
}

/// Identity provider settings for token validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Expected `aud` (application client id)
    pub client_id: String,
    /// Expected `iss`
    pub issuer: String,
    /// Where the signing keys are published
    pub jwks_endpoint: String,
    /// How long a fetched key set is reused
    pub jwks_cache_ttl: Duration,
    /// Bound on a single key set request
    pub jwks_timeout: Duration,
}

impl AuthSettings {
    /// Validated settings with default cache TTL and timeout
    ///
    /// # Errors
    ///
    /// [`SettingsError`] if any value is empty or the endpoint is not an
    /// http(s) URL.
    pub fn new(
        client_id: impl Into<String>,
        issuer: impl Into<String>,
        jwks_endpoint: impl Into<String>,
    ) -> Result<Self, SettingsError> {
        let settings = Self {
            client_id: client_id.into(),
            issuer: issuer.into(),
            jwks_endpoint: jwks_endpoint.into(),
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            jwks_timeout: DEFAULT_JWKS_TIMEOUT,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Set the key set cache TTL
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Set the key set request timeout
    ///
    /// # Errors
    ///
    /// [`SettingsError::ZeroTimeout`] for a zero duration.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, SettingsError> {
        if timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout);
        }
        self.jwks_timeout = timeout;
        Ok(self)
    }

    /// Re-check every invariant
    ///
    /// # Errors
    ///
    /// The first [`SettingsError`] found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.client_id.trim().is_empty() {
            return Err(SettingsError::Empty("client id"));
        }
        if self.issuer.trim().is_empty() {
            return Err(SettingsError::Empty("issuer"));
        }
        if self.jwks_endpoint.trim().is_empty() {
            return Err(SettingsError::Empty("JWKS endpoint"));
        }

        let url = Url::parse(&self.jwks_endpoint).map_err(|e| SettingsError::InvalidEndpoint {
            url: self.jwks_endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::UnsupportedScheme(self.jwks_endpoint.clone()));
        }

        if self.jwks_timeout.is_zero() {
            return Err(SettingsError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Whether requests are authenticated for real
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Validation off, every request gets the fixed development identity
    Development,
    /// Bearer tokens are validated
    #[default]
    Production,
}

impl RuntimeMode {
    /// Lower-case name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(SettingsError::UnknownMode(other.to_string())),
        }
    }
}
