//! How a request is authenticated
//!
//! The development bypass is a strategy picked at startup, not a check buried
//! in request handling.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::claims::{Identity, User};
use crate::config::{AuthSettings, RuntimeMode, SettingsError};
use crate::error::ValidationError;
use crate::jwt::TokenValidator;

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was not authenticated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// No `Authorization: Bearer` header
    #[error("no bearer token in request")]
    MissingToken,

    /// Token present but invalid
    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

impl AuthFailure {
    /// Tag for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "MissingToken",
            Self::Rejected(e) => e.kind().as_str(),
        }
    }
}

/// Extract the token from an `Authorization` header value
///
/// Returns `None` unless the value starts with `Bearer ` and has something
/// after it.
pub fn bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication strategy, chosen once at startup
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Validate bearer tokens
    RealJwtValidation(Arc<TokenValidator>),
    /// Skip validation and attach this user to every request
    FixedTestIdentity(User),
}

impl AuthStrategy {
    /// Build the strategy for `mode`
    ///
    /// Development mode ignores `settings` and uses [`User::development`].
    ///
    /// # Errors
    ///
    /// [`SettingsError::MissingInProduction`] when production has no settings,
    /// or [`SettingsError::KeySource`] if the HTTP client cannot be built.
    pub fn from_mode(
        mode: RuntimeMode,
        settings: Option<&AuthSettings>,
    ) -> Result<Self, SettingsError> {
        match mode {
            RuntimeMode::Development => {
                info!("Development mode: requests use a fixed identity");
                Ok(Self::FixedTestIdentity(User::development()))
            }
            RuntimeMode::Production => {
                let settings = settings.ok_or(SettingsError::MissingInProduction)?;
                settings.validate()?;
                let validator = TokenValidator::from_settings(settings)?;
                info!(
                    issuer = %settings.issuer,
                    jwks_uri = %settings.jwks_endpoint,
                    cache_ttl_secs = settings.jwks_cache_ttl.as_secs(),
                    "Bearer token validation enabled"
                );
                Ok(Self::RealJwtValidation(Arc::new(validator)))
            }
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::RealJwtValidation(_) => "jwt",
            Self::FixedTestIdentity(_) => "fixed-identity",
        }
    }

    /// Authenticate a request given its `Authorization` header value
    ///
    /// # Errors
    ///
    /// [`AuthFailure::MissingToken`] without a bearer token, or
    /// [`AuthFailure::Rejected`] when validation fails. The fixed identity
    /// strategy never fails.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Identity, AuthFailure> {
        match self {
            Self::FixedTestIdentity(user) => Ok(Identity::fixed(user.clone())),
            Self::RealJwtValidation(validator) => {
                let token = authorization
                    .and_then(bearer_token)
                    .ok_or(AuthFailure::MissingToken)?;
                let claims = validator.verify(token).await?;
                Ok(Identity::from_claims(claims))
            }
        }
    }
}
