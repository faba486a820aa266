//! Command-line and environment configuration
//!
//! Every flag has an environment fallback so the gate can run unchanged in a
//! container where the identity provider settings are injected as env vars.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use my_copilot_auth::{AuthSettings, AuthStrategy, RuntimeMode, SettingsError};

use crate::logging::LogFormat;

/// my-copilot-gate - authentication gate for the my-copilot dashboard
#[derive(Parser, Debug)]
#[command(
    name = "my-copilot-gate",
    version,
    about = "Validates bearer tokens and serves the my-copilot API behind an authentication gate"
)]
pub struct Cli {
    /// Runtime mode: `production` validates tokens, `development` uses a fixed identity
    #[arg(long, env = "MY_COPILOT_MODE", default_value = "production")]
    pub mode: RuntimeMode,

    /// Address to listen on
    #[arg(long, env = "MY_COPILOT_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Expected token audience (application client id)
    #[arg(long, env = "AZURE_APP_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Expected token issuer
    #[arg(long, env = "AZURE_OPENID_CONFIG_ISSUER")]
    pub issuer: Option<String>,

    /// JWKS endpoint of the identity provider
    #[arg(long, env = "AZURE_OPENID_CONFIG_JWKS_URI")]
    pub jwks_uri: Option<String>,

    /// Seconds a fetched key set is reused
    #[arg(long, env = "JWKS_CACHE_TTL_SECS", default_value_t = 600)]
    pub jwks_cache_ttl_secs: u64,

    /// Seconds before a key set request is abandoned
    #[arg(long, env = "JWKS_TIMEOUT_SECS", default_value_t = 10)]
    pub jwks_timeout_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Identity provider settings, if all three values were given
    ///
    /// # Errors
    ///
    /// [`SettingsError`] when the values are present but invalid.
    pub fn auth_settings(&self) -> Result<Option<AuthSettings>, SettingsError> {
        let (Some(client_id), Some(issuer), Some(jwks_uri)) =
            (&self.client_id, &self.issuer, &self.jwks_uri)
        else {
            return Ok(None);
        };

        let settings = AuthSettings::new(client_id.as_str(), issuer.as_str(), jwks_uri.as_str())?
            .with_cache_ttl(Duration::from_secs(self.jwks_cache_ttl_secs))
            .with_timeout(Duration::from_secs(self.jwks_timeout_secs))?;
        Ok(Some(settings))
    }

    /// Build the authentication strategy for the configured mode
    ///
    /// # Errors
    ///
    /// [`SettingsError`] when production settings are missing or invalid.
    pub fn strategy(&self) -> Result<AuthStrategy, SettingsError> {
        match self.mode {
            RuntimeMode::Development => AuthStrategy::from_mode(RuntimeMode::Development, None),
            RuntimeMode::Production => {
                AuthStrategy::from_mode(RuntimeMode::Production, self.auth_settings()?.as_ref())
            }
        }
    }
}
