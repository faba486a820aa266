//! # Authentication gate for Tower/axum
//!
//! [`AuthGateLayer`] wraps a service so every request is authenticated with an
//! [`AuthStrategy`](crate::AuthStrategy) before it reaches the handler.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use my_copilot_auth::{AuthStrategy, RuntimeMode};
//! use my_copilot_auth::gate::AuthGateLayer;
//!
//! let strategy = AuthStrategy::from_mode(RuntimeMode::Production, Some(&settings))?;
//! let app = axum::Router::new()
//!     .route("/api/me", get(me))
//!     .layer(AuthGateLayer::new(strategy));
//! ```
//!
//! ## Request Extensions
//!
//! On success the [`Identity`](crate::Identity) is inserted into the request's
//! extensions:
//!
//! ```rust,ignore
//! if let Some(identity) = req.extensions().get::<Identity>() {
//!     println!("signed in as {:?}", identity.user);
//! }
//! ```
//!
//! ## Rejections
//!
//! Requests without a valid token get a `307 Temporary Redirect` to the login
//! path, or a bare `401` with [`FailureMode::Unauthorized`]. The specific
//! failure is only logged.

mod layer;
mod service;

pub use layer::AuthGateLayer;
pub use service::{AuthGateFuture, AuthGateService};

/// Where unauthenticated browsers are sent
pub const DEFAULT_LOGIN_PATH: &str = "/oauth2/login";

/// Path prefixes served without authentication, without the leading `/`
pub const DEFAULT_BYPASS_PREFIXES: &[&str] = &[
    "_next/static",
    "_next/image",
    "favicon.ico",
    "sitemap.xml",
    "robots.txt",
    "health",
    "metrics",
];

/// What a rejected request gets back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// `307` to the login path
    #[default]
    Redirect,
    /// `401` with `WWW-Authenticate: Bearer`
    Unauthorized,
}

/// Gate configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Login path, also exempt from the gate
    pub login_path: String,
    /// Path prefixes (no leading `/`) that skip authentication
    pub bypass_prefixes: Vec<String>,
    /// Response for rejected requests
    pub failure_mode: FailureMode,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            bypass_prefixes: DEFAULT_BYPASS_PREFIXES
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            failure_mode: FailureMode::Redirect,
        }
    }
}

impl GateConfig {
    /// Reply `401` instead of redirecting
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            failure_mode: FailureMode::Unauthorized,
            ..Default::default()
        }
    }

    /// Set the login path
    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Add a bypass prefix; a leading `/` is ignored
    #[must_use]
    pub fn bypass_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.strip_prefix('/').map(str::to_string).unwrap_or(prefix);
        self.bypass_prefixes.push(prefix);
        self
    }

    /// Set the failure mode
    #[must_use]
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Whether `path` skips authentication
    pub fn should_bypass(&self, path: &str) -> bool {
        if path == self.login_path {
            return true;
        }
        let relative = path.strip_prefix('/').unwrap_or(path);
        self.bypass_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && relative.starts_with(prefix.as_str()))
    }
}
