//! # my-copilot-auth - Bearer Token Validation and Authentication Gate
//!
//! Authentication for the my-copilot dashboard. Every inbound request passes
//! through a gate that extracts the `Authorization: Bearer` token, validates it
//! as an RS256-signed JWT issued by the identity provider, and either forwards
//! the request with the caller's identity attached or sends the browser to the
//! login endpoint.
//!
//! ## Design Principles
//!
//! - **Total validation**: [`TokenValidator`] never panics and never returns a
//!   bare transport error; every failure is one tagged [`ValidationError`]
//! - **Fixed check order**: structure, decode, algorithm, audience, issuer,
//!   expiry, not-before, key endpoint, key set, key, signature
//! - **Explicit configuration**: [`AuthSettings`] and [`AuthStrategy`] are
//!   chosen once at startup, including the development identity
//! - **Injectable key sets**: JWKS retrieval sits behind [`KeySetSource`] so
//!   caching and transport are swappable and testable
//!
//! ## Architecture
//!
//! - [`jwt`] - compact token parsing, the validator, JWKS retrieval and caching
//! - [`error`] - the validation error taxonomy
//! - [`claims`] - identity claims schema and the [`User`] mapping
//! - [`config`] - startup settings and runtime mode
//! - [`strategy`] - real validation vs. fixed test identity
//! - `gate` - Tower layer/service that enforces authentication (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use my_copilot_auth::validate;
//!
//! # tokio_test_block_on(async {
//! let result = validate(
//!     "eyJhbGciOiJSUzI1NiIsImtpZCI6IjEyMyJ9...",
//!     "my-client-id",
//!     "https://login.example.com/tenant/v2.0",
//!     "https://login.example.com/tenant/discovery/v2.0/keys",
//! )
//! .await;
//!
//! if let Some(error) = result.error() {
//!     eprintln!("rejected ({}): {error}", error.kind());
//! }
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(_: F) {}
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower [`gate::AuthGateLayer`] and [`gate::AuthGateService`]

pub mod claims;
pub mod config;
pub mod error;
#[cfg(feature = "middleware")]
pub mod gate;
pub mod jwt;
pub mod strategy;

#[doc(inline)]
pub use claims::{ClaimsError, Identity, User};

#[doc(inline)]
pub use config::{AuthSettings, RuntimeMode, SettingsError};

#[doc(inline)]
pub use error::{ValidationError, ValidationErrorKind};

#[doc(inline)]
pub use jwt::{
    CachedKeySetSource, Clock, FixedClock, HttpKeySetSource, Jwk, JwkSet, JwksError,
    KeySetSource, RawClaims, SystemClock, TokenValidator, ValidationResult, validate,
};

#[doc(inline)]
pub use strategy::{AuthFailure, AuthStrategy, bearer_token};
