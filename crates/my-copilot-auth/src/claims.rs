//! Identity claims schema
//!
//! The validator treats the payload as opaque. This module is where the
//! application-level claims (`name`, `preferred_username`, `groups`) are read
//! into a typed [`User`]. Mapping problems are reported as [`ClaimsError`]
//! and are not fatal: a token that validated still authenticates the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::jwt::RawClaims;

/// Display name claim, formatted `"<last>, <first>"`
pub const NAME_CLAIM: &str = "name";
/// Login name claim, used as the email address
pub const USERNAME_CLAIM: &str = "preferred_username";
/// Group object ids
pub const GROUPS_CLAIM: &str = "groups";

/// Why the claims did not map to a [`User`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// Claim is absent
    #[error("missing claim `{0}`")]
    Missing(&'static str),

    /// Claim is present with the wrong JSON type
    #[error("malformed claim `{claim}`: {reason}")]
    Malformed {
        /// Claim name
        claim: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// `name` is not `"<last>, <first>"`
    #[error("claim `name` is not in \"Last, First\" format: {0:?}")]
    UnexpectedNameFormat(String),
}

/// The signed-in user as the rest of the application sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Given name(s)
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Lower-cased `preferred_username`
    pub email: String,
    /// Group ids, empty when the claim is absent
    #[serde(default)]
    pub groups: Vec<String>,
}

impl User {
    /// Map validated claims to a user
    ///
    /// # Errors
    ///
    /// [`ClaimsError`] when `name` or `preferred_username` is missing or not
    /// a string, `name` has no `", "` separator, or `groups` is not an array
    /// of strings.
    pub fn from_claims(claims: &RawClaims) -> Result<Self, ClaimsError> {
        let name = string_claim(claims, NAME_CLAIM)?;
        let (last_name, first_name) = name
            .split_once(", ")
            .ok_or_else(|| ClaimsError::UnexpectedNameFormat(name.to_string()))?;

        let email = string_claim(claims, USERNAME_CLAIM)?.to_lowercase();

        let groups = match claims.get(GROUPS_CLAIM) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ClaimsError::Malformed {
                            claim: GROUPS_CLAIM,
                            reason: format!("expected string entries, found {item}"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ClaimsError::Malformed {
                    claim: GROUPS_CLAIM,
                    reason: format!("expected an array, found {other}"),
                });
            }
        };

        Ok(Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            groups,
        })
    }

    /// The fixed identity used when validation is switched off
    pub fn development() -> Self {
        Self {
            first_name: "Ola Kari".to_string(),
            last_name: "Nordmann".to_string(),
            email: "dev@localhost".to_string(),
            groups: Vec::new(),
        }
    }

    /// `"<first> <last>"`
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

fn string_claim<'a>(claims: &'a RawClaims, claim: &'static str) -> Result<&'a str, ClaimsError> {
    match claims.get(claim) {
        None | Some(Value::Null) => Err(ClaimsError::Missing(claim)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ClaimsError::Malformed {
            claim,
            reason: format!("expected a string, found {other}"),
        }),
    }
}

/// What the gate attaches to an authenticated request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    /// Mapped user, absent when the claims did not map
    pub user: Option<User>,
    /// Validated token payload; empty for the fixed identity
    pub claims: RawClaims,
}

impl Identity {
    /// Build from validated claims, logging any mapping problem
    pub fn from_claims(claims: RawClaims) -> Self {
        let user = match User::from_claims(&claims) {
            Ok(user) => Some(user),
            Err(error) => {
                warn!(error = %error, "Token claims did not map to a user");
                None
            }
        };
        Self { user, claims }
    }

    /// A fixed identity with no token behind it
    pub fn fixed(user: User) -> Self {
        Self {
            user: Some(user),
            claims: RawClaims::new(),
        }
    }
}
