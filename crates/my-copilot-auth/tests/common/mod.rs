//! Common test utilities for integration tests
//!
//! Shared infrastructure for minting RS256 tokens with fixture keys and
//! serving key sets from a mock identity provider.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use my_copilot_auth::{JwkSet, JwksError, KeySetSource, RawClaims};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "clientId";
pub const ISSUER: &str = "issuer";
pub const KID: &str = "123";

/// PKCS#8 signing key whose public half is [`MODULUS_A`]
pub const SIGNING_KEY_A: &str = include_str!("../fixtures/signing_key_a.pem");
/// PKCS#8 signing key whose public half is [`MODULUS_B`]
pub const SIGNING_KEY_B: &str = include_str!("../fixtures/signing_key_b.pem");
/// Base64url RSA modulus of key A
pub const MODULUS_A: &str = include_str!("../fixtures/modulus_a.txt");
/// Base64url RSA modulus of key B
pub const MODULUS_B: &str = include_str!("../fixtures/modulus_b.txt");

/// Mock identity provider serving a JWKS document
pub struct MockJwksServer {
    pub server: MockServer,
    pub jwks_endpoint: String,
}

impl MockJwksServer {
    /// Start a mock server; nothing is mounted yet
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let jwks_endpoint = format!("{}/discovery/v2.0/keys", server.uri());
        Self {
            server,
            jwks_endpoint,
        }
    }

    /// Serve `keys` as the key set
    pub async fn mock_jwks(&self, keys: Vec<Value>) {
        self.mock_response(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .await;
    }

    /// Serve an arbitrary response at the JWKS path
    pub async fn mock_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/discovery/v2.0/keys"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Number of requests the server has seen
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

/// JWK for an RS256 signing key with exponent 65537
pub fn rsa_jwk(kid: &str, modulus: &str) -> Value {
    json!({
        "kty": "RSA",
        "use": "sig",
        "kid": kid,
        "n": modulus.trim(),
        "e": "AQAB"
    })
}

/// Current Unix time in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before 1970")
        .as_secs()
}

/// Claims that pass every check at `now`
pub fn valid_claims(now: u64) -> Value {
    json!({
        "aud": CLIENT_ID,
        "iss": ISSUER,
        "nbf": now - 10,
        "exp": now + 3600,
        "name": "Nordmann, Ola Kari",
        "preferred_username": "Ola.Kari.Nordmann@nav.no",
        "groups": ["group-a"]
    })
}

/// Sign `claims` with `pem` under `kid`
pub fn mint_token(kid: Option<&str>, claims: &Value, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("token encodes")
}

/// A token with arbitrary header and payload and a fixed junk signature
pub fn unsigned_token(header: &Value, payload: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string()),
        URL_SAFE_NO_PAD.encode(b"not a signature")
    )
}

/// Convert a JSON object literal into claims
pub fn as_claims(value: &Value) -> RawClaims {
    value.as_object().cloned().expect("claims literal is an object")
}

/// Key source that serves a fixed key set and counts fetches
#[derive(Debug)]
pub struct StaticKeySource {
    keys: JwkSet,
    calls: Arc<AtomicUsize>,
}

impl StaticKeySource {
    pub fn new(keys: Vec<Value>) -> Self {
        let keys = serde_json::from_value(json!({ "keys": keys })).expect("valid key set");
        Self {
            keys,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared fetch counter
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySource {
    async fn fetch(&self, _endpoint: &str) -> Result<JwkSet, JwksError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.keys.clone())
    }
}
