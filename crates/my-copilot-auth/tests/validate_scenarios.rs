//! End-to-end validation scenarios
//!
//! Tokens are genuinely RS256-signed with fixture keys and key sets are served
//! over HTTP by a mock identity provider, so every step of the pipeline runs
//! for real.

mod common;

use std::time::Duration;

use common::*;
use my_copilot_auth::{HttpKeySetSource, TokenValidator, ValidationErrorKind, validate};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method};
use wiremock::{Mock, ResponseTemplate};

async fn provider_with_key_a() -> MockJwksServer {
    let idp = MockJwksServer::start().await;
    idp.mock_jwks(vec![rsa_jwk(KID, MODULUS_A)]).await;
    idp
}

#[tokio::test]
async fn test_valid_token_returns_payload() {
    // GIVEN: a token signed with key A and a key set publishing key A
    let idp = provider_with_key_a().await;
    let claims = valid_claims(current_timestamp());
    let token = mint_token(Some(KID), &claims, SIGNING_KEY_A);

    // WHEN
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    // THEN
    assert!(result.is_valid(), "unexpected error: {:?}", result.error());
    assert_eq!(result.payload(), Some(&as_claims(&claims)));
    assert!(result.error().is_none());
}

#[tokio::test]
async fn test_minimal_claims_scenario() {
    let idp = provider_with_key_a().await;
    let now = current_timestamp();
    let claims = json!({"aud": "clientId", "iss": "issuer", "nbf": now - 10, "exp": now + 3600});
    let token = mint_token(Some("123"), &claims, SIGNING_KEY_A);

    let result = validate(&token, "clientId", "issuer", &idp.jwks_endpoint).await;

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"isValid": true, "payload": claims})
    );
}

#[tokio::test]
async fn test_empty_endpoint() {
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let result = validate(&token, CLIENT_ID, ISSUER, "").await;

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"isValid": false, "error": "Public key endpoint is not defined."})
    );
}

#[tokio::test]
async fn test_malformed_tokens_never_reach_network() {
    let idp = provider_with_key_a().await;

    for token in ["", "abc", "a.b", "a.b.c.d", "a..c", ".b.c", "a.b."] {
        let result = validate(token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
        assert_eq!(
            result.error().map(|e| e.kind()),
            Some(ValidationErrorKind::MalformedToken),
            "token {token:?}"
        );
        assert_eq!(result.error().unwrap().to_string(), "Invalid token format.");
    }

    assert_eq!(idp.request_count().await, 0);
}

#[tokio::test]
async fn test_undecodable_segments() {
    let idp = provider_with_key_a().await;
    let payload = URL_SAFE_JSON_OBJECT;

    for token in [
        format!("!!!.{payload}.c2ln"),
        format!("{payload}.!!!.c2ln"),
        // "bm90IGpzb24" is base64url for "not json"
        format!("{payload}.bm90IGpzb24.c2ln"),
    ] {
        let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
        let error = result.error().expect("decode failure");
        assert_eq!(error.kind(), ValidationErrorKind::DecodeError);
        assert!(error.to_string().starts_with("Error decoding token: "));
    }

    assert_eq!(idp.request_count().await, 0);
}

// base64url of `{}`
const URL_SAFE_JSON_OBJECT: &str = "e30";

#[tokio::test]
async fn test_algorithm_checked_first() {
    let token = unsigned_token(
        &json!({"alg": "HS256", "kid": KID}),
        &json!({"aud": "someone-else", "iss": "elsewhere"}),
    );

    let result = validate(&token, CLIENT_ID, ISSUER, "https://unused.invalid/keys").await;

    assert_eq!(
        result.error().unwrap().to_string(),
        "Invalid algorithm. Expected: RS256, got: HS256."
    );
}

#[tokio::test]
async fn test_audience_then_issuer() {
    let now = current_timestamp();
    let header = json!({"alg": "RS256", "kid": KID});

    let mut claims = valid_claims(now);
    claims["aud"] = json!("clientId");
    claims["iss"] = json!("wrongIssuer");
    let token = unsigned_token(&header, &claims);
    let result = validate(&token, "wrongClientId", ISSUER, "").await;
    assert_eq!(
        result.error().unwrap().to_string(),
        "Invalid audience. Expected: wrongClientId, got: clientId."
    );

    let result = validate(&token, "clientId", "issuer", "").await;
    assert_eq!(
        result.error().unwrap().to_string(),
        "Invalid issuer. Expected: issuer, got: wrongIssuer."
    );
}

#[tokio::test]
async fn test_time_window() {
    let idp = provider_with_key_a().await;
    let now = current_timestamp();

    let mut expired = valid_claims(now);
    expired["exp"] = json!(now - 3600);
    let token = mint_token(Some(KID), &expired, SIGNING_KEY_A);
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
    assert_eq!(result.error().unwrap().to_string(), "Token is expired.");

    let mut early = valid_claims(now);
    early["nbf"] = json!(now + 3600);
    let token = mint_token(Some(KID), &early, SIGNING_KEY_A);
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
    assert_eq!(result.error().unwrap().to_string(), "Token is not yet valid.");

    // Rejected on time alone, even though the signature is genuine
    assert_eq!(idp.request_count().await, 0);
}

#[tokio::test]
async fn test_unknown_kid() {
    let idp = MockJwksServer::start().await;
    idp.mock_jwks(vec![rsa_jwk("other", MODULUS_A)]).await;
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert_eq!(
        result.error().unwrap().to_string(),
        "Public key not found in JWKS endpoint."
    );
}

#[tokio::test]
async fn test_header_without_kid_is_not_found() {
    let idp = provider_with_key_a().await;
    let token = mint_token(None, &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert_eq!(
        result.error().map(|e| e.kind()),
        Some(ValidationErrorKind::KeyNotFound)
    );
}

#[tokio::test]
async fn test_signature_from_other_key() {
    // Key set publishes key A under the token's kid, token is signed with key B
    let idp = provider_with_key_a().await;
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_B);

    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert_eq!(
        result.error().unwrap().to_string(),
        "Invalid signature. The token's signature does not match the expected value."
    );
}

#[tokio::test]
async fn test_tampered_payload() {
    let idp = provider_with_key_a().await;
    let now = current_timestamp();
    let token = mint_token(Some(KID), &valid_claims(now), SIGNING_KEY_A);

    let mut forged = valid_claims(now);
    forged["groups"] = json!(["admins"]);
    let forged_segment = unsigned_token(&json!({}), &forged)
        .split('.')
        .nth(1)
        .map(str::to_string)
        .unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    let tampered = format!("{}.{}.{}", parts[0], forged_segment, parts[2]);

    let result = validate(&tampered, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert_eq!(
        result.error().map(|e| e.kind()),
        Some(ValidationErrorKind::InvalidSignature)
    );
}

#[tokio::test]
async fn test_undecodable_signature() {
    let idp = provider_with_key_a().await;
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);
    let (signed_part, _) = token.rsplit_once('.').unwrap();

    let tampered = format!("{signed_part}.!!!");
    let result = validate(&tampered, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    let error = result.error().unwrap();
    assert_eq!(error.kind(), ValidationErrorKind::SignatureVerificationError);
    assert!(error.to_string().starts_with("Error verifying signature: "));
}

#[tokio::test]
async fn test_standard_alphabet_signature_accepted() {
    use base64::Engine;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    let idp = provider_with_key_a().await;
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);
    let (signed_part, signature) = token.rsplit_once('.').unwrap();
    let standard = STANDARD.encode(URL_SAFE_NO_PAD.decode(signature).unwrap());

    let reencoded = format!("{signed_part}.{standard}");
    let result = validate(&reencoded, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert!(result.is_valid(), "unexpected error: {:?}", result.error());
}

#[tokio::test]
async fn test_key_import_failures() {
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    for key in [
        json!({"kid": KID, "kty": "EC", "crv": "P-256", "x": "AA", "y": "AA"}),
        json!({"kid": KID, "kty": "RSA", "e": "AQAB"}),
        json!({"kid": KID, "kty": "RSA", "n": "***", "e": "AQAB"}),
        // Decodes cleanly but is no usable RSA key
        json!({"kid": KID, "kty": "RSA", "n": "AQAB", "e": "AQAB"}),
        json!({"kid": KID, "kty": "RSA", "n": MODULUS_A.trim(), "e": "AQ"}),
    ] {
        let idp = MockJwksServer::start().await;
        idp.mock_jwks(vec![key.clone()]).await;

        let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

        let error = result.error().unwrap();
        assert_eq!(error.kind(), ValidationErrorKind::KeyImportError, "key {key}");
        assert!(error.to_string().starts_with("Error importing public key: "));
    }
}

#[tokio::test]
async fn test_fetch_failures() {
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let idp = MockJwksServer::start().await;
    idp.mock_response(ResponseTemplate::new(500)).await;
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
    assert_eq!(
        result.error().unwrap().to_string(),
        "Error fetching JWKS: JWKS endpoint returned status 500 Internal Server Error"
    );

    let idp = MockJwksServer::start().await;
    idp.mock_response(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .await;
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
    assert_eq!(
        result.error().map(|e| e.kind()),
        Some(ValidationErrorKind::JwksFetchError)
    );

    let idp = MockJwksServer::start().await;
    idp.mock_response(ResponseTemplate::new(200).set_body_json(json!({"no_keys": []})))
        .await;
    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;
    assert_eq!(
        result.error().map(|e| e.kind()),
        Some(ValidationErrorKind::JwksFetchError)
    );

    // Nothing listening
    let result = validate(&token, CLIENT_ID, ISSUER, "http://127.0.0.1:9/keys").await;
    assert_eq!(
        result.error().map(|e| e.kind()),
        Some(ValidationErrorKind::JwksFetchError)
    );
}

#[tokio::test]
async fn test_fetch_times_out() {
    let idp = MockJwksServer::start().await;
    idp.mock_response(
        ResponseTemplate::new(200)
            .set_body_json(json!({"keys": [rsa_jwk(KID, MODULUS_A)]}))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let source = Arc::new(HttpKeySetSource::with_timeout(Duration::from_millis(200)).unwrap());
    let validator = TokenValidator::new(CLIENT_ID, ISSUER, &idp.jwks_endpoint, source);
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let error = validator.verify(&token).await.unwrap_err();
    assert_eq!(error.kind(), ValidationErrorKind::JwksFetchError);
}

#[tokio::test]
async fn test_sends_cache_hint() {
    let idp = MockJwksServer::start().await;
    Mock::given(method("GET"))
        .and(header("cache-control", "max-age=3600"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"keys": [rsa_jwk(KID, MODULUS_A)]})),
        )
        .expect(1)
        .mount(&idp.server)
        .await;
    let token = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);

    let result = validate(&token, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await;

    assert!(result.is_valid(), "unexpected error: {:?}", result.error());
}

#[tokio::test]
async fn test_key_rotation_with_two_published_keys() {
    let idp = MockJwksServer::start().await;
    idp.mock_jwks(vec![rsa_jwk("old", MODULUS_A), rsa_jwk("new", MODULUS_B)])
        .await;
    let claims = valid_claims(current_timestamp());

    let old = mint_token(Some("old"), &claims, SIGNING_KEY_A);
    let new = mint_token(Some("new"), &claims, SIGNING_KEY_B);
    let crossed = mint_token(Some("new"), &claims, SIGNING_KEY_A);

    assert!(validate(&old, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await.is_valid());
    assert!(validate(&new, CLIENT_ID, ISSUER, &idp.jwks_endpoint).await.is_valid());
    assert_eq!(
        validate(&crossed, CLIENT_ID, ISSUER, &idp.jwks_endpoint)
            .await
            .error()
            .map(|e| e.kind()),
        Some(ValidationErrorKind::InvalidSignature)
    );
}

#[tokio::test]
async fn test_idempotent() {
    let source = Arc::new(StaticKeySource::new(vec![rsa_jwk(KID, MODULUS_A)]));
    let validator = TokenValidator::new(CLIENT_ID, ISSUER, "https://idp/keys", source.clone());

    let good = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_A);
    let bad = mint_token(Some(KID), &valid_claims(current_timestamp()), SIGNING_KEY_B);

    assert_eq!(validator.validate(&good).await, validator.validate(&good).await);
    assert_eq!(validator.validate(&bad).await, validator.validate(&bad).await);
    assert_eq!(source.counter().load(std::sync::atomic::Ordering::SeqCst), 4);
}
