use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use octofhir_auth::{AssertionSigner, AuthError, KeyStore, TokenExchanger};
use p384::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key_store() -> Arc<KeyStore> {
    let secret = p384::SecretKey::random(&mut OsRng);
    let point = secret.public_key().to_encoded_point(false);
    let doc = json!({"keys": [{
        "kty": "EC",
        "kid": "lab-key",
        "alg": "ES384",
        "crv": "P-384",
        "d": URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
        "y": URL_SAFE_NO_PAD.encode(point.y().unwrap()),
    }]});
    Arc::new(KeyStore::from_json(&doc.to_string()).expect("valid key set"))
}

fn exchanger(server: &MockServer) -> TokenExchanger {
    let signer = AssertionSigner::new(
        key_store(),
        "client-123",
        format!("{}/oauth2/token", server.uri()),
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    TokenExchanger::new(http, signer)
}

#[tokio::test]
async fn exchange_returns_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains(
            "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("client_assertion=ey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-abc",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "system/Patient.read system/Observation.read"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = exchanger(&server).fetch_token().await.expect("token");
    assert_eq!(token.secret(), "token-abc");
    assert_eq!(token.expires_in(), Some(Duration::from_secs(3600)));
}

#[tokio::test]
async fn rejected_request_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_client"}"#))
        .mount(&server)
        .await;

    let err = exchanger(&server).fetch_token().await.unwrap_err();
    match &err {
        AuthError::TokenRequest { status, body } => {
            assert_eq!(*status, 400);
            assert!(body.contains("invalid_client"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_authentication_error());
}

#[tokio::test]
async fn malformed_token_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = exchanger(&server).fetch_token().await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidTokenResponse { .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Nothing listens on a port once its listener is dropped.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let signer = AssertionSigner::new(
        key_store(),
        "client-123",
        format!("http://127.0.0.1:{port}/oauth2/token"),
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("client");
    let err = TokenExchanger::new(http, signer).fetch_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Transport { .. }), "unexpected error: {err:?}");
}
