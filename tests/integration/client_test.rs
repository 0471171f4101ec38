//! Tests for the EST-backed enrollment client against a wiremock server.

use base64::prelude::*;
use url::Url;
use wiremock::matchers::{body_bytes, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auto_pki_client::enrollment::{EnrollmentClient, EnrollmentOutcome, EstEnrollmentClient};
use auto_pki_client::ProvisionError;

const PATH_CACERTS: &str = "/.well-known/est/cacerts";
const PATH_SIMPLEENROLL: &str = "/.well-known/est/simpleenroll";

async fn client_for(server: &MockServer) -> EstEnrollmentClient {
    let url = Url::parse(&server.uri()).unwrap();
    EstEnrollmentClient::with_base_url(url, None).unwrap()
}

#[tokio::test]
async fn test_enroll_issued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_SIMPLEENROLL))
        .and(header("Content-Type", "application/pkcs10"))
        .and(body_bytes(b"CSR-BYTES".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ISSUED-CERT".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let outcome = client.enroll(b"CSR-BYTES").await;
    assert_eq!(outcome, EnrollmentOutcome::Issued(b"ISSUED-CERT".to_vec()));
}

#[tokio::test]
async fn test_enroll_deferred_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_SIMPLEENROLL))
        .respond_with(ResponseTemplate::new(202).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let outcome = client.enroll(b"CSR").await;
    assert_eq!(outcome, EnrollmentOutcome::Deferred { wait_secs: 30 });
}

#[tokio::test]
async fn test_enroll_deferred_without_retry_after_uses_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_SIMPLEENROLL))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let outcome = client.enroll(b"CSR").await;
    assert_eq!(outcome, EnrollmentOutcome::Deferred { wait_secs: 60 });
}

#[tokio::test]
async fn test_enroll_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_SIMPLEENROLL))
        .respond_with(ResponseTemplate::new(400).set_body_string("malformed CSR"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    match client.enroll(b"CSR").await {
        EnrollmentOutcome::Rejected { message } => {
            assert!(message.contains("400"));
            assert!(message.contains("malformed CSR"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_enroll_sends_basic_auth() {
    let server = MockServer::start().await;
    let expected = format!(
        "Basic {}",
        BASE64_STANDARD.encode("bootstrap:bootstrap")
    );
    Mock::given(method("POST"))
        .and(path(PATH_SIMPLEENROLL))
        .and(header("Authorization", expected.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CERT".to_vec()))
        .mount(&server)
        .await;

    let mut client = client_for(&server).await;
    client.set_credentials("bootstrap", "bootstrap");
    let outcome = client.enroll(b"CSR").await;
    assert_eq!(outcome, EnrollmentOutcome::Issued(b"CERT".to_vec()));
}

#[tokio::test]
async fn test_enroll_unreachable_server_is_transport_failure() {
    // Nothing listens on port 1.
    let url = Url::parse("http://127.0.0.1:1").unwrap();
    let client = EstEnrollmentClient::with_base_url(url, None).unwrap();

    match client.enroll(b"CSR").await {
        EnrollmentOutcome::TransportFailed { .. } => {}
        other => panic!("expected TransportFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_trust_anchor_returns_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PATH_CACERTS))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ANCHOR-PEM".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let anchor = client.fetch_trust_anchor().await.unwrap();
    assert_eq!(anchor, b"ANCHOR-PEM");
}

#[tokio::test]
async fn test_fetch_trust_anchor_server_error_is_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PATH_CACERTS))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_trust_anchor().await.unwrap_err();
    assert!(matches!(err, ProvisionError::Transport(_)));
    assert_eq!(err.exit_code(), 8);
}
