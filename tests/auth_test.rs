//! Authentication, rate limiting and upload limits on `POST /api/convert`.

mod common;

use common::{TestHarness, API_KEY, OTHER_KEY};
use serde_json::Value;

#[tokio::test]
async fn missing_key_is_unauthorized() {
    let h = TestHarness::start().await;
    let resp = h.submit_with_key(None, "a.png", b"a".to_vec(), "jpg").await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "unauthorized");
    assert!(body["error"].as_str().unwrap().contains("Missing X-API-Key"));
    assert_eq!(h.stub().calls(), 0);
}

#[tokio::test]
async fn wrong_key_is_unauthorized() {
    let h = TestHarness::start().await;
    let resp = h
        .submit_with_key(Some("guess"), "a.png", b"a".to_vec(), "jpg")
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid API key"));
}

#[tokio::test]
async fn read_endpoints_need_no_key() {
    let h = TestHarness::start().await;
    for path in ["/api/formats", "/api/files", "/api/test", "/health"] {
        let resp = h.client.get(h.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200, "GET {path}");
    }
}

#[tokio::test]
async fn disabled_auth_accepts_anonymous_uploads() {
    let h = TestHarness::builder()
        .config(|c| c.auth.enabled = false)
        .start()
        .await;
    let resp = h.submit_with_key(None, "a.png", b"a".to_vec(), "jpg").await;
    assert_eq!(resp.status(), 202);
}

#[tokio::test]
async fn rate_limit_is_per_key() {
    let h = TestHarness::builder()
        .config(|c| c.auth.rate_limit_per_minute = 1)
        .start()
        .await;

    let resp = h.submit_with_key(Some(API_KEY), "a.png", b"a".to_vec(), "jpg").await;
    assert_eq!(resp.status(), 202);

    let resp = h.submit_with_key(Some(API_KEY), "b.png", b"b".to_vec(), "jpg").await;
    assert_eq!(resp.status(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "rate_limited");

    let resp = h.submit_with_key(Some(OTHER_KEY), "c.png", b"c".to_vec(), "jpg").await;
    assert_eq!(resp.status(), 202);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let h = TestHarness::builder()
        .config(|c| c.server.max_upload_bytes = 1024)
        .start()
        .await;

    let resp = h.submit("big.png", &vec![7u8; 4096], "jpg").await;
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "payload_too_large");

    let resp = h.submit("small.png", &[7u8; 512], "jpg").await;
    assert_eq!(resp.status(), 202);
    assert_eq!(h.jobs.queue_stats().capacity, 16);
}

#[tokio::test]
async fn rejected_requests_carry_request_id() {
    let h = TestHarness::start().await;
    let form = reqwest::multipart::Form::new().text("target_format", "jpg");
    let resp = h
        .client
        .post(h.url("/api/convert"))
        .header("x-request-id", "req-42")
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers()["x-request-id"], "req-42");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["request_id"], "req-42");
}
