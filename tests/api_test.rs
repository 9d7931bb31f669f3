//! API integration tests for the read-only endpoints and housekeeping.
//!
//! Each test runs a [`TestHarness`] server on a random port with an
//! in-memory SQLite database.

mod common;

use std::time::Duration;

use common::TestHarness;
use nb_convert::{Capability, CapabilityRegistry};
use nb_server::jobs::sweeper::{sweep_once, SweepPolicy};
use serde_json::Value;

async fn get_json(h: &TestHarness, path: &str) -> Value {
    let resp = h.client.get(h.url(path)).send().await.unwrap();
    assert_eq!(resp.status(), 200, "GET {path}");
    resp.json().await.unwrap()
}

// ---------------------------------------------------------------------------
// Health and liveness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_queue_and_capabilities() {
    let h = TestHarness::start().await;
    let body = get_json(&h, "/health").await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
    assert_eq!(body["queue"]["capacity"], 16);
    assert_eq!(body["queue"]["depth"], 0);
    assert_eq!(body["workers"], 2);
    assert_eq!(body["jobs"]["processing"], 0);
    assert_eq!(body["capabilities"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn api_test_reports_storage() {
    let h = TestHarness::start().await;
    let body = get_json(&h, "/api/test").await;
    assert_eq!(body["status"], "working");
    assert_eq!(body["message"], "NodeBlack API is running");
    assert_eq!(body["storage_exists"]["input"], false);

    // Directories appear with the first upload.
    let id = h.submit_ok("a.png", b"a", "jpg").await;
    h.wait_for(&id, "ready").await;
    let body = get_json(&h, "/api/test").await;
    assert_eq!(body["storage_exists"]["input"], true);
    assert_eq!(get_json(&h, "/health").await["jobs"]["completed"], 1);
    assert_eq!(body["storage_exists"]["output"], true);
}

#[tokio::test]
async fn metrics_without_recorder() {
    let h = TestHarness::start().await;
    let resp = h.client.get(h.url("/metrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "# No metrics recorder installed\n");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let h = TestHarness::start().await;
    let body = get_json(&h, "/api-docs/openapi.json").await;
    assert!(body["paths"]["/api/convert"]["post"].is_object());
    assert!(body["components"]["securitySchemes"]["api_key"].is_object());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let h = TestHarness::start().await;
    let resp = h
        .client
        .get(h.url("/health"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "abc-123");

    let resp = h.client.get(h.url("/health")).send().await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn formats_lists_matrix_and_availability() {
    let registry = CapabilityRegistry::all_available()
        .with_disabled(Capability::Video, "ffmpeg not found");
    let h = TestHarness::builder().registry(registry).start().await;
    let body = get_json(&h, "/api/formats").await;

    let conversions = body["conversions"].as_array().unwrap();
    let image = conversions
        .iter()
        .find(|c| c["capability"] == "image")
        .unwrap();
    assert_eq!(image["available"], true);
    assert!(image["input_formats"]
        .as_array()
        .unwrap()
        .contains(&Value::from("png")));

    let video = conversions
        .iter()
        .find(|c| c["capability"] == "video")
        .unwrap();
    assert_eq!(video["available"], false);

    let caps = body["capabilities"].as_array().unwrap();
    let video = caps.iter().find(|c| c["capability"] == "video").unwrap();
    assert_eq!(video["reason"], "ffmpeg not found");
    let image = caps.iter().find(|c| c["capability"] == "image").unwrap();
    assert!(image.get("reason").is_none());
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn files_lists_artifacts_with_state() {
    let h = TestHarness::start().await;
    let body = get_json(&h, "/api/files").await;
    assert_eq!(body["total"], 0);

    let id = h.submit_ok("a.png", b"a", "jpg").await;
    h.wait_for(&id, "ready").await;

    let body = get_json(&h, "/api/files").await;
    assert_eq!(body["total"], 1);
    let entry = &body["files"][0];
    assert_eq!(entry["task_id"], id.as_str());
    assert_eq!(entry["status"], "available");
    assert_eq!(entry["file_exists"], true);
    assert_eq!(entry["download_url"], format!("/api/download/{id}"));

    h.clock.advance(601);
    let body = get_json(&h, "/api/files").await;
    let entry = &body["files"][0];
    assert_eq!(entry["status"], "expired");
    assert!(entry["download_url"].is_null());
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_purges_expired_files_but_keeps_records() {
    let h = TestHarness::start().await;
    let id = h.submit_ok("a.png", b"a", "jpg").await;
    h.wait_for(&id, "ready").await;
    let output = h.output_path(&id, "jpg");

    let policy = SweepPolicy {
        interval: Duration::from_secs(60),
        retention: None,
    };

    sweep_once(&h.jobs, &policy).await;
    assert!(output.exists());

    h.clock.advance(601);
    sweep_once(&h.jobs, &policy).await;
    assert!(!output.exists());
    assert_eq!(h.status(&id).await["status"], "expired");
    assert_eq!(h.jobs.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn retention_prunes_old_finished_jobs() {
    let h = TestHarness::builder()
        .behavior(common::Behavior::Fail("nope".into()))
        .start()
        .await;
    let failed = h.submit_ok("a.png", b"a", "jpg").await;
    h.wait_for(&failed, "failed").await;

    let policy = SweepPolicy {
        interval: Duration::from_secs(60),
        retention: Some(Duration::from_secs(3600)),
    };

    h.clock.advance(1800);
    sweep_once(&h.jobs, &policy).await;
    assert_eq!(h.status(&failed).await["status"], "failed");

    h.clock.advance(3600);
    sweep_once(&h.jobs, &policy).await;
    assert_eq!(h.status(&failed).await["status"], "not_found");
}
