//! End-to-end webhook pipeline tests with mock downstream clients.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State as AxumState;
use axum::http::{HeaderMap, StatusCode};
use runner_dispatch::api::handle_webhook;
use runner_dispatch::build::{BuildClient, CreateBuildRequest};
use runner_dispatch::config::Config;
use runner_dispatch::error::{Result, WebhookError};
use runner_dispatch::github::{JitConfigProvider, JitRunnerConfig, RunnerRequest};
use runner_dispatch::signature::sign_payload;
use runner_dispatch::{AppState, SharedState};
use serde_json::json;

const WEBHOOK_SECRET: &[u8] = b"test-github-webhook-secret";
const ENCODED_JIT_CONFIG: &str = "Hello";

/// Shared call log so tests can assert on the ordering of outbound calls.
type CallLog = Arc<Mutex<Vec<&'static str>>>;

struct MockJitProvider {
    calls: Mutex<Vec<RunnerRequest>>,
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl JitConfigProvider for MockJitProvider {
    async fn generate_jit_config(&self, request: &RunnerRequest) -> Result<JitRunnerConfig> {
        self.log.lock().unwrap().push("jit");
        self.calls.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(WebhookError::dependency("github jit config", "boom"));
        }
        Ok(JitRunnerConfig {
            encoded_jit_config: ENCODED_JIT_CONFIG.to_string(),
        })
    }
}

struct MockBuildClient {
    calls: Mutex<Vec<CreateBuildRequest>>,
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl BuildClient for MockBuildClient {
    async fn create_build(&self, request: CreateBuildRequest) -> Result<()> {
        self.log.lock().unwrap().push("build");
        self.calls.lock().unwrap().push(request);
        if self.fail {
            return Err(WebhookError::dependency("build service", "boom"));
        }
        Ok(())
    }
}

struct Harness {
    state: SharedState,
    jit: Arc<MockJitProvider>,
    builds: Arc<MockBuildClient>,
    log: CallLog,
}

fn harness() -> Harness {
    harness_with_failures(false, false)
}

fn harness_with_failures(jit_fails: bool, build_fails: bool) -> Harness {
    let config = Config::from_lookup(|name| {
        let value = match name {
            "BUILD_LOCATION" => "us-central1",
            "GITHUB_APP_ID" => "1234",
            "GITHUB_APP_PRIVATE_KEY_PATH" => "/secrets/app-key.pem",
            "WEBHOOK_KEY_MOUNT_PATH" => "/secrets",
            "WEBHOOK_KEY_NAME" => "webhook-secret",
            "RUNNER_PROJECT_ID" => "my-project",
            "RUNNER_REPOSITORY_ID" => "us-docker.pkg.dev/my-project/runners",
            "RUNNER_SERVICE_ACCOUNT" => "runner@my-project.iam.gserviceaccount.com",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap();

    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let jit = Arc::new(MockJitProvider {
        calls: Mutex::new(Vec::new()),
        log: Arc::clone(&log),
        fail: jit_fails,
    });
    let builds = Arc::new(MockBuildClient {
        calls: Mutex::new(Vec::new()),
        log: Arc::clone(&log),
        fail: build_fails,
    });

    let state = Arc::new(AppState {
        config,
        webhook_secret: WEBHOOK_SECRET.to_vec(),
        jit: Arc::clone(&jit) as Arc<dyn JitConfigProvider>,
        builds: Arc::clone(&builds) as Arc<dyn BuildClient>,
    });

    Harness { state, jit, builds, log }
}

fn workflow_job_payload(action: &str, labels: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": action,
        "workflow_job": {
            "id": 789,
            "run_id": 456,
            "name": "build-job",
            "labels": labels,
            "created_at": "2025-01-01T12:00:00Z",
            "started_at": "2025-01-01T12:05:00Z",
            "completed_at": "2025-01-01T12:15:00Z",
            "conclusion": "success"
        },
        "installation": {"id": 123},
        "organization": {"login": "google"},
        "repository": {"name": "webhook"}
    }))
    .unwrap()
}

fn signed_headers(event_type: &str, body: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("X-Github-Event", event_type.parse().unwrap());
    headers.insert(
        "X-Hub-Signature-256",
        sign_payload(WEBHOOK_SECRET, body).parse().unwrap(),
    );
    headers.insert("Content-Type", "application/json".parse().unwrap());
    headers
}

async fn deliver(h: &Harness, headers: HeaderMap, body: Vec<u8>) -> (StatusCode, String) {
    handle_webhook(AxumState(Arc::clone(&h.state)), headers, Bytes::from(body)).await
}

#[tokio::test]
async fn queued_with_default_label_dispatches_runner() {
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "runner started");

    // Exactly one credential exchange and one build submission, in order.
    assert_eq!(*h.log.lock().unwrap(), vec!["jit", "build"]);

    let jit_calls = h.jit.calls.lock().unwrap();
    assert_eq!(
        *jit_calls,
        vec![RunnerRequest {
            installation_id: 123,
            org: "google".to_string(),
            repo: Some("webhook".to_string()),
            // Derived from the job id, not the run id: a single run can
            // contain multiple jobs.
            runner_name: "GCP-789".to_string(),
        }]
    );

    let build_calls = h.builds.calls.lock().unwrap();
    assert_eq!(build_calls.len(), 1);
    let subs = &build_calls[0].build.substitutions;
    assert_eq!(subs.get("_ENCODED_JIT_CONFIG").map(String::as_str), Some(ENCODED_JIT_CONFIG));
    assert_eq!(subs.get("_IMAGE_TAG").map(String::as_str), Some("latest"));
}

#[tokio::test]
async fn queued_without_default_label_is_a_no_op() {
    let h = harness();
    let body = workflow_job_payload("queued", &["other-label"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "no action taken for labels: [other-label]");
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dynamic_label_selects_image_tag() {
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted", "pr-123-abc"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "runner started");

    let build_calls = h.builds.calls.lock().unwrap();
    assert_eq!(
        build_calls[0].build.substitutions.get("_IMAGE_TAG").map(String::as_str),
        Some("pr-123-abc")
    );
}

#[tokio::test]
async fn in_progress_and_completed_trigger_no_dispatch() {
    let h = harness();

    let body = workflow_job_payload("in_progress", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);
    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "workflow job in progress event logged");

    let body = workflow_job_payload("completed", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);
    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "workflow job completed event logged");

    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn absent_action_is_a_no_op() {
    let h = harness();
    let body = b"{}".to_vec();
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "no action taken for action type: &quot;none&quot;");
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_action_is_a_no_op() {
    let h = harness();
    let body = workflow_job_payload("waiting", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "no action taken for action type: &quot;other&quot;");
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unhandled_event_types_are_accepted() {
    let h = harness();
    let body = br#"{"ref": "refs/heads/main"}"#.to_vec();
    let headers = signed_headers("push", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(message, "no action taken for event: &quot;push&quot;");
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_signature_is_opaque() {
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let mut headers = HeaderMap::new();
    headers.insert("X-Github-Event", "workflow_job".parse().unwrap());
    headers.insert(
        "X-Hub-Signature-256",
        sign_payload(b"wrong-secret", &body).parse().unwrap(),
    );

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "failed to validate payload");
    // Payload content is never echoed back.
    assert!(!message.contains("google"));
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_signature_gets_the_same_generic_response() {
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let mut headers = HeaderMap::new();
    headers.insert("X-Github-Event", "workflow_job".parse().unwrap());

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "failed to validate payload");
}

#[tokio::test]
async fn missing_event_type_header_is_a_client_error() {
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Hub-Signature-256",
        sign_payload(WEBHOOK_SECRET, &body).parse().unwrap(),
    );

    let (code, _) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_payload_is_a_client_error() {
    let h = harness();
    let body = b"not json at all".to_vec();
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(message, "failed to parse webhook payload");
}

#[tokio::test]
async fn queued_event_missing_identity_is_a_client_error() {
    let h = harness();
    let body = serde_json::to_vec(&json!({
        "action": "queued",
        "workflow_job": {
            "id": 789,
            "labels": ["self-hosted"]
        }
        // no installation / organization / repository
    }))
    .unwrap();
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(message, "workflow job event missing required fields");
    assert!(h.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn jit_failure_is_a_server_error_and_skips_the_build() {
    let h = harness_with_failures(true, false);
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "failed to generate jit config");
    assert_eq!(*h.log.lock().unwrap(), vec!["jit"]);
}

#[tokio::test]
async fn build_failure_is_a_server_error() {
    let h = harness_with_failures(false, true);
    let body = workflow_job_payload("queued", &["self-hosted"]);
    let headers = signed_headers("workflow_job", &body);

    let (code, message) = deliver(&h, headers, body).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "failed to run build");
    assert_eq!(*h.log.lock().unwrap(), vec!["jit", "build"]);
}

#[tokio::test]
async fn replayed_delivery_dispatches_twice() {
    // Identical signed deliveries each provision their own runner; there is
    // deliberately no dedup.
    let h = harness();
    let body = workflow_job_payload("queued", &["self-hosted"]);

    for _ in 0..2 {
        let headers = signed_headers("workflow_job", &body);
        let (code, _) = deliver(&h, headers, body.clone()).await;
        assert_eq!(code, StatusCode::OK);
    }

    assert_eq!(*h.log.lock().unwrap(), vec!["jit", "build", "jit", "build"]);
}
