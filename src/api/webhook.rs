//! Webhook handler for GitHub workflow_job events
//!
//! Per-request pipeline: verify signature over the raw bytes, classify the
//! event, and for a `queued` job on the default runner label exchange the
//! installation identity for a JIT config and submit one runner build.
//! Everything else is a logged no-op. Replayed deliveries dispatch
//! independently; dedup is GitHub's problem, not ours.

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
};
use tracing::{error, info};

use crate::DEFAULT_RUNNER_LABEL;
use crate::build::CreateBuildRequest;
use crate::error::WebhookError;
use crate::event::{WorkflowJobAction, WorkflowJobEvent};
use crate::github::RunnerRequest;
use crate::signature::verify_signature;
use crate::utils::{format_labels, html_escape};
use crate::{AppState, SharedState};

pub const RUNNER_STARTED_MSG: &str = "runner started";

/// The result of processing one request: a status code, a short
/// human-readable message, and any error that occurred along the way.
struct ApiResponse {
    code: StatusCode,
    message: String,
    error: Option<WebhookError>,
}

impl ApiResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK,
            message: message.into(),
            error: None,
        }
    }

    fn fail(code: StatusCode, message: impl Into<String>, error: WebhookError) -> Self {
        Self {
            code,
            message: message.into(),
            error: Some(error),
        }
    }
}

/// Handles the GitHub webhook POST request.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let resp = process_request(&state, &headers, &body).await;

    if let Some(err) = &resp.error {
        error!(
            error = %err,
            code = %resp.code,
            body = %resp.message,
            "error processing request"
        );
    }

    // Short escaped message only; never the raw error or payload.
    (resp.code, html_escape(&resp.message))
}

async fn process_request(state: &AppState, headers: &HeaderMap, body: &Bytes) -> ApiResponse {
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // One generic response for every authentication failure mode, so the
    // sender cannot probe which part was at fault.
    if let Err(err) = verify_signature(&state.webhook_secret, body, signature) {
        return ApiResponse::fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to validate payload",
            err,
        );
    }

    let Some(event_type) = headers.get("X-Github-Event").and_then(|v| v.to_str().ok()) else {
        return ApiResponse::fail(
            StatusCode::BAD_REQUEST,
            "missing event type header",
            WebhookError::MalformedPayload("X-Github-Event header absent".to_string()),
        );
    };

    // GitHub sends event families this service does not model; they are
    // accepted, not errors, so delivery is never reported as failed.
    if event_type != "workflow_job" {
        info!(event_type, "no action taken for event type");
        return ApiResponse::ok(format!("no action taken for event: \"{}\"", event_type));
    }

    let event: WorkflowJobEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            return ApiResponse::fail(
                StatusCode::BAD_REQUEST,
                "failed to parse webhook payload",
                WebhookError::MalformedPayload(e.to_string()),
            );
        }
    };

    match event.action {
        Some(WorkflowJobAction::Queued) => dispatch_runner(state, &event).await,
        Some(WorkflowJobAction::InProgress) => log_in_progress(&event),
        Some(WorkflowJobAction::Completed) => log_completed(&event),
        Some(WorkflowJobAction::Other) | None => {
            let action = event.action.map_or("none", |a| a.as_str());
            info!(action, "no action taken for action type");
            ApiResponse::ok(format!("no action taken for action type: \"{}\"", action))
        }
    }
}

/// Terminal no-op: record how long the job sat in the queue.
fn log_in_progress(event: &WorkflowJobEvent) -> ApiResponse {
    if let Some(job) = &event.workflow_job {
        info!(
            runner_id = job.runner_identity().as_deref().unwrap_or("unknown"),
            job_name = job.name.as_deref().unwrap_or("unknown"),
            queued_seconds = job.queued_seconds(),
            "workflow job in progress"
        );
    }
    ApiResponse::ok("workflow job in progress event logged")
}

/// Terminal no-op: record run durations and conclusion.
fn log_completed(event: &WorkflowJobEvent) -> ApiResponse {
    if let Some(job) = &event.workflow_job {
        info!(
            runner_id = job.runner_identity().as_deref().unwrap_or("unknown"),
            job_name = job.name.as_deref().unwrap_or("unknown"),
            conclusion = job.conclusion.as_deref().unwrap_or("unknown"),
            running_seconds = job.running_seconds(),
            total_seconds = job.total_seconds(),
            "workflow job completed"
        );
    }
    ApiResponse::ok("workflow job completed event logged")
}

/// The dispatch path: label gate, credential exchange, build submission.
/// Exactly one exchange call and at most one build call per accepted event.
async fn dispatch_runner(state: &AppState, event: &WorkflowJobEvent) -> ApiResponse {
    let Some(job) = &event.workflow_job else {
        return malformed("queued event carries no workflow_job");
    };

    if !job.labels.iter().any(|l| l == DEFAULT_RUNNER_LABEL) {
        info!(labels = %format_labels(&job.labels), "no action taken for labels");
        return ApiResponse::ok(format!(
            "no action taken for labels: {}",
            format_labels(&job.labels)
        ));
    }

    let (Some(installation_id), Some(org), Some(repo), Some(runner_name)) = (
        event.installation_id(),
        event.org_login(),
        event.repo_name(),
        job.runner_identity(),
    ) else {
        return malformed("queued event missing installation, org, repo, or job id");
    };

    // The runner name does not pin the triggering job to this runner;
    // GitHub's own matching decides which queued job lands where.
    let request = RunnerRequest {
        installation_id,
        org: org.to_string(),
        repo: Some(repo.to_string()),
        runner_name: runner_name.clone(),
    };

    let jit = match state.jit.generate_jit_config(&request).await {
        Ok(jit) => jit,
        Err(err) => {
            return ApiResponse::fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to generate jit config",
                err,
            );
        }
    };

    // A label beyond the default selects a job-specific runner image tag.
    let image_tag = job
        .labels
        .iter()
        .find(|l| *l != DEFAULT_RUNNER_LABEL)
        .cloned()
        .unwrap_or_else(|| state.config.runner_image_tag.clone());

    let build = CreateBuildRequest::runner_build(&state.config, jit.encoded_jit_config, image_tag);
    if let Err(err) = state.builds.create_build(build).await {
        return ApiResponse::fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to run build",
            err,
        );
    }

    info!(runner_id = %runner_name, "runner started");
    ApiResponse::ok(RUNNER_STARTED_MSG)
}

fn malformed(detail: &str) -> ApiResponse {
    ApiResponse::fail(
        StatusCode::BAD_REQUEST,
        "workflow job event missing required fields",
        WebhookError::MalformedPayload(detail.to_string()),
    )
}
