//! Environment-sourced service configuration

use crate::error::{Result, WebhookError};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_BUILD_API_BASE_URL: &str = "https://cloudbuild.googleapis.com";
pub const DEFAULT_RUNNER_IMAGE_NAME: &str = "default-runner";
pub const DEFAULT_RUNNER_IMAGE_TAG: &str = "latest";

/// The set of environment variables required for running the webhook service.
/// Loaded once at startup; the process refuses to start if any required
/// value is absent.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub build_location: String,
    pub build_api_base_url: String,
    pub github_api_base_url: String,
    pub github_app_id: String,
    pub github_app_private_key_path: String,
    pub webhook_key_mount_path: String,
    pub webhook_key_name: String,
    pub runner_project_id: String,
    pub runner_image_name: String,
    pub runner_image_tag: String,
    pub runner_repository_id: String,
    pub runner_service_account: String,
    pub worker_pool_id: Option<String>,
}

impl Config {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the configuration through an injected lookup function. Keeps
    /// config parsing testable without mutating process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(WebhookError::Config(format!("{} is required", name))),
            }
        };
        let optional =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            bind_address: optional("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            build_location: required("BUILD_LOCATION")?,
            build_api_base_url: optional("BUILD_API_BASE_URL", DEFAULT_BUILD_API_BASE_URL),
            github_api_base_url: optional("GITHUB_API_BASE_URL", DEFAULT_GITHUB_API_BASE_URL),
            github_app_id: required("GITHUB_APP_ID")?,
            github_app_private_key_path: required("GITHUB_APP_PRIVATE_KEY_PATH")?,
            webhook_key_mount_path: required("WEBHOOK_KEY_MOUNT_PATH")?,
            webhook_key_name: required("WEBHOOK_KEY_NAME")?,
            runner_project_id: required("RUNNER_PROJECT_ID")?,
            runner_image_name: optional("RUNNER_IMAGE_NAME", DEFAULT_RUNNER_IMAGE_NAME),
            runner_image_tag: optional("RUNNER_IMAGE_TAG", DEFAULT_RUNNER_IMAGE_TAG),
            runner_repository_id: required("RUNNER_REPOSITORY_ID")?,
            runner_service_account: required("RUNNER_SERVICE_ACCOUNT")?,
            worker_pool_id: lookup("WORKER_POOL_ID").filter(|v| !v.is_empty()),
        })
    }

    /// Path of the mounted webhook secret file.
    pub fn webhook_secret_path(&self) -> String {
        format!("{}/{}", self.webhook_key_mount_path, self.webhook_key_name)
    }
}
