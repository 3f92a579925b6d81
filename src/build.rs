//! Remote build submission
//!
//! Models the slice of the build service's JSON surface this service uses:
//! one build with a single step that boots the runner container. The JIT
//! credential travels only as the `_ENCODED_JIT_CONFIG` substitution value —
//! never as a command-line argument, which would leak it into process lists.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, WebhookError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStep {
    pub id: String,
    pub name: String,
    pub env: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOption {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub logging: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub service_account: String,
    pub steps: Vec<BuildStep>,
    pub options: BuildOptions,
    pub substitutions: HashMap<String, String>,
}

/// One build submission: target project/location plus the build itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBuildRequest {
    pub parent: String,
    pub project_id: String,
    pub build: Build,
}

impl CreateBuildRequest {
    /// Construct the runner build for one accepted `queued` event. The
    /// `image_tag` may differ from the configured default when the job
    /// carried a dynamic label.
    pub fn runner_build(config: &Config, encoded_jit_config: String, image_tag: String) -> Self {
        let pool = config.worker_pool_id.as_ref().map(|pool_id| PoolOption {
            name: format!(
                "projects/{}/locations/{}/workerPools/{}",
                config.runner_project_id, config.build_location, pool_id
            ),
        });

        let substitutions = HashMap::from([
            ("_ENCODED_JIT_CONFIG".to_string(), encoded_jit_config),
            ("_REPOSITORY_ID".to_string(), config.runner_repository_id.clone()),
            ("_IMAGE_NAME".to_string(), config.runner_image_name.clone()),
            ("_IMAGE_TAG".to_string(), image_tag),
        ]);

        Self {
            parent: format!(
                "projects/{}/locations/{}",
                config.runner_project_id, config.build_location
            ),
            project_id: config.runner_project_id.clone(),
            build: Build {
                service_account: config.runner_service_account.clone(),
                steps: vec![BuildStep {
                    id: "run".to_string(),
                    name: "$_REPOSITORY_ID/$_IMAGE_NAME:$_IMAGE_TAG".to_string(),
                    env: vec!["ENCODED_JIT_CONFIG=${_ENCODED_JIT_CONFIG}".to_string()],
                }],
                options: BuildOptions {
                    logging: "CLOUD_LOGGING_ONLY".to_string(),
                    pool,
                },
                substitutions,
            },
        }
    }
}

/// Submits builds to the remote build service. Fire-and-forget: success
/// means the build was accepted for execution, nothing more.
#[async_trait]
pub trait BuildClient: Send + Sync {
    async fn create_build(&self, request: CreateBuildRequest) -> Result<()>;
}

/// BuildClient speaking the build service's REST API.
pub struct HttpBuildClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBuildClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BuildClient for HttpBuildClient {
    async fn create_build(&self, request: CreateBuildRequest) -> Result<()> {
        let url = format!("{}/v1/{}/builds", self.base_url, request.parent);

        let resp = self
            .client
            .post(&url)
            .json(&request.build)
            .send()
            .await
            .map_err(|e| WebhookError::dependency("build service", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WebhookError::dependency(
                "build service",
                format!("unexpected status {}", status),
            ));
        }
        Ok(())
    }
}
