//! GitHub App authentication and JIT runner config exchange
//!
//! The app identity (RS256 JWT signed with the app private key) is traded
//! for an installation access token scoped to `administration:write`, which
//! in turn authorizes the JIT runner config request. Tokens are short-lived
//! and fetched per request; no caching, no retries — GitHub's own webhook
//! redelivery covers transient failures.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_RUNNER_LABEL;
use crate::error::{Result, WebhookError};

/// Parameters for one JIT runner registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerRequest {
    pub installation_id: i64,
    pub org: String,
    /// Registration is scoped to this repo, or to the org when absent.
    pub repo: Option<String>,
    pub runner_name: String,
}

/// Single-use runner registration credential. Treated as a secret: the
/// `Debug` impl redacts it and it must never appear in logs or responses.
#[derive(Clone, Deserialize)]
pub struct JitRunnerConfig {
    pub encoded_jit_config: String,
}

impl std::fmt::Debug for JitRunnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitRunnerConfig")
            .field("encoded_jit_config", &"<redacted>")
            .finish()
    }
}

/// Exchanges a GitHub App installation reference for a JIT runner config.
#[async_trait]
pub trait JitConfigProvider: Send + Sync {
    async fn generate_jit_config(&self, request: &RunnerRequest) -> Result<JitRunnerConfig>;
}

#[derive(Serialize)]
struct JwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Serialize)]
struct JitConfigRequestBody<'a> {
    name: &'a str,
    runner_group_id: i64,
    labels: Vec<&'a str>,
}

#[derive(Deserialize)]
struct InstallationToken {
    token: String,
}

/// GitHub App client speaking the REST API directly.
pub struct GitHubApp {
    app_id: String,
    encoding_key: EncodingKey,
    base_url: String,
    client: reqwest::Client,
}

impl GitHubApp {
    pub fn new(app_id: String, private_key_pem: &[u8], base_url: String) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| WebhookError::Config(format!("invalid app private key: {}", e)))?;

        Ok(Self {
            app_id,
            encoding_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        })
    }

    fn app_jwt(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iat: now - 60, // clock skew allowance
            exp: now + 10 * 60,
            iss: self.app_id.clone(),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| WebhookError::dependency("github app jwt", e))
    }

    /// Obtain an installation access token scoped to `administration:write`
    /// on all repos visible to the installation.
    async fn installation_token(&self, installation_id: i64) -> Result<String> {
        let jwt = self.app_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url, installation_id
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&jwt)
            .header("user-agent", "runner-dispatch")
            .header("accept", "application/vnd.github+json")
            .json(&serde_json::json!({
                "permissions": {"administration": "write"}
            }))
            .send()
            .await
            .map_err(|e| WebhookError::dependency("github installation token", e))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(WebhookError::dependency(
                "github installation token",
                format!("unexpected status {}", status),
            ));
        }

        let token: InstallationToken = resp
            .json()
            .await
            .map_err(|e| WebhookError::dependency("github installation token", e))?;
        Ok(token.token)
    }
}

#[async_trait]
impl JitConfigProvider for GitHubApp {
    async fn generate_jit_config(&self, request: &RunnerRequest) -> Result<JitRunnerConfig> {
        let token = self.installation_token(request.installation_id).await?;

        let url = match &request.repo {
            Some(repo) => format!(
                "{}/repos/{}/{}/actions/runners/generate-jitconfig",
                self.base_url, request.org, repo
            ),
            None => format!(
                "{}/orgs/{}/actions/runners/generate-jitconfig",
                self.base_url, request.org
            ),
        };

        let body = JitConfigRequestBody {
            name: &request.runner_name,
            runner_group_id: 1,
            labels: vec![DEFAULT_RUNNER_LABEL, "Linux", "X64"],
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("user-agent", "runner-dispatch")
            .header("accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| WebhookError::dependency("github jit config", e))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(WebhookError::dependency(
                "github jit config",
                format!("unexpected status {}", status),
            ));
        }

        resp.json()
            .await
            .map_err(|e| WebhookError::dependency("github jit config", e))
    }
}
