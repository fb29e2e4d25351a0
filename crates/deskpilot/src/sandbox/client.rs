//! HTTP sandbox client.
//!
//! Control plane:
//! - `POST   {api_url}/sandboxes`        start (`{"templateID"}` -> `{"sandboxID"}`)
//! - `GET    {api_url}/sandboxes/{id}`   liveness
//! - `DELETE {api_url}/sandboxes/{id}`   terminate
//!
//! Desktop commands are `POST {api_url}/sandboxes/{id}/desktop/{op}` with a JSON body,
//! except the screenshot which is a `GET` returning `image/png`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::error::{SandboxError, SandboxResult};
use super::{
    CommandOutput, Desktop, MouseButton, Point, SandboxInfo, SandboxProvider, ScrollDirection,
    validate_sandbox_id,
};

const API_KEY_HEADER: &str = "X-API-Key";

/// Settings for [`HttpSandboxProvider`].
#[derive(Debug, Clone)]
pub struct HttpSandboxConfig {
    pub api_url: String,
    pub api_key: String,
    /// Template started by [`SandboxProvider::create`].
    pub template: String,
    pub request_timeout: Duration,
}

/// Sandbox provider backed by the sandbox service's REST API.
#[derive(Debug, Clone)]
pub struct HttpSandboxProvider {
    client: Client,
    config: Arc<HttpSandboxConfig>,
}

#[derive(Debug, Serialize)]
struct CreateSandboxRequest<'a> {
    #[serde(rename = "templateID")]
    template_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
}

impl HttpSandboxProvider {
    pub fn new(config: HttpSandboxConfig) -> SandboxResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn sandbox_url(&self, sandbox_id: &str) -> SandboxResult<String> {
        validate_sandbox_id(sandbox_id)?;
        Ok(format!(
            "{}/sandboxes/{}",
            self.config.api_url.trim_end_matches('/'),
            sandbox_id
        ))
    }
}

#[async_trait]
impl SandboxProvider for HttpSandboxProvider {
    async fn create(&self) -> SandboxResult<SandboxInfo> {
        let url = format!("{}/sandboxes", self.config.api_url.trim_end_matches('/'));
        let response = send(
            &url,
            self.client
                .post(&url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .json(&CreateSandboxRequest {
                    template_id: &self.config.template,
                }),
        )
        .await?;
        let response = check_status(response, "new sandbox").await?;
        let created: CreateSandboxResponse = response
            .json()
            .await
            .map_err(|e| SandboxError::ParseError(e.to_string()))?;

        info!(sandbox_id = %created.sandbox_id, "started sandbox");
        Ok(SandboxInfo {
            sandbox_id: created.sandbox_id,
        })
    }

    async fn connect(&self, sandbox_id: &str) -> SandboxResult<Arc<dyn Desktop>> {
        let url = self.sandbox_url(sandbox_id)?;
        let response = send(
            &url,
            self.client
                .get(&url)
                .header(API_KEY_HEADER, &self.config.api_key),
        )
        .await?;
        check_status(response, sandbox_id).await?;

        debug!(sandbox_id, "attached to sandbox");
        Ok(Arc::new(HttpDesktop {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            sandbox_id: sandbox_id.to_string(),
            base_url: url,
        }))
    }

    async fn kill(&self, sandbox_id: &str) -> SandboxResult<()> {
        let url = self.sandbox_url(sandbox_id)?;
        kill_sandbox(&self.client, &self.config, &url, sandbox_id).await
    }
}

/// A desktop reached through the sandbox REST API.
#[derive(Debug, Clone)]
struct HttpDesktop {
    client: Client,
    config: Arc<HttpSandboxConfig>,
    sandbox_id: String,
    /// `{api_url}/sandboxes/{id}`
    base_url: String,
}

impl HttpDesktop {
    async fn command(&self, op: &str, body: serde_json::Value) -> SandboxResult<reqwest::Response> {
        let url = format!("{}/desktop/{}", self.base_url, op);
        debug!(sandbox_id = %self.sandbox_id, op, "desktop command");
        let response = send(
            &url,
            self.client
                .post(&url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .json(&body),
        )
        .await?;
        check_status(response, &self.sandbox_id).await
    }
}

#[async_trait]
impl Desktop for HttpDesktop {
    fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    async fn move_mouse(&self, to: Point) -> SandboxResult<()> {
        self.command("mouse/move", json!({"x": to.x, "y": to.y}))
            .await
            .map(|_| ())
    }

    async fn click(&self, button: MouseButton, at: Point) -> SandboxResult<()> {
        self.command(
            "mouse/click",
            json!({"x": at.x, "y": at.y, "button": button, "double": false}),
        )
        .await
        .map(|_| ())
    }

    async fn double_click(&self, at: Point) -> SandboxResult<()> {
        self.command(
            "mouse/click",
            json!({"x": at.x, "y": at.y, "button": MouseButton::Left, "double": true}),
        )
        .await
        .map(|_| ())
    }

    async fn write(&self, text: &str) -> SandboxResult<()> {
        self.command("keyboard/type", json!({"text": text}))
            .await
            .map(|_| ())
    }

    async fn press(&self, key: &str) -> SandboxResult<()> {
        self.command("keyboard/press", json!({"key": key}))
            .await
            .map(|_| ())
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> SandboxResult<()> {
        self.command(
            "mouse/scroll",
            json!({"direction": direction, "amount": amount}),
        )
        .await
        .map(|_| ())
    }

    async fn drag(&self, from: Point, to: Point) -> SandboxResult<()> {
        self.command("mouse/drag", json!({"from": from, "to": to}))
            .await
            .map(|_| ())
    }

    async fn run_command(&self, command: &str) -> SandboxResult<CommandOutput> {
        let response = self.command("commands/run", json!({"cmd": command})).await?;
        response
            .json()
            .await
            .map_err(|e| SandboxError::ParseError(e.to_string()))
    }

    async fn screenshot(&self) -> SandboxResult<Vec<u8>> {
        let url = format!("{}/desktop/screenshot", self.base_url);
        let response = send(
            &url,
            self.client
                .get(&url)
                .header(API_KEY_HEADER, &self.config.api_key),
        )
        .await?;
        let response = check_status(response, &self.sandbox_id).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn kill(&self) -> SandboxResult<()> {
        kill_sandbox(&self.client, &self.config, &self.base_url, &self.sandbox_id).await
    }
}

async fn kill_sandbox(
    client: &Client,
    config: &HttpSandboxConfig,
    url: &str,
    sandbox_id: &str,
) -> SandboxResult<()> {
    let response = send(
        url,
        client.delete(url).header(API_KEY_HEADER, &config.api_key),
    )
    .await?;
    match check_status(response, sandbox_id).await {
        Ok(_) => {
            info!(sandbox_id, "terminated sandbox");
            Ok(())
        }
        Err(SandboxError::NotFound(_)) => {
            debug!(sandbox_id, "sandbox already gone");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn send(url: &str, request: RequestBuilder) -> SandboxResult<reqwest::Response> {
    request.send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            SandboxError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            SandboxError::RequestFailed(e)
        }
    })
}

/// Map non-success statuses onto [`SandboxError`].
async fn check_status(response: reqwest::Response, subject: &str) -> SandboxResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(SandboxError::NotFound(subject.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SandboxError::Unauthorized),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            Err(SandboxError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}
