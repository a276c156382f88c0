//! Gateway HTTP client
//!
//! Thin wrapper around `POST /tools/invoke` and `GET /health`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::{header, Client, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::protocol::{ToolInvokeRequest, ToolInvokeResponse, ToolResultBody};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sessions::{AgentSession, SessionSource};

/// Result of a `/health` probe
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Gateway answered with a 2xx status
    pub ok: bool,
    /// HTTP status code
    pub status: u16,
    /// Round-trip time
    pub latency: Duration,
    /// JSON body, if the gateway sent one
    pub body: Option<serde_json::Value>,
}

/// Gateway tool invocation client
#[derive(Clone)]
pub struct ToolsClient {
    /// HTTP client
    client: Client,
    /// Gateway base URL without trailing slash
    base_url: String,
    /// Timeout for health probes
    health_timeout: Duration,
    /// Retries for transient failures
    max_retries: u32,
}

impl ToolsClient {
    /// Create a new client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = header::HeaderMap::new();

        let token = config.gateway.token.expose_secret();
        if !token.is_empty() {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| Error::Config(format!("Invalid gateway token format: {}", e)))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.gateway.request_timeout)
            .build()?;

        Ok(ToolsClient {
            client,
            base_url: config.gateway.url.trim_end_matches('/').to_string(),
            health_timeout: config.gateway.health_timeout,
            max_retries: config.http.max_retries,
        })
    }

    /// Gateway base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke a gateway tool, retrying transient failures
    pub async fn invoke(&self, tool: &str, args: serde_json::Value) -> Result<ToolResultBody> {
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(None)
            .build();

        backoff::future::retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match self.invoke_once(tool, &args).await {
                Ok(result) => Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(tool, attempt, "Tool invocation failed, retrying: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    /// Invoke a tool and decode its structured output
    pub async fn invoke_as<T: DeserializeOwned>(
        &self,
        tool: &str,
        args: impl Serialize,
    ) -> Result<T> {
        let result = self.invoke(tool, serde_json::to_value(args)?).await?;
        let value = result
            .structured()
            .ok_or_else(|| Error::Gateway(format!("{} returned no structured output", tool)))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn invoke_once(&self, tool: &str, args: &serde_json::Value) -> Result<ToolResultBody> {
        let url = format!("{}/tools/invoke", self.base_url);
        let request = ToolInvokeRequest {
            tool: tool.to_string(),
            args: args.clone(),
        };

        debug!("Invoking gateway tool: {}", tool);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Unauthorized(format!(
                    "Gateway rejected credentials ({})",
                    status
                )));
            }
            s if s.is_server_error() => {
                // Keep the reqwest error so the retry classifier sees the status
                return Err(response.error_for_status().err().map(Error::Http).unwrap_or_else(
                    || Error::Gateway(format!("Gateway returned {}", s)),
                ));
            }
            _ => {}
        }

        let body: ToolInvokeResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => return Err(Error::Http(e)),
            Err(_) if status == StatusCode::NOT_FOUND => {
                return Err(Error::NotFound(format!("Tool not available: {}", tool)))
            }
            Err(_) => return Err(Error::Gateway(format!("Gateway returned {}", status))),
        };

        if !body.ok {
            let message = body
                .error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("{} failed ({})", tool, status));
            return Err(Error::Gateway(message));
        }

        Ok(body.result.unwrap_or_default())
    }

    /// Probe `GET /health` with the short health timeout
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("Health check exceeded {:?}", self.health_timeout))
                } else {
                    Error::Http(e)
                }
            })?;

        let latency = started.elapsed();
        let status = response.status();
        let body = response.json::<serde_json::Value>().await.ok();

        Ok(HealthStatus {
            ok: status.is_success(),
            status: status.as_u16(),
            latency,
            body,
        })
    }

    /// List sessions via the `sessions_list` tool
    pub async fn list_sessions(&self, limit: u32) -> Result<Vec<AgentSession>> {
        let result = self
            .invoke(
                "sessions_list",
                serde_json::json!({ "limit": limit, "messageLimit": 0 }),
            )
            .await?;

        let value = result
            .structured()
            .ok_or_else(|| Error::Gateway("sessions_list returned no structured output".into()))?;

        // Either `{"sessions": [...]}` or a bare array
        let sessions = match value {
            serde_json::Value::Object(mut map) => map
                .remove("sessions")
                .unwrap_or(serde_json::Value::Array(Vec::new())),
            other => other,
        };

        let rows = match sessions {
            serde_json::Value::Array(rows) => rows,
            other => {
                return Err(Error::Gateway(format!(
                    "sessions_list returned {} instead of a list",
                    json_type(&other)
                )))
            }
        };

        // One bad row must not sink the whole poll
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<AgentSession>(row) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Skipping unreadable session row: {}", e);
                    None
                }
            })
            .collect())
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[async_trait]
impl SessionSource for ToolsClient {
    async fn fetch_sessions(&self, limit: u32) -> Result<Vec<AgentSession>> {
        self.list_sessions(limit).await
    }
}
