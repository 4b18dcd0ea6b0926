use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{ChunkStream, ModelInfo, Provider};
use super::configs::OpenRouterProviderConfig;
use crate::errors::{AgentError, AgentResult};
use crate::streaming::ChatChunk;

pub struct OpenRouterProvider {
    client: Client,
    config: OpenRouterProviderConfig,
}

/// Shared HTTP client for upstream calls
pub fn build_client() -> AgentResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(600)) // 10 minutes timeout
        .build()
        .map_err(AgentError::from)
}

impl OpenRouterProvider {
    pub fn new(config: OpenRouterProviderConfig) -> AgentResult<Self> {
        Ok(Self::with_client(build_client()?, config))
    }

    pub fn with_client(client: Client, config: OpenRouterProviderConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.host.trim_end_matches('/'), endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request.header("X-Title", &self.config.site_title);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(site_url) = &self.config.site_url {
            request = request.header("HTTP-Referer", site_url);
        }
        request
    }

    async fn post(&self, payload: &Value) -> AgentResult<reqwest::Response> {
        let response = self
            .authorized(self.client.post(self.url("chat/completions")))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            status => Err(AgentError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn upstream_error(error: &Value) -> AgentError {
    let status = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY.as_u16());
    AgentError::Upstream {
        status,
        body: error.to_string(),
    }
}

/// A 200 body carrying `error` and no `choices` is still a failure
fn embedded_error(body: &Value) -> Option<AgentError> {
    match (body.get("error"), body.get("choices")) {
        (Some(error), None) => Some(upstream_error(error)),
        _ => None,
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn complete(&self, payload: &Value) -> AgentResult<Value> {
        let body: Value = self.post(payload).await?.json().await?;
        match embedded_error(&body) {
            Some(err) => Err(err),
            None => Ok(body),
        }
    }

    async fn stream(&self, payload: &Value) -> AgentResult<ChunkStream> {
        let response = self.post(payload).await?;
        let mut events = response.bytes_stream().eventsource();

        let chunks = async_stream::try_stream! {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| AgentError::Transport(e.to_string()))?;
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    break;
                }

                let frame: Value = match serde_json::from_str(data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("skipping malformed stream frame: {}", e);
                        continue;
                    }
                };
                if let Some(error) = frame.get("error") {
                    Err::<(), _>(upstream_error(error))?;
                }
                match serde_json::from_value::<ChatChunk>(frame) {
                    Ok(chunk) => yield chunk,
                    Err(e) => debug!("skipping unexpected stream frame: {}", e),
                }
            }
        };

        Ok(Box::pin(chunks))
    }

    async fn list_models(&self) -> AgentResult<Vec<ModelInfo>> {
        let response = self
            .authorized(self.client.get(self.url("models")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        let models = body
            .get("data")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }
}
