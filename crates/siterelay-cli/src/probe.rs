use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client aimed at one running siterelay server
pub struct Probe {
    client: Client,
    base: String,
}

impl Probe {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// GET a JSON endpoint. The body is `Null` when it isn't JSON.
    pub async fn get_json(&self, path: &str) -> Result<(u16, Value)> {
        let response = self.client.get(self.url(path)).send().await?;
        Ok(read_json(response).await)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// First `:free` model the server lists, else its first model
    pub async fn pick_model(&self) -> Option<String> {
        let (status, body) = match self.get_json("/api/models").await {
            Ok(listing) => listing,
            Err(err) => {
                debug!("model listing failed: {}", err);
                return None;
            }
        };
        if !(200..300).contains(&status) {
            return None;
        }

        let ids: Vec<&str> = body["data"]
            .as_array()?
            .iter()
            .filter_map(|m| m["id"].as_str())
            .collect();
        ids.iter()
            .find(|id| id.contains(":free"))
            .or_else(|| ids.first())
            .map(|id| id.to_string())
    }
}

pub async fn read_json(response: Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    (status, serde_json::from_str(&text).unwrap_or(Value::Null))
}
