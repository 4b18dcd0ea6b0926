use crate::probe::{read_json, Probe};
use anyhow::{bail, Result};
use console::style;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::warn;

const CHAT_PROBE_PROMPT: &str = "Health check: please reply OK";

/// One probed endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub detail: serde_json::Map<String, Value>,
}

impl Step {
    fn failed(name: &'static str, error: impl ToString) -> Self {
        Self {
            name,
            status: None,
            ok: false,
            error: Some(error.to_string()),
            detail: Default::default(),
        }
    }

    fn from_response(name: &'static str, status: u16, body: &Value, keys: &[&str]) -> Self {
        let detail = keys
            .iter()
            .map(|key| (key.to_string(), body.get(*key).cloned().unwrap_or(Value::Null)))
            .collect();
        Self {
            name,
            status: Some(status),
            ok: (200..300).contains(&status) && body["ok"] == true,
            error: body["error"].as_str().map(str::to_string),
            detail,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub steps: Vec<Step>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl HealthReport {
    pub fn summary(&self, base: &str) -> String {
        let mut lines = vec![format!(
            "health_check: base={} ok={} durationMs={}",
            base, self.ok, self.duration_ms
        )];
        for step in &self.steps {
            let status = step.status.map(|s| s.to_string()).unwrap_or_default();
            let outcome = if step.ok {
                style("OK".to_string()).green().to_string()
            } else {
                style(step.error.clone().unwrap_or_else(|| "FAIL".to_string()))
                    .red()
                    .to_string()
            };
            lines.push(format!("- {}: {} {}", step.name, status, outcome));
        }
        lines.join("\n")
    }

    /// What the webhook receives
    pub fn payload(&self, base: &str) -> Value {
        json!({
            "source": "health_check",
            "base": base,
            "ok": self.ok,
            "steps": self.steps,
            "durationMs": self.duration_ms,
        })
    }
}

/// Probe `/api/ai-health`, then send a small chat through `/api/ai-chat` on the default model
pub async fn check(probe: &Probe) -> HealthReport {
    let started = Instant::now();
    let mut steps = Vec::new();

    steps.push(match probe.get_json("/api/ai-health").await {
        Ok((status, body)) => Step::from_response("ai-health", status, &body, &["upstream"]),
        Err(err) => Step::failed("ai-health", err),
    });

    let body = json!({"messages": [{"role": "user", "content": CHAT_PROBE_PROMPT}]});
    steps.push(match probe.post_json("/api/ai-chat", &body).await {
        Ok(response) => {
            let (status, body) = read_json(response).await;
            Step::from_response("ai-chat", status, &body, &["model", "notice"])
        }
        Err(err) => Step::failed("ai-chat", err),
    });

    HealthReport {
        ok: steps.iter().all(|step| step.ok),
        steps,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

async fn post_webhook(probe: &Probe, url: &str, payload: &Value) {
    match probe.client().post(url).json(payload).send().await {
        Ok(response) if !response.status().is_success() => {
            warn!("webhook answered {}", response.status())
        }
        Ok(_) => {}
        Err(err) => warn!("webhook failed: {}", err),
    }
}

/// Run one check and report it; `Ok(false)` when the server is unhealthy
pub async fn run_once(probe: &Probe, webhook: Option<&str>) -> bool {
    let report = check(probe).await;
    println!("{}", report.summary(probe.base()));
    if let Some(url) = webhook {
        post_webhook(probe, url, &report.payload(probe.base())).await;
    }
    report.ok
}

pub async fn execute(
    base: String,
    timeout_ms: u64,
    webhook: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    let probe = Probe::new(&base, Duration::from_millis(timeout_ms))?;
    let webhook = webhook.filter(|url| !url.trim().is_empty());

    let Some(interval) = interval else {
        if run_once(&probe, webhook.as_deref()).await {
            return Ok(());
        }
        bail!("health check failed for {}", probe.base());
    };

    loop {
        run_once(&probe, webhook.as_deref()).await;
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
