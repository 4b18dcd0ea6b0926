use crate::probe::{read_json, Probe};
use anyhow::{bail, Result};
use console::style;
use serde_json::json;
use std::time::Duration;

const OUTPUT_PREVIEW: usize = 200;

/// Send one message through `/api/ai-chat`; returns the model used and the start of the reply
pub async fn probe_chat(probe: &Probe, model: Option<String>, prompt: &str) -> Result<(String, String)> {
    let model = match model {
        Some(model) => model,
        None => probe.pick_model().await.unwrap_or_default(),
    };

    let mut body = json!({"messages": [{"role": "user", "content": prompt}]});
    if !model.is_empty() {
        body["model"] = json!(model);
    }

    let response = probe.post_json("/api/ai-chat", &body).await?;
    let (status, reply) = read_json(response).await;
    if !(200..300).contains(&status) || reply["ok"] != true {
        bail!(
            "base={} model={} -> HTTP {} {}",
            probe.base(),
            model,
            status,
            reply
        );
    }

    let output: String = reply["output"]
        .as_str()
        .unwrap_or_default()
        .chars()
        .take(OUTPUT_PREVIEW)
        .collect();
    let model = reply["model"].as_str().map(str::to_string).unwrap_or(model);
    Ok((model, output))
}

pub async fn execute(base: String, model: Option<String>, prompt: String) -> Result<()> {
    let probe = Probe::new(&base, Duration::from_secs(120))?;
    let (model, output) = probe_chat(&probe, model, &prompt).await?;
    println!(
        "{} base={} model={} -> {:?}",
        style("[chat] OK").green().bold(),
        probe.base(),
        style(model).cyan(),
        output
    );
    Ok(())
}
