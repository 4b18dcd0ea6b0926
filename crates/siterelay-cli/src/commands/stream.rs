use crate::probe::Probe;
use anyhow::{bail, Result};
use console::style;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;

/// How a streamed reply ended
#[derive(Debug, Default, PartialEq)]
pub struct StreamOutcome {
    pub text: String,
    pub notice: Option<String>,
    pub done: bool,
}

/// Post to `/api/ai-chat/stream` and feed each content delta to `on_delta` until `done`
pub async fn probe_stream(
    probe: &Probe,
    model: Option<String>,
    prompt: &str,
    mut on_delta: impl FnMut(&str),
) -> Result<StreamOutcome> {
    let model = match model {
        Some(model) => Some(model),
        None => probe.pick_model().await,
    };
    let mut body = json!({"messages": [{"role": "user", "content": prompt}]});
    if let Some(model) = &model {
        body["model"] = json!(model);
    }

    let response = probe.post_json("/api/ai-chat/stream", &body).await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        bail!("base={} -> HTTP {} {}", probe.base(), status.as_u16(), text);
    }

    let mut outcome = StreamOutcome::default();
    let mut events = response.bytes_stream().eventsource();
    while let Some(event) = events.next().await {
        let event = event?;
        let Ok(frame) = serde_json::from_str::<Value>(&event.data) else {
            continue;
        };
        if let Some(error) = frame.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            bail!("stream error: {}", message);
        }
        if let Some(notice) = frame["notice"].as_str() {
            outcome.notice = Some(notice.to_string());
        }
        if frame["done"] == true {
            outcome.done = true;
            break;
        }
        if let Some(delta) = frame["choices"][0]["delta"]["content"].as_str() {
            on_delta(delta);
            outcome.text.push_str(delta);
        }
    }

    if !outcome.done {
        bail!("stream ended before done");
    }
    Ok(outcome)
}

pub async fn execute(base: String, model: Option<String>, prompt: String) -> Result<()> {
    let probe = Probe::new(&base, Duration::from_secs(600))?;
    let outcome = probe_stream(&probe, model, &prompt, |delta| {
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    })
    .await?;

    println!();
    if let Some(notice) = outcome.notice {
        println!("{}", style(format!("notice: {}", notice)).yellow());
    }
    println!("{}", style("[stream] done").green().bold());
    Ok(())
}
