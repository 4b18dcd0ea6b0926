//! Retrying a chat on free models after the requested model turns out to be
//! out of credits or unavailable.
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{Agent, ReplySink};
use crate::errors::{AgentError, AgentResult};
use crate::models::request::{ChatRequest, Reply};
use crate::providers::base::{ModelInfo, Provider};

/// Used when the upstream listing yields nothing usable
pub const STATIC_FREE_MODELS: [&str; 5] = [
    "meta/llama-3.1-8b-instruct:free",
    "qwen/qwen2.5-7b-instruct:free",
    "deepseek/deepseek-chat:free",
    "mistralai/mistral-7b-instruct:free",
    "google/gemini-2.5-flash:free",
];

const VENDOR_ORDER: [&str; 15] = [
    "meta",
    "qwen",
    "deepseek",
    "mistralai",
    "openai",
    "google",
    "anthropic",
    "cohere",
    "xai",
    "hf",
    "perplexity",
    "01-ai",
    "databricks",
    "nvidia",
    "ai21",
];

const MAX_CANDIDATES: usize = 5;

fn vendor_rank(id: &str) -> usize {
    let vendor = id.split('/').next().unwrap_or_default();
    VENDOR_ORDER
        .iter()
        .position(|v| *v == vendor)
        .unwrap_or(VENDOR_ORDER.len())
}

/// Free model ids in preference order: known vendors first, then by id
pub fn rank_free_models(models: &[ModelInfo]) -> Vec<String> {
    let mut ids: Vec<&str> = models
        .iter()
        .filter(|m| m.is_free())
        .map(|m| m.id.as_str())
        .collect();
    ids.sort_by(|a, b| vendor_rank(a).cmp(&vendor_rank(b)).then_with(|| a.cmp(b)));
    ids.into_iter().map(str::to_string).collect()
}

/// Models to try after `failed` was rejected, best first, without duplicates
pub async fn candidates(provider: &dyn Provider, default_model: &str, failed: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    let default_model = default_model.trim();
    if !default_model.is_empty() && default_model != failed {
        seen.insert(default_model.to_string());
        out.push(default_model.to_string());
    }

    match provider.list_models().await {
        Ok(models) => {
            for id in rank_free_models(&models) {
                if out.len() >= MAX_CANDIDATES {
                    break;
                }
                if id != failed && seen.insert(id.clone()) {
                    out.push(id);
                }
            }
        }
        Err(e) => warn!("could not list models for fallback: {}", e),
    }

    if out.is_empty() {
        for id in STATIC_FREE_MODELS {
            if id != failed && seen.insert(id.to_string()) {
                out.push(id.to_string());
            }
        }
    }
    out
}

pub fn switched_notice(model: &str) -> String {
    format!("Switched to available free model: {}", model)
}

/// Shown when no candidate worked either
pub fn exhausted_tip(candidates: &[String]) -> String {
    let list = if candidates.is_empty() {
        "pick a model ending in :free from /api/models".to_string()
    } else {
        candidates.join("\n- ")
    };
    format!(
        "The current model is unavailable or out of credits. Try one of these free models:\n- {}\n\nYou can also set DEFAULT_MODEL in .env and restart.",
        list
    )
}

impl Agent {
    /// Walk the fallback candidates after `cause` rejected the requested model
    pub(super) async fn recover(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ReplySink,
        cause: AgentError,
    ) -> AgentResult<Reply> {
        let candidates = candidates(self.provider.as_ref(), &self.default_model, &request.model).await;
        info!(
            model = %request.model,
            candidates = ?candidates,
            "model rejected ({}), trying fallbacks",
            cause
        );

        for model in &candidates {
            let notice = switched_notice(model);
            if sink.is_streaming() {
                sink.send_partial(&format!("{}\n", notice)).await?;
            }

            match self.attempt(&request.with_model(model.as_str()), sink).await {
                Ok(mut reply) => {
                    if !sink.is_streaming() {
                        reply.output = format!("{}\n\n{}", notice, reply.output);
                    }
                    return Ok(reply);
                }
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                Err(err) => {
                    warn!(model = %model, "fallback model failed: {}", err);
                }
            }
        }

        let tip = exhausted_tip(&candidates);
        if sink.is_streaming() {
            sink.send_partial(&tip).await?;
        }
        Ok(Reply {
            output: tip,
            raw: json!({"demo": false, "fallbackTried": candidates}),
            model: None,
            notice: None,
        })
    }
}
