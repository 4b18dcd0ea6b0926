use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use scraper::{Html, Node, Selector};
use serde_json::{json, Map, Value};
use url::Url;

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

pub const DEFAULT_SEARCH_URL: &str = "https://duckduckgo.com/html/";

const FETCH_LIMIT: usize = 5000;
const TEXT_LIMIT_DEFAULT: usize = 8000;
const TEXT_LIMIT_MIN: usize = 256;
const TEXT_LIMIT_MAX: usize = 20000;
const SEARCH_LIMIT_DEFAULT: usize = 5;
const SEARCH_LIMIT_MAX: usize = 10;
const TITLE_LIMIT: usize = 200;
/// Bodies that must be parsed before truncation are read up to this many bytes
const MAX_BODY_BYTES: usize = 1024 * 1024;

lazy_static! {
    static ref PATH_SEGMENT: Regex = Regex::new(r"^([^\[]+)((?:\[\d+\])*)").unwrap();
    static ref PATH_INDEX: Regex = Regex::new(r"\[(\d+)\]").unwrap();
}

/// Read-only web tools: fetching pages and JSON, a lightweight search, and a clock
pub struct WebSystem {
    tools: Vec<Tool>,
    client: Client,
    search_url: String,
}

impl Default for WebSystem {
    fn default() -> Self {
        Self::new(Client::new(), DEFAULT_SEARCH_URL)
    }
}

impl WebSystem {
    pub fn new<S: Into<String>>(client: Client, search_url: S) -> Self {
        let fetch_url_tool = Tool::new(
            "fetch_url",
            "Fetch a URL and return its text or compact JSON, truncated to 5000 bytes",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"}
                },
                "required": ["url"]
            }),
        );

        let fetch_url_text_tool = Tool::new(
            "fetch_url_text",
            "Fetch HTML/JSON and return plain text or truncated JSON",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "limit": {"type": "number"}
                },
                "required": ["url"]
            }),
        );

        let json_path_tool = Tool::new(
            "http_get_json_path",
            "GET JSON and extract value via dotted path with optional [index] segments",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "path": {"type": "string"}
                },
                "required": ["url", "path"]
            }),
        );

        let web_search_tool = Tool::new(
            "web_search",
            "Lightweight web search using DuckDuckGo HTML results",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "number"}
                },
                "required": ["query"]
            }),
        );

        let current_time_tool = Tool::new(
            "current_time",
            "Return current server ISO datetime",
            json!({"type": "object", "properties": {}}),
        );

        Self {
            tools: vec![
                fetch_url_tool,
                fetch_url_text_tool,
                json_path_tool,
                web_search_tool,
                current_time_tool,
            ],
            client,
            search_url: search_url.into(),
        }
    }

    async fn fetch_url(&self, args: Value) -> AgentResult<Value> {
        let Some(url) = url_arg(&args, "fetch_url")? else {
            return Ok(json!({"error": "fetch_url: missing url"}));
        };

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = content_type(&response);

        let text = if content_type.contains("application/json") {
            let raw = read_capped(response, MAX_BODY_BYTES).await?;
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => truncate(&value.to_string(), FETCH_LIMIT).to_string(),
                Err(_) => truncate(&raw, FETCH_LIMIT).to_string(),
            }
        } else if content_type.starts_with("text/") {
            // a char cut at the cap is at most four bytes long
            truncate(&read_capped(response, FETCH_LIMIT + 4).await?, FETCH_LIMIT).to_string()
        } else {
            format!("[non-text content-type={}, status={}]", content_type, status)
        };

        Ok(json!({"status": status, "contentType": content_type, "text": text}))
    }

    async fn fetch_url_text(&self, args: Value) -> AgentResult<Value> {
        let Some(url) = url_arg(&args, "fetch_url_text")? else {
            return Ok(json!({"error": "fetch_url_text: missing url"}));
        };
        let limit = text_limit(args.get("limit"));

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = content_type(&response);
        let raw = read_capped(response, MAX_BODY_BYTES).await?;

        let text = match serde_json::from_str::<Value>(&raw) {
            Ok(value) if content_type.contains("application/json") => {
                truncate(&value.to_string(), limit).to_string()
            }
            _ => truncate(&strip_html(&raw), limit).to_string(),
        };

        Ok(json!({"status": status, "contentType": content_type, "text": text}))
    }

    async fn http_get_json_path(&self, args: Value) -> AgentResult<Value> {
        let Some(url) = url_arg(&args, "http_get_json_path")? else {
            return Ok(json!({"error": "http_get_json_path: missing url"}));
        };
        let path = args.get("path").and_then(Value::as_str).unwrap_or_default();

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body: Value = serde_json::from_str(&read_capped(response, MAX_BODY_BYTES).await?)?;

        let mut result = Map::new();
        result.insert("status".to_string(), json!(status));
        if let Some(value) = value_at_path(&body, path) {
            result.insert("value".to_string(), value.clone());
        }
        Ok(Value::Object(result))
    }

    async fn web_search(&self, args: Value) -> AgentResult<Value> {
        let query = match args.get("query") {
            Some(Value::String(query)) => query.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        };
        if query.is_empty() {
            return Ok(json!({"error": "web_search: missing query"}));
        }
        let limit = search_limit(args.get("limit"));

        let separator = if self.search_url.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}q={}",
            self.search_url,
            separator,
            urlencoding::encode(&query)
        );
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, "Mozilla/5.0")
            .send()
            .await?;
        let html = read_capped(response, MAX_BODY_BYTES).await?;

        let results = search_results(&html, limit)?;
        Ok(json!({"query": query, "results": results}))
    }

    fn current_time(&self) -> Value {
        json!({"now": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)})
    }
}

#[async_trait]
impl System for WebSystem {
    fn name(&self) -> &str {
        "WebSystem"
    }

    fn description(&self) -> &str {
        "A system that fetches web pages and JSON, searches the web and tells the time"
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: &ToolCall) -> AgentResult<Value> {
        let args = tool_call.parse_arguments()?;
        match tool_call.name() {
            "fetch_url" => self.fetch_url(args).await,
            "fetch_url_text" => self.fetch_url_text(args).await,
            "http_get_json_path" => self.http_get_json_path(args).await,
            "web_search" => self.web_search(args).await,
            "current_time" => Ok(self.current_time()),
            other => Err(AgentError::UnsupportedTool(other.to_string())),
        }
    }
}

/// The `url` argument, if present. Only http(s) targets are accepted.
fn url_arg(args: &Value, tool: &str) -> AgentResult<Option<Url>> {
    let Some(raw) = args.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(raw)
        .map_err(|e| AgentError::InvalidParameters(format!("{}: invalid url: {}", tool, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(Some(url)),
        scheme => Err(AgentError::InvalidParameters(format!(
            "{}: unsupported url scheme: {}",
            tool, scheme
        ))),
    }
}

/// Read at most `cap` bytes of the body, dropping the rest of the stream
async fn read_capped(response: Response, cap: usize) -> AgentResult<String> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk?);
        if body.len() >= cap {
            body.truncate(cap);
            break;
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn number_arg(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Absent, zero or non-numeric limits fall back to the default; the rest are clamped
fn text_limit(value: Option<&Value>) -> usize {
    match number_arg(value) {
        Some(n) if n.is_finite() && n != 0.0 => {
            n.clamp(TEXT_LIMIT_MIN as f64, TEXT_LIMIT_MAX as f64) as usize
        }
        _ => TEXT_LIMIT_DEFAULT,
    }
}

fn search_limit(value: Option<&Value>) -> usize {
    match number_arg(value).map(f64::trunc) {
        Some(n) if n.is_finite() && n != 0.0 => n.clamp(1.0, SEARCH_LIMIT_MAX as f64) as usize,
        _ => SEARCH_LIMIT_DEFAULT,
    }
}

/// Longest prefix of at most `max_bytes` bytes that ends on a char boundary
pub fn truncate(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML document to whitespace-normalised text, skipping scripts and styles
pub fn strip_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let texts = document.root_element().descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let hidden = node.ancestors().any(|parent| {
            parent
                .value()
                .as_element()
                .map_or(false, |el| matches!(el.name(), "script" | "style" | "noscript"))
        });
        (!hidden).then_some(&**text)
    });
    collapse_whitespace(texts)
}

/// Result links of a DuckDuckGo HTML page, as `{title, url}`
fn search_results(html: &str, limit: usize) -> AgentResult<Vec<Value>> {
    let selector = Selector::parse("a.result__a")
        .map_err(|e| AgentError::Internal(format!("invalid selector: {:?}", e)))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|link| {
            let url = link.value().attr("href").filter(|href| !href.is_empty())?;
            let title: String = collapse_whitespace(link.text()).chars().take(TITLE_LIMIT).collect();
            Some(json!({"title": title, "url": url}))
        })
        .take(limit)
        .collect())
}

/// Walk `a.b[0].c` style paths. An empty path selects the whole document.
pub fn value_at_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }

    let mut current = root;
    for part in path.split('.') {
        let caps = PATH_SEGMENT.captures(part)?;
        current = current.get(&caps[1])?;
        for index in PATH_INDEX.captures_iter(&caps[2]) {
            let index: usize = index[1].parse().ok()?;
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}
