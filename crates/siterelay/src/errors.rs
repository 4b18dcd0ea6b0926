use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref QUOTA_OR_ENDPOINT: Regex =
        Regex::new(r"(?i)insufficient credits|no endpoints found|unauthorized|forbidden")
            .expect("valid regex");
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("{0}")]
    InvalidParameters(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Malformed upstream response: {0}")]
    Decode(String),

    #[error("Client disconnected")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether this failure means the model is out of quota or unavailable,
    /// in which case another model may still succeed.
    pub fn is_fallback_eligible(&self) -> bool {
        match self {
            AgentError::Upstream { status, body } => {
                matches!(status, 401 | 402 | 403 | 404) || QUOTA_OR_ENDPOINT.is_match(body)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AgentError::Decode(err.to_string())
        } else {
            AgentError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Decode(err.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
