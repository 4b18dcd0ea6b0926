use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::{Deserialize, Deserializer};
use siterelay::contact::{SmtpConfig, DEFAULT_SMTP_PORT};
use siterelay::providers::configs::{OpenRouterProviderConfig, ProviderConfig, OPENROUTER_HOST};
use siterelay::systems::web::DEFAULT_SEARCH_URL;

/// Server configuration, read once from the process environment at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default = "default_openrouter_base_url")]
    pub openrouter_base_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default = "default_site_title")]
    pub site_title: String,
    #[serde(default = "default_web_search_url")]
    pub web_search_url: String,

    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_pass: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub smtp_secure: Option<bool>,
    #[serde(default)]
    pub mail_to: Option<String>,
    #[serde(default)]
    pub mail_from: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                return Err(match err {
                    config::ConfigError::NotFound(field) => ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    },
                    other => ConfigError::Other(other),
                });
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                env_var: to_env_var("default_model"),
                reason: "must not be empty".to_string(),
            });
        }
        for (field, value) in [
            ("openrouter_base_url", &self.openrouter_base_url),
            ("web_search_url", &self.web_search_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::Invalid {
                    env_var: to_env_var(field),
                    reason: format!("expected an http(s) url, got {:?}", value),
                });
            }
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                env_var: to_env_var("host"),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` to bind; the host may be a name, resolved when binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }

    /// The API key, when one is configured. A blank key counts as none.
    pub fn api_key(&self) -> Option<&str> {
        non_blank(&self.openrouter_api_key)
    }

    /// Provider for one request; `site_url` is what the request says about its origin
    pub fn provider_config(&self, site_url: Option<String>) -> ProviderConfig {
        OpenRouterProviderConfig::new(
            self.openrouter_base_url.clone(),
            self.api_key().map(str::to_string),
        )
        .with_site_url(site_url.or_else(|| self.site_url.clone()))
        .with_site_title(self.site_title.clone())
        .into_provider_config()
    }

    /// Always the real upstream, even without a key: the models listing is public
    pub fn listing_config(&self) -> OpenRouterProviderConfig {
        OpenRouterProviderConfig::new(
            self.openrouter_base_url.clone(),
            self.api_key().map(str::to_string),
        )
        .with_site_url(self.site_url.clone())
        .with_site_title(self.site_title.clone())
    }

    /// Mail settings, or `None` when host or credentials are missing
    pub fn smtp_config(&self) -> Option<SmtpConfig> {
        let host = non_blank(&self.smtp_host)?;
        let user = non_blank(&self.smtp_user)?;
        let pass = non_blank(&self.smtp_pass)?;
        Some(SmtpConfig {
            host: host.to_string(),
            port: self.smtp_port,
            user: user.to_string(),
            pass: pass.to_string(),
            secure: SmtpConfig::secure_for(self.smtp_port, self.smtp_secure),
            to: non_blank(&self.mail_to).unwrap_or(user).to_string(),
            from: non_blank(&self.mail_from).unwrap_or(user).to_string(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// SMTP_SECURE may arrive as a parsed bool, or as a string when blank or oddly cased
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(b)) => Some(b),
        Some(Raw::Text(s)) if s.trim().is_empty() => None,
        Some(Raw::Text(s)) => Some(matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes")),
        None => None,
    })
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_openrouter_base_url() -> String {
    OPENROUTER_HOST.to_string()
}

fn default_model() -> String {
    "google/gemini-2.5-flash:free".to_string()
}

fn default_site_title() -> String {
    "siterelay".to_string()
}

fn default_web_search_url() -> String {
    DEFAULT_SEARCH_URL.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
