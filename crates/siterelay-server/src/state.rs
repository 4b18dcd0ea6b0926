use crate::configuration::Settings;
use siterelay::{
    agent::Agent,
    contact::{ContactError, Mailer, SmtpMailer},
    errors::AgentResult,
    providers::{
        base::Provider, configs::ProviderConfig, factory, openrouter::build_client,
        openrouter::OpenRouterProvider,
    },
    systems::{ToolDispatcher, WebSystem},
};
use std::sync::Arc;

/// Shared application state: immutable settings plus the clients built from them
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: reqwest::Client,
    pub mailer: Option<Arc<dyn Mailer>>,
}

impl AppState {
    pub fn new(settings: Settings) -> AgentResult<Self> {
        let mailer = match settings.smtp_config().map(SmtpMailer::new) {
            Some(Ok(mailer)) => Some(Arc::new(mailer) as Arc<dyn Mailer>),
            Some(Err(err)) => {
                tracing::warn!("contact mail disabled: {}", err);
                None
            }
            None => None,
        };

        Ok(Self {
            settings: Arc::new(settings),
            client: build_client()?,
            mailer,
        })
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn mailer(&self) -> Result<Arc<dyn Mailer>, ContactError> {
        self.mailer.clone().ok_or(ContactError::NotConfigured)
    }

    pub fn is_demo(&self) -> bool {
        self.settings.api_key().is_none()
    }

    /// The chat provider for one request
    pub fn provider(&self, site_url: Option<String>) -> Arc<dyn Provider> {
        factory::get_provider(self.settings.provider_config(site_url), self.client.clone())
    }

    /// The upstream, keyed or not, for endpoints that work without a key
    pub fn upstream(&self) -> Arc<dyn Provider> {
        Arc::new(OpenRouterProvider::with_client(
            self.client.clone(),
            self.settings.listing_config(),
        ))
    }

    pub fn tools(&self) -> ToolDispatcher {
        ToolDispatcher::new().with_system(Arc::new(WebSystem::new(
            self.client.clone(),
            self.settings.web_search_url.clone(),
        )))
    }

    pub fn agent(&self, site_url: Option<String>) -> Agent {
        Agent::new(self.provider(site_url), self.settings.default_model.clone())
            .with_tools(self.tools())
    }
}

#[cfg(test)]
impl AppState {
    /// State built from explicit settings, without reading the environment
    pub fn for_tests(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            client: reqwest::Client::new(),
            mailer: None,
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use crate::configuration::Settings;

    /// Settings with every default and no key, pointing upstream at `base_url`
    pub fn settings(base_url: &str, api_key: Option<&str>) -> Settings {
        serde_json::from_value(serde_json::json!({
            "openrouter_base_url": base_url,
            "openrouter_api_key": api_key,
            "web_search_url": format!("{}/html/", base_url),
        }))
        .expect("valid settings")
    }
}
