pub const OPENROUTER_HOST: &str = "https://openrouter.ai/api/v1";

// Unified enum to wrap the chat provider choices
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenRouter(OpenRouterProviderConfig),
    /// No API key on the server: answer with canned demo content
    Demo,
}

#[derive(Debug, Clone)]
pub struct OpenRouterProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    /// Sent as `HTTP-Referer` so the upstream can attribute traffic to the site
    pub site_url: Option<String>,
    /// Sent as `X-Title`
    pub site_title: String,
}

impl OpenRouterProviderConfig {
    pub fn new<H: Into<String>>(host: H, api_key: Option<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            site_url: None,
            site_title: "siterelay".to_string(),
        }
    }

    pub fn with_site_url(mut self, site_url: Option<String>) -> Self {
        self.site_url = site_url.filter(|url| !url.is_empty());
        self
    }

    pub fn with_site_title<S: Into<String>>(mut self, site_title: S) -> Self {
        self.site_title = site_title.into();
        self
    }

    /// The config for chat traffic: demo mode when there is no key to authenticate with
    pub fn into_provider_config(self) -> ProviderConfig {
        if self.api_key.is_some() {
            ProviderConfig::OpenRouter(self)
        } else {
            ProviderConfig::Demo
        }
    }
}
