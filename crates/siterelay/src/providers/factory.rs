use std::sync::Arc;

use reqwest::Client;

use super::{
    base::Provider, configs::ProviderConfig, demo::DemoProvider, openrouter::OpenRouterProvider,
};

pub fn get_provider(config: ProviderConfig, client: Client) -> Arc<dyn Provider> {
    match config {
        ProviderConfig::OpenRouter(openrouter_config) => {
            Arc::new(OpenRouterProvider::with_client(client, openrouter_config))
        }
        ProviderConfig::Demo => Arc::new(DemoProvider::new()),
    }
}
