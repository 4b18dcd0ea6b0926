mod configuration;
mod error;
mod routes;
mod state;

use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the process environment still applies
    dotenv::dotenv().ok();

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("siterelay=info,siterelayd=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let settings = configuration::Settings::new()?;
    let addr = settings.bind_address();

    if settings.api_key().is_none() {
        info!("OPENROUTER_API_KEY is not set, chat endpoints answer in demo mode");
    }
    if settings.smtp_config().is_none() {
        info!("SMTP is not configured, contact form submissions will be refused");
    }

    // Create app state
    let state = state::AppState::new(settings)?;
    let app = routes::app(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
