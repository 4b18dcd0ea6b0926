use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;
mod probe;

#[derive(Parser)]
#[command(author, version, about = "Operator probes for a running siterelay server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Target {
    /// Base URL of the server
    #[arg(long, env = "HEALTH_BASE_URL", default_value = "http://localhost:9000")]
    base: String,
}

#[derive(Subcommand)]
enum Command {
    /// Check /api/ai-health and a chat round trip, optionally reporting to a webhook
    Health {
        #[command(flatten)]
        target: Target,

        /// Per-request timeout in milliseconds
        #[arg(long, env = "HEALTH_TIMEOUT_MS", default_value_t = 15000)]
        timeout: u64,

        /// Where to POST the report as JSON
        #[arg(long, env = "HEALTH_WEBHOOK_URL")]
        webhook: Option<String>,

        /// Repeat every N seconds instead of checking once
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Send one message and print the start of the reply
    Chat {
        #[command(flatten)]
        target: Target,

        /// Model to ask; defaults to the first free model the server lists
        #[arg(short, long)]
        model: Option<String>,

        #[arg(short, long, default_value = "ping from siterelay chat")]
        prompt: String,
    },

    /// Stream one reply and print the deltas as they arrive
    Stream {
        #[command(flatten)]
        target: Target,

        /// Model to ask; defaults to the first free model the server lists
        #[arg(short, long)]
        model: Option<String>,

        #[arg(short, long, default_value = "streaming ping from siterelay stream")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Health {
            target,
            timeout,
            webhook,
            interval,
        } => commands::health::execute(target.base, timeout, webhook, interval).await,
        Command::Chat {
            target,
            model,
            prompt,
        } => commands::chat::execute(target.base, model, prompt).await,
        Command::Stream {
            target,
            model,
            prompt,
        } => commands::stream::execute(target.base, model, prompt).await,
    };

    if let Err(err) = &result {
        eprintln!("{} {:#}", style("error:").red().bold(), err);
        std::process::exit(1);
    }
    Ok(())
}
