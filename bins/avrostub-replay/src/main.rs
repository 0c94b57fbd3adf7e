mod error;
mod input;
mod replay;

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "avrostub-replay",
    about = "Replay JSON lines through an in-memory Avro broker stub"
)]
struct Cli {
    /// Path to the TOML fixture configuration.
    #[arg(long, default_value = "avrostub.toml", env = "AVROSTUB_CONFIG")]
    config: PathBuf,

    /// JSON lines file, one `{topic, value, partition?, key?}` per line.
    #[arg(long)]
    input: PathBuf,

    /// Consumer group id; overrides `[consumer]` in the config.
    #[arg(long)]
    group: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config.display(), "loading configuration");
    let summary = match replay::run(&cli.config, &cli.input, cli.group).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %error::ReplayError::from(e), "cannot render summary");
            std::process::exit(1);
        }
    }
}
