use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use guestbook::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    guestbook::run(cli).await
}
