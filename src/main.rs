use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use capi::cli::Cli;
use capi::config;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise --verbose picks the capi level.
    let default_level = if cli.verbose { "capi=debug" } else { "capi=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = config::resolve(&cli)?;
    tracing::debug!(?settings, "resolved settings");

    capi::server::run_serve(&settings).await?;
    Ok(())
}
