//! Main entry point for the market-archive CLI

use clap::Parser;
use market_archive::cli::Cli;
use market_archive::metrics;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("market_archive=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.print_metrics {
        metrics::init_metrics().map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    let result = cli.execute();

    if cli.print_metrics {
        if let Some(rendered) = metrics::render() {
            println!("{rendered}");
        }
    }

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
