mod search;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tablescout_scraper::CancelFlag;

#[derive(Debug, Parser)]
#[command(name = "tablescout")]
#[command(about = "Collect restaurant listings from search result pages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one search per location and write JSON lines
    Search(SearchArgs),
    /// Print the effective site profile as JSON
    Profile,
}

#[derive(Debug, Clone, Args)]
struct SearchArgs {
    /// Location or search term; repeat for several queries
    #[arg(long = "location", short = 'l')]
    locations: Vec<String>,
    /// Reservation date, YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
    /// Reservation time, HH:MM (requires --date)
    #[arg(long)]
    time: Option<String>,
    /// Party size
    #[arg(long)]
    covers: Option<u32>,
    /// Listings to collect per query
    #[arg(long, short = 'n')]
    results_wanted: Option<usize>,
    /// Open this URL instead of building a search URL
    #[arg(long)]
    start_url: Option<String>,
    /// Replay a captured browser snapshot (JSON) instead of fetching
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Write JSON lines here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = tablescout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Search(args)) => {
            let cancel = CancelFlag::new();
            spawn_ctrl_c_handler(cancel.clone());
            search::run_search(&config, &args, &cancel).await?;
        }
        Some(Commands::Profile) => {
            let profile = search::load_profile(&config)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        None => println!("tablescout: try `tablescout search --location <city>`"),
    }

    Ok(())
}

/// First Ctrl-C cancels every running query; drivers stop between pages
/// and keep what they already emitted.
fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received ctrl-c, stopping after the current page");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests;
