mod cache;
mod dbopt;
mod importer;
mod listcharacters;
mod models;
mod schema;
mod vendor;

use clap::Parser;
use dotenv::dotenv;
use std::process::exit;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(about, version)]
struct Capers {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Import character issues and appearances from the fan wiki.
    ImportIssues(importer::Args),

    /// Recompute the cached per-year appearance counts.
    SyncAppearances(importer::sync::Args),

    /// List known characters (in compact format).
    ListCharacters(listcharacters::Args),
}

#[tokio::main]
async fn main() {
    match dotenv() {
        Ok(_) => (),
        Err(ref err) if err.not_found() => (),
        Err(err) => {
            eprintln!("Failed to read env: {err}");
            exit(1);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    match run().await {
        Ok(()) => (),
        Err(error) => {
            eprintln!("Error: {error:#}");
            exit(1);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    match Capers::parse().cmd {
        Command::ImportIssues(args) => args.run().await,
        Command::SyncAppearances(args) => args.run().await,
        Command::ListCharacters(args) => args.run().await,
    }
}
