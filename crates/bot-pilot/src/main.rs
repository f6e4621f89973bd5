use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use bot_pilot::config::PilotConfig;
use bot_pilot::elo;
use bot_pilot::selfplay::{SelfPlay, SelfPlaySession};
use bot_pilot::transport::ProcessLauncher;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::Level;

/// Environment variable holding the bot account's API token.
const TOKEN_VAR: &str = "LICHESS_TOKEN";

#[derive(Parser)]
#[command(name = "bot-pilot")]
#[command(about = "Plays UCI chess engines against each other")]
struct Cli {
    /// Configuration file (defaults to pilot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer challenges and play games as a bot account
    Server,
    /// Play a baseline engine against a candidate build
    Selfplay {
        /// Baseline engine executable
        #[arg(long)]
        baseline: PathBuf,
        /// Candidate engine executable
        #[arg(long)]
        candidate: PathBuf,
        /// Number of games to play
        #[arg(short, long)]
        games: Option<u32>,
        /// Games played at once
        #[arg(short, long)]
        parallel: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let config = match &cli.config {
        Some(path) => PilotConfig::load_from(path),
        None => PilotConfig::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Commands::Server => {
            service_token(std::env::var(TOKEN_VAR).ok())?;
            tracing::info!(engine = %config.server.engine.display(), "server mode requested");
            anyhow::bail!(
                "no HTTP client for the matchmaking service is built in; \
                 run bot_pilot::server::Server with a RemoteService implementation"
            );
        }
        Commands::Selfplay {
            baseline,
            candidate,
            games,
            parallel,
        } => {
            let session = SelfPlaySession {
                games: games.unwrap_or(config.selfplay.games),
                parallelism: Some(
                    parallel
                        .or(config.selfplay.parallel)
                        .unwrap_or_else(num_cpus::get),
                ),
                clock: config.selfplay.clock(),
                ..SelfPlaySession::new(baseline, candidate, 0)
            };

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, finishing games in progress");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let result = SelfPlay::new(session, Arc::new(ProcessLauncher))
                .with_cancel_flag(cancel)
                .run()
                .await
                .context("Self-play failed")?;

            let (candidate_score, baseline_score) = result.score();
            println!("final score: {}-{}", candidate_score, baseline_score);
            match elo::estimate(&result) {
                Some(estimate) => println!(
                    "elo difference: {:+.1} +/- {:.1}",
                    estimate.difference, estimate.margin
                ),
                None => println!("elo difference: n/a"),
            }
        }
    }
    Ok(())
}

/// The API token for server mode; it must be set and non-empty.
fn service_token(value: Option<String>) -> anyhow::Result<String> {
    match value {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => anyhow::bail!("failed to read {}", TOKEN_VAR),
    }
}
