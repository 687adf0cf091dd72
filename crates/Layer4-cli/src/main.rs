//! Taskhook CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Taskhook - background tasks that report back through signed callbacks
#[derive(Parser, Debug)]
#[command(name = "taskhook")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// TOML config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Also run a worker in this process
        #[arg(long)]
        embedded_worker: bool,
    },
    /// Run a worker that drains the broker
    Worker,
    /// Print the X-Signature a worker would send for a task
    Sign {
        task_id: String,

        /// Callback body, needed when the signature covers the body
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일은 있으면 읽고, 없으면 무시
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = cli::load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { embedded_worker } => cli::run_serve(config, embedded_worker).await,
        Command::Worker => cli::run_worker(config).await,
        Command::Sign { task_id, body } => {
            println!("{}", cli::sign(&config, &task_id, body.as_deref())?);
            Ok(())
        }
    }
}
