use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use uppe_service::Config;
use uppe_service::monitoring::{Clock, Periodicity};
use uppe_service::orchestrator::Services;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "UPPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fire every periodicity at its wall clock boundary until interrupted
    Clock,
    /// Run a single dispatch cycle and print its report
    Trigger {
        /// Periodicity tag: 1m, 5m, 10m, 30m, 1h or other
        periodicity: Periodicity,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_ref()).context("failed to load configuration")?;

    match args.command {
        Command::Config => print!("{config}"),
        Command::Trigger { periodicity } => {
            let services = Services::start(&config).await?;
            let report = services.trigger.start_cycle(periodicity).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Clock => {
            let services = Services::start(&config).await?;
            let _handles = Clock::new(services.trigger.clone()).spawn();

            tokio::signal::ctrl_c().await?;
            info!("Interrupted, stopping clock");
        }
    }

    Ok(())
}
