//! tickwork: in-process job runner
//!
//! Main binary with subcommands:
//! - `run`: load job definitions and run them until Ctrl-C
//! - `next-run`: show how long until a wall-clock time next comes around

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod command_job;
mod config;
mod daemon;

#[derive(Parser)]
#[command(name = "tickwork")]
#[command(about = "Run periodic and one-shot jobs from a jobs file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and timers until interrupted
    Run {
        /// Path to the JSON jobs file
        #[arg(long, env = "TICKWORK_JOBS")]
        jobs: PathBuf,

        /// Seconds between scheduler ticks
        #[arg(
            long,
            env = "TICKWORK_TICK_SECS",
            default_value = "10",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        tick_secs: u64,
    },

    /// Print the delay until the next occurrence of a local time
    NextRun {
        /// Time of day, 24-hour HH:MM
        #[arg(value_name = "HH:MM")]
        time: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tickwork=info,tickwork_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { jobs, tick_secs } => {
            let config = config::DaemonConfig::load(&jobs, tick_secs)
                .map_err(|e| miette::miette!("{}", e))?;
            daemon::run(config).await
        }

        Commands::NextRun { time } => {
            let delay = tickwork_scheduler::due_time::duration_from_now(&time)
                .map_err(|e| miette::miette!("{}", e))?;
            let at = chrono::Local::now()
                + chrono::TimeDelta::from_std(delay).map_err(|e| miette::miette!("{}", e))?;
            println!("{} (at {})", format_delay(delay), at.format("%Y-%m-%d %H:%M"));
            Ok(())
        }
    }
}

/// Render a delay as `Xh Ym Zs`, dropping leading zero units.
fn format_delay(delay: Duration) -> String {
    let total = delay.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
