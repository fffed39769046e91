pub mod process;
pub mod stats;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_servers, restart_server};
use stats::{process_stats_command, process_top_command};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{sampler::SamplerConfig, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Apptime", version, long_about = None)]
#[command(about = "Tracks per-application CPU usage over time", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[arg(
            long,
            help = "Application directory. By default tries to save into %APPDATA% or $XDG_STATE_HOME"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Display daily CPU usage totals for the trailing window")]
    Stats {
        #[arg(
            long,
            default_value_t = 7,
            help = "Trailing window in days, including today"
        )]
        days: u32,
    },
    #[command(about = "Display the applications with the highest CPU usage")]
    Top {
        #[arg(long, default_value_t = 10, help = "Number of applications to show")]
        limit: usize,
        #[arg(
            long,
            default_value_t = 7,
            help = "Trailing window in days, including today"
        )]
        days: u32,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into %APPDATA% or $XDG_STATE_HOME"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let default_dir = create_application_default_path()?;
    enable_logging(CLI_PREFIX, &default_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init { .. } => {
            restart_server()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = std::env::current_exe()?;
            kill_previous_servers(&process_name);
            Ok(())
        }
        Commands::Serve { dir } => {
            let dir = dir.unwrap_or(default_dir);
            start_daemon(dir, SamplerConfig::default()).await
        }
        Commands::Stats { days } => process_stats_command(&default_dir, days).await,
        Commands::Top { limit, days } => process_top_command(&default_dir, limit, days).await,
    }
}
