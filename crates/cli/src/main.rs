//! acserverctl - Assetto Corsa server plugin client
//!
//! Attaches to a dedicated server's UDP plugin interface, tracks sessions
//! and drivers, answers admin chat commands and hands finished sessions to
//! report sinks.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod completion;
mod error;
mod output;
mod plugins;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openracing_acserver_client::{ClientConfig, SessionClient, run_udp};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::CliError;
use crate::plugins::{JsonReportSink, LoggingPlugin, LoggingReportSink};

#[derive(Parser)]
#[command(name = "acserverctl")]
#[command(about = "Assetto Corsa dedicated server plugin client")]
#[command(version)]
#[command(long_about = "
acserverctl connects to the UDP plugin interface of an Assetto Corsa
dedicated server. It follows sessions and drivers, reconstructs standings
when a session ends, answers admin chat commands and relays raw traffic to
external plugins.

Point the server's UDP_PLUGIN_ADDRESS at the client's listening port and
UDP_PLUGIN_LOCAL_PORT at remote_port in the configuration file.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the server and run until interrupted
    Run {
        /// Configuration file (YAML, or JSON with a .json extension)
        #[arg(short, long, env = "ACSERVERCTL_CONFIG")]
        config: PathBuf,

        /// Write each finished session as JSON into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Configuration file commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file and print it
    Show { path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "acserverctl={log_level},openracing_acserver_client={log_level},openracing_acserver_session={log_level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match execute_command(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            ExitCode::from(error::exit_code(&e))
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run { config, report_dir } => {
            run(config, report_dir.as_deref(), cli.json).await
        }
        Commands::Config(ConfigCommands::Init { path, force }) => init_config(path, *force),
        Commands::Config(ConfigCommands::Show { path }) => {
            let config = ClientConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            output::print_config(&config, cli.json)
        }
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()).into());
    }
    ClientConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn run(config_path: &Path, report_dir: Option<&Path>, json: bool) -> Result<()> {
    let config = ClientConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let client = SessionClient::new(config)?;
    client.register_plugin(Arc::new(LoggingPlugin))?;
    client.register_report_sink(Arc::new(LoggingReportSink))?;
    if let Some(dir) = report_dir {
        if !dir.is_dir() {
            return Err(CliError::ReportDirectory(dir.to_path_buf()).into());
        }
        client.register_report_sink(Arc::new(JsonReportSink::new(dir.to_path_buf())))?;
    }

    info!(
        listening_port = client.config().listening_port,
        remote_host = %client.config().remote_host,
        remote_port = client.config().remote_port,
        "Starting server plugin client"
    );

    run_udp(client.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Interrupted");
    })
    .await?;

    output::print_plugin_stats(&client.plugin_stats(), json)
}
