use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use theta_core::{profile_path, AppConfig, ConfigError, ConfigLoader};

mod commands;

use commands::{CloseArgs, RemindArgs, RunArgs, StatusArgs, SummaryArgs, WatchArgs};

/// Process exit code for a configuration that cannot be loaded or is invalid.
const EXIT_CONFIG: u8 = 2;
/// Process exit code for a fatal invocation (store failure, stuck exit).
const EXIT_FATAL: u8 = 1;

#[derive(Parser)]
#[command(name = "theta")]
#[command(about = "0DTE put credit spread paper trader, one entry per day", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Theta.toml")]
    config: PathBuf,

    /// Profile overlay, read from <config stem>.<profile>.toml next to the config
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one engine invocation (meant for cron / a scheduler)
    Run(RunArgs),
    /// Invoke the engine on a fixed interval until interrupted
    Watch(WatchArgs),
    /// Print the stored record for a day
    Status(StatusArgs),
    /// Record a close done by hand for a position left OPEN
    Close(CloseArgs),
    /// Print running paper-trading statistics
    Summary(SummaryArgs),
    /// Send the pre-session reminder alert
    Remind(RemindArgs),
    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("failed to initialise logging: {e:#}");
        return ExitCode::from(EXIT_FATAL);
    }

    let config = match load_config(&cli.config, cli.profile.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(config = %cli.config.display(), error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run_once(&config, args).await,
        Commands::Watch(args) => commands::run_watch(&config, args).await,
        Commands::Status(args) => commands::run_status(&config, args),
        Commands::Close(args) => commands::run_close(&config, args).await,
        Commands::Summary(args) => commands::run_summary(&config, args),
        Commands::Remind(args) => commands::run_remind(&config, args).await,
        Commands::CheckConfig => commands::run_check_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Command failed");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(path: &Path, profile: Option<&str>) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::warn!(config = %path.display(), "Config file not found, using defaults and environment");
    }
    match profile {
        Some(profile) => {
            let overlay = profile_path(path, profile);
            if !overlay.exists() {
                return Err(ConfigError::invalid(format!(
                    "profile file {} not found",
                    overlay.display()
                )));
            }
            ConfigLoader::load_with_profile(path, profile)
        }
        None => ConfigLoader::load(path),
    }
}
