//! ManaHRMS CLI - a command-line host for the ManaHRMS session core.
//!
//! Wires the credential store, transport, and managers together the way the
//! mobile shell does, and prints each result as JSON.

mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use manahrms_core::{AppContext, Config, TracingReporter};
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ManaHRMS CLI - sign in and manage your employee profile.
#[derive(Parser)]
#[command(name = "manahrms")]
#[command(about = "ManaHRMS client for session and profile management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for a daily rolling log file, in addition to stderr
    #[arg(long, env = "MANAHRMS_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Secret for the encrypted credential file backend
    #[arg(long, env = "MANAHRMS_DEVICE_SECRET", hide_env_values = true, global = true)]
    device_secret: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status,

    /// Sign in with email and password
    Login {
        /// Account email (defaults to the last one used)
        #[arg(env = "MANAHRMS_EMAIL")]
        email: Option<String>,

        /// Password (prompted for when absent)
        #[arg(long, env = "MANAHRMS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show or update the extended profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommands>,
    },

    /// Upload a profile picture
    Avatar {
        /// Image file to upload
        path: PathBuf,
    },

    /// Change the account password
    ChangePassword,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Fetch the extended profile
    Show,

    /// Update profile fields
    Set {
        /// Fields as key=value; JSON values keep their type
        #[arg(required = true, value_parser = commands::parse_field)]
        fields: Vec<(String, Value)>,
    },
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "manahrms.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_ref());

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let secret = cli.device_secret.as_deref().map(str::as_bytes);
    let store = AppContext::open_store(&config, secret).await?;
    let context = AppContext::new(&config, store, Arc::new(TracingReporter))?;

    info!(base_url = config.base_url(), "ManaHRMS CLI starting");
    context.session.initialize().await;

    let succeeded = match cli.command {
        Commands::Status => commands::status(&context).await?,
        Commands::Login { email, password } => {
            commands::login(&context, &mut config, email, password).await?
        }
        Commands::Logout => commands::logout(&context).await?,
        Commands::Profile { command } => match command.unwrap_or(ProfileCommands::Show) {
            ProfileCommands::Show => commands::show_profile(&context).await?,
            ProfileCommands::Set { fields } => commands::set_profile(&context, fields).await?,
        },
        Commands::Avatar { path } => commands::upload_avatar(&context, &path).await?,
        Commands::ChangePassword => commands::change_password(&context).await?,
    };

    // Returning lets the log guard flush before the process exits
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
