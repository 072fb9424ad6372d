//! Acontext CLI, the main entry point.
//!
//! Commands:
//! - `init`     : write the default config file
//! - `session`  : manage sessions
//! - `process`  : feed a batch of messages to the task agent
//! - `tasks`    : show a session's task list

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(
    name = "acontext",
    about = "Acontext: keep a session's task list in step with its conversation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.acontext/config.toml
    #[arg(short, long, global = true, env = "ACONTEXT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Manage sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Store a batch of messages and run the task agent over it
    Process {
        /// Session to process
        #[arg(short, long)]
        session: Uuid,

        /// JSON file holding an array of messages
        #[arg(short, long)]
        messages: PathBuf,

        /// How many earlier messages to show the agent as context
        #[arg(short, long, default_value_t = 10)]
        previous: usize,

        /// Override agent.max_iterations from the config
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Show the task list of a session
    Tasks {
        #[arg(short, long)]
        session: Uuid,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create an empty session and print its id
    New,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Init => commands::init::run(cli.config.as_deref()).await?,
        Commands::Session {
            command: SessionCommands::New,
        } => commands::session::new(&config).await?,
        Commands::Process {
            session,
            messages,
            previous,
            max_iterations,
        } => {
            let args = commands::process::ProcessArgs {
                session_id: session,
                messages_path: messages,
                previous,
                max_iterations: max_iterations.unwrap_or(config.agent.max_iterations),
            };
            commands::process::run(&config, args).await?
        }
        Commands::Tasks { session } => commands::tasks::run(&config, session).await?,
    }

    Ok(())
}
