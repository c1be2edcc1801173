//! A local-first AI assistant. For devs, by devs.
//!
//! ```sh
//! hermit invoke
//! hermit ponder "why is the sky blue?"
//! hermit scribe
//! hermit diagnose -- python broken.py
//! hermit chat new planning
//! hermit chat recall
//! ```

use clap::{Parser, Subcommand};
use hermit_cli::{DaemonClient, commands};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// A local-first AI assistant. For devs, by devs.
#[derive(Parser)]
#[command(name = "hermit", version)]
struct Cli {
    /// Address of the hermit daemon.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    daemon_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize or re-configure hermit for a project.
    Invoke,
    /// Hermit ponders on your question and gives its best answer.
    Ponder { prompt: String },
    /// Generate a semantic commit message from staged changes.
    Scribe,
    /// Run a command and diagnose it if it fails.
    Diagnose {
        /// The command to run, e.g. `hermit diagnose -- python broken.py`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Manage and interact with persistent chat sessions.
    #[command(subcommand)]
    Chat(ChatCommand),
}

#[derive(Subcommand)]
enum ChatCommand {
    /// Start a new chat session.
    New {
        /// Optional name for the session; defaults to the current date.
        session_name: Option<String>,
    },
    /// Pick a saved session and continue the conversation.
    Recall,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let project = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let daemon = match DaemonClient::new(&cli.daemon_url, &project) {
        Ok(daemon) => daemon,
        Err(e) => {
            eprintln!("{} {e}", console::style("Error:").red().bold());
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Invoke => commands::invoke::run(&daemon, &project).await,
        Command::Ponder { prompt } => commands::ponder::run(&daemon, &prompt).await,
        Command::Scribe => commands::scribe::run(&daemon).await,
        Command::Diagnose { command } => commands::diagnose::run(&daemon, &command).await,
        Command::Chat(ChatCommand::New { session_name }) => {
            commands::chat::new_session(daemon, &project, session_name).await
        }
        Command::Chat(ChatCommand::Recall) => commands::chat::recall_session(daemon, &project).await,
    };

    if let Err(e) = result {
        eprintln!("{} {e}", console::style("Error:").red().bold());
        process::exit(1);
    }
}
