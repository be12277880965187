//! # docchat CLI
//!
//! The `docchat` binary drives the whole pipeline: it runs the streaming
//! proxy, uploads documents to the backend extraction endpoint, and submits
//! streaming queries scoped to the uploaded document's session.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the streaming proxy |
//! | `docchat upload <file>` | Upload a document, persist the session handle |
//! | `docchat ask "<prompt>"` | Stream an answer for the active session |
//! | `docchat reset` | Clear the stored session handle |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use docchat::config::load_config;
use docchat::session::SessionStore;
use docchat::submit::{QueryEvent, SubmissionController};
use docchat::transport::HttpTransport;

/// docchat — session-scoped streaming document Q&A.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — upload a document, then stream answers to questions about it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the streaming proxy.
    ///
    /// Relays `POST /api/query` to the backend and pipes the answer stream
    /// back unbuffered. Runs until terminated.
    Serve,

    /// Upload a document to the backend extraction endpoint.
    ///
    /// On success the returned session handle is persisted, replacing any
    /// previous one, and subsequent `ask` commands are scoped to this
    /// document.
    Upload {
        /// Path to the document to upload.
        file: PathBuf,
    },

    /// Ask a question about the uploaded document.
    ///
    /// Streams the answer to stdout as it arrives. Requires an active
    /// session (see `upload`).
    Ask {
        /// The question to ask.
        prompt: String,
    },

    /// Clear the stored session handle.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let store = SessionStore::new(&config.session.path);

    match cli.command {
        Commands::Serve => docchat::server::run_server(&config).await,
        Commands::Upload { file } => {
            let outcome = docchat::upload::upload_document(&config.backend.base_url, &file).await?;
            store.set(&outcome.session_id)?;
            println!("{}", outcome.description);
            println!("session: {}", outcome.session_id);
            Ok(())
        }
        Commands::Ask { prompt } => ask(&config.client.proxy_url, &store, &prompt).await,
        Commands::Reset => {
            store.clear()?;
            println!("session cleared");
            Ok(())
        }
    }
}

/// Submits one query and renders the answer incrementally.
async fn ask(proxy_url: &str, store: &SessionStore, prompt: &str) -> Result<()> {
    let session = store.get()?;
    let transport = Arc::new(HttpTransport::new(proxy_url)?);
    let mut controller = SubmissionController::new(transport);

    let mut events = controller.submit(session.as_ref(), prompt)?;

    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            QueryEvent::Delta(payload) => {
                write!(stdout, "{}", payload)?;
                stdout.flush()?;
            }
            QueryEvent::Completed(_) => {
                writeln!(stdout)?;
                return Ok(());
            }
            QueryEvent::Failed(e) => {
                writeln!(stdout)?;
                return Err(e.into());
            }
        }
    }

    Ok(())
}
