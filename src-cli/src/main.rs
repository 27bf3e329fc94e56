//! # kbchat
//!
//! Chat with a model about your own documents.
//!
//! ```bash
//! kbchat build handbook.pdf notes.md      # create the knowledge base
//! kbchat ask --mode docs "What is the refund policy?"
//! kbchat chat                             # interactive session
//! kbchat status
//! ```

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kbchat_core::config::load_config;
use kbchat_core::conversation::ResponseMode;

#[derive(Parser)]
#[command(name = "kbchat", version, about = "Ask questions about your documents, the web, or just chat")]
struct Cli {
    /// Path to the TOML configuration file. Missing file means defaults.
    #[arg(long, global = true, default_value = "./kbchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or replace) the knowledge base from PDF and text files.
    Build {
        files: Vec<PathBuf>,
    },

    /// Ask a single question and stream the answer.
    Ask {
        /// plain, web or docs.
        #[arg(long, default_value = "plain")]
        mode: ResponseMode,
        question: String,
    },

    /// Interactive chat. Type /help for commands.
    Chat {
        #[arg(long, default_value = "plain")]
        mode: ResponseMode,
    },

    /// Show whether a knowledge base exists.
    Status,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let result = load_config(&cli.config).and_then(|settings| match cli.command {
        Commands::Build { files } => commands::build(&settings, &files),
        Commands::Ask { mode, question } => commands::ask(&settings, mode, &question),
        Commands::Chat { mode } => commands::chat(&settings, mode),
        Commands::Status => commands::status(&settings),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
