//! CLI definitions for chirp.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// chirp - command-line social network client
#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(version)]
#[command(about = "Single-session command-line social network client")]
#[command(long_about = r#"
chirp - a command-line social network client backed by a local SQLite
database. One interactive user at a time registers, posts, follows,
searches, and reads a feed through a text menu.

Quick start:
  1. Create the database: chirp init
  2. Start a session:     chirp session
  3. Register, then log in with the user id you are given.
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "CHIRP_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format (for non-interactive commands)
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the database
    Init(InitArgs),

    /// Start an interactive session (login, register, browse)
    Session,

    /// Show network-wide statistics
    Stats,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Delete any existing database first (destroys all data)
    #[arg(long, short = 'F')]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}
