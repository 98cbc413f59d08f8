//! chirp - command-line social network client
//!
//! Main entry point for the chirp binary.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use chirp::config::Config;
use chirp::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    let config = Config::load();

    match &cli.command {
        Commands::Init(args) => cmd_init(&cli, &config, args),
        Commands::Session => cmd_session(&cli, &config),
        Commands::Stats => cmd_stats(&cli, &config),
        Commands::Completions(args) => cmd_completions(args.clone()),
    }
}

fn get_db_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.db.clone().unwrap_or_else(|| config.db_path())
}

fn cmd_init(cli: &Cli, config: &Config, args: &cli::InitArgs) -> Result<()> {
    let db_path = get_db_path(cli, config);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if args.force && db_path.exists() {
        std::fs::remove_file(&db_path)?;
        info!("Removed existing database");
    }

    let store = Store::open(&db_path)?;
    drop(store);

    println!("{}", "Database ready.".bold().green());
    println!("  Database: {}", db_path.display());
    println!();
    println!("Run {} to start.", "chirp session".bold());

    Ok(())
}

fn cmd_session(cli: &Cli, config: &Config) -> Result<()> {
    let db_path = get_db_path(cli, config);

    if !db_path.exists() {
        return Err(ChirpError::database_not_found(db_path).into());
    }

    let store = Store::open(&db_path)?;
    session::run(store)?;
    Ok(())
}

fn cmd_stats(cli: &Cli, config: &Config) -> Result<()> {
    let db_path = get_db_path(cli, config);

    if !db_path.exists() {
        return Err(ChirpError::database_not_found(db_path).into());
    }

    let store = Store::open(&db_path)?;
    let stats = store.network_stats()?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&stats)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("{}", "Network Statistics".bold().cyan());
            println!("{}", "─".repeat(40));
            println!("  {:<20} {:>10}", "Users:", stats.users_count);
            println!("  {:<20} {:>10}", "Tweets:", stats.tweets_count);
            println!("  {:<20} {:>10}", "Replies:", stats.replies_count);
            println!("  {:<20} {:>10}", "Follows:", stats.follows_count);
            println!("  {:<20} {:>10}", "Retweets:", stats.retweets_count);
            println!("  {:<20} {:>10}", "Hashtags:", stats.hashtags_count);
            println!("{}", "─".repeat(40));

            if let (Some(first), Some(last)) = (stats.first_tweet_date, stats.last_tweet_date) {
                println!(
                    "  First tweet: {}",
                    first.format("%Y-%m-%d").to_string().green()
                );
                println!(
                    "  Last tweet:  {}",
                    last.format("%Y-%m-%d").to_string().green()
                );
            }
        }
    }

    Ok(())
}

fn cmd_completions(args: cli::CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "chirp", &mut io::stdout());
    Ok(())
}
