use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use knowledge_assistant::commands::{ask_once, ingest, run_chat, search};
use knowledge_assistant::config::{Config, get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "knowledge-assistant")]
#[command(about = "Ask questions about local documents and web pages")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the persisted index
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Chat model API key (defaults to the configured environment variable)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Load files and web pages and build the index
    Ingest {
        /// Text or PDF files to load
        files: Vec<PathBuf>,
        /// Web page to load; may be repeated
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Answer one question from the persisted index
    Ask {
        question: String,
        /// Chat model API key (defaults to the configured environment variable)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show the chunks most similar to a query
    Search {
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
    /// Configure the embedding service, chat model and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn resolve_api_key(config: &Config, flag: Option<String>) -> Result<String> {
    match config.llm.resolve_api_key(flag, config.llm.api_key_from_env()) {
        Ok(key) => Ok(key),
        Err(missing) => {
            eprintln!("{}", missing);
            let key = Password::new()
                .with_prompt("Chat model API key")
                .interact()
                .context("Failed to read API key")?;
            Ok(config.llm.resolve_api_key(Some(key), None)?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Chat { api_key } => {
            let config = Config::load(&config_dir)?;
            let api_key = resolve_api_key(&config, api_key)?;
            run_chat(config, api_key).await?;
        }
        Commands::Ingest { files, urls } => {
            let config = Config::load(&config_dir)?;
            ingest(config, &files, &urls).await?;
        }
        Commands::Ask { question, api_key } => {
            let config = Config::load(&config_dir)?;
            let api_key = resolve_api_key(&config, api_key)?;
            ask_once(config, api_key, &question).await?;
        }
        Commands::Search { query, k } => {
            let config = Config::load(&config_dir)?;
            search(&config, &query, k).await?;
        }
    }

    Ok(())
}
