#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaClient};
use crate::engine::Answer;
use crate::index::{SearchResult, VectorStore};
use crate::llm::{ChatModel, GroqClient};
use crate::loader::Source;
use crate::session::{Ingestor, Session, Upload};

/// Characters of each source chunk shown under an answer
pub const SOURCE_PREVIEW_CHARS: usize = 500;

/// One line typed into the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    File(PathBuf),
    Url(String),
    Process,
    History,
    Help,
    Quit,
    Question(String),
    Unknown(String),
    Empty,
}

impl ChatCommand {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Question(line.to_string());
        }

        let (command, argument) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, a)| (c, a.trim()));

        match (command, argument) {
            ("/file", path) if !path.is_empty() => Self::File(PathBuf::from(path)),
            ("/url", url) if !url.is_empty() => Self::Url(url.to_string()),
            ("/process", _) => Self::Process,
            ("/history", _) => Self::History,
            ("/help", _) => Self::Help,
            ("/quit" | "/exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// `Source N:` heading followed by the start of the chunk text
#[inline]
pub fn format_source(position: usize, result: &SearchResult) -> String {
    format!("Source {}:\n{}...", position + 1, preview(&result.chunk.content))
}

fn preview(content: &str) -> String {
    content.chars().take(SOURCE_PREVIEW_CHARS).collect()
}

/// Connect to Ollama and make sure the embedding model has been pulled
#[inline]
pub fn connect_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = OllamaClient::new(config).context("Failed to create Ollama client")?;

    client.health_check().with_context(|| {
        format!(
            "Ollama at {}:{} is not ready. Use 'knowledge-assistant config' to update connection settings.",
            config.ollama.host, config.ollama.port
        )
    })?;

    info!(
        "Ollama connected at {}:{} with model {}",
        config.ollama.host,
        config.ollama.port,
        client.model()
    );
    Ok(Arc::new(client))
}

#[inline]
pub fn connect_chat_model(config: &Config, api_key: String) -> Result<Arc<dyn ChatModel>> {
    let client = GroqClient::new(&config.llm, api_key).context("Failed to create chat client")?;
    debug!("Using chat model {}", client.model());
    Ok(Arc::new(client))
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("📚 Sources").bold().cyan());
        for (position, result) in answer.sources.iter().enumerate() {
            println!("{}", format_source(position, result));
            println!();
        }
    }
}

fn print_help() {
    eprintln!("{}", style("Commands:").bold().yellow());
    eprintln!("  /file <path>   queue a .txt or .pdf file");
    eprintln!("  /url <url>     queue a web page");
    eprintln!("  /process       build the index from queued files and URLs");
    eprintln!("  /history       show the conversation so far");
    eprintln!("  /help          show this message");
    eprintln!("  /quit          leave the chat");
    eprintln!("Anything else is asked as a question.");
}

/// Interactive loop: queue sources, process them, then ask questions
#[inline]
pub async fn run_chat(config: Config, api_key: String) -> Result<()> {
    let embedder = connect_embedder(&config)?;
    let llm = connect_chat_model(&config, api_key)?;
    let mut session = Session::new(config, embedder, llm)?;

    eprintln!("{}", style("🧠 Knowledge Assistant").bold().cyan());
    match session.load_index().await {
        Ok(count) => eprintln!(
            "{}",
            style(format!("Loaded existing index with {} chunks.", count)).green()
        ),
        Err(e) => {
            debug!("No previous index loaded: {}", e);
            eprintln!("Add sources with /file or /url, then run /process.");
        }
    }
    print_help();

    let mut uploads: Vec<Upload> = Vec::new();
    let mut urls: Vec<String> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("{} ", style(">").bold().green());
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => {}
            ChatCommand::Help => print_help(),
            ChatCommand::Quit => break,
            ChatCommand::Unknown(input) => {
                eprintln!("{} {}", style("Unknown command:").yellow(), input);
            }
            ChatCommand::File(path) => match queue_file(&path) {
                Ok(upload) => {
                    eprintln!("Queued {}", style(&upload.file_name).cyan());
                    uploads.push(upload);
                }
                Err(e) => eprintln!("{} {:#}", style("✗").red(), e),
            },
            ChatCommand::Url(url) => {
                eprintln!("Queued {}", style(&url).cyan());
                urls.push(url);
            }
            ChatCommand::Process => {
                let bar = spinner("Processing documents...");
                let result = session.process_documents(&uploads, &urls.join("\n")).await;
                bar.finish_and_clear();

                match result {
                    Ok(outcome) => eprintln!(
                        "{}",
                        style(format!(
                            "✅ Processed {} document chunks successfully!",
                            outcome.chunks
                        ))
                        .green()
                    ),
                    Err(e) => eprintln!("{} {}", style("✗").red(), e),
                }
                uploads.clear();
                urls.clear();
            }
            ChatCommand::History => {
                for message in session.chat_history() {
                    println!("{}: {}", style(message.role).bold(), message.content);
                }
            }
            ChatCommand::Question(question) => {
                let bar = spinner("Thinking...");
                let result = session.ask(&question).await;
                bar.finish_and_clear();

                match result {
                    Ok(answer) => print_answer(&answer),
                    Err(e) => eprintln!("{} {}", style("✗").red(), e),
                }
            }
        }
    }

    Ok(())
}

fn queue_file(path: &Path) -> Result<Upload> {
    Source::from_path(path)?;
    Ok(Upload::from_path(path)?)
}

/// Build and persist an index from files and URLs
#[inline]
pub async fn ingest(config: Config, files: &[PathBuf], urls: &[String]) -> Result<()> {
    let uploads: Vec<Upload> = files
        .iter()
        .map(|path| Upload::from_path(path))
        .collect::<crate::Result<_>>()?;

    let embedder = connect_embedder(&config)?;
    let ingestor = Ingestor::new(config, embedder)?;

    let bar = spinner("Processing documents...");
    let result = ingestor.process(&uploads, &urls.join("\n")).await;
    bar.finish_and_clear();
    let (store, outcome) = result?;

    eprintln!(
        "{}",
        style(format!(
            "✅ Processed {} document chunks successfully!",
            outcome.chunks
        ))
        .green()
    );
    eprintln!(
        "Index saved to: {}",
        style(store.directory().display()).cyan()
    );
    Ok(())
}

/// Answer a single question from the persisted index
#[inline]
pub async fn ask_once(config: Config, api_key: String, question: &str) -> Result<()> {
    let embedder = connect_embedder(&config)?;
    let llm = connect_chat_model(&config, api_key)?;
    let mut session = Session::new(config, embedder, llm)?;

    if let Err(e) = session.load_index().await {
        warn!("No index available: {}", e);
        eprintln!(
            "{}",
            style("No index found. Run 'knowledge-assistant ingest' first.").yellow()
        );
    }

    let bar = spinner("Thinking...");
    let result = session.ask(question).await;
    bar.finish_and_clear();

    print_answer(&result?);
    Ok(())
}

/// Print the `k` chunks most similar to `query`
#[inline]
pub async fn search(config: &Config, query: &str, k: usize) -> Result<()> {
    let embedder = connect_embedder(config)?;
    let store = VectorStore::load(&config.index_directory(), embedder)
        .await
        .context("Run 'knowledge-assistant ingest' to build an index first")?;

    let results = store.search(query, k).await?;
    if results.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (position, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let location = chunk
            .page
            .map_or_else(|| chunk.source.clone(), |page| format!("{} (page {})", chunk.source, page));
        println!(
            "{}. [{:.3}] {}",
            position + 1,
            result.similarity_score,
            style(location).cyan()
        );
        if let Some(title) = &chunk.title {
            println!("   {}", style(title).bold());
        }
        println!("   {}...", preview(&chunk.content));
        println!();
    }

    Ok(())
}
