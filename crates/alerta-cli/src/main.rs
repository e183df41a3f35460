//! Alerta CLI - Command-line interface
//!
//! Usage:
//!   alerta index --records <json>... --table <csv|xlsx>... [--search <text> -k N]
//!   alerta chat --records <json>... --table <csv|xlsx>... [--question <q>]

use alerta_core::{AppConfig, ChatTurn, EmbeddingClient, LlmClient, LoggingConfig, SourceRecord};
use alerta_rag::{create_llm_client, select_references, Answer, IndexBuilder, Responder};
use alerta_vector::{create_embedding_client, CachedEmbedding, IndexHandle};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "alerta")]
#[command(about = "Question answering over Mexican natural-disaster news")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and report what was added
    Index {
        #[command(flatten)]
        sources: SourceArgs,

        /// Run a retrieval for this text after building
        #[arg(long)]
        search: Option<String>,

        /// Number of documents to select
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Ask questions about the indexed news
    Chat {
        #[command(flatten)]
        sources: SourceArgs,

        /// Answer a single question and exit
        #[arg(long)]
        question: Option<String>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// JSON file with an array of summarized news records
    #[arg(long = "records")]
    records: Vec<PathBuf>,

    /// CSV or Excel file whose rows are indexed as documents
    #[arg(long = "table")]
    tables: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    let embedder = Arc::new(CachedEmbedding::new(
        create_embedding_client(&config.llm)?,
        &config.index,
    ));
    let builder = IndexBuilder::new(embedder.clone(), config.index.embedding_concurrency);

    match cli.command {
        Commands::Index { sources, search, k } => {
            let handle = build_index(&builder, &sources).await?;
            if let Some(text) = search {
                let query = embedder.embed(&text).await?;
                let index = handle.read().await;
                let references = select_references(
                    &index,
                    &query,
                    k.unwrap_or(config.rag.top_k),
                    config.rag.mmr_lambda,
                    config.rag.candidate_pool,
                )?;
                for r in &references {
                    println!(
                        "[{}] id={} sim={:.3} mmr={:.3} {}",
                        r.rank,
                        r.id(),
                        r.similarity,
                        r.mmr_score,
                        r.document.title().unwrap_or("-")
                    );
                    println!("    {}", r.document.summary);
                }
            }
        }
        Commands::Chat { sources, question } => {
            let handle = build_index(&builder, &sources).await?;
            let llm: Arc<dyn LlmClient> = Arc::from(create_llm_client(&config.llm)?);
            let responder = Responder::new(embedder.clone(), llm, config.rag.clone());

            match question {
                Some(question) => {
                    let (answer, _) = responder.answer(&question, &handle, &[]).await?;
                    print_answer(&answer);
                }
                None => chat_loop(&responder, &handle).await?,
            }
        }
    }

    tracing::debug!(
        hits = embedder.hits(),
        misses = embedder.misses(),
        "Embedding cache"
    );
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("alerta={}", logging.level).into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Index every records file, then every table, into one handle
async fn build_index(builder: &IndexBuilder, sources: &SourceArgs) -> anyhow::Result<IndexHandle> {
    let handle = IndexHandle::new();

    for path in &sources.records {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read records from {}", path.display()))?;
        let records = SourceRecord::parse_many(&json)?;
        let (_, report) = builder
            .build_or_extend_index(records, Some(handle.clone()))
            .await?;
        println!(
            "{}: {} added, {} blank, {} malformed (total {})",
            path.display(),
            report.added,
            report.skipped_blank,
            report.malformed,
            report.total
        );
    }

    for path in &sources.tables {
        let table = alerta_parser::parse_table(path)?;
        let (_, report) = builder.add_table(&table, Some(handle.clone())).await?;
        println!(
            "{}: {} rows added (total {})",
            path.display(),
            report.added,
            report.total
        );
    }

    Ok(handle)
}

async fn chat_loop(responder: &Responder, handle: &IndexHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ChatTurn> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("salir") {
            break;
        }

        match responder.answer(question, handle, &history).await {
            Ok((answer, updated)) => {
                history = updated;
                print_answer(&answer);
            }
            Err(e) if e.is_gateway() => {
                tracing::warn!(error = %e, "Question failed, history kept");
                eprintln!("Error: {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if answer.citations.is_empty() {
        return;
    }

    println!();
    println!("Fuentes:");
    for r in answer
        .references
        .iter()
        .filter(|r| answer.citations.contains(&r.id()))
    {
        println!("  [{}] {}", r.rank, r.document.title().unwrap_or(&r.document.summary));
    }
}
