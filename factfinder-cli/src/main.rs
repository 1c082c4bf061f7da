//! factfinder CLI - ask questions of a fact file
//!
//! # Commands
//!
//! ```bash
//! # Best single match for a question
//! factfinder --corpus profile.txt lookup "Where did I study?"
//!
//! # Top 3 ranked facts
//! factfinder lookup -k 3 "Where do I live?"
//!
//! # Bounded retry; several queries run concurrently against one index
//! factfinder retrieve --threshold 0.3 --max-attempts 3 "What's my address?" "Favorite ice cream?"
//!
//! # Embed text and show vector stats
//! factfinder embed --query "Where did I study?"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use factfinder_lib::{
    embed::{shared_text_embedder, Embedder, ModelKind, TextEmbedder},
    index::{semantic_lookup, EmbeddingIndex},
    retrieve::{
        CancellationToken, RetrievalConfig, RetrievalOutcome, RetrievalSession,
        DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_ATTEMPTS,
    },
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "factfinder")]
#[command(about = "Semantic lookup over a file of short facts")]
#[command(version)]
struct Cli {
    /// Fact file, one fact per line
    #[arg(short, long, env = "FACTFINDER_CORPUS", default_value = "profile.txt", global = true)]
    corpus: PathBuf,

    /// Embedding model: "minilm" or "bge"
    #[arg(short, long, env = "FACTFINDER_MODEL", default_value = "minilm", global = true)]
    model: ModelKind,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the best matching fact (single attempt, no threshold)
    Lookup {
        /// Questions to look up
        #[arg(required = true)]
        queries: Vec<String>,

        /// Show the top k facts instead of only the best one
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Retrieve with a confidence threshold and bounded retries
    Retrieve {
        /// Questions to retrieve context for
        #[arg(required = true)]
        queries: Vec<String>,

        /// Minimum similarity for accepting a match
        #[arg(
            short,
            long,
            env = "FACTFINDER_THRESHOLD",
            default_value_t = DEFAULT_CONFIDENCE_THRESHOLD
        )]
        threshold: f64,

        /// Attempts before giving up
        #[arg(long, env = "FACTFINDER_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },

    /// Embed text and show vector info
    Embed {
        /// Text to embed
        text: String,

        /// Treat as query (uses query prompt prefix)
        #[arg(short, long)]
        query: bool,
    },

    /// List the facts in the corpus
    Corpus,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let index = Arc::new(EmbeddingIndex::from_file(&cli.corpus, cli.model));

    match cli.command {
        Commands::Lookup { queries, k } => {
            let json = cli.json;
            tokio::task::spawn_blocking(move || lookup(&index, &queries, k, json)).await??;
        }

        Commands::Retrieve {
            queries,
            threshold,
            max_attempts,
        } => {
            let config = RetrievalConfig::new(threshold, max_attempts);
            config.validate()?;

            // fatal corpus problems surface before any session starts
            let loader = Arc::clone(&index);
            match tokio::task::spawn_blocking(move || loader.ensure_loaded()).await? {
                Err(e @ factfinder_lib::Error::ModelUnavailable(_)) => {
                    tracing::warn!(
                        error = %e,
                        "model not ready; sessions will count failed attempts"
                    );
                }
                other => other.with_context(|| format!("loading {}", cli.corpus.display()))?,
            }

            let outcomes = retrieve_all(index, queries, config).await?;
            for (query, outcome) in &outcomes {
                print_outcome(query, outcome, cli.json)?;
            }
        }

        Commands::Embed { text, query } => {
            eprintln!("Loading {} (first run downloads the model)...", cli.model.model_name());
            let embedding =
                tokio::task::spawn_blocking(move || embed(cli.model, &text, query)).await??;

            println!("Embedding stats:");
            println!("  Dimensions: {}", embedding.len());
            println!("  First 5 values: {:?}", &embedding[..embedding.len().min(5)]);
            println!("  Min: {:.4}", embedding.iter().copied().fold(f32::INFINITY, f32::min));
            println!("  Max: {:.4}", embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max));
        }

        Commands::Corpus => {
            let corpus = tokio::task::spawn_blocking(move || index.corpus())
                .await?
                .with_context(|| format!("loading {}", cli.corpus.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&corpus)?);
            } else {
                for (i, fact) in corpus.iter().enumerate() {
                    println!("{i:>3}  {fact}");
                }
            }
        }
    }

    Ok(())
}

fn lookup(
    index: &EmbeddingIndex<TextEmbedder>,
    queries: &[String],
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    for query in queries {
        match k {
            Some(k) => {
                let ranked = index.top_matches(query, k)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&ranked)?);
                    continue;
                }
                println!("Question: {query}");
                for (rank, fact) in ranked.iter().enumerate() {
                    println!(
                        "  #{} (score: {:.4}) [{}] {}",
                        rank + 1,
                        fact.score,
                        fact.index,
                        fact.fact
                    );
                }
            }
            None => {
                let result = semantic_lookup(index, query)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    continue;
                }
                println!("Question: {}", result.query);
                println!("Best match: {}", result.best_match);
                println!("Confidence: {:.4}", result.score);
            }
        }
        println!();
    }
    Ok(())
}

/// Run one session per query on blocking tasks sharing `index`.
///
/// Ctrl-C cancels all sessions at their next attempt boundary.
async fn retrieve_all(
    index: Arc<EmbeddingIndex<TextEmbedder>>,
    queries: Vec<String>,
    config: RetrievalConfig,
) -> Result<Vec<(String, RetrievalOutcome)>> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling retrieval");
            on_interrupt.cancel();
        }
    });

    let handles: Vec<_> = queries
        .into_iter()
        .map(|query| {
            let index = Arc::clone(&index);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || session_outcome(&index, query, config, cancel))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await??);
    }
    Ok(outcomes)
}

fn session_outcome(
    index: &EmbeddingIndex<TextEmbedder>,
    query: String,
    config: RetrievalConfig,
    cancel: CancellationToken,
) -> factfinder_lib::Result<(String, RetrievalOutcome)> {
    let outcome = RetrievalSession::new(index, &query, config)?
        .with_cancellation(cancel)
        .run()?;
    Ok((query, outcome))
}

fn print_outcome(query: &str, outcome: &RetrievalOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("Question: {query}");
    println!("  Verdict: {:?}", outcome.verdict);
    println!("  Attempts: {}", outcome.attempts_used);
    println!("  Score: {:.4}", outcome.best_score());
    if let Some(err) = &outcome.last_error {
        println!("  Last error: {err}");
    }
    println!("  {}", outcome.context_line());
    println!();
    Ok(())
}

fn embed(kind: ModelKind, text: &str, query: bool) -> Result<Vec<f32>> {
    let model = shared_text_embedder(kind).get()?;

    let embedding = if query {
        model.embed_query(text)?
    } else {
        model
            .embed_documents(&[text])?
            .into_iter()
            .next()
            .context("model returned no embeddings")?
    };
    Ok(embedding)
}
