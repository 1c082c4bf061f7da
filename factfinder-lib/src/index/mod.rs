//! Embedding index over a fact corpus
//!
//! Owns the corpus and one cached embedding per fact. Both are built on first
//! use and then shared read-only, so a single index can serve lookups from
//! many threads.
//!
//! # Usage
//!
//! ```ignore
//! use factfinder_lib::embed::ModelKind;
//! use factfinder_lib::index::{semantic_lookup, EmbeddingIndex};
//!
//! let index = EmbeddingIndex::from_file("profile.txt", ModelKind::MiniLm);
//! let result = semantic_lookup(&index, "Where did I study?")?;
//! println!("{} ({:.4})", result.best_match, result.score);
//! ```

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;

use crate::corpus::{Corpus, CorpusSource, FileCorpus};
use crate::embed::{shared_text_embedder, Embedder, Embedding, ModelKind, SharedModel, TextEmbedder};
use crate::{Error, Result};

mod similarity;

pub use similarity::*;

/// The single best fact for a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// The query as it was embedded
    pub query: String,
    /// The winning fact
    pub best_match: String,
    /// Position of the winning fact in the corpus
    pub index: usize,
    /// Cosine similarity between query and fact, in [-1, 1]
    pub score: f64,
    /// Every fact that was considered
    pub all_lines: Corpus,
}

/// A fact with its similarity to a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFact {
    pub index: usize,
    pub fact: String,
    pub score: f64,
}

struct Loaded<E> {
    corpus: Corpus,
    model: Arc<E>,
    /// Unit-length embeddings, one per corpus entry
    entries: Vec<Vec<f64>>,
}

/// Lazily built nearest-neighbour index over a corpus.
pub struct EmbeddingIndex<E: Embedder> {
    source: Box<dyn CorpusSource>,
    model: Arc<SharedModel<E>>,
    loaded: OnceLock<Loaded<E>>,
    load_lock: Mutex<()>,
}

impl EmbeddingIndex<TextEmbedder> {
    /// Index a fact file with the process-wide model for `kind`.
    pub fn from_file(path: impl Into<std::path::PathBuf>, kind: ModelKind) -> Self {
        Self::new(FileCorpus::new(path), shared_text_embedder(kind))
    }
}

impl<E: Embedder> EmbeddingIndex<E> {
    /// Create an index; nothing is read or embedded until first use.
    pub fn new(source: impl CorpusSource + 'static, model: Arc<SharedModel<E>>) -> Self {
        Self {
            source: Box::new(source),
            model,
            loaded: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Load the corpus, obtain the model and embed every fact.
    ///
    /// Idempotent. Concurrent first callers wait for a single build. A failed
    /// build leaves the index unloaded so a later call can try again; the
    /// model itself is never constructed twice.
    pub fn ensure_loaded(&self) -> Result<()> {
        self.loaded().map(|_| ())
    }

    /// Returns `true` once the corpus and its embeddings are cached.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// The loaded corpus.
    pub fn corpus(&self) -> Result<Corpus> {
        self.loaded().map(|loaded| loaded.corpus.clone())
    }

    /// Name of the embedding model in use.
    pub fn model_name(&self) -> Result<String> {
        self.loaded().map(|loaded| loaded.model.model_name().to_string())
    }

    /// Find the fact most similar to `query`.
    ///
    /// Ties go to the fact that appears first in the corpus.
    pub fn best_match(&self, query: &str) -> Result<MatchResult> {
        validate_query(query)?;
        let loaded = self.loaded()?;
        let scores = self.score_all(loaded, query)?;

        // strict comparison keeps the lowest index on ties
        let (index, score) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, score)| {
                if score > best.1 {
                    (i, score)
                } else {
                    best
                }
            });

        let best_match = loaded
            .corpus
            .get(index)
            .ok_or_else(|| Error::EmptyCorpus(self.source.describe()))?
            .to_string();

        tracing::debug!(query, index, score, "best match");

        Ok(MatchResult {
            query: query.to_string(),
            best_match,
            index,
            score,
            all_lines: loaded.corpus.clone(),
        })
    }

    /// Rank the `k` facts most similar to `query`, highest first.
    pub fn top_matches(&self, query: &str, k: usize) -> Result<Vec<ScoredFact>> {
        validate_query(query)?;
        let loaded = self.loaded()?;
        let scores = self.score_all(loaded, query)?;

        let mut ranked: Vec<ScoredFact> = loaded
            .corpus
            .iter()
            .zip(scores)
            .enumerate()
            .map(|(index, (fact, score))| ScoredFact {
                index,
                fact: fact.to_string(),
                score,
            })
            .collect();

        // stable sort: equal scores keep corpus order
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(k);

        Ok(ranked)
    }

    fn score_all(&self, loaded: &Loaded<E>, query: &str) -> Result<Vec<f64>> {
        let embedding = loaded.model.embed_query(query)?;
        check_embedding(&embedding, loaded.model.dimension())?;

        let query = normalize(&embedding);
        Ok(loaded.entries.iter().map(|entry| dot(&query, entry)).collect())
    }

    fn loaded(&self) -> Result<&Loaded<E>> {
        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(loaded) = self.loaded.get() {
            return Ok(loaded);
        }

        let loaded = self.build()?;
        Ok(self.loaded.get_or_init(|| loaded))
    }

    fn build(&self) -> Result<Loaded<E>> {
        let corpus = Corpus::load(self.source.as_ref())?;
        let model = self.model.get()?;

        let texts: Vec<&str> = corpus.iter().collect();
        let embeddings = model.embed_documents(&texts)?;

        if embeddings.len() != corpus.len() {
            return Err(Error::ModelUnavailable(format!(
                "model returned {} embeddings for {} facts",
                embeddings.len(),
                corpus.len()
            )));
        }

        let entries = embeddings
            .iter()
            .map(|e| check_embedding(e, model.dimension()).map(|()| normalize(e)))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            facts = corpus.len(),
            model = model.model_name(),
            dimension = model.dimension(),
            "index ready"
        );

        Ok(Loaded {
            corpus,
            model,
            entries,
        })
    }
}

/// Single-shot lookup with no retry.
pub fn semantic_lookup<E: Embedder>(index: &EmbeddingIndex<E>, query: &str) -> Result<MatchResult> {
    index.best_match(query)
}

/// Reject empty or whitespace-only queries.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery("query must not be blank".to_string()));
    }
    Ok(())
}

/// Rejects vectors of the wrong width or holding NaN or infinity.
fn check_embedding(embedding: &Embedding, expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(Error::ModelUnavailable(format!(
            "embedding has {} dimensions, model declares {expected}",
            embedding.len()
        )));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(Error::ModelUnavailable("embedding contains non-finite values".to_string()));
    }
    Ok(())
}
