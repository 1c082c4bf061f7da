//! Text embedding using local models
//!
//! Uses sentence-transformers/all-MiniLM-L6-v2 by default via the fastembed
//! crate (ONNX runtime). BAAI/bge-large-en-v1.5 is available for higher
//! recall at the cost of a much larger download.
//!
//! # Model Details
//!
//! | kind     | model                                   | dims |
//! |----------|-----------------------------------------|------|
//! | `minilm` | sentence-transformers/all-MiniLM-L6-v2  | 384  |
//! | `bge`    | BAAI/bge-large-en-v1.5                  | 1024 |
//!
//! # Usage
//!
//! ```ignore
//! use factfinder_lib::embed::{shared_text_embedder, Embedder, ModelKind};
//!
//! // Loaded once per process, shared by every caller
//! let model = shared_text_embedder(ModelKind::MiniLm).get()?;
//!
//! let doc_embeddings = model.embed_documents(&["I live in Chicago."])?;
//! let query_embedding = model.embed_query("Where do I live?")?;
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
///
/// Implementations must be deterministic for identical input and model
/// version, and safe to call from several threads at once.
pub trait Embedder: Send + Sync {
    /// Embed multiple documents for indexing
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    ///
    /// Note: Some models (like BGE) use different prompts for queries vs documents.
    /// This method handles that distinction.
    fn embed_query(&self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

/// Supported local embedding models
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// sentence-transformers/all-MiniLM-L6-v2
    #[default]
    MiniLm,
    /// BAAI/bge-large-en-v1.5
    Bge,
}

impl ModelKind {
    #[must_use]
    pub fn model_name(self) -> &'static str {
        match self {
            Self::MiniLm => "sentence-transformers/all-MiniLM-L6-v2",
            Self::Bge => "BAAI/bge-large-en-v1.5",
        }
    }

    #[must_use]
    pub fn dimension(self) -> usize {
        match self {
            Self::MiniLm => 384,
            Self::Bge => 1024,
        }
    }

    /// Prompt prepended to queries (not documents) before embedding
    #[must_use]
    pub fn query_prefix(self) -> Option<&'static str> {
        match self {
            Self::MiniLm => None,
            Self::Bge => Some("Represent this sentence for searching relevant passages: "),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MiniLm => f.write_str("minilm"),
            Self::Bge => f.write_str("bge"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minilm" | "all-minilm-l6-v2" => Ok(Self::MiniLm),
            "bge" | "bge-large-en-v1.5" => Ok(Self::Bge),
            other => Err(Error::InvalidConfig(format!(
                "unknown model '{other}', expected 'minilm' or 'bge'"
            ))),
        }
    }
}

mod shared;
mod text;

pub use shared::*;
pub use text::*;
