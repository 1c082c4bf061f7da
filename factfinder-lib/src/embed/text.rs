use std::sync::{Mutex, MutexGuard, PoisonError};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::embed::{Embedder, Embedding, ModelKind};
use crate::{Error, Result};

/// Sentence embedder backed by fastembed.
///
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// `Mutex`; concurrent callers are serialized per model instance.
pub struct TextEmbedder {
    kind: ModelKind,
    model: Mutex<TextEmbedding>,
}

impl TextEmbedder {
    /// Load the model for `kind`.
    ///
    /// Downloads the model on first use (~90MB for MiniLM, ~1.2GB for BGE).
    pub fn new(kind: ModelKind) -> Result<Self> {
        let model = match kind {
            ModelKind::MiniLm => EmbeddingModel::AllMiniLML6V2,
            ModelKind::Bge => EmbeddingModel::BGELargeENV15,
        };
        let opts = InitOptions::new(model).with_show_download_progress(true);

        tracing::info!(model = kind.model_name(), "loading embedding model");
        TextEmbedding::try_new(opts)
            .map(|model| Self {
                kind,
                model: Mutex::new(model),
            })
            .map_err(|e| Error::ModelUnavailable(format!("{}: {e}", kind.model_name())))
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, TextEmbedding> {
        lock_recovering(&self.model)
    }
}

impl Embedder for TextEmbedder {
    fn model_name(&self) -> &str {
        self.kind.model_name()
    }

    fn dimension(&self) -> usize {
        self.kind.dimension()
    }

    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| Error::ModelUnavailable(e.to_string()))
    }

    fn embed_query(&self, text: &str) -> Result<Embedding> {
        let query_text = match self.kind.query_prefix() {
            Some(prefix) => format!("{prefix}{text}"),
            None => text.to_string(),
        };

        self.lock()
            .embed(vec![query_text], None)
            .map_err(|e| Error::ModelUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelUnavailable("model returned no embeddings".to_string()))
    }
}

/// A panic during one inference poisons the lock but leaves the model
/// usable, so later callers take the guard back instead of failing.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("embedding model lock poisoned by an earlier panic, recovering");
        PoisonError::into_inner(poisoned)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let model = Arc::new(Mutex::new(7_u32));
        let poisoner = Arc::clone(&model);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("inference crashed");
        })
        .join();

        assert!(model.is_poisoned());
        assert_eq!(*lock_recovering(&model), 7);
        *lock_recovering(&model) += 1;
        assert_eq!(*lock_recovering(&model), 8);
    }

    #[test]
    #[ignore] // Requires model download, run with: cargo test -- --ignored
    fn test_minilm_dimension() {
        let embedder = TextEmbedder::new(ModelKind::MiniLm).unwrap();
        let embedding = embedder.embed_query("Where did I study?").unwrap();
        assert_eq!(embedding.len(), embedder.dimension());
    }

    #[test]
    #[ignore] // Requires model download
    fn test_embedding_is_deterministic() {
        let embedder = TextEmbedder::new(ModelKind::MiniLm).unwrap();
        let a = embedder.embed_documents(&["I studied at MIT."]).unwrap();
        let b = embedder.embed_documents(&["I studied at MIT."]).unwrap();
        assert_eq!(a, b);
    }
}
