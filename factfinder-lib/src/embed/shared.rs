//! Process-wide embedding model instances.
//!
//! Loading a model is slow (download + ONNX session setup), so each model is
//! constructed at most once per process and then handed out as an `Arc`.
//!
//! # Thread Safety
//!
//! - `OnceLock` holds the ready instance; the fast path is lock-free
//! - `Mutex` serializes construction; late arrivals re-check and reuse
//! - A failed construction is remembered and never re-attempted

use std::sync::{Arc, LazyLock, Mutex, OnceLock, PoisonError};

use crate::embed::{ModelKind, TextEmbedder};
use crate::{Error, Result};

type Loader<E> = Box<dyn Fn() -> Result<E> + Send + Sync>;

/// A lazily constructed, shared embedding model.
pub struct SharedModel<E> {
    loader: Loader<E>,
    ready: OnceLock<Arc<E>>,
    /// Guards construction; holds the failure reason once a load has failed.
    init: Mutex<Option<String>>,
}

impl<E> SharedModel<E> {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<E> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            ready: OnceLock::new(),
            init: Mutex::new(None),
        }
    }

    /// Returns the shared instance, constructing it on first call.
    ///
    /// Concurrent first callers block on the construction lock; exactly one
    /// of them runs the loader.
    pub fn get(&self) -> Result<Arc<E>> {
        if let Some(model) = self.ready.get() {
            return Ok(Arc::clone(model));
        }

        let mut failure = self.init.lock().unwrap_or_else(PoisonError::into_inner);

        // another caller may have finished while we waited
        if let Some(model) = self.ready.get() {
            return Ok(Arc::clone(model));
        }

        if let Some(reason) = failure.as_ref() {
            return Err(Error::ModelUnavailable(format!(
                "model failed to load earlier: {reason}"
            )));
        }

        match (self.loader)() {
            Ok(model) => {
                let model = Arc::new(model);
                // only reachable while holding `init`, so the cell is still empty
                let _ = self.ready.set(Arc::clone(&model));
                tracing::info!("embedding model ready");
                Ok(model)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(error = %reason, "embedding model failed to load");
                *failure = Some(reason.clone());
                Err(Error::ModelUnavailable(reason))
            }
        }
    }

    /// Returns `true` once the model has been constructed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.ready.get().is_some()
    }
}

static MINILM: LazyLock<Arc<SharedModel<TextEmbedder>>> =
    LazyLock::new(|| Arc::new(SharedModel::new(|| TextEmbedder::new(ModelKind::MiniLm))));

static BGE: LazyLock<Arc<SharedModel<TextEmbedder>>> =
    LazyLock::new(|| Arc::new(SharedModel::new(|| TextEmbedder::new(ModelKind::Bge))));

/// The process-wide fastembed model slot for `kind`.
#[must_use]
pub fn shared_text_embedder(kind: ModelKind) -> Arc<SharedModel<TextEmbedder>> {
    match kind {
        ModelKind::MiniLm => Arc::clone(&MINILM),
        ModelKind::Bge => Arc::clone(&BGE),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_loads_once_and_reuses() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let shared = SharedModel::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42_u32)
        });

        assert!(!shared.is_loaded());
        let a = shared.get().unwrap();
        let b = shared.get().unwrap();

        assert!(shared.is_loaded());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let shared = Arc::new(SharedModel::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(String::from("model"))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.get().unwrap())
            })
            .collect();

        let models: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_load_is_not_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let shared: SharedModel<u32> = SharedModel::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::ModelUnavailable("no onnx runtime".to_string()))
        });

        let first = shared.get().unwrap_err();
        let second = shared.get().unwrap_err();

        assert!(matches!(first, Error::ModelUnavailable(_)));
        assert!(matches!(second, Error::ModelUnavailable(msg) if msg.contains("no onnx runtime")));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(!shared.is_loaded());
    }

    #[test]
    fn test_global_slots_are_per_kind() {
        let a = shared_text_embedder(ModelKind::MiniLm);
        let b = shared_text_embedder(ModelKind::MiniLm);
        let c = shared_text_embedder(ModelKind::Bge);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
