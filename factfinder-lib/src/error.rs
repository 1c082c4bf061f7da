//! Error types for factfinder

use thiserror::Error;

/// Result type alias for factfinder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in factfinder operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Query was empty or whitespace-only; rejected before any model call
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The corpus source is missing or unreadable
    #[error("corpus unavailable: {0}")]
    CorpusUnavailable(String),

    /// The corpus source contained no usable lines
    #[error("corpus is empty: {0}")]
    EmptyCorpus(String),

    /// The embedding model failed to initialize or to run inference
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Retrieval settings out of range
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The caller cancelled a retrieval session between attempts
    #[error("retrieval cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl Error {
    /// Errors that end a retrieval session instead of counting as a
    /// zero-score attempt.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::InvalidConfig("max_attempts".into()).is_fatal());
        assert!(Error::Cancelled { attempts: 1 }.is_fatal());
        assert!(!Error::ModelUnavailable("oom".into()).is_fatal());
        assert!(!Error::InvalidQuery("blank".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::Cancelled { attempts: 2 };
        assert_eq!(err.to_string(), "retrieval cancelled after 2 attempt(s)");
    }
}
