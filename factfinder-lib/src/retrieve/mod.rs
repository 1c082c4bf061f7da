//! Bounded-retry retrieval
//!
//! Repeatedly asks a [`Lookup`] for the best fact, accepting the first result
//! that clears the confidence threshold and giving up after a fixed number of
//! attempts. Per-attempt failures never escape a session: they count as a
//! zero-score attempt, so every valid query ends in a [`Verdict`].
//!
//! # Usage
//!
//! ```ignore
//! use factfinder_lib::retrieve::{retrieve_with_retry, Verdict};
//!
//! let outcome = retrieve_with_retry(&index, "Where did I study?", 0.3, 3)?;
//! match outcome.verdict {
//!     Verdict::Accepted => println!("{}", outcome.context_line()),
//!     Verdict::Exhausted => println!("no confident match"),
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::embed::Embedder;
use crate::index::{validate_query, EmbeddingIndex, MatchResult};
use crate::{Error, Result};

mod cancel;
mod policy;
mod session;

pub use cancel::*;
pub use policy::*;
pub use session::*;

/// Default minimum cosine similarity for accepting a match
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Default number of lookups before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Anything that can answer a single best-fact query.
///
/// Implemented by [`EmbeddingIndex`]; tests substitute scripted stubs.
pub trait Lookup: Send + Sync {
    fn lookup(&self, query: &str) -> Result<MatchResult>;
}

impl<E: Embedder> Lookup for EmbeddingIndex<E> {
    fn lookup(&self, query: &str) -> Result<MatchResult> {
        self.best_match(query)
    }
}

/// Acceptance and retry settings for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// A match is accepted when its score is at least this value
    pub confidence_threshold: f64,
    /// Maximum number of lookups in one session
    pub max_attempts: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetrievalConfig {
    #[must_use]
    pub fn new(confidence_threshold: f64, max_attempts: u32) -> Self {
        Self {
            confidence_threshold,
            max_attempts,
        }
    }

    /// Any threshold is usable except NaN, which no score can be compared
    /// against; at least one attempt is required.
    pub fn validate(&self) -> Result<()> {
        if self.confidence_threshold.is_nan() {
            return Err(Error::InvalidConfig("confidence_threshold must be a number".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig("max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Terminal decision of a retrieval session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// A match cleared the confidence threshold
    Accepted,
    /// Attempts ran out without a confident match
    Exhausted,
}

/// What a finished session hands to the downstream step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalOutcome {
    pub verdict: Verdict,
    /// The accepted match, or the last best-effort result when exhausted
    #[serde(rename = "match")]
    pub match_result: Option<MatchResult>,
    pub attempts_used: u32,
    /// Failure of the final attempt, if it failed
    pub last_error: Option<String>,
}

impl RetrievalOutcome {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    /// The accepted match, if any. `None` when exhausted.
    #[must_use]
    pub fn accepted_match(&self) -> Option<&MatchResult> {
        self.match_result.as_ref().filter(|_| self.is_accepted())
    }

    /// Score of the surfaced result, 0.0 when there is none.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.match_result.as_ref().map_or(0.0, |r| r.score)
    }

    /// One-line summary of the retrieved context for a response step.
    #[must_use]
    pub fn context_line(&self) -> String {
        match self.accepted_match() {
            Some(found) => format!(
                "Found relevant information (confidence: {:.2}): {}",
                found.score, found.best_match
            ),
            None => format!(
                "No relevant information found after {} search attempt(s).",
                self.attempts_used
            ),
        }
    }
}

/// Run a full bounded-retry session against `index` with the default retry
/// policy.
///
/// Blank queries and invalid settings fail immediately. Corpus errors are
/// fatal and propagate; a model that cannot be loaded only costs attempts,
/// and the session still ends in [`Verdict::Exhausted`].
pub fn retrieve_with_retry<E: Embedder>(
    index: &EmbeddingIndex<E>,
    query: &str,
    threshold: f64,
    max_attempts: u32,
) -> Result<RetrievalOutcome> {
    let config = RetrievalConfig::new(threshold, max_attempts);
    validate_query(query)?;
    config.validate()?;

    match index.ensure_loaded() {
        Err(e @ (Error::CorpusUnavailable(_) | Error::EmptyCorpus(_))) => return Err(e),
        Err(e) => tracing::warn!(error = %e, "index not ready, attempts will fail until it loads"),
        Ok(()) => {}
    }

    RetrievalSession::new(index, query, config)?.run()
}
