//! factfinder - semantic fact lookup with bounded retry
//!
//! # Architecture
//!
//! ```text
//! Fact file -> Corpus -> Embedder -> EmbeddingIndex
//!                                         |
//! Query -> RetrievalSession -> Lookup ----+
//!               |    ^
//!               |    +-- retry (score < threshold, attempts left)
//!               v
//!     Accepted | Exhausted
//! ```
//!
//! # Example
//!
//! ```ignore
//! use factfinder_lib::embed::ModelKind;
//! use factfinder_lib::index::{semantic_lookup, EmbeddingIndex};
//! use factfinder_lib::retrieve::retrieve_with_retry;
//!
//! let index = EmbeddingIndex::from_file("profile.txt", ModelKind::MiniLm);
//!
//! // Single shot
//! let result = semantic_lookup(&index, "Where did I study?")?;
//!
//! // Bounded retry
//! let outcome = retrieve_with_retry(&index, "Where did I study?", 0.3, 3)?;
//! println!("{:?} after {} attempt(s)", outcome.verdict, outcome.attempts_used);
//! ```

pub mod corpus;
pub mod embed;
pub mod error;
pub mod index;
pub mod retrieve;

pub use error::{Error, Result};
pub use index::{semantic_lookup, EmbeddingIndex, MatchResult};
pub use retrieve::{retrieve_with_retry, RetrievalConfig, RetrievalOutcome, Verdict};
