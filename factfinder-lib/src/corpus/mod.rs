//! Fact corpus loading
//!
//! A corpus is an ordered list of short facts, one per line. Sources only
//! have to produce raw lines; trimming and blank-line removal happen here so
//! every [`Corpus`] upholds the same invariant: no entry is empty.
//!
//! # Usage
//!
//! ```ignore
//! use factfinder_lib::corpus::{Corpus, FileCorpus};
//!
//! let corpus = Corpus::load(&FileCorpus::new("profile.txt"))?;
//! for (i, fact) in corpus.iter().enumerate() {
//!     println!("{i}: {fact}");
//! }
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::{Error, Result};

/// Trait for line-oriented corpus backends
pub trait CorpusSource: Send + Sync {
    /// Read the raw lines of the source.
    ///
    /// Lines may contain surrounding whitespace or be blank; the caller
    /// normalizes them.
    fn read_lines(&self) -> Result<Vec<String>>;

    /// Human-readable identifier used in logs and error messages
    fn describe(&self) -> String;
}

/// An immutable, ordered collection of non-blank facts.
///
/// Cloning is cheap: entries are shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Corpus {
    lines: Arc<[String]>,
}

impl Corpus {
    /// Build a corpus from raw lines, trimming each and dropping blanks.
    ///
    /// `origin` names the source in the [`Error::EmptyCorpus`] message.
    pub fn from_lines<I, S>(lines: I, origin: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim();
                (!line.is_empty()).then(|| line.to_string())
            })
            .collect();

        if lines.is_empty() {
            return Err(Error::EmptyCorpus(format!("{origin} has no non-blank lines")));
        }

        Ok(Self { lines: lines.into() })
    }

    /// Read and normalize every line of `source`.
    pub fn load(source: &dyn CorpusSource) -> Result<Self> {
        let origin = source.describe();
        let raw = source.read_lines()?;
        let corpus = Self::from_lines(raw, &origin)?;

        tracing::info!(source = %origin, facts = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    /// Returns the fact at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Returns the number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always `false` for a successfully built corpus.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Iterate over facts in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.lines
    }
}

/// In-memory corpus source.
///
/// Useful for embedding a fixed fact list in a host application and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    lines: Vec<String>,
}

impl StaticCorpus {
    #[must_use]
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl CorpusSource for StaticCorpus {
    fn read_lines(&self) -> Result<Vec<String>> {
        Ok(self.lines.clone())
    }

    fn describe(&self) -> String {
        format!("static corpus ({} lines)", self.lines.len())
    }
}

mod file;

pub use file::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lines_trims_and_drops_blanks() {
        let corpus = Corpus::from_lines(["  I live in Chicago.  ", "", "   ", "\tI studied at MIT.\n"], "test")
            .unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0), Some("I live in Chicago."));
        assert_eq!(corpus.get(1), Some("I studied at MIT."));
        assert_eq!(corpus.get(2), None);
    }

    #[test]
    fn test_from_lines_preserves_order() {
        let corpus = Corpus::from_lines(["c", "a", "b"], "test").unwrap();
        let facts: Vec<_> = corpus.iter().collect();
        assert_eq!(facts, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_all_blank_is_empty_corpus() {
        let err = Corpus::from_lines(["", "  ", "\t"], "profile").unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus(msg) if msg.contains("profile")));
    }

    #[test]
    fn test_no_lines_is_empty_corpus() {
        let err = Corpus::from_lines(Vec::<String>::new(), "nothing").unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus(_)));
    }

    #[test]
    fn test_load_static_source() {
        let source = StaticCorpus::new(["My phone is 555-0100.", " "]);
        let corpus = Corpus::load(&source).unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(!corpus.is_empty());
    }

    #[test]
    fn test_clone_shares_entries() {
        let corpus = Corpus::from_lines(["one", "two"], "test").unwrap();
        let copy = corpus.clone();
        assert_eq!(corpus, copy);
        assert!(std::ptr::eq(corpus.as_slice(), copy.as_slice()));
    }

    #[test]
    fn test_serializes_as_list() {
        let corpus = Corpus::from_lines(["one", "two"], "test").unwrap();
        let json = serde_json::to_string(&corpus).unwrap();
        assert_eq!(json, r#"["one","two"]"#);
    }
}
