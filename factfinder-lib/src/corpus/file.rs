use std::fs;
use std::path::{Path, PathBuf};

use crate::corpus::CorpusSource;
use crate::{Error, Result};

/// File-backed corpus: plain UTF-8 text, one fact per line.
#[derive(Debug, Clone)]
pub struct FileCorpus {
    path: PathBuf,
}

impl FileCorpus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CorpusSource for FileCorpus {
    fn read_lines(&self) -> Result<Vec<String>> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| Error::CorpusUnavailable(format!("{}: {e}", self.path.display())))?;

        Ok(FactLines::from(text.as_str()).map(str::to_string).collect())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Iterator over the non-blank lines of a text, trimmed.
///
/// Handles both `\n` and `\r\n` endings and a trailing line without newline.
struct FactLines<'a> {
    s: &'a str,
}

impl<'a> FactLines<'a> {
    fn from(s: &'a str) -> Self {
        // a leading byte-order mark would otherwise stick to the first fact
        Self {
            s: s.strip_prefix('\u{feff}').unwrap_or(s),
        }
    }
}

impl<'a> Iterator for FactLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.s.is_empty() {
                return None;
            }
            let (line, rest) = split_first_line(self.s);
            self.s = rest;

            let line = line.trim();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }
}

fn split_first_line(s: &str) -> (&str, &str) {
    let len = match s.find('\n') {
        Some(i) => i + 1,
        None => s.len(),
    };
    s.split_at(len)
}
