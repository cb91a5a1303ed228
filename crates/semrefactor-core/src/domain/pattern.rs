//! Matched code fragments returned by semantic search.

use serde::{Deserialize, Serialize};

/// A code fragment that is semantically close to the refactoring query.
///
/// Immutable once produced by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    /// Path of the file the fragment came from, as reported by the index.
    pub file_path: String,
    /// The indexed content of the fragment.
    pub content: String,
    /// 0.0 = identical meaning, 1.0 = unrelated.
    pub similarity_distance: f32,
    /// Function or symbol names the index extracted from the fragment.
    pub extracted_symbols: Vec<String>,
    pub line_count: usize,
}

impl PatternMatch {
    pub fn new(
        file_path: impl Into<String>,
        content: impl Into<String>,
        similarity_distance: f32,
    ) -> Self {
        let content = content.into();
        let line_count = content.lines().count();
        Self {
            file_path: file_path.into(),
            content,
            similarity_distance,
            extracted_symbols: Vec::new(),
            line_count,
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extracted_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Number of extracted symbols, used by risk classification.
    pub fn symbol_count(&self) -> usize {
        self.extracted_symbols.len()
    }
}
