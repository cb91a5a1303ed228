//! Search collaborator boundary.
//!
//! The embedding index lives outside this crate. It is consumed through
//! [`SearchBackend::search`], which returns hits ranked by similarity.
//! [`CommandSearch`] queries an external index tool that prints JSON.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Errors from the search collaborator.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("search timed out after {0}s")]
    Timeout(u64),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Index metadata attached to a hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub file_path: String,
    /// Either a JSON array of names or a JSON-encoded string of one.
    #[serde(default)]
    pub functions: Option<serde_json::Value>,
    #[serde(default)]
    pub line_count: Option<usize>,
}

impl SearchMetadata {
    /// Decode `functions` into a list of symbol names.
    pub fn symbols(&self) -> SearchResult<Vec<String>> {
        let malformed = |e: serde_json::Error| {
            SearchError::Malformed(format!("functions for {}: {e}", self.file_path))
        };
        match &self.functions {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(serde_json::Value::String(encoded)) if encoded.trim().is_empty() => Ok(Vec::new()),
            Some(serde_json::Value::String(encoded)) => {
                serde_json::from_str(encoded).map_err(malformed)
            }
            Some(value @ serde_json::Value::Array(_)) => {
                serde_json::from_value(value.clone()).map_err(malformed)
            }
            Some(other) => Err(SearchError::Malformed(format!(
                "functions for {} must be a list, got {other}",
                self.file_path
            ))),
        }
    }
}

/// One ranked result from the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    /// 0.0 = identical, 1.0 = unrelated.
    #[serde(alias = "similarity_distance")]
    pub distance: f32,
    pub metadata: SearchMetadata,
}

/// Semantic search over an indexed codebase.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `max_results` hits, best first.
    async fn search(&self, query: &str, max_results: usize) -> SearchResult<Vec<SearchHit>>;
}

#[async_trait]
impl<T: SearchBackend + ?Sized> SearchBackend for std::sync::Arc<T> {
    async fn search(&self, query: &str, max_results: usize) -> SearchResult<Vec<SearchHit>> {
        (**self).search(query, max_results).await
    }
}

/// Search backend that shells out to an index query tool.
///
/// Invocation: `<argv...> <query> --limit <n> --json`; stdout must be a JSON
/// array of [`SearchHit`].
#[derive(Debug, Clone)]
pub struct CommandSearch {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandSearch {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

#[async_trait]
impl SearchBackend for CommandSearch {
    async fn search(&self, query: &str, max_results: usize) -> SearchResult<Vec<SearchHit>> {
        let (exe, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SearchError::Unavailable("search command is empty".to_string()))?;

        let child = Command::new(exe)
            .args(args)
            .arg(query)
            .arg("--limit")
            .arg(max_results.to_string())
            .arg("--json")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SearchError::Unavailable(format!("failed to spawn {exe}: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SearchError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SearchError::Unavailable(format!(
                "{exe} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_hits(&output.stdout)
    }
}

/// Parse a JSON array of hits.
pub fn parse_hits(bytes: &[u8]) -> SearchResult<Vec<SearchHit>> {
    serde_json::from_slice(bytes).map_err(|e| SearchError::Malformed(e.to_string()))
}
