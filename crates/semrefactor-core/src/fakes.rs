//! In-process collaborators for tests.
//!
//! `StaticSearch`, `ScriptedGenerator` and `ScriptedConfirmer` satisfy the
//! collaborator traits without an index, a model, or a terminal.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::confirm::Confirmer;
use crate::domain::PlanStep;
use crate::generation::{GenerationError, GenerationResult, TextGenerator};
use crate::search::{SearchBackend, SearchError, SearchHit, SearchMetadata, SearchResult};

// ---------------------------------------------------------------------------
// StaticSearch
// ---------------------------------------------------------------------------

/// Search backend returning a fixed hit list in insertion order.
#[derive(Debug, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    unavailable: Option<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hit(self, file_path: &str, content: &str, distance: f32) -> Self {
        self.with_symbols(file_path, content, distance, &[])
    }

    pub fn with_symbols(
        mut self,
        file_path: &str,
        content: &str,
        distance: f32,
        symbols: &[&str],
    ) -> Self {
        let functions = (!symbols.is_empty()).then(|| serde_json::json!(symbols));
        self.hits.push(SearchHit {
            content: content.to_string(),
            distance,
            metadata: SearchMetadata {
                file_path: file_path.to_string(),
                functions,
                line_count: None,
            },
        });
        self
    }

    /// Every search fails as if the index were offline.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            unavailable: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// `(query, max_results)` of every call so far.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, query: &str, max_results: usize) -> SearchResult<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        if let Some(reason) = &self.unavailable {
            return Err(SearchError::Unavailable(reason.clone()));
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Generator answering from a queue, with optional failure rules.
///
/// Rules are checked first: a prompt containing a rule's needle fails with
/// `NonZeroExit`. Otherwise the next queued response is returned, and once
/// the queue is empty the fallback is used.
#[derive(Debug)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<GenerationResult<String>>>,
    fail_on: Vec<(String, String)>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fail_on: Vec::new(),
            fallback: "// refactored\n".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn with_error(self, error: GenerationError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    /// Fail any prompt that contains `needle`.
    pub fn failing_on(mut self, needle: &str, stderr: &str) -> Self {
        self.fail_on.push((needle.to_string(), stderr.to_string()));
        self
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> GenerationResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some((_, stderr)) = self.fail_on.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Err(GenerationError::NonZeroExit {
                code: Some(1),
                stderr: stderr.clone(),
            });
        }

        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(self.fallback.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedConfirmer
// ---------------------------------------------------------------------------

/// Answers from a fixed queue; declines once the queue runs out.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Relative paths the executor asked about, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, step: &PlanStep) -> bool {
        self.asked.lock().unwrap().push(step.relative_path.clone());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }
}
