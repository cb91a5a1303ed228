//! Text-generation collaborator boundary.
//!
//! Every call to a model goes through [`TextGenerator::complete`]. Two
//! backends are provided: [`CommandGenerator`] pipes the prompt to an
//! external CLI, and [`AnthropicGenerator`] talks to the Messages API.

pub mod anthropic;
pub mod command;

use async_trait::async_trait;
use thiserror::Error;

pub use anthropic::AnthropicGenerator;
pub use command::CommandGenerator;

/// Errors from a generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to start generator: {0}")]
    Spawn(String),

    #[error("generator exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed generator response: {0}")]
    Malformed(String),

    #[error("generator returned an empty completion")]
    EmptyCompletion,
}

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

/// Turns a prompt into a completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> GenerationResult<String>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<T> {
    async fn complete(&self, prompt: &str) -> GenerationResult<String> {
        (**self).complete(prompt).await
    }
}
