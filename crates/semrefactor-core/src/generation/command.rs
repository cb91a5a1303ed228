//! Generator backed by an external CLI process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{GenerationError, GenerationResult, TextGenerator};

/// Pipes the prompt to `argv` on stdin and returns trimmed stdout.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    async fn complete(&self, prompt: &str) -> GenerationResult<String> {
        let (exe, args) = self
            .argv
            .split_first()
            .ok_or_else(|| GenerationError::Spawn("generator command is empty".to_string()))?;

        debug!(command = %exe, prompt_chars = prompt.len(), "invoking generator");

        let mut child = Command::new(exe)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GenerationError::Spawn(format!("{exe}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(prompt.as_bytes()).await {
                Ok(()) => {}
                // The child may exit before reading; its exit status reports why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!(command = %exe, "generator closed stdin early");
                }
                Err(e) => {
                    return Err(GenerationError::Spawn(format!(
                        "writing prompt to {exe}: {e}"
                    )))
                }
            }
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| GenerationError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(GenerationError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }
        Ok(text)
    }
}
