//! Pipeline configuration.
//!
//! Resolved once at process start (defaults, then an optional TOML file,
//! then environment variables) and passed into the pipeline explicitly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analyzer::{AnalysisLimits, DEFAULT_EXCERPT_CHARS, DEFAULT_SAMPLE_SIZE};
use crate::domain::{RefactorError, Result};
use crate::generation::anthropic::DEFAULT_MODEL;

/// Default config file looked up in the project root.
pub const CONFIG_FILE: &str = ".semrefactor.toml";

/// Which text-generation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Pipe prompts to an external CLI.
    #[default]
    Command,
    /// Call the Anthropic Messages API directly.
    Anthropic,
}

impl std::str::FromStr for Provider {
    type Err = RefactorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" | "cli" => Ok(Self::Command),
            "anthropic" | "claude-api" => Ok(Self::Anthropic),
            other => Err(RefactorError::Config(format!("unknown provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefactorConfig {
    pub provider: Provider,
    /// argv of the generator CLI; the prompt is written to its stdin.
    pub generator_command: Vec<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    /// argv of the index query tool.
    pub search_command: Vec<String>,
    pub backup_dir: PathBuf,
    pub project_root: PathBuf,
    pub default_threshold: f32,
    pub default_limit: usize,
    pub analysis_sample_size: usize,
    pub excerpt_chars: usize,
    pub generation_timeout_secs: u64,
    pub search_timeout_secs: u64,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Command,
            generator_command: vec!["claude".to_string(), "-p".to_string()],
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base_url: None,
            search_command: vec!["semindex".to_string(), "query".to_string()],
            backup_dir: PathBuf::from(".semrefactor/backups"),
            project_root: PathBuf::from("."),
            default_threshold: 0.4,
            default_limit: 20,
            analysis_sample_size: DEFAULT_SAMPLE_SIZE,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            generation_timeout_secs: 120,
            search_timeout_secs: 60,
        }
    }
}

impl RefactorConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RefactorError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise return defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Full resolution: file (explicit or `<root>/.semrefactor.toml`), then
    /// the process environment.
    pub fn resolve(project_root: &Path, explicit_file: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_file {
            Some(path) if !path.is_file() => {
                return Err(RefactorError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            Some(path) => Self::load_file(path)?,
            None => Self::load_file(&project_root.join(CONFIG_FILE))?,
        };
        config.project_root = project_root.to_path_buf();

        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment map.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(provider) = env.get("SEMREFACTOR_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(model) = env.get("SEMREFACTOR_MODEL") {
            self.model = model.clone();
        }
        if let Some(key) = env.get("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = env.get("ANTHROPIC_BASE_URL") {
            self.api_base_url = Some(url.clone());
        }
        if let Some(dir) = env.get("SEMREFACTOR_BACKUP_DIR") {
            self.backup_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = env.get("SEMREFACTOR_SEARCH_COMMAND") {
            self.search_command = split_command(cmd);
        }
        if let Some(cmd) = env.get("SEMREFACTOR_GENERATOR_COMMAND") {
            self.generator_command = split_command(cmd);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(RefactorError::Config(format!(
                "default_threshold must be within [0, 1], got {}",
                self.default_threshold
            )));
        }
        if self.default_limit == 0 {
            return Err(RefactorError::Config("default_limit must be positive".into()));
        }
        if self.analysis_sample_size == 0 {
            return Err(RefactorError::Config(
                "analysis_sample_size must be positive".into(),
            ));
        }
        match self.provider {
            Provider::Anthropic if self.api_key.is_none() => Err(RefactorError::Config(
                "provider `anthropic` requires ANTHROPIC_API_KEY".into(),
            )),
            Provider::Command if self.generator_command.is_empty() => Err(RefactorError::Config(
                "generator_command must not be empty".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Backup directory, resolved against the project root when relative.
    pub fn backup_root(&self) -> PathBuf {
        if self.backup_dir.is_absolute() {
            self.backup_dir.clone()
        } else {
            self.project_root.join(&self.backup_dir)
        }
    }

    pub fn analysis_limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            sample_size: self.analysis_sample_size,
            excerpt_chars: self.excerpt_chars,
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}
