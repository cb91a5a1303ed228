//! Structured output of the pattern analyzer.

use serde::{Deserialize, Serialize};

/// Placeholder placed in `common_patterns` when the backend response could not be parsed.
pub const UNPARSED_MARKER: &str = "Unable to parse response";

/// Commonalities and differences across a sample of matches, plus a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    #[serde(default)]
    pub common_patterns: Vec<String>,
    #[serde(default)]
    pub variations: Vec<String>,
    #[serde(default)]
    pub refactoring_opportunities: Vec<String>,
    #[serde(default)]
    pub suggested_approach: String,
}

impl PatternAnalysis {
    /// The fallback record used when the backend response is not well-formed.
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            common_patterns: vec![UNPARSED_MARKER.to_string()],
            variations: Vec::new(),
            refactoring_opportunities: Vec::new(),
            suggested_approach: raw.into(),
        }
    }
}

/// Result of parsing an analysis response.
///
/// Parsing never fails past the analyzer: a malformed response becomes
/// `Degraded` carrying the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Parsed(PatternAnalysis),
    Degraded(String),
}

impl AnalysisOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Collapse into the analysis record downstream stages consume.
    pub fn into_analysis(self) -> PatternAnalysis {
        match self {
            Self::Parsed(analysis) => analysis,
            Self::Degraded(raw) => PatternAnalysis::degraded(raw),
        }
    }
}
