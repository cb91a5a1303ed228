//! Pattern analyzer: one generation call that characterizes the matches.
//!
//! The response is parsed as JSON on a best-effort basis. A malformed
//! response is absorbed into [`AnalysisOutcome::Degraded`] so the pipeline
//! can still use the raw text as its suggestion.

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::{AnalysisOutcome, PatternAnalysis, PatternMatch, Result};
use crate::generation::TextGenerator;

/// Maximum number of matches sent to the backend.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Keys that mark a JSON object as an analysis rather than stray prose.
const ANALYSIS_KEYS: [&str; 4] = [
    "common_patterns",
    "variations",
    "refactoring_opportunities",
    "suggested_approach",
];

/// Maximum characters of each match included in the prompt.
pub const DEFAULT_EXCERPT_CHARS: usize = 500;

/// Bounds on the analysis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    pub sample_size: usize,
    pub excerpt_chars: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }
}

/// Analyze the best matches and collapse the outcome into a [`PatternAnalysis`].
pub async fn analyze_patterns(
    generator: &dyn TextGenerator,
    matches: &[PatternMatch],
    description: &str,
    limits: AnalysisLimits,
) -> Result<PatternAnalysis> {
    Ok(analyze_patterns_outcome(generator, matches, description, limits)
        .await?
        .into_analysis())
}

/// Analyze the best matches, keeping track of whether the response parsed.
///
/// Issues exactly one generation request. A generation failure is returned
/// as an error; a parse failure never is.
#[instrument(skip(generator, matches), fields(matches = matches.len()))]
pub async fn analyze_patterns_outcome(
    generator: &dyn TextGenerator,
    matches: &[PatternMatch],
    description: &str,
    limits: AnalysisLimits,
) -> Result<AnalysisOutcome> {
    let prompt = build_analysis_prompt(matches, description, limits);
    let response = generator.complete(&prompt).await?;
    let outcome = parse_analysis(&response);
    if outcome.is_degraded() {
        warn!(
            response_chars = response.len(),
            "analysis response was not valid JSON; using raw text as the suggestion"
        );
    }
    Ok(outcome)
}

/// Build the analysis prompt from the lowest-distance sample of `matches`.
pub fn build_analysis_prompt(
    matches: &[PatternMatch],
    description: &str,
    limits: AnalysisLimits,
) -> String {
    let mut sample: Vec<&PatternMatch> = matches.iter().collect();
    sample.sort_by(|a, b| a.similarity_distance.total_cmp(&b.similarity_distance));
    sample.truncate(limits.sample_size);

    let mut prompt = String::new();
    prompt.push_str("You are helping refactor a codebase.\n");
    prompt.push_str(&format!("Refactoring goal: {description}\n\n"));
    prompt.push_str(&format!(
        "Below are {} code fragments that match this pattern.\n\n",
        sample.len()
    ));

    for (i, m) in sample.iter().enumerate() {
        prompt.push_str(&format!(
            "### Match {} ({}, distance {:.3})\n```\n{}\n```\n\n",
            i + 1,
            m.file_path,
            m.similarity_distance,
            excerpt(&m.content, limits.excerpt_chars)
        ));
    }

    prompt.push_str(
        "Respond with a single JSON object and nothing else, using exactly these keys:\n\
         {\n  \"common_patterns\": [string],\n  \"variations\": [string],\n  \
         \"refactoring_opportunities\": [string],\n  \"suggested_approach\": string\n}\n",
    );
    prompt
}

/// Parse a backend response into an analysis outcome. Never fails.
pub fn parse_analysis(raw: &str) -> AnalysisOutcome {
    let Some(json) = json_candidate(raw) else {
        return AnalysisOutcome::Degraded(raw.to_string());
    };

    match serde_json::from_value::<PatternAnalysis>(json) {
        Ok(mut analysis) => {
            if analysis.suggested_approach.trim().is_empty() {
                analysis.suggested_approach = raw.to_string();
            }
            AnalysisOutcome::Parsed(analysis)
        }
        Err(_) => AnalysisOutcome::Degraded(raw.to_string()),
    }
}

/// Locate the JSON object in a response that may carry fences or prose.
///
/// The widest `{ ... }` span is tried first. When prose around the object
/// holds its own braces, the first balanced object with an analysis key wins.
fn json_candidate(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start < end {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str(&raw[start..=end]) {
            return Some(value);
        }
    }

    raw.match_indices('{').find_map(|(offset, _)| {
        let mut stream = serde_json::Deserializer::from_str(&raw[offset..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) if ANALYSIS_KEYS.iter().any(|k| map.contains_key(*k)) => {
                Some(Value::Object(map))
            }
            _ => None,
        }
    })
}

/// First `max_chars` characters of `content`, on a char boundary.
pub fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}
