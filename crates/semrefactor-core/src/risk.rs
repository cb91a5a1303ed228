//! Risk tiers for ordering and gating automated edits.
//!
//! Classification is a pure function of a match's file path, extracted
//! symbol count and similarity distance. Rules are checked in a fixed order
//! and the first one that applies wins:
//!
//! 1. test artifact path -> `Low`
//! 2. more than [`HIGH_RISK_SYMBOL_COUNT`] symbols -> `High`
//! 3. distance above [`MEDIUM_RISK_DISTANCE`] -> `Medium`
//! 4. otherwise -> `Low`

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::PatternMatch;

/// Matches touching more symbols than this are `High` risk.
pub const HIGH_RISK_SYMBOL_COUNT: usize = 5;

/// Matches further than this from the query are at least `Medium` risk.
pub const MEDIUM_RISK_DISTANCE: f32 = 0.3;

/// Risk tier assigned to a matched pattern.
///
/// Ordering follows the plan order: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Tests, or close matches with a small surface.
    Low,
    /// Looser matches; worth a second look.
    Medium,
    /// Many symbols involved; review carefully.
    High,
}

impl RiskTier {
    /// Sort rank used by the plan builder.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Classify a match. Total and deterministic.
pub fn classify(pattern: &PatternMatch) -> RiskTier {
    if is_test_path(&pattern.file_path) {
        RiskTier::Low
    } else if pattern.symbol_count() > HIGH_RISK_SYMBOL_COUNT {
        RiskTier::High
    } else if pattern.similarity_distance > MEDIUM_RISK_DISTANCE {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Whether a path looks like a test artifact.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    let path = Path::new(&lower);

    let in_test_dir = path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some("test" | "tests" | "__tests__" | "spec" | "specs" | "testing")
        )
    });
    if in_test_dir {
        return true;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();

    stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_tests")
        || stem.ends_with("_spec")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
}
