//! Pattern matcher: typed, threshold-filtered view over semantic search.

use tracing::{debug, instrument, warn};

use crate::domain::{PatternMatch, RefactorError, Result};
use crate::search::{SearchBackend, SearchHit};

/// Find fragments semantically similar to `query`.
///
/// Calls the search backend once for up to `limit` candidates, keeps those
/// with `similarity_distance < threshold` and returns them best first. An
/// empty result is not an error. Never touches the filesystem.
#[instrument(skip(search), fields(query = %query))]
pub async fn find_similar_patterns(
    search: &dyn SearchBackend,
    query: &str,
    threshold: f32,
    limit: usize,
) -> Result<Vec<PatternMatch>> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(RefactorError::Config(format!(
            "threshold must be within [0, 1], got {threshold}"
        )));
    }
    if limit == 0 {
        return Err(RefactorError::Config("limit must be positive".to_string()));
    }

    let hits = search.search(query, limit).await?;
    let candidates = hits.len();

    let mut matches = Vec::with_capacity(candidates);
    for hit in hits.into_iter().take(limit) {
        if hit.distance.is_nan() {
            warn!(file = %hit.metadata.file_path, "dropping hit with NaN distance");
            continue;
        }
        if hit.distance >= threshold {
            continue;
        }
        matches.push(into_pattern(hit)?);
    }

    matches.sort_by(|a, b| a.similarity_distance.total_cmp(&b.similarity_distance));

    debug!(candidates, kept = matches.len(), threshold, "filtered search hits");
    Ok(matches)
}

fn into_pattern(hit: SearchHit) -> Result<PatternMatch> {
    let extracted_symbols = hit.metadata.symbols()?;
    let line_count = hit
        .metadata
        .line_count
        .unwrap_or_else(|| hit.content.lines().count());
    Ok(PatternMatch {
        file_path: hit.metadata.file_path,
        content: hit.content,
        similarity_distance: hit.distance,
        extracted_symbols,
        line_count,
    })
}
