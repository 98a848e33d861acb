//! File suggestion ranking.
//!
//! Deterministic total order over candidate paths for `@` mention
//! autocomplete. Most relevant first:
//!
//! 1. basename (or its stem) equals the query, case-insensitive
//! 2. basename starts with the query
//! 3. full path contains the query
//!
//! Non-matches are filtered out; within a rank, ties break by
//! case-insensitive full-path order. The result never exceeds
//! [`MAX_SUGGESTIONS`]. An empty query short-circuits to the first ten
//! candidates in caller-supplied order — no ranking at all.

/// Upper bound on suggestions returned to the UI.
pub const MAX_SUGGESTIONS: usize = 10;

/// Rank candidates for a query, most relevant first.
pub fn rank(query: &str, candidates: &[String]) -> Vec<String> {
    if query.is_empty() {
        return candidates.iter().take(MAX_SUGGESTIONS).cloned().collect();
    }

    let query_lower = query.to_lowercase();

    let mut matched: Vec<(u8, String, &String)> = candidates
        .iter()
        .filter_map(|path| {
            match_rank(path, &query_lower).map(|rank| (rank, path.to_lowercase(), path))
        })
        .collect();

    matched.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    matched
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, _, path)| path.clone())
        .collect()
}

/// Relevance rank of one candidate, or `None` when it does not match.
///
/// A fourth rank ("everything else") exists in the ordering relation but is
/// unreachable here: non-matches are filtered, and the empty query never
/// reaches ranking.
fn match_rank(path: &str, query_lower: &str) -> Option<u8> {
    let name = basename(path).to_lowercase();
    let stem = name
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .unwrap_or(&name);

    if name == query_lower || stem == query_lower {
        return Some(0);
    }
    if name.starts_with(query_lower) {
        return Some(1);
    }
    if path.to_lowercase().contains(query_lower) {
        return Some(2);
    }
    None
}

/// Final path component, tolerant of either separator.
fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
