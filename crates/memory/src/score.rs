//! Keyword relevance scoring.
//!
//! A pure, deterministic term-overlap score in [0, 1]. Stores that sit on
//! a vector index replace this with cosine similarity; the contract is the
//! same either way: higher means more relevant, identical text scores 1.0.

/// Score how relevant `text` is to `query`.
///
/// The score is the fraction of distinct query terms that occur in the
/// text (case-insensitive), so a text containing every query term scores
/// 1.0 and one containing none scores 0.0. Terms shorter than two
/// characters are ignored.
pub fn keyword_relevance(query: &str, text: &str) -> f32 {
    let text_lower = text.to_lowercase();
    let mut terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect();
    terms.sort();
    terms.dedup();

    if terms.is_empty() {
        return 0.0;
    }

    let matched = terms
        .iter()
        .filter(|t| text_lower.contains(t.as_str()))
        .count();

    matched as f32 / terms.len() as f32
}
