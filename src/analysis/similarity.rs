//! Fuzzy text similarity

use strsim::normalized_levenshtein;

/// Case-insensitive normalized Levenshtein similarity in `[0, 1]`.
///
/// `1 - distance / max(len(a), len(b))`, lengths in characters. Two empty
/// strings are identical.
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    normalized_levenshtein(&a, &b) as f32
}

/// Threshold decision: a score equal to the threshold passes
pub fn is_match(score: f32, threshold: f32) -> bool {
    score >= threshold
}
