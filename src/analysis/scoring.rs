//! Scoring of recognized fragments against one expected entry

use crate::analysis::similarity::{is_match, similarity};
use crate::analysis::Annotation;
use crate::vision::TextRegion;

/// Scoring result for one expected entry on one screenshot
#[derive(Debug, Clone, PartialEq)]
pub struct EntryScore {
    /// Positive annotations, or a single negative one when nothing matched
    pub annotations: Vec<Annotation>,
    /// Number of fragments at or above the threshold
    pub match_count: usize,
    /// Most similar fragment and its score
    pub best: Option<(String, f32)>,
}

impl EntryScore {
    pub fn passed(&self) -> bool {
        self.match_count > 0
    }
}

/// Compare `expected` with every fragment.
///
/// Each fragment scoring at least `threshold` yields a positive annotation.
/// An entry without any positive annotation gets exactly one negative
/// annotation without bounds.
pub fn score_entry(expected: &str, fragments: &[TextRegion], threshold: f32) -> EntryScore {
    let mut annotations = Vec::new();
    let mut best: Option<(String, f32)> = None;

    for fragment in fragments {
        let score = similarity(expected, &fragment.text);

        if best.as_ref().map_or(true, |(_, s)| score > *s) {
            best = Some((fragment.text.clone(), score));
        }

        if is_match(score, threshold) {
            annotations.push(Annotation::matched(fragment.bounds, &fragment.text, score));
        }
    }

    let match_count = annotations.len();
    if annotations.is_empty() {
        annotations.push(Annotation::unmatched());
    }

    EntryScore {
        annotations,
        match_count,
        best,
    }
}
