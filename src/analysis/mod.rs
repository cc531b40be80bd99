//! Analysis Layer
//!
//! Decides whether recognized text counts as the expected string and shapes
//! the per-entry outcome handed to the aggregator.

pub mod scoring;
pub mod similarity;

pub use scoring::score_entry;

use serde::Serialize;
use std::path::PathBuf;

use crate::corpus::{CorpusEntry, Language};

/// One box to draw on an annotated screenshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    /// Bounding box (x, y, width, height); `None` for an unmatched entry
    pub bounds: Option<(u32, u32, u32, u32)>,
    pub matched: bool,
    /// Recognized fragment text (positive annotations only)
    pub text: Option<String>,
    pub similarity: f32,
}

impl Annotation {
    pub fn matched(bounds: (u32, u32, u32, u32), text: &str, similarity: f32) -> Self {
        Self {
            bounds: Some(bounds),
            matched: true,
            text: Some(text.to_string()),
            similarity,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            bounds: None,
            matched: false,
            text: None,
            similarity: 0.0,
        }
    }
}

/// Scored result of one expected entry on one screenshot
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    /// Key in the aggregate store (screenshot file stem)
    pub image_id: String,
    pub image_path: PathBuf,
    /// Annotated copy, when rendering succeeded
    pub annotated_path: Option<PathBuf>,
    pub language: Language,
    pub language_code: String,
    pub entry: CorpusEntry,
    /// Closest recognized fragment, empty when nothing was recognized
    pub recognized_text: String,
    pub best_similarity: f32,
    /// Mean engine confidence over all fragments of the screenshot
    pub recognition_confidence: f32,
    pub annotations: Vec<Annotation>,
    pub match_count: usize,
    pub passed: bool,
    /// Times this recognized text had been seen across the run, this one included
    pub occurrences: usize,
    /// Why the screenshot could not be checked; the outcome is then NG
    pub failure: Option<String>,
}

impl MatchOutcome {
    /// "OK" / "NG" verdict label used in reports
    pub fn verdict(&self) -> &'static str {
        if self.passed {
            "OK"
        } else {
            "NG"
        }
    }
}
