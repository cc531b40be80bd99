//! Vision/OCR Layer
//!
//! External capabilities the pipeline calls into:
//! - text recognition ([`TextRecognizer`], tesseract backend)
//! - annotated screenshot rendering ([`Annotator`])

pub mod annotate;
pub mod ocr;
pub mod tesseract;

pub use annotate::{Annotator, ImageAnnotator};
pub use ocr::{RecognitionEngine, TextRecognizer};
pub use tesseract::{TesseractConfig, TesseractRecognizer};

use serde::{Deserialize, Serialize};

/// OCR result granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrGranularity {
    /// Individual words with their bounding boxes
    Word,
    /// Full lines with their bounding boxes (words joined)
    #[default]
    Line,
}

/// Detected text region from OCR
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    /// Detected text content
    pub text: String,
    /// Bounding box (x, y, width, height)
    pub bounds: (u32, u32, u32, u32),
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// Mean confidence over all regions, 0.0 when there are none
pub fn mean_confidence(regions: &[TextRegion]) -> f32 {
    if regions.is_empty() {
        return 0.0;
    }
    regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32
}
