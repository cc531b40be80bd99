//! Tesseract CLI backend
//!
//! Runs `tesseract <image> stdout -l <code> --psm <n> tsv` once per image and
//! parses the TSV word rows. Each call is an independent process, so the
//! active language is just the `-l` argument of the next call.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::vision::ocr::TextRecognizer;
use crate::vision::{OcrGranularity, TextRegion};

/// Settings for the tesseract backend
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Executable name or path
    pub command: String,
    /// Optional `--tessdata-dir`
    pub tessdata_dir: Option<PathBuf>,
    /// Page segmentation mode (6 = single uniform block of text)
    pub page_segmentation_mode: u32,
    pub granularity: OcrGranularity,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            tessdata_dir: None,
            page_segmentation_mode: 6,
            granularity: OcrGranularity::Line,
        }
    }
}

/// Tesseract-backed recognizer
pub struct TesseractRecognizer {
    config: TesseractConfig,
    language: String,
}

impl TesseractRecognizer {
    /// Verify the executable runs and start with `initial_language`
    pub fn new(config: TesseractConfig, initial_language: &str) -> Result<Self> {
        let output = Command::new(&config.command)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to run '{}'", config.command))?;

        let version = String::from_utf8_lossy(&output.stdout);
        let version = version.lines().next().unwrap_or("unknown version").to_string();
        info!("Using {} ({})", config.command, version);

        Ok(Self {
            config,
            language: initial_language.to_string(),
        })
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn active_language(&self) -> &str {
        &self.language
    }

    fn set_language(&mut self, language_code: &str) -> Result<()> {
        validate_language_code(language_code)?;
        self.language = language_code.to_string();
        Ok(())
    }

    fn recognize(&mut self, image: &Path) -> Result<Vec<TextRegion>> {
        self.run(image, &self.language)
    }

    /// Every call is its own process with its own `-l`
    fn is_reentrant(&self) -> bool {
        true
    }

    fn recognize_in(&self, image: &Path, language_code: &str) -> Result<Vec<TextRegion>> {
        validate_language_code(language_code)?;
        self.run(image, language_code)
    }
}

impl TesseractRecognizer {
    fn run(&self, image: &Path, language_code: &str) -> Result<Vec<TextRegion>> {
        let mut command = Command::new(&self.config.command);
        command.arg(image).arg("stdout");
        if let Some(dir) = &self.config.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
            .arg("-l")
            .arg(language_code)
            .arg("--psm")
            .arg(self.config.page_segmentation_mode.to_string())
            .arg("tsv");

        let output = command
            .output()
            .with_context(|| format!("Failed to run '{}'", self.config.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let regions = parse_tsv(&tsv, self.config.granularity);
        debug!("Tesseract: {} regions in {:?} ({})", regions.len(), image, language_code);
        Ok(regions)
    }
}

/// Language codes are passed as process arguments: `eng`, `tha+eng`, `chi_sim`
fn validate_language_code(language_code: &str) -> Result<()> {
    if language_code.is_empty()
        || language_code
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '+' || c == '_'))
    {
        return Err(anyhow!("Invalid tesseract language code '{}'", language_code));
    }
    Ok(())
}

/// One word row of tesseract's TSV output
#[derive(Debug, Clone)]
struct TsvWord {
    line_key: (u32, u32, u32, u32),
    bounds: (u32, u32, u32, u32),
    confidence: f32,
    text: String,
}

fn parse_word_row(row: &str) -> Option<TsvWord> {
    // level, page_num, block_num, par_num, line_num, word_num,
    // left, top, width, height, conf, text
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() < 12 || fields[0] != "5" {
        return None;
    }

    let num = |i: usize| fields[i].trim().parse::<u32>().ok();
    let confidence: f32 = fields[10].trim().parse().ok()?;
    let text = fields[11].trim();
    if confidence < 0.0 || text.is_empty() {
        return None;
    }

    Some(TsvWord {
        line_key: (num(1)?, num(2)?, num(3)?, num(4)?),
        bounds: (num(6)?, num(7)?, num(8)?, num(9)?),
        confidence: (confidence / 100.0).clamp(0.0, 1.0),
        text: text.to_string(),
    })
}

/// Union of two (x, y, width, height) boxes
fn union_bounds(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> (u32, u32, u32, u32) {
    let x = a.0.min(b.0);
    let y = a.1.min(b.1);
    let right = a.0.saturating_add(a.2).max(b.0.saturating_add(b.2));
    let bottom = a.1.saturating_add(a.3).max(b.1.saturating_add(b.3));
    (x, y, right - x, bottom - y)
}

/// Parse tesseract TSV output into regions at the requested granularity
pub fn parse_tsv(tsv: &str, granularity: OcrGranularity) -> Vec<TextRegion> {
    let words: Vec<TsvWord> = tsv.lines().skip(1).filter_map(parse_word_row).collect();

    match granularity {
        OcrGranularity::Word => words
            .into_iter()
            .map(|w| TextRegion {
                text: w.text,
                bounds: w.bounds,
                confidence: w.confidence,
            })
            .collect(),
        OcrGranularity::Line => {
            let mut lines: BTreeMap<(u32, u32, u32, u32), Vec<TsvWord>> = BTreeMap::new();
            for word in words {
                lines.entry(word.line_key).or_default().push(word);
            }

            lines
                .into_values()
                .filter_map(|words| {
                    let first = words.first()?.bounds;
                    let bounds = words.iter().fold(first, |acc, w| union_bounds(acc, w.bounds));
                    let confidence =
                        words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
                    let text = words
                        .iter()
                        .map(|w| w.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    Some(TextRegion {
                        text,
                        bounds,
                        confidence,
                    })
                })
                .collect()
        }
    }
}
