//! Application Configuration
//!
//! Run settings stored in TOML format. Every section has defaults, so a
//! partial file only overrides what it names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::SetupError;
use crate::storage::ensure_dir;
use crate::vision::OcrGranularity;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub matching: MatchingConfig,
    pub pool: PoolConfig,
    pub languages: LanguageConfig,
    pub recognition: RecognitionConfig,
    pub annotation: AnnotationConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), SetupError> {
        let threshold = self.matching.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SetupError::InvalidThreshold(threshold));
        }
        if self.pool.workers == 0 {
            return Err(SetupError::InvalidWorkerCount);
        }
        if self.pool.max_failed_jobs == Some(0) {
            return Err(SetupError::Config(
                "pool.max_failed_jobs must be at least 1".to_string(),
            ));
        }
        if self.annotation.stroke_width == 0 {
            return Err(SetupError::Config(
                "annotation.stroke_width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log level for this crate (overridden by RUST_LOG)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Text matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity (0.0 - 1.0) for a fragment to count as a match
    pub confidence_threshold: f32,
    /// Whether fragments are recognized lines or single words
    pub granularity: OcrGranularity,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            granularity: OcrGranularity::Line,
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,
    /// Cancel the remaining jobs once this many have failed; unset runs everything
    pub max_failed_jobs: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_failed_jobs: None,
        }
    }
}

/// Recognition code overrides, keyed by language name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    pub codes: HashMap<String, String>,
}

/// Tesseract backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub tesseract_cmd: String,
    pub tessdata_dir: Option<PathBuf>,
    pub page_segmentation_mode: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: "tesseract".to_string(),
            tessdata_dir: None,
            page_segmentation_mode: 6,
        }
    }
}

/// Annotated screenshot appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Box colour for matched fragments (#RRGGBB or #RRGGBBAA)
    pub matched_color: String,
    pub unmatched_color: String,
    pub stroke_width: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            matched_color: "#00C800".to_string(),
            unmatched_color: "#FF0000".to_string(),
            stroke_width: 2,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Indent the JSON report
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
