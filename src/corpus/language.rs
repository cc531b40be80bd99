//! Language detection and recognition-code lookup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Recognition code used when a language has no mapping
pub const BASELINE_CODE: &str = "eng";

/// Target language of a corpus entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    French,
    German,
    Russian,
    Spanish,
    Portuguese,
    Italian,
    Turkish,
    Thai,
    Arabic,
}

/// Keywords checked against the lower-cased text, in priority order.
/// The first rule with any hit decides the language.
const DETECTION_RULES: &[(Language, &[&str])] = &[
    (Language::English, &["english", "uk", "englist"]),
    (Language::French, &["français", "french"]),
    (Language::German, &["deutsch", "german"]),
    (Language::Russian, &["русский", "russian"]),
    (Language::Spanish, &["español", "spanish"]),
    (Language::Portuguese, &["português", "portuguese"]),
    (Language::Italian, &["italiano", "italian"]),
    (Language::Turkish, &["türkçe", "turkish"]),
    (Language::Thai, &["ไทย", "thai"]),
    (Language::Arabic, &["العربية", "arabic"]),
];

/// Misspelling found in older specification files. Still accepted, but reported.
const LEGACY_ENGLISH_KEYWORD: &str = "englist";

impl Language {
    /// Language assumed when no keyword matches
    pub const BASELINE: Language = Language::English;

    pub const ALL: [Language; 10] = [
        Language::English,
        Language::French,
        Language::German,
        Language::Russian,
        Language::Spanish,
        Language::Portuguese,
        Language::Italian,
        Language::Turkish,
        Language::Thai,
        Language::Arabic,
    ];

    /// Lower-case name, also used as the per-language output directory
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "french",
            Language::German => "german",
            Language::Russian => "russian",
            Language::Spanish => "spanish",
            Language::Portuguese => "portuguese",
            Language::Italian => "italian",
            Language::Turkish => "turkish",
            Language::Thai => "thai",
            Language::Arabic => "arabic",
        }
    }

    /// Default recognition-engine code (tesseract naming)
    pub fn default_code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::French => "fra",
            Language::German => "deu",
            Language::Russian => "rus",
            Language::Spanish => "spa",
            Language::Portuguese => "por",
            Language::Italian => "ita",
            Language::Turkish => "tur",
            Language::Thai => "tha",
            Language::Arabic => "ara",
        }
    }

    pub fn from_name(name: &str) -> Option<Language> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Infer the language of an expected string from embedded keywords.
///
/// Falls back to [`Language::BASELINE`] instead of rejecting the text.
pub fn detect_language(text: &str) -> Language {
    let lower = text.to_lowercase();

    for (language, keywords) in DETECTION_RULES {
        if let Some(keyword) = keywords.iter().find(|k| lower.contains(*k)) {
            if *keyword == LEGACY_ENGLISH_KEYWORD {
                warn!(
                    "Text {:?} classified as English via misspelled keyword '{}'",
                    text, LEGACY_ENGLISH_KEYWORD
                );
            }
            return *language;
        }
    }

    Language::BASELINE
}

/// Language name -> recognition code table
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    overrides: HashMap<String, String>,
}

impl LanguageTable {
    /// Build a table with per-language overrides (keys are language names)
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(name, code)| (name.trim().to_lowercase(), code))
            .filter(|(_, code)| !code.trim().is_empty())
            .collect();
        Self { overrides }
    }

    /// Resolve the recognition code for a language name.
    ///
    /// Lookup order: override, built-in table, [`BASELINE_CODE`].
    pub fn code_for(&self, name: &str) -> String {
        let key = name.trim().to_lowercase();
        if let Some(code) = self.overrides.get(&key) {
            return code.clone();
        }
        Language::from_name(&key)
            .map(|lang| lang.default_code().to_string())
            .unwrap_or_else(|| BASELINE_CODE.to_string())
    }
}
