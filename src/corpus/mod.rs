//! Corpus Layer
//!
//! Turns the specification file into expected-text entries grouped by
//! target language. Malformed rows are skipped with a warning; an unreadable
//! file or an empty result aborts the run.

pub mod language;
pub mod row;

pub use language::{Language, LanguageTable};

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::SetupError;

/// Identifiers used to find the screenshot of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifiers {
    /// Prefix of the screenshot file name (always present)
    pub string_id: String,
    pub screen_id: Option<String>,
    pub part_id: Option<String>,
}

/// One expected localized string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorpusEntry {
    /// Physical line where the row starts (1-based)
    pub source_line: usize,
    pub sequence_id: String,
    pub module_name: String,
    pub description: String,
    /// Text that must appear on the screenshot
    pub expected_text: String,
    pub identifiers: Identifiers,
    pub language: Language,
    /// Lines of later rows carrying the same text
    pub duplicate_lines: Vec<usize>,
}

impl CorpusEntry {
    /// All specification lines this entry stands for
    pub fn document_lines(&self) -> Vec<usize> {
        std::iter::once(self.source_line)
            .chain(self.duplicate_lines.iter().copied())
            .collect()
    }
}

/// Extraction counters, logged once the file is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    pub rows: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

/// Extracted entries grouped by language, input order kept within a group
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub groups: BTreeMap<Language, Vec<CorpusEntry>>,
    pub stats: CorpusStats,
}

impl Corpus {
    /// Total number of distinct entries
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split file content into logical rows.
///
/// Physical lines are joined with `\n` while a quoted span is still open, so
/// multi-line metadata cells stay in one row. Each row carries the line
/// number it starts on.
pub fn logical_rows(content: &str) -> Vec<(usize, String)> {
    let mut rows = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    let mut open_quotes = false;

    for (index, line) in content.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.chars().filter(|c| *c == '"').count() % 2 == 1 {
            open_quotes = !open_quotes;
        }

        match pending.as_mut() {
            Some((_, row)) => {
                row.push('\n');
                row.push_str(line);
            }
            None => pending = Some((index + 1, line.to_string())),
        }

        if !open_quotes {
            if let Some(row) = pending.take() {
                rows.push(row);
            }
        }
    }

    if let Some(row) = pending {
        warn!("Row starting at line {} has an unterminated quote", row.0);
        rows.push(row);
    }

    rows
}

/// Parse file content into a deduplicated, language-grouped corpus
pub fn parse_corpus(content: &str) -> Corpus {
    let mut corpus = Corpus::default();
    // expected text -> (language, index within its group)
    let mut seen: HashMap<String, (Language, usize)> = HashMap::new();

    for (line, row) in logical_rows(content) {
        if row.trim().is_empty() {
            continue;
        }
        corpus.stats.rows += 1;

        let entry = match row::parse_row(line, &row) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping specification row: {}", e);
                corpus.stats.skipped += 1;
                continue;
            }
        };

        if let Some((language, index)) = seen.get(&entry.expected_text) {
            debug!(
                "Line {} repeats the text of line {}, merged",
                line, corpus.groups[language][*index].source_line
            );
            if let Some(original) = corpus
                .groups
                .get_mut(language)
                .and_then(|group| group.get_mut(*index))
            {
                original.duplicate_lines.push(line);
            }
            corpus.stats.duplicates += 1;
            continue;
        }

        let group = corpus.groups.entry(entry.language).or_default();
        seen.insert(entry.expected_text.clone(), (entry.language, group.len()));
        group.push(entry);
    }

    corpus
}

/// Read and parse the specification file.
///
/// Fails when the file is missing, unreadable, or yields no usable entry.
pub fn extract_corpus(path: &Path) -> Result<Corpus, SetupError> {
    if !path.exists() {
        return Err(SetupError::CorpusMissing(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| SetupError::CorpusUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            warn!("{:?} is not valid UTF-8, invalid sequences replaced", path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let corpus = parse_corpus(content);
    info!(
        "Extracted {} entries in {} languages from {:?} ({} rows, {} skipped, {} duplicates)",
        corpus.len(),
        corpus.groups.len(),
        path,
        corpus.stats.rows,
        corpus.stats.skipped,
        corpus.stats.duplicates
    );

    if corpus.is_empty() {
        return Err(SetupError::EmptyCorpus(path.to_path_buf()));
    }

    Ok(corpus)
}
