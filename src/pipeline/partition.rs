//! Language partitioning
//!
//! Each language group becomes an independent batch of located entries.
//! Batches share no mutable state, so their jobs can run on any worker.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, CorpusEntry, Language, LanguageTable};
use crate::storage::ImageIndex;

/// Unit of partitioned work for one language
#[derive(Debug, Clone)]
pub struct LanguageBatch {
    pub language: Language,
    /// Recognition-engine code
    pub language_code: String,
    /// Located screenshot + entry, in corpus order
    pub entries: Vec<(PathBuf, CorpusEntry)>,
    pub confidence_threshold: f32,
    /// Directory receiving annotated screenshots of this language
    pub output_location: PathBuf,
}

/// Build batches, looking screenshots up under `image_dir`.
///
/// The directory is indexed once for the whole corpus.
pub fn partition(
    corpus: &Corpus,
    image_dir: &Path,
    confidence_threshold: f32,
    output_root: &Path,
    table: &LanguageTable,
) -> Vec<LanguageBatch> {
    let index = ImageIndex::build(image_dir);
    if index.is_empty() {
        warn!("No screenshots found under {:?}", image_dir);
    } else {
        debug!("{} screenshots available under {:?}", index.len(), image_dir);
    }
    partition_with(corpus, confidence_threshold, output_root, table, |string_id| {
        index.locate_or_warn(string_id)
    })
}

/// Build batches with a custom screenshot lookup.
///
/// Entries whose screenshot is not found are left out; a language left
/// with no entries produces no batch.
pub fn partition_with<F>(
    corpus: &Corpus,
    confidence_threshold: f32,
    output_root: &Path,
    table: &LanguageTable,
    mut locate: F,
) -> Vec<LanguageBatch>
where
    F: FnMut(&str) -> Option<PathBuf>,
{
    let mut batches = Vec::new();

    for (language, entries) in &corpus.groups {
        let located: Vec<(PathBuf, CorpusEntry)> = entries
            .iter()
            .filter_map(|entry| {
                locate(&entry.identifiers.string_id).map(|path| (path, entry.clone()))
            })
            .collect();

        if located.is_empty() {
            warn!("No screenshots located for {} entries, language dropped", language);
            continue;
        }

        let batch = LanguageBatch {
            language: *language,
            language_code: table.code_for(language.name()),
            confidence_threshold,
            output_location: output_root.join(language.name()),
            entries: located,
        };
        info!(
            "Batch {} ({}): {}/{} entries located",
            batch.language,
            batch.language_code,
            batch.entries.len(),
            entries.len()
        );
        batches.push(batch);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_corpus;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn corpus_of(rows: &[(&str, &str)]) -> Corpus {
        let content = rows
            .iter()
            .enumerate()
            .map(|(i, (id, text))| {
                format!("{i},,M,d,String ID:{id},确认文言表示,{text},Y,Y,Y")
            })
            .collect::<Vec<_>>()
            .join("\n");
        parse_corpus(&content)
    }

    #[test]
    fn test_partition_keeps_located_entries_only() {
        let corpus = corpus_of(&[("A_01", "Hello"), ("A_02", "World"), ("B_01", "Bonjour french")]);
        let batches = partition_with(&corpus, 0.7, Path::new("/out"), &LanguageTable::default(), |id| {
            (id != "A_02").then(|| PathBuf::from(format!("/shots/{id}.png")))
        });

        assert_eq!(batches.len(), 2);
        let english = batches.iter().find(|b| b.language == Language::English).unwrap();
        assert_eq!(english.entries.len(), 1);
        assert_eq!(english.language_code, "eng");
        assert_eq!(english.output_location, PathBuf::from("/out/english"));
        assert!((english.confidence_threshold - 0.7).abs() < f32::EPSILON);

        let french = batches.iter().find(|b| b.language == Language::French).unwrap();
        assert_eq!(french.language_code, "fra");
    }

    #[test]
    fn test_partition_drops_empty_batches() {
        let corpus = corpus_of(&[("A_01", "Hello"), ("B_01", "Hallo german")]);
        let batches = partition_with(&corpus, 0.5, Path::new("/out"), &LanguageTable::default(), |id| {
            id.starts_with('A').then(|| PathBuf::from("/shots/a.png"))
        });

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].language, Language::English);
    }

    #[test]
    fn test_partition_applies_code_overrides() {
        let corpus = corpus_of(&[("A_01", "Hello")]);
        let mut overrides = HashMap::new();
        overrides.insert("english".to_string(), "eng+osd".to_string());
        let table = LanguageTable::with_overrides(overrides);

        let batches = partition_with(&corpus, 0.5, Path::new("/out"), &table, |_| {
            Some(PathBuf::from("/shots/a.png"))
        });
        assert_eq!(batches[0].language_code, "eng+osd");
    }

    #[test]
    fn test_partition_with_real_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A_01_main.png"), b"").unwrap();
        let corpus = corpus_of(&[("A_01", "Hello"), ("A_09", "Missing")]);

        let batches = partition(&corpus, dir.path(), 0.8, Path::new("/out"), &LanguageTable::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entries.len(), 1);
        assert!(batches[0].entries[0].0.ends_with("A_01_main.png"));
    }

    #[test]
    fn test_partition_shares_one_screenshot_between_languages() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("MM_01.png"), b"").unwrap();
        let corpus = corpus_of(&[("MM_01", "Hello"), ("MM_01", "Bonjour french"), ("MM_02", "Gone")]);

        let batches = partition(&corpus, dir.path(), 0.8, Path::new("/out"), &LanguageTable::default());
        assert_eq!(batches.len(), 2);
        let paths: Vec<_> = batches.iter().flat_map(|b| b.entries.iter().map(|(p, _)| p)).collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], paths[1]);
    }
}
