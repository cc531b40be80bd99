//! Report Layer
//!
//! Renders the aggregated results once the pool has shut down: a JSON
//! document with one page per screenshot, and a short console summary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::analysis::MatchOutcome;
use crate::corpus::{CorpusStats, Language};
use crate::pipeline::RunSummary;
use crate::shared::ResultMap;
use crate::storage::ensure_dir;

/// Produces the report document for a finished run
pub trait ReportRenderer {
    fn render(&self, report: &RunReport, destination: &Path) -> Result<()>;
}

/// Run-level header
#[derive(Debug, Clone, Serialize)]
pub struct ReportHeader {
    pub run_id: Uuid,
    pub corpus_path: PathBuf,
    pub image_dir: PathBuf,
    pub confidence_threshold: f32,
    pub entries_total: usize,
    pub entries_passed: usize,
    pub entries_failed: usize,
    pub rows_skipped: usize,
    pub duplicates: usize,
}

/// One row of a page
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub language: Language,
    pub language_code: String,
    pub image_id: String,
    pub expected_text: String,
    pub document_lines: Vec<usize>,
    pub verdict: &'static str,
    pub occurrences: usize,
    pub recognized_text: String,
    pub similarity: f32,
    pub annotated_image: Option<PathBuf>,
    /// Set when the screenshot could not be checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<&MatchOutcome> for ReportRow {
    fn from(outcome: &MatchOutcome) -> Self {
        Self {
            language: outcome.language,
            language_code: outcome.language_code.clone(),
            image_id: outcome.image_id.clone(),
            expected_text: outcome.entry.expected_text.clone(),
            document_lines: outcome.entry.document_lines(),
            verdict: outcome.verdict(),
            occurrences: outcome.occurrences,
            recognized_text: outcome.recognized_text.clone(),
            similarity: outcome.best_similarity,
            annotated_image: outcome.annotated_path.clone(),
            failure: outcome.failure.clone(),
        }
    }
}

/// All rows for one screenshot
#[derive(Debug, Clone, Serialize)]
pub struct ReportPage {
    pub image_id: String,
    pub rows: Vec<ReportRow>,
}

/// Complete report document
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub header: ReportHeader,
    pub pages: Vec<ReportPage>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Build the document from pool results. Pages follow image id order;
    /// rows within a page are ordered by language, then by document line.
    pub fn build(
        corpus_path: &Path,
        image_dir: &Path,
        confidence_threshold: f32,
        stats: &CorpusStats,
        results: &ResultMap,
        summary: RunSummary,
    ) -> Self {
        let pages: Vec<ReportPage> = results
            .iter()
            .map(|(image_id, outcomes)| {
                let mut rows: Vec<ReportRow> = outcomes.iter().map(ReportRow::from).collect();
                rows.sort_by(|a, b| {
                    a.language
                        .cmp(&b.language)
                        .then_with(|| a.document_lines.first().cmp(&b.document_lines.first()))
                });
                ReportPage {
                    image_id: image_id.clone(),
                    rows,
                }
            })
            .collect();

        let entries_total: usize = pages.iter().map(|p| p.rows.len()).sum();
        let entries_passed = pages
            .iter()
            .flat_map(|p| &p.rows)
            .filter(|r| r.verdict == "OK")
            .count();

        Self {
            header: ReportHeader {
                run_id: Uuid::new_v4(),
                corpus_path: corpus_path.to_path_buf(),
                image_dir: image_dir.to_path_buf(),
                confidence_threshold,
                entries_total,
                entries_passed,
                entries_failed: entries_total - entries_passed,
                rows_skipped: stats.skipped,
                duplicates: stats.duplicates,
            },
            pages,
            summary,
        }
    }
}

/// Writes the report as JSON
#[derive(Debug, Clone, Default)]
pub struct JsonReportRenderer {
    pub pretty: bool,
}

impl ReportRenderer for JsonReportRenderer {
    fn render(&self, report: &RunReport, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        let file = File::create(destination)
            .with_context(|| format!("Failed to create report {:?}", destination))?;
        let mut writer = BufWriter::new(file);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, report)?;
        } else {
            serde_json::to_writer(&mut writer, report)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;

        info!(
            "Report {} written to {:?} ({} pages)",
            report.header.run_id,
            destination,
            report.pages.len()
        );
        Ok(())
    }
}

/// Human-readable end-of-run summary
pub fn console_summary(report: &RunReport) -> String {
    let header = &report.header;
    let summary = &report.summary;
    let mut out = format!(
        "Run {}\n  entries: {} passed, {} failed ({} total)\n  jobs:    {} completed, {} failed, {} cancelled ({} total)\n",
        header.run_id,
        header.entries_passed,
        header.entries_failed,
        header.entries_total,
        summary.jobs_completed,
        summary.jobs_failed.len(),
        summary.jobs_cancelled,
        summary.jobs_total,
    );
    for failed in &summary.jobs_failed {
        out.push_str(&format!(
            "  failed:  {} [{}] {}\n",
            failed.image_path.display(),
            failed.language_code,
            failed.reason
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Annotation;
    use crate::corpus::{CorpusEntry, Identifiers};
    use crate::pipeline::FailedJob;
    use tempfile::tempdir;

    fn outcome(image_id: &str, language: Language, line: usize, passed: bool) -> MatchOutcome {
        MatchOutcome {
            image_id: image_id.into(),
            image_path: PathBuf::from(format!("/shots/{image_id}.png")),
            annotated_path: None,
            language,
            language_code: language.default_code().into(),
            entry: CorpusEntry {
                source_line: line,
                sequence_id: line.to_string(),
                module_name: "Menu".into(),
                description: String::new(),
                expected_text: format!("Text {line}"),
                identifiers: Identifiers {
                    string_id: image_id.into(),
                    screen_id: None,
                    part_id: None,
                },
                language,
                duplicate_lines: vec![line + 10],
            },
            recognized_text: format!("Text {line}"),
            best_similarity: if passed { 1.0 } else { 0.3 },
            recognition_confidence: 0.9,
            annotations: vec![Annotation::unmatched()],
            match_count: usize::from(passed),
            passed,
            occurrences: 1,
            failure: None,
        }
    }

    fn sample_report() -> RunReport {
        let mut results = ResultMap::new();
        results.insert(
            "B_01".into(),
            vec![
                outcome("B_01", Language::French, 4, false),
                outcome("B_01", Language::English, 2, true),
            ],
        );
        results.insert("A_01".into(), vec![outcome("A_01", Language::English, 1, true)]);

        let summary = RunSummary {
            jobs_total: 4,
            jobs_completed: 3,
            jobs_failed: vec![FailedJob {
                image_path: PathBuf::from("/shots/C_01.png"),
                language_code: "eng".into(),
                reason: "engine crashed".into(),
            }],
            jobs_cancelled: 0,
            outcomes_merged: 3,
        };
        let stats = CorpusStats {
            rows: 5,
            skipped: 1,
            duplicates: 0,
        };
        RunReport::build(Path::new("strings.csv"), Path::new("/shots"), 0.7, &stats, &results, summary)
    }

    #[test]
    fn test_build_orders_pages_and_rows() {
        let report = sample_report();
        let ids: Vec<_> = report.pages.iter().map(|p| p.image_id.as_str()).collect();
        assert_eq!(ids, vec!["A_01", "B_01"]);

        let rows = &report.pages[1].rows;
        assert_eq!(rows[0].language, Language::English);
        assert_eq!(rows[1].language, Language::French);
        assert_eq!(rows[1].verdict, "NG");
        assert_eq!(rows[0].document_lines, vec![2, 12]);

        assert_eq!(report.header.entries_total, 3);
        assert_eq!(report.header.entries_passed, 2);
        assert_eq!(report.header.entries_failed, 1);
        assert_eq!(report.header.rows_skipped, 1);
        assert_eq!(report.summary.jobs_failed.len(), 1);
    }

    #[test]
    fn test_unchecked_entries_count_as_failed() {
        let mut broken = outcome("C_01", Language::English, 7, false);
        broken.recognized_text.clear();
        broken.failure = Some("Recognition failed for /shots/C_01.png (eng): engine crashed".into());

        let mut results = ResultMap::new();
        results.insert("A_01".into(), vec![outcome("A_01", Language::English, 1, true)]);
        results.insert("C_01".into(), vec![broken]);
        let stats = CorpusStats::default();
        let report = RunReport::build(
            Path::new("strings.csv"),
            Path::new("/shots"),
            0.7,
            &stats,
            &results,
            RunSummary::default(),
        );

        assert_eq!(report.header.entries_total, 2);
        assert_eq!(report.header.entries_failed, 1);
        let row = &report.pages[1].rows[0];
        assert_eq!(row.verdict, "NG");
        assert!(row.failure.as_deref().unwrap().contains("engine crashed"));
        assert!(report.pages[0].rows[0].failure.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["pages"][0]["rows"][0].get("failure").is_none());
        assert!(json["pages"][1]["rows"][0]["failure"].is_string());
    }

    #[test]
    fn test_json_renderer_writes_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = sample_report();

        JsonReportRenderer { pretty: true }.render(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["pages"].as_array().unwrap().len(), 2);
        assert_eq!(value["pages"][0]["rows"][0]["verdict"], "OK");
        assert_eq!(value["pages"][1]["rows"][1]["language"], "french");
        assert_eq!(value["summary"]["jobs_failed"][0]["reason"], "engine crashed");
        assert_eq!(
            value["header"]["run_id"].as_str().unwrap(),
            report.header.run_id.to_string()
        );
    }

    #[test]
    fn test_console_summary_lists_failures() {
        let text = console_summary(&sample_report());
        assert!(text.contains("2 passed, 1 failed (3 total)"));
        assert!(text.contains("3 completed, 1 failed, 0 cancelled (4 total)"));
        assert!(text.contains("engine crashed"));
    }
}
