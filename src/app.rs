//! Run Coordinator
//!
//! Drives one verification run: extract the corpus, partition it by
//! language, acquire the recognition engine, run the worker pool and hand
//! the collected results to the report stage.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::corpus::{extract_corpus, CorpusStats, LanguageTable};
use crate::errors::SetupError;
use crate::pipeline::{build_jobs, partition, JobContext, RunSummary, WorkerPool};
use crate::report::RunReport;
use crate::shared::{AggregateStore, OccurrenceCounter, ResultMap};
use crate::vision::{Annotator, RecognitionEngine, TextRecognizer};

/// Inputs of one run, after config and CLI have been merged
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub corpus_path: PathBuf,
    pub image_dir: PathBuf,
    pub output_root: PathBuf,
    pub confidence_threshold: f32,
    pub workers: usize,
    /// Cancel the remaining jobs after this many failures
    pub max_failed_jobs: Option<usize>,
    pub language_table: LanguageTable,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig, corpus_path: &Path, image_dir: &Path, output_root: &Path) -> Self {
        Self {
            corpus_path: corpus_path.to_path_buf(),
            image_dir: image_dir.to_path_buf(),
            output_root: output_root.to_path_buf(),
            confidence_threshold: config.matching.confidence_threshold,
            workers: config.pool.workers,
            max_failed_jobs: config.pool.max_failed_jobs,
            language_table: LanguageTable::with_overrides(config.languages.codes.clone()),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutput {
    pub results: ResultMap,
    pub summary: RunSummary,
    pub stats: CorpusStats,
}

/// Main application coordinator
pub struct ShotCheckApp {
    settings: RunSettings,
    pool: WorkerPool,
}

impl ShotCheckApp {
    /// Create a coordinator, rejecting settings no run could use
    pub fn new(settings: RunSettings) -> Result<Self, SetupError> {
        if !(0.0..=1.0).contains(&settings.confidence_threshold) {
            return Err(SetupError::InvalidThreshold(settings.confidence_threshold));
        }
        if settings.max_failed_jobs == Some(0) {
            return Err(SetupError::Config("max_failed_jobs must be at least 1".to_string()));
        }
        let pool = WorkerPool::new(settings.workers)?.with_failure_limit(settings.max_failed_jobs);
        Ok(Self { settings, pool })
    }

    /// Run the pipeline.
    ///
    /// `open_recognizer` is called once, with the language code of the
    /// first batch, after the corpus has been partitioned. The engine it
    /// returns lives until every worker has been joined.
    pub fn run<F>(&self, open_recognizer: F, annotator: Arc<dyn Annotator>) -> Result<RunOutput, SetupError>
    where
        F: FnOnce(&str) -> Result<Box<dyn TextRecognizer>>,
    {
        let settings = &self.settings;
        let corpus = extract_corpus(&settings.corpus_path)?;

        let batches = partition(
            &corpus,
            &settings.image_dir,
            settings.confidence_threshold,
            &settings.output_root,
            &settings.language_table,
        );
        let Some(first) = batches.first() else {
            return Err(SetupError::NoBatches(settings.image_dir.clone()));
        };

        let recognizer = open_recognizer(&first.language_code)
            .map_err(|e| SetupError::EngineUnavailable(format!("{e:#}")))?;

        let jobs = build_jobs(&batches);
        info!(
            "{} entries in {} language batches, {} jobs",
            batches.iter().map(|b| b.entries.len()).sum::<usize>(),
            batches.len(),
            jobs.len()
        );

        let store = Arc::new(AggregateStore::new());
        let ctx = Arc::new(JobContext {
            engine: Arc::new(RecognitionEngine::new(recognizer)),
            annotator,
            store: store.clone(),
            occurrences: Arc::new(OccurrenceCounter::new()),
        });

        let summary = self.pool.run(jobs, ctx.clone())?;
        drop(ctx);
        debug!(
            "Aggregate store: {} merges, {} outcomes",
            store.merge_count(),
            store.outcome_count()
        );

        let results = match Arc::try_unwrap(store) {
            Ok(store) => store.into_results(),
            Err(shared) => {
                warn!("Result store still shared after shutdown, copying");
                shared.snapshot()
            }
        };

        Ok(RunOutput {
            results,
            summary,
            stats: corpus.stats,
        })
    }

    /// Shape a finished run into the report document
    pub fn report(&self, output: &RunOutput) -> RunReport {
        RunReport::build(
            &self.settings.corpus_path,
            &self.settings.image_dir,
            self.settings.confidence_threshold,
            &output.stats,
            &output.results,
            output.summary.clone(),
        )
    }
}
