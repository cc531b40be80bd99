//! Fixed-size worker pool
//!
//! All jobs are queued up front on a crossbeam channel and the sending side
//! is closed, so a worker stops once it finds the queue empty. The pool
//! returns after every worker has been joined.

use crossbeam_channel::unbounded;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::errors::SetupError;
use crate::pipeline::worker::{run_worker, JobContext};
use crate::pipeline::Job;
use crate::shared::{JobReport, JobStatus};

/// Cancellation state shared by the workers of one run.
///
/// Jobs already running finish; jobs still queued are drained unrun. The
/// run cancels itself once `max_failed_jobs` jobs have failed.
#[derive(Debug, Default)]
pub struct RunControl {
    cancelled: AtomicBool,
    failures: AtomicUsize,
    max_failed_jobs: Option<usize>,
}

impl RunControl {
    pub fn new(max_failed_jobs: Option<usize>) -> Self {
        Self {
            max_failed_jobs,
            ..Default::default()
        }
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Count a failed job, cancelling the run when the limit is reached
    pub fn record_failure(&self) {
        let failed = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(limit) = self.max_failed_jobs {
            if failed >= limit && !self.is_cancelled() {
                warn!("{} jobs failed (limit {}), cancelling remaining jobs", failed, limit);
                self.cancel();
            }
        }
    }
}

/// A job whose screenshot could not be checked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedJob {
    pub image_path: PathBuf,
    pub language_code: String,
    pub reason: String,
}

/// Accounting for one pool run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub jobs_total: usize,
    pub jobs_completed: usize,
    pub jobs_failed: Vec<FailedJob>,
    pub jobs_cancelled: usize,
    pub outcomes_merged: usize,
}

impl RunSummary {
    /// Every job is accounted for exactly once
    pub fn is_consistent(&self) -> bool {
        self.jobs_completed + self.jobs_failed.len() + self.jobs_cancelled == self.jobs_total
    }
}

pub struct WorkerPool {
    workers: usize,
    max_failed_jobs: Option<usize>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, SetupError> {
        if workers == 0 {
            return Err(SetupError::InvalidWorkerCount);
        }
        Ok(Self {
            workers,
            max_failed_jobs: None,
        })
    }

    /// Cancel the rest of a run after `limit` failed jobs
    pub fn with_failure_limit(mut self, limit: Option<usize>) -> Self {
        self.max_failed_jobs = limit;
        self
    }

    /// Run every job to completion, failure or cancellation
    pub fn run(&self, jobs: Vec<Job>, ctx: Arc<JobContext>) -> Result<RunSummary, SetupError> {
        let mut summary = RunSummary {
            jobs_total: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return Ok(summary);
        }

        let pending: Vec<(PathBuf, String)> = jobs
            .iter()
            .map(|j| (j.image_path.clone(), j.language_code.clone()))
            .collect();

        let control = Arc::new(RunControl::new(self.max_failed_jobs));
        let (job_tx, job_rx) = unbounded();
        let (report_tx, report_rx) = unbounded::<JobReport>();
        for job in jobs {
            // The receiver is alive until the workers are spawned.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let spawn_count = self.workers.min(pending.len());
        info!("Starting {} workers for {} jobs", spawn_count, pending.len());

        let mut handles = Vec::with_capacity(spawn_count);
        for index in 0..spawn_count {
            let jobs = job_rx.clone();
            let reports = report_tx.clone();
            let ctx = ctx.clone();
            let worker_control = control.clone();

            let spawned = thread::Builder::new()
                .name(format!("shotcheck-worker-{index}"))
                .spawn(move || run_worker(index, jobs, reports, ctx, worker_control));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    error!("Failed to spawn worker {}: {}", index, source);
                    control.cancel();
                    drop(job_rx);
                    drop(report_tx);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(SetupError::PoolSpawn { index, source });
                }
            }
        }
        drop(job_rx);
        drop(report_tx);

        let mut reported = vec![false; pending.len()];
        for report in report_rx.iter() {
            if let Some(seen) = reported.get_mut(report.job_index) {
                *seen = true;
            }
            debug!(
                "Job {} reported by worker {}: {:?}",
                report.job_index, report.worker, report.status
            );
            match report.status {
                JobStatus::Completed { outcomes } => {
                    summary.jobs_completed += 1;
                    summary.outcomes_merged += outcomes;
                }
                JobStatus::Failed { reason } => summary.jobs_failed.push(FailedJob {
                    image_path: report.image_path,
                    language_code: report.language_code,
                    reason,
                }),
                JobStatus::Cancelled => summary.jobs_cancelled += 1,
            }
        }

        for (index, handle) in handles.into_iter().enumerate() {
            if handle.join().is_err() {
                error!("Worker {} panicked", index);
            }
        }

        // Jobs lost with a panicked worker never reported.
        for (index, (image_path, language_code)) in pending.into_iter().enumerate() {
            if !reported[index] {
                summary.jobs_failed.push(FailedJob {
                    image_path,
                    language_code,
                    reason: "worker terminated unexpectedly".to_string(),
                });
            }
        }

        if !summary.jobs_failed.is_empty() {
            warn!("{} of {} jobs failed", summary.jobs_failed.len(), summary.jobs_total);
        }
        info!(
            "Pool finished: {} completed, {} failed, {} cancelled",
            summary.jobs_completed,
            summary.jobs_failed.len(),
            summary.jobs_cancelled
        );
        if !summary.is_consistent() {
            error!(
                "Job accounting mismatch: {} completed + {} failed + {} cancelled != {} total",
                summary.jobs_completed,
                summary.jobs_failed.len(),
                summary.jobs_cancelled,
                summary.jobs_total
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Annotation;
    use crate::corpus::{parse_corpus, Language, LanguageTable};
    use crate::pipeline::build_jobs;
    use crate::pipeline::partition::partition_with;
    use crate::shared::{AggregateStore, OccurrenceCounter};
    use crate::vision::{Annotator, RecognitionEngine, TextRecognizer, TextRegion};
    use anyhow::{bail, Result};
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    /// Reads the language-specific label out of a fixed table
    struct TableRecognizer {
        language: String,
        calls: Arc<AtomicUsize>,
        panic_on: Option<String>,
    }

    impl TableRecognizer {
        fn new() -> Self {
            Self {
                language: "eng".into(),
                calls: Arc::new(AtomicUsize::new(0)),
                panic_on: None,
            }
        }
    }

    impl TextRecognizer for TableRecognizer {
        fn name(&self) -> &str {
            "table"
        }

        fn active_language(&self) -> &str {
            &self.language
        }

        fn set_language(&mut self, language_code: &str) -> Result<()> {
            self.language = language_code.to_string();
            Ok(())
        }

        fn recognize(&mut self, image: &Path) -> Result<Vec<TextRegion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = image.file_stem().unwrap().to_string_lossy().to_string();
            if self.panic_on.as_deref() == Some(stem.as_str()) {
                panic!("recognizer crashed on {stem}");
            }
            if stem.starts_with("BAD") {
                bail!("unreadable image");
            }
            let text = match self.language.as_str() {
                "fra" => "Bonjour french",
                _ => "Hello",
            };
            Ok(vec![TextRegion {
                text: text.into(),
                bounds: (0, 0, 10, 10),
                confidence: 0.95,
            }])
        }
    }

    struct NoopAnnotator;

    impl Annotator for NoopAnnotator {
        fn annotate(&self, _: &Path, _: &Path, _: &[Annotation]) -> Result<()> {
            Ok(())
        }
    }

    fn setup(dir: &Path, rows: &str, recognizer: TableRecognizer) -> (Vec<Job>, Arc<JobContext>) {
        let corpus = parse_corpus(rows);
        let batches = partition_with(&corpus, 0.7, &dir.join("out"), &LanguageTable::default(), |id| {
            let path = dir.join(format!("{id}.png"));
            fs::write(&path, b"png").unwrap();
            Some(path)
        });
        let ctx = Arc::new(JobContext {
            engine: Arc::new(RecognitionEngine::new(Box::new(recognizer))),
            annotator: Arc::new(NoopAnnotator),
            store: Arc::new(AggregateStore::new()),
            occurrences: Arc::new(OccurrenceCounter::new()),
        });
        (build_jobs(&batches), ctx)
    }

    fn rows(ids: &[&str]) -> String {
        ids.iter()
            .enumerate()
            .map(|(i, id)| format!("{i},,M,d,String ID:{id},确认文言表示,Hello {id},Y,Y,Y"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(SetupError::InvalidWorkerCount)));
    }

    #[test]
    fn test_every_job_accounted_for() {
        let dir = tempdir().unwrap();
        let ids: Vec<String> = (0..12)
            .map(|i| if i % 4 == 0 { format!("BAD_{i}") } else { format!("IMG_{i}") })
            .collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let recognizer = TableRecognizer::new();
        let calls = recognizer.calls.clone();
        let (jobs, ctx) = setup(dir.path(), &rows(&id_refs), recognizer);

        let pool = WorkerPool::new(4).unwrap();
        let summary = pool.run(jobs, ctx.clone()).unwrap();

        assert_eq!(summary.jobs_total, 12);
        assert_eq!(summary.jobs_completed, 9);
        assert_eq!(summary.jobs_failed.len(), 3);
        assert_eq!(summary.jobs_cancelled, 0);
        assert!(summary.is_consistent());
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(ctx.store.merge_count(), 12);
        assert_eq!(ctx.store.outcome_count(), 12);
        assert!(summary.jobs_failed.iter().all(|f| f.reason.contains("unreadable image")));
    }

    #[test]
    fn test_same_image_two_languages_union() {
        let dir = tempdir().unwrap();
        let rows = "1,,M,d,String ID:MM_01,确认文言表示,Hello,Y,Y,Y\n\
                    2,,M,d,String ID:MM_01,确认文言表示,Bonjour french,Y,Y,Y";
        let (jobs, ctx) = setup(dir.path(), rows, TableRecognizer::new());
        assert_eq!(jobs.len(), 2);

        let summary = WorkerPool::new(2).unwrap().run(jobs, ctx.clone()).unwrap();
        assert_eq!(summary.jobs_completed, 2);

        let results = ctx.store.snapshot();
        assert_eq!(results.len(), 1);
        let outcomes = &results["MM_01"];
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.passed));
        let mut languages: Vec<_> = outcomes.iter().map(|o| o.language).collect();
        languages.sort();
        assert_eq!(languages, vec![Language::English, Language::French]);
    }

    #[test]
    fn test_failure_limit_cancels_remaining_jobs() {
        let dir = tempdir().unwrap();
        let recognizer = TableRecognizer::new();
        let calls = recognizer.calls.clone();
        let (jobs, ctx) = setup(dir.path(), &rows(&["BAD_1", "BAD_2", "C", "D", "E"]), recognizer);

        let pool = WorkerPool::new(1).unwrap().with_failure_limit(Some(2));
        let summary = pool.run(jobs, ctx.clone()).unwrap();

        assert_eq!(summary.jobs_failed.len(), 2);
        assert_eq!(summary.jobs_completed, 0);
        assert_eq!(summary.jobs_cancelled, 3);
        assert!(summary.is_consistent());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.store.outcome_count(), 2);
    }

    #[test]
    fn test_failure_limit_not_reached_runs_everything() {
        let dir = tempdir().unwrap();
        let (jobs, ctx) = setup(dir.path(), &rows(&["BAD_1", "B", "C"]), TableRecognizer::new());

        let pool = WorkerPool::new(1).unwrap().with_failure_limit(Some(2));
        let summary = pool.run(jobs, ctx).unwrap();

        assert_eq!(summary.jobs_failed.len(), 1);
        assert_eq!(summary.jobs_completed, 2);
        assert_eq!(summary.jobs_cancelled, 0);
    }

    #[test]
    fn test_run_control_cancels_once_at_limit() {
        let control = RunControl::new(Some(3));
        control.record_failure();
        control.record_failure();
        assert!(!control.is_cancelled());
        control.record_failure();
        assert!(control.is_cancelled());

        let unlimited = RunControl::new(None);
        for _ in 0..100 {
            unlimited.record_failure();
        }
        assert!(!unlimited.is_cancelled());
    }

    /// Re-entrant backend that takes a fixed time per call
    struct SlowRecognizer {
        delay: Duration,
    }

    impl TextRecognizer for SlowRecognizer {
        fn name(&self) -> &str {
            "slow"
        }

        fn active_language(&self) -> &str {
            "eng"
        }

        fn set_language(&mut self, _language_code: &str) -> Result<()> {
            Ok(())
        }

        fn recognize(&mut self, image: &Path) -> Result<Vec<TextRegion>> {
            self.recognize_in(image, "eng")
        }

        fn is_reentrant(&self) -> bool {
            true
        }

        fn recognize_in(&self, _image: &Path, _language_code: &str) -> Result<Vec<TextRegion>> {
            std::thread::sleep(self.delay);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_reentrant_backend_runs_jobs_in_parallel() {
        let dir = tempdir().unwrap();
        let ids: Vec<String> = (0..8).map(|i| format!("IMG_{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (jobs, _) = setup(dir.path(), &rows(&id_refs), TableRecognizer::new());
        let ctx = Arc::new(JobContext {
            engine: Arc::new(RecognitionEngine::new(Box::new(SlowRecognizer {
                delay: Duration::from_millis(200),
            }))),
            annotator: Arc::new(NoopAnnotator),
            store: Arc::new(AggregateStore::new()),
            occurrences: Arc::new(OccurrenceCounter::new()),
        });

        let started = Instant::now();
        let summary = WorkerPool::new(8).unwrap().run(jobs, ctx).unwrap();
        let elapsed = started.elapsed();

        assert_eq!(summary.jobs_completed, 8);
        // Serialized, eight calls would take 1.6s
        assert!(elapsed < Duration::from_millis(1200), "took {elapsed:?}");
    }

    #[test]
    fn test_panicked_worker_jobs_count_as_failed() {
        let dir = tempdir().unwrap();
        let mut recognizer = TableRecognizer::new();
        recognizer.panic_on = Some("A".into());
        let (jobs, ctx) = setup(dir.path(), &rows(&["A", "B"]), recognizer);

        let summary = WorkerPool::new(1).unwrap().run(jobs, ctx).unwrap();
        assert_eq!(summary.jobs_total, 2);
        assert_eq!(summary.jobs_failed.len(), 2);
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_empty_job_list() {
        let dir = tempdir().unwrap();
        let (_, ctx) = setup(dir.path(), "", TableRecognizer::new());
        let summary = WorkerPool::new(8).unwrap().run(Vec::new(), ctx).unwrap();
        assert_eq!(summary.jobs_total, 0);
        assert!(summary.is_consistent());
    }
}
