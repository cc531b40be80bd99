//! Worker side of the pool: runs single jobs and reports back.

use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{score_entry, Annotation, MatchOutcome};
use crate::errors::JobError;
use crate::pipeline::pool::RunControl;
use crate::pipeline::Job;
use crate::shared::{AggregateStore, JobReport, JobStatus, OccurrenceCounter};
use crate::vision::{mean_confidence, Annotator, RecognitionEngine, TextRegion};

/// Everything a job needs besides its own data
pub struct JobContext {
    pub engine: Arc<RecognitionEngine>,
    pub annotator: Arc<dyn Annotator>,
    pub store: Arc<AggregateStore>,
    pub occurrences: Arc<OccurrenceCounter>,
}

/// Run one job and merge its outcomes.
///
/// Returns the number of merged outcomes. When the screenshot is missing
/// or recognition fails, every entry of the job is merged as NG with the
/// failure reason before the error is returned. An annotation failure only
/// costs the annotated copy.
pub fn process_job(job: &Job, ctx: &JobContext) -> Result<usize, JobError> {
    let fragments = match recognize(job, ctx) {
        Ok(fragments) => fragments,
        Err(err) => {
            ctx.store.merge(&job.image_id, failed_outcomes(job, &err.to_string()));
            return Err(err);
        }
    };
    debug!(
        "{} ({}): {} fragments",
        job.image_id,
        job.language_code,
        fragments.len()
    );
    let confidence = mean_confidence(&fragments);

    // One sighting per recognized fragment, however many entries look at it
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for fragment in &fragments {
        seen.insert(&fragment.text, ctx.occurrences.record(&fragment.text));
    }

    let mut outcomes = Vec::with_capacity(job.entries.len());
    for entry in &job.entries {
        let score = score_entry(&entry.expected_text, &fragments, job.confidence_threshold);
        let (recognized_text, best_similarity) = score.best.clone().unwrap_or_default();
        let occurrences = seen.get(recognized_text.as_str()).copied().unwrap_or(0);

        outcomes.push(MatchOutcome {
            image_id: job.image_id.clone(),
            image_path: job.image_path.clone(),
            annotated_path: None,
            language: job.language,
            language_code: job.language_code.clone(),
            entry: entry.clone(),
            recognized_text,
            best_similarity,
            recognition_confidence: confidence,
            passed: score.passed(),
            match_count: score.match_count,
            annotations: score.annotations,
            occurrences,
            failure: None,
        });
    }

    let annotations: Vec<_> = outcomes
        .iter()
        .flat_map(|o| o.annotations.iter().cloned())
        .collect();
    let destination = job.annotated_path();
    match ctx.annotator.annotate(&job.image_path, &destination, &annotations) {
        Ok(()) => {
            for outcome in &mut outcomes {
                outcome.annotated_path = Some(destination.clone());
            }
        }
        Err(source) => {
            let err = JobError::Annotation {
                path: job.image_path.clone(),
                source,
            };
            warn!("{}", err);
        }
    }

    let merged = outcomes.len();
    ctx.store.merge(&job.image_id, outcomes);
    Ok(merged)
}

fn recognize(job: &Job, ctx: &JobContext) -> Result<Vec<TextRegion>, JobError> {
    if !job.image_path.is_file() {
        return Err(JobError::ImageMissing(job.image_path.clone()));
    }
    ctx.engine
        .recognize(&job.image_path, &job.language_code)
        .map_err(|source| JobError::Recognition {
            path: job.image_path.clone(),
            language_code: job.language_code.clone(),
            source,
        })
}

/// NG outcome for every entry of a job that could not be checked
fn failed_outcomes(job: &Job, reason: &str) -> Vec<MatchOutcome> {
    job.entries
        .iter()
        .map(|entry| MatchOutcome {
            image_id: job.image_id.clone(),
            image_path: job.image_path.clone(),
            annotated_path: None,
            language: job.language,
            language_code: job.language_code.clone(),
            entry: entry.clone(),
            recognized_text: String::new(),
            best_similarity: 0.0,
            recognition_confidence: 0.0,
            annotations: vec![Annotation::unmatched()],
            match_count: 0,
            passed: false,
            occurrences: 0,
            failure: Some(reason.to_string()),
        })
        .collect()
}

/// Worker loop.
///
/// Takes jobs until the queue is empty and closed. Once the run is
/// cancelled the remaining jobs are drained and reported as cancelled
/// without running.
pub fn run_worker(
    worker: usize,
    jobs: Receiver<Job>,
    reports: Sender<JobReport>,
    ctx: Arc<JobContext>,
    control: Arc<RunControl>,
) {
    debug!("Worker {} started", worker);
    let mut handled = 0usize;

    for job in jobs.iter() {
        let status = if control.is_cancelled() {
            JobStatus::Cancelled
        } else {
            match process_job(&job, &ctx) {
                Ok(outcomes) => JobStatus::Completed { outcomes },
                Err(e) => {
                    warn!("Job {} abandoned: {}", job.index, e);
                    control.record_failure();
                    JobStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };
        handled += 1;

        let report = JobReport {
            job_index: job.index,
            image_path: job.image_path,
            language_code: job.language_code,
            worker,
            status,
        };
        if reports.send(report).is_err() {
            warn!("Worker {}: report channel closed, exiting", worker);
            break;
        }
    }

    info!("Worker {} finished after {} jobs", worker, handled);
}
