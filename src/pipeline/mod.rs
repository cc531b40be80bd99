//! Pipeline Layer
//!
//! Partitioning of the corpus into language batches, flattening of batches
//! into jobs, and the worker pool that runs them.

pub mod partition;
pub mod pool;
pub mod worker;

pub use partition::{partition, LanguageBatch};
pub use pool::{FailedJob, RunSummary, WorkerPool};
pub use worker::JobContext;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::corpus::{CorpusEntry, Language};
use crate::storage::image_id;

/// One recognition pass: a screenshot read in one language, scored against
/// every entry of that language that points at it.
#[derive(Debug, Clone)]
pub struct Job {
    pub index: usize,
    pub image_path: PathBuf,
    pub image_id: String,
    pub language: Language,
    pub language_code: String,
    pub confidence_threshold: f32,
    pub output_location: PathBuf,
    pub entries: Vec<CorpusEntry>,
}

impl Job {
    /// Destination of the annotated copy: `annotated_<file name>`
    pub fn annotated_path(&self) -> PathBuf {
        let file_name = self
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.png", self.image_id));
        self.output_location.join(format!("annotated_{file_name}"))
    }
}

/// Flatten batches into jobs.
///
/// Entries of one batch that locate the same screenshot share a job, so each
/// (screenshot, language) pair is recognized once. Jobs keep batch order and,
/// within a batch, the order in which screenshots first appear.
pub fn build_jobs(batches: &[LanguageBatch]) -> Vec<Job> {
    let mut jobs: Vec<Job> = Vec::new();

    for batch in batches {
        // Screenshot -> index of its job within this batch
        let mut by_image: HashMap<&PathBuf, usize> = HashMap::new();
        for (path, entry) in &batch.entries {
            if let Some(&index) = by_image.get(path) {
                jobs[index].entries.push(entry.clone());
                continue;
            }
            by_image.insert(path, jobs.len());
            jobs.push(Job {
                index: jobs.len(),
                image_path: path.clone(),
                image_id: image_id(path),
                language: batch.language,
                language_code: batch.language_code.clone(),
                confidence_threshold: batch.confidence_threshold,
                output_location: batch.output_location.clone(),
                entries: vec![entry.clone()],
            });
        }
    }

    jobs
}
