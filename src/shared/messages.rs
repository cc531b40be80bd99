//! Messages sent from worker threads back to the pool coordinator

use std::path::PathBuf;

/// How a single job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Outcomes were merged into the aggregate store
    Completed { outcomes: usize },
    /// Recognition or image access failed; entries were merged as NG
    Failed { reason: String },
    /// Drained after cancellation without running
    Cancelled,
}

/// Report for one job, sent once per job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_index: usize,
    pub image_path: PathBuf,
    pub language_code: String,
    pub worker: usize,
    pub status: JobStatus,
}
