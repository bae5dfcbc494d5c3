//! Status derivations for polling clients
//!
//! Pure views over a job snapshot. No mutation, no external calls; pollers
//! never block on the orchestrator.

use serde::Serialize;

use crate::registry::{FileStatus, Job};

/// Per-file view returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatusView {
    pub name: String,
    pub status: FileStatus,
    pub progress: u8,
    pub converted: bool,
}

/// Aggregate counts for the summary endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub finished: usize,
}

/// Ordered per-file statuses, upload order preserved.
pub fn file_statuses(job: &Job) -> Vec<FileStatusView> {
    job.files
        .iter()
        .map(|task| FileStatusView {
            name: task.name.clone(),
            status: task.status,
            progress: task.progress,
            converted: task.converted,
        })
        .collect()
}

/// Aggregate counts: `finished = converted + failed`.
pub fn summarize(job: &Job) -> JobSummary {
    let converted = job.files.iter().filter(|t| t.converted).count();
    let failed = job
        .files
        .iter()
        .filter(|t| t.status == FileStatus::Failed)
        .count();
    JobSummary {
        total: job.files.len(),
        converted,
        failed,
        finished: converted + failed,
    }
}
