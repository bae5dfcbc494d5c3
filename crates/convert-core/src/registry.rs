//! Process-wide job registry
//!
//! Keyed store of job state, no business logic. A single orchestrator task
//! owns all processing writes for a given job; everything else only polls, so
//! writes are field-level replacements under a short lock and readers see
//! either the old or the new value of each field. Status is advisory UI
//! feedback, not a correctness-bearing value.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use uuid::Uuid;

use crate::error::BatchError;
use docx_compose::PageSize;

/// Per-file pipeline state. Progress derives from the state and is only ever
/// reported at transition points, never interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Queued,
    Preparing,
    Uploading,
    Converting,
    Finalizing,
    Converted,
    /// Transient, reachable only from `Failed` while the single retry runs.
    Retrying,
    /// Absorbing.
    Failed,
}

impl FileStatus {
    pub fn progress(self) -> u8 {
        match self {
            FileStatus::Queued => 0,
            FileStatus::Preparing => 5,
            FileStatus::Uploading => 25,
            FileStatus::Converting => 55,
            FileStatus::Finalizing => 90,
            FileStatus::Converted => 100,
            FileStatus::Retrying => 20,
            FileStatus::Failed => 0,
        }
    }
}

/// One file of a batch and its pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct FileTask {
    pub name: String,
    pub status: FileStatus,
    pub progress: u8,
    pub converted: bool,
    #[serde(skip)]
    pub page_size: PageSize,
}

/// One batch-conversion request and its aggregate outcome.
///
/// Created at submission, mutated by the owning orchestrator task until the
/// archive is set, read-only afterwards. Never explicitly destroyed: job ids
/// are ephemeral and volume is low, so process-lifetime retention is fine.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub folder_name: String,
    pub cooldown_active: bool,
    pub cooldown_remaining: u32,
    /// Insertion order == upload order; preserved for merge ordering.
    pub files: Vec<FileTask>,
    /// Set exactly once, after the final chunk.
    pub archive: Option<Vec<u8>>,
    /// Present only if the merge succeeded.
    pub combined_entry: Option<String>,
}

/// Shared handle to the in-process job store.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job with every file in `Queued` state.
    pub fn create_job(
        &self,
        files: impl IntoIterator<Item = (String, PageSize)>,
        folder_name: String,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let files = files
            .into_iter()
            .map(|(name, page_size)| FileTask {
                name,
                status: FileStatus::Queued,
                progress: 0,
                converted: false,
                page_size,
            })
            .collect();

        let job = Job {
            id,
            folder_name,
            cooldown_active: false,
            cooldown_remaining: 0,
            files,
            archive: None,
            combined_entry: None,
        };

        self.jobs.write().unwrap().insert(id, job);
        id
    }

    /// Run a closure against a job snapshot without cloning it out.
    pub fn with_job<T>(
        &self,
        job_id: Uuid,
        f: impl FnOnce(&Job) -> T,
    ) -> Result<T, BatchError> {
        let jobs = self.jobs.read().unwrap();
        let job = jobs.get(&job_id).ok_or(BatchError::JobNotFound(job_id))?;
        Ok(f(job))
    }

    pub fn set_file_status(
        &self,
        job_id: Uuid,
        name: &str,
        status: FileStatus,
    ) -> Result<(), BatchError> {
        self.update(job_id, |job| {
            if let Some(task) = job.files.iter_mut().find(|t| t.name == name) {
                task.status = status;
                task.progress = status.progress();
            }
        })
    }

    pub fn mark_converted(
        &self,
        job_id: Uuid,
        name: &str,
        converted: bool,
    ) -> Result<(), BatchError> {
        self.update(job_id, |job| {
            if let Some(task) = job.files.iter_mut().find(|t| t.name == name) {
                task.converted = converted;
            }
        })
    }

    pub fn set_cooldown(
        &self,
        job_id: Uuid,
        active: bool,
        remaining: u32,
    ) -> Result<(), BatchError> {
        self.update(job_id, |job| {
            job.cooldown_active = active;
            job.cooldown_remaining = remaining;
        })
    }

    /// Finalize a job: store the archive (exactly once) and the combined entry
    /// name, if a merge succeeded.
    pub fn finish_job(
        &self,
        job_id: Uuid,
        archive: Vec<u8>,
        combined_entry: Option<String>,
    ) -> Result<(), BatchError> {
        self.update(job_id, |job| {
            debug_assert!(job.archive.is_none(), "archive written twice");
            job.archive = Some(archive);
            job.combined_entry = combined_entry;
        })
    }

    fn update(&self, job_id: Uuid, f: impl FnOnce(&mut Job)) -> Result<(), BatchError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or(BatchError::JobNotFound(job_id))?;
        f(job);
        Ok(())
    }
}
