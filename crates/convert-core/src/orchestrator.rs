//! Batch orchestration engine
//!
//! Drives every file of a job through upload -> convert -> fetch against the
//! external provider, strictly sequentially, in fixed-size chunks. Throughput
//! is deliberately throttled: the provider rate-limits aggressively, so the
//! design trades latency for reliability instead of parallelising.
//!
//! All side effects go through the [`JobRegistry`] and the archive written at
//! the end; `run` returns nothing to its caller and is spawned fire-and-forget
//! from the submission endpoint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::{build_archive, ArchiveEntry};
use crate::client::ConversionClient;
use crate::error::BatchError;
use crate::registry::{FileStatus, JobRegistry};
use crate::{combined_entry_name, output_entry_name};
use docx_compose::{merge_documents, MergeItem, PageSize};

/// Tuning knobs for the per-job pipeline. Defaults match production.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Files per chunk; chunks run strictly one after another.
    pub chunk_size: usize,
    /// Budget for each individual provider call.
    pub call_timeout: Duration,
    /// Visible backoff after any provider failure, retried or not.
    pub failure_cooldown_secs: u32,
    /// Visible pause between chunks; none after the final chunk.
    pub chunk_cooldown_secs: u32,
    /// Wait before the single retry of a transiently failed file.
    pub retry_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            call_timeout: Duration::from_secs(120),
            failure_cooldown_secs: 20,
            chunk_cooldown_secs: 30,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// One uploaded file handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub page_size: PageSize,
}

/// The batch engine. Cheap to construct per job; holds no per-job state of
/// its own, everything observable lives in the registry.
pub struct BatchOrchestrator {
    registry: JobRegistry,
    client: Arc<dyn ConversionClient>,
    config: OrchestratorConfig,
}

impl BatchOrchestrator {
    pub fn new(
        registry: JobRegistry,
        client: Arc<dyn ConversionClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }

    /// Process a whole batch. Per-file failures never abort the run; the only
    /// way to end without an archive is the job id vanishing from the
    /// registry, which is logged and swallowed.
    pub async fn run(&self, job_id: Uuid, files: Vec<FilePayload>) {
        if let Err(e) = self.run_inner(job_id, files).await {
            error!(%job_id, error = %e, "batch orchestration aborted");
        }
    }

    async fn run_inner(&self, job_id: Uuid, files: Vec<FilePayload>) -> Result<(), BatchError> {
        let total = files.len();
        let chunk_count = total.div_ceil(self.config.chunk_size).max(1);
        info!(%job_id, files = total, chunks = chunk_count, "starting batch");

        let mut entries: Vec<ArchiveEntry> = Vec::new();
        let mut merge_items: Vec<MergeItem> = Vec::new();

        for (chunk_index, chunk) in files.chunks(self.config.chunk_size).enumerate() {
            for file in chunk {
                self.process_file(job_id, file, &mut entries, &mut merge_items)
                    .await?;
            }

            if chunk_index + 1 < chunk_count {
                self.cooldown(job_id, self.config.chunk_cooldown_secs).await?;
            }
        }

        let combined = self.merge_outputs(job_id, &merge_items)?;
        let archive = build_archive(&entries, combined.as_ref())?;
        let combined_name = combined.map(|c| c.name);

        self.registry.finish_job(job_id, archive, combined_name)?;
        info!(%job_id, converted = merge_items.len(), "batch finished");
        Ok(())
    }

    /// Full pipeline for one file, including the failure cooldown and the
    /// single retry. Only registry errors propagate.
    async fn process_file(
        &self,
        job_id: Uuid,
        file: &FilePayload,
        entries: &mut Vec<ArchiveEntry>,
        merge_items: &mut Vec<MergeItem>,
    ) -> Result<(), BatchError> {
        let name = file.name.as_str();
        self.registry
            .set_file_status(job_id, name, FileStatus::Preparing)?;

        if file.bytes.is_empty() {
            // Input errors are terminal immediately: no retry, no cooldown.
            warn!(%job_id, file = name, "empty input file");
            self.registry
                .set_file_status(job_id, name, FileStatus::Failed)?;
            self.registry.mark_converted(job_id, name, false)?;
            return Ok(());
        }

        match self.attempt(job_id, name, &file.bytes).await {
            Ok(output) => {
                self.record_success(job_id, file, output, entries, merge_items)?;
            }
            Err(first_error) => {
                error!(%job_id, file = name, error = %first_error, "conversion failed");
                self.registry
                    .set_file_status(job_id, name, FileStatus::Failed)?;
                self.registry.mark_converted(job_id, name, false)?;

                // Global backoff after any provider failure, retried or not,
                // to stop hammering the provider.
                self.cooldown(job_id, self.config.failure_cooldown_secs)
                    .await?;

                if first_error.is_retryable() {
                    self.registry
                        .set_file_status(job_id, name, FileStatus::Retrying)?;
                    sleep(self.config.retry_delay).await;

                    // The owned bytes, not any spent upload stream, are the
                    // source of truth: the retry re-uploads from scratch.
                    match self.attempt(job_id, name, &file.bytes).await {
                        Ok(output) => {
                            self.record_success(job_id, file, output, entries, merge_items)?;
                        }
                        Err(retry_error) => {
                            error!(%job_id, file = name, error = %retry_error, "retry failed");
                            self.registry
                                .set_file_status(job_id, name, FileStatus::Failed)?;
                            self.registry.mark_converted(job_id, name, false)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// One upload/submit/poll/fetch pass, each call bounded by the timeout
    /// budget. Returns the converted bytes.
    async fn attempt(
        &self,
        job_id: Uuid,
        name: &str,
        bytes: &[u8],
    ) -> Result<Vec<u8>, BatchError> {
        self.registry
            .set_file_status(job_id, name, FileStatus::Uploading)?;
        let asset = self.bounded(self.client.upload(bytes)).await?;

        self.registry
            .set_file_status(job_id, name, FileStatus::Converting)?;
        let location = self.bounded(self.client.submit(&asset)).await?;
        let result = self.bounded(self.client.poll_result(&location)).await?;

        self.registry
            .set_file_status(job_id, name, FileStatus::Finalizing)?;
        let output = self.bounded(self.client.fetch_content(&result)).await?;

        if output.is_empty() {
            return Err(BatchError::EmptyOutput);
        }
        Ok(output)
    }

    /// Bound a provider call by the per-call budget. On expiry the future is
    /// dropped; a truly blocking provider call cannot be interrupted that way
    /// and its late result is simply discarded.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BatchError>>,
    ) -> Result<T, BatchError> {
        timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| BatchError::Timeout(self.config.call_timeout))?
    }

    fn record_success(
        &self,
        job_id: Uuid,
        file: &FilePayload,
        output: Vec<u8>,
        entries: &mut Vec<ArchiveEntry>,
        merge_items: &mut Vec<MergeItem>,
    ) -> Result<(), BatchError> {
        entries.push(ArchiveEntry {
            name: output_entry_name(&file.name),
            bytes: output.clone(),
        });
        merge_items.push(MergeItem {
            bytes: output,
            page_size: file.page_size,
        });
        self.registry
            .set_file_status(job_id, &file.name, FileStatus::Converted)?;
        self.registry.mark_converted(job_id, &file.name, true)
    }

    /// Merge candidates into the combined document. Requires at least two
    /// converted outputs; merge failure is logged and non-fatal.
    fn merge_outputs(
        &self,
        job_id: Uuid,
        merge_items: &[MergeItem],
    ) -> Result<Option<ArchiveEntry>, BatchError> {
        if merge_items.len() < 2 {
            return Ok(None);
        }

        let folder_name = self.registry.with_job(job_id, |job| job.folder_name.clone())?;
        match merge_documents(merge_items) {
            Ok(bytes) => Ok(Some(ArchiveEntry {
                name: combined_entry_name(&folder_name),
                bytes,
            })),
            Err(e) => {
                warn!(%job_id, error = %e, "combined document merge failed");
                Ok(None)
            }
        }
    }

    /// Visible countdown: pollers watch `cooldown_remaining` tick down in 1s
    /// decrements until the flag clears at zero.
    async fn cooldown(&self, job_id: Uuid, seconds: u32) -> Result<(), BatchError> {
        for remaining in (1..=seconds).rev() {
            self.registry.set_cooldown(job_id, true, remaining)?;
            sleep(Duration::from_secs(1)).await;
        }
        self.registry.set_cooldown(job_id, false, 0)
    }
}
