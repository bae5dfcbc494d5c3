//! Batch conversion engine
//!
//! Drives batches of uploaded PDFs through an external conversion provider,
//! tracks per-file progress in a process-wide job registry, merges the
//! successful outputs into one combined document and packages everything into
//! a downloadable ZIP archive.
//!
//! The provider is an opaque capability behind the [`ConversionClient`] trait:
//! upload, submit, poll, fetch. The orchestrator owns throttling (fixed-size
//! chunks, inter-chunk cooldowns), per-call timeouts, failure classification
//! and the single-retry policy.

pub mod archive;
pub mod client;
pub mod error;
pub mod orchestrator;
pub mod pdf;
pub mod registry;
pub mod status;

pub use archive::{build_archive, strip_entries, ArchiveEntry};
pub use client::{AssetRef, ConversionClient, JobLocation, ResultRef, TRANSIENT_SIGNATURE};
pub use error::BatchError;
pub use orchestrator::{BatchOrchestrator, FilePayload, OrchestratorConfig};
pub use pdf::pdf_page_size;
pub use registry::{FileStatus, FileTask, Job, JobRegistry};
pub use status::{file_statuses, summarize, FileStatusView, JobSummary};

pub use docx_compose::PageSize;

/// Fallback folder name when uploads carry no shared path prefix.
pub const DEFAULT_FOLDER_NAME: &str = "converted_batch";

/// Suffix of the combined-document archive entry.
pub const COMBINED_SUFFIX: &str = "_COMBINED.docx";

/// Archive entry name for the merged document of a job.
pub fn combined_entry_name(folder_name: &str) -> String {
    format!("{}{}", folder_name.replace(' ', "_"), COMBINED_SUFFIX)
}

/// Archive entry name for one converted file: source basename, `.docx` extension.
pub fn output_entry_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    format!("{stem}.docx")
}
