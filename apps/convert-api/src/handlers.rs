//! HTTP handlers for the conversion API

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use convert_core::{
    file_statuses, pdf_page_size, strip_entries, summarize, BatchOrchestrator, FilePayload,
    FileStatusView, JobSummary, PageSize, COMBINED_SUFFIX, DEFAULT_FOLDER_NAME,
};

use crate::error::ApiError;
use crate::models::{DownloadQuery, SubmitResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Start a batch conversion. Responds immediately; the orchestrator runs as a
/// detached background task and is observed via the status endpoints only.
pub async fn submit_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let mut payloads: Vec<FilePayload> = Vec::new();
    let mut folder_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(raw_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {e}")))?;

        // Directory uploads arrive as "folder/file.pdf"; the first path prefix
        // names the whole batch.
        if folder_name.is_none() {
            folder_name = path_prefix(&raw_name);
        }
        let basename = basename(&raw_name);

        // A page box we cannot read must not fail the whole request; the file
        // itself will still go through conversion and fail there if broken.
        let page_size = pdf_page_size(&bytes).unwrap_or_else(|e| {
            warn!(file = %basename, error = %e, "page size extraction failed, using Letter");
            PageSize::LETTER
        });

        payloads.push(FilePayload {
            name: basename,
            bytes: bytes.to_vec(),
            page_size,
        });
    }

    if payloads.is_empty() {
        return Err(ApiError::InvalidRequest("No files in batch".into()));
    }

    let folder = folder_name.unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string());
    let job_id = state.registry.create_job(
        payloads.iter().map(|p| (p.name.clone(), p.page_size)),
        folder.clone(),
    );

    info!(%job_id, files = payloads.len(), folder = %folder, "batch submitted");

    let orchestrator = BatchOrchestrator::new(
        state.registry.clone(),
        state.client.clone(),
        state.config.clone(),
    );
    tokio::spawn(async move {
        orchestrator.run(job_id, payloads).await;
    });

    Ok(Json(SubmitResponse {
        job_id,
        folder,
    }))
}

/// Ordered per-file statuses for a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FileStatusView>>, ApiError> {
    let statuses = state.registry.with_job(id, file_statuses)?;
    Ok(Json(statuses))
}

/// Aggregate counts for a job.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobSummary>, ApiError> {
    let summary = state.registry.with_job(id, summarize)?;
    Ok(Json(summary))
}

/// Leading directory of an uploaded path, if the client sent one.
fn path_prefix(raw_name: &str) -> Option<String> {
    raw_name
        .split_once('/')
        .map(|(prefix, _)| prefix.to_string())
}

/// Final path component of an uploaded file name.
fn basename(raw_name: &str) -> String {
    raw_name
        .rsplit('/')
        .next()
        .unwrap_or(raw_name)
        .to_string()
}

/// Download the result archive, optionally without the combined document.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<(StatusCode, [(String, String); 2], Vec<u8>), ApiError> {
    let (archive, folder_name) = state
        .registry
        .with_job(id, |job| (job.archive.clone(), job.folder_name.clone()))?;
    let mut archive = archive.ok_or(ApiError::ArchiveNotReady(id))?;

    if !query.include_merged {
        archive = strip_entries(&archive, |name| name.ends_with(COMBINED_SUFFIX))?;
    }

    let safe_name = folder_name.replace(' ', "_");
    Ok((
        StatusCode::OK,
        [
            ("Content-Type".to_string(), "application/zip".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{safe_name}_converted.zip\""),
            ),
        ],
        archive,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_path_prefix_from_directory_upload() {
        assert_eq!(path_prefix("site plans/p1.pdf").as_deref(), Some("site plans"));
        assert_eq!(path_prefix("a/b/p1.pdf").as_deref(), Some("a"));
        assert_eq!(path_prefix("loose.pdf"), None);
    }

    #[test]
    fn test_basename_strips_directories() {
        assert_eq!(basename("site plans/p1.pdf"), "p1.pdf");
        assert_eq!(basename("a/b/p1.pdf"), "p1.pdf");
        assert_eq!(basename("loose.pdf"), "loose.pdf");
    }
}
