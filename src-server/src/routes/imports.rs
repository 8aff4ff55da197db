//! Import Handlers
//!
//! `/api/data/*`: direct uploads, scheduled imports and import counters.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use scrub_processing::{CleaningError, JobId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::read_upload;
use crate::response::{ApiError, ApiResult, success};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    /// RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]` (UTC).
    pub time: Option<String>,
    /// Local path the scheduler reads when the job fires.
    pub source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub job_id: Option<String>,
}

/// One row of `view-imported`.
#[derive(Debug, Serialize)]
pub struct ImportedFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub filename: Option<String>,
    pub row_count: usize,
    pub column_count: usize,
    pub version: u64,
    pub uploaded_at: String,
}

/// `POST /api/data/upload`
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let upload = read_upload(multipart).await?;
    let importer = state.importer.clone();
    let summary = tokio::task::spawn_blocking(move || {
        importer.import_file(&upload.filename, &upload.content)
    })
    .await
    .map_err(|e| CleaningError::Internal(format!("Upload task failed: {}", e)))??;

    Ok(success(json!({
        "message": "File uploaded and data saved successfully",
        "metadata": {
            "_id": summary.dataset_id,
            "filename": summary.filename,
            "format": summary.format.to_string(),
            "row_count": summary.rows,
            "columns": summary.columns,
            "uploaded_at": summary.imported_at.to_rfc3339(),
        }
    })))
}

/// `POST /api/data/schedule-import`
pub async fn schedule_import(
    State(state): State<AppState>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let time = req
        .time
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CleaningError::InvalidSchedule("time is required".to_string()))?;
    let source = req.source.filter(|s| !s.trim().is_empty());

    let job_id = state.importer.schedule_import(time, source)?;
    Ok(success(json!({
        "message": "Import scheduled successfully.",
        "job_id": job_id,
    })))
}

/// `GET /api/data/view-scheduled-imports`
pub async fn view_scheduled_imports(State(state): State<AppState>) -> ApiResult {
    Ok(success(json!({ "data": state.importer.jobs() })))
}

/// `POST /api/data/cancel-scheduled-import`
pub async fn cancel_scheduled_import(
    State(state): State<AppState>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let job_id = req
        .job_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(JobId::from)
        .ok_or_else(|| ApiError::bad_request("Job ID is required."))?;

    state.importer.cancel_job(&job_id)?;
    Ok(success(json!({
        "message": format!("Scheduled import {} cancelled.", job_id),
    })))
}

/// `GET /api/data/view-imported`
pub async fn view_imported(State(state): State<AppState>) -> ApiResult {
    let files: Vec<ImportedFile> = state
        .pipeline
        .store()
        .list()
        .into_iter()
        .map(|info| ImportedFile {
            id: info.id.to_string(),
            filename: info.name,
            row_count: info.row_count,
            column_count: info.column_count,
            version: info.version,
            uploaded_at: info.imported_at.to_rfc3339(),
        })
        .collect();
    Ok(success(json!({ "data": files })))
}

/// `GET /api/data/import-progress`
///
/// Raw counters only; turning them into a percentage is the client's call.
pub async fn import_progress(State(state): State<AppState>) -> ApiResult {
    let stats = state.importer.import_stats();
    let status = if stats.total_files > 0 {
        "complete"
    } else {
        "no_import"
    };
    Ok(success(json!({
        "data": {
            "status": status,
            "total_files": stats.total_files,
            "total_rows": stats.total_rows,
            "scheduled_jobs": stats.scheduled_jobs,
        }
    })))
}
