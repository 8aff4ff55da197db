//! Cleaning Handlers
//!
//! `/api/module9/*`: import a file, run one of the four cleaning
//! operations against it, poll its operation log and download the result.
//!
//! Operations are CPU bound, so each one runs on tokio's blocking pool.
//! The request waits at most `operation_timeout`; past that the caller gets
//! a 504 and the background sweeper fails the record.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use scrub_processing::{
    CleaningError, CleaningResult, FillStrategy, NormalizeMethod, OperationKind, Pipeline, Value,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;

use super::{read_upload, require_file_id};
use crate::response::{ApiResult, success};
use crate::state::AppState;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct FileRequest {
    pub file_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FillRequest {
    pub file_id: Option<String>,
    /// mean, median, mode or constant
    pub strategy: Option<String>,
    /// Fill value for the constant strategy.
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NormalizeRequest {
    pub file_id: Option<String>,
    /// min_max (default) or z_score
    pub method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutlierRequest {
    pub file_id: Option<String>,
    pub threshold: Option<f64>,
}

// ============================================================================
// HELPERS
// ============================================================================

/// Run a pipeline call on the blocking pool, bounded by the operation budget.
async fn run_operation<T, F>(state: &AppState, kind: OperationKind, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Pipeline) -> CleaningResult<T> + Send + 'static,
{
    let pipeline = state.pipeline.clone();
    let task = tokio::task::spawn_blocking(move || op(&pipeline));

    match tokio::time::timeout(state.operation_timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join_err)) => Err(CleaningError::Internal(format!(
            "{} task failed: {}",
            kind.display_name(),
            join_err
        ))
        .into()),
        Err(_) => Err(CleaningError::Timeout {
            kind,
            budget_secs: state.operation_timeout.as_secs(),
        }
        .into()),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// `POST /api/module9/import`
pub async fn import(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let upload = read_upload(multipart).await?;
    let importer = state.importer.clone();
    let summary = run_operation(&state, OperationKind::Import, move |_| {
        importer.import_file(&upload.filename, &upload.content)
    })
    .await?;

    Ok(success(json!({
        "file_id": summary.dataset_id,
        "filename": summary.filename,
        "rows": summary.rows,
        "columns": summary.columns,
    })))
}

/// `POST /api/module9/remove_duplicates`
pub async fn remove_duplicates(
    State(state): State<AppState>,
    payload: Result<Json<FileRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let id = require_file_id(req.file_id.as_deref())?;

    let outcome = run_operation(&state, OperationKind::Dedup, move |p| {
        p.remove_duplicates(&id)
    })
    .await?;

    Ok(success(json!({
        "duplicates_removed": outcome.summary.duplicates_removed,
        "rows_remaining": outcome.summary.rows_after,
        "operation_id": outcome.operation_id,
        "version": outcome.version,
    })))
}

/// `POST /api/module9/fill_missing`
pub async fn fill_missing(
    State(state): State<AppState>,
    payload: Result<Json<FillRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let id = require_file_id(req.file_id.as_deref())?;
    let strategy = FillStrategy::parse(
        req.strategy.as_deref().unwrap_or("mean"),
        req.value.as_ref().map(Value::from_json),
    )?;
    debug!("fill_missing on {} with {}", id, strategy.name());

    let outcome = run_operation(&state, OperationKind::FillMissing, move |p| {
        p.fill_missing(&id, strategy)
    })
    .await?;

    Ok(success(json!({
        "message": outcome.summary.message(),
        "cells_filled": outcome.summary.cells_filled,
        "columns": outcome.summary.columns,
        "operation_id": outcome.operation_id,
        "version": outcome.version,
    })))
}

/// `POST /api/module9/normalize`
pub async fn normalize(
    State(state): State<AppState>,
    payload: Result<Json<NormalizeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let id = require_file_id(req.file_id.as_deref())?;
    let method = match req.method.as_deref() {
        Some(name) => name.parse::<NormalizeMethod>()?,
        None => NormalizeMethod::default(),
    };

    let outcome = run_operation(&state, OperationKind::Normalize, move |p| {
        p.normalize(&id, method)
    })
    .await?;

    Ok(success(json!({
        "normalized_columns": outcome.summary.normalized_columns,
        "skipped_columns": outcome.summary.skipped_columns,
        "method": outcome.summary.method,
        "operation_id": outcome.operation_id,
        "version": outcome.version,
    })))
}

/// `POST /api/module9/detect_outliers`
pub async fn detect_outliers(
    State(state): State<AppState>,
    payload: Result<Json<OutlierRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let id = require_file_id(req.file_id.as_deref())?;

    let outcome = run_operation(&state, OperationKind::DetectOutliers, move |p| {
        p.detect_outliers(&id, req.threshold)
    })
    .await?;

    Ok(success(json!({
        "outliers_detected": outcome.summary.outliers_detected,
        "total_outliers": outcome.summary.total_outliers,
        "threshold": outcome.summary.threshold,
        "operation_id": outcome.operation_id,
    })))
}

/// `GET /api/module9/progress?file_id=`
pub async fn progress(
    State(state): State<AppState>,
    query: Result<Query<FileRequest>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let id = require_file_id(query.file_id.as_deref())?;
    let dataset = state.pipeline.store().get(&id)?;
    let operations = state.pipeline.tracker().progress(&id);

    Ok(success(json!({
        "progress": {
            "file_id": id,
            "version": dataset.version,
            "rows": dataset.row_count(),
            "columns": dataset.columns,
            "operations": operations,
        }
    })))
}

/// `GET /api/module9/export?file_id=`
pub async fn export(
    State(state): State<AppState>,
    query: Result<Query<FileRequest>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let id = require_file_id(query.file_id.as_deref())?;
    let dataset = state.pipeline.store().get(&id)?;
    let stem = dataset
        .name
        .as_deref()
        .and_then(|n| Path::new(n).file_stem())
        .map(|s| s.to_string_lossy().replace('"', ""))
        .unwrap_or_else(|| "dataset".to_string());

    let importer = state.importer.clone();
    let csv = tokio::task::spawn_blocking(move || importer.export_csv(&id))
        .await
        .map_err(|e| CleaningError::Internal(format!("Export task failed: {}", e)))??;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}_cleaned.csv\"", stem),
            ),
        ],
        csv,
    )
        .into_response())
}
