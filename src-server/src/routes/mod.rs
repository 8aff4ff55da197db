//! HTTP handlers, grouped the way the API paths are.
//!
//! - **cleaning**: `/api/module9/*` (import, the four cleaning operations,
//!   progress, export)
//! - **imports**: `/api/data/*` (uploads, scheduled imports, import stats)
//! - **database**: store connectivity and `/health`

pub mod cleaning;
pub mod database;
pub mod imports;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use scrub_processing::DatasetId;

use crate::response::{ApiError, ApiResult};

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

/// Turn an optional `file_id` into a dataset id, rejecting blanks.
pub(crate) fn require_file_id(file_id: Option<&str>) -> ApiResult<DatasetId> {
    match file_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(DatasetId::from(id)),
        _ => Err(ApiError::bad_request("File ID is required.")),
    }
}

/// An uploaded file pulled out of a multipart body.
#[derive(Debug)]
pub(crate) struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Read the `file` part of a multipart body.
pub(crate) async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Upload> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().trim().to_string();
        if filename.is_empty() {
            return Err(ApiError::bad_request("No file selected."));
        }
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(Upload {
            filename,
            content: content.to_vec(),
        });
    }
    Err(ApiError::bad_request("No file provided."))
}
