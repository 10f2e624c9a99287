//! Category import handlers
//!
//! Accepts a CSV upload (multipart field `file`) or the rows as JSON and runs
//! them through the import reconciler as one batch.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};

use crate::error::{AppError, AppResult};
use crate::import::{self, CsvError, ImportResult, RawRow};
use crate::routes::ApiResponse;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// POST /api/categories/import
pub async fn import_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<ImportResult>>)> {
    let mut content = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("failed to read upload: {}", e)))?;
            content = Some(bytes);
            break;
        }
    }

    let Some(content) = content else {
        return Err(AppError::BadRequest(format!("missing '{}' field", FILE_FIELD)));
    };

    let rows = match import::parse_csv(content.as_ref()) {
        Ok(rows) => rows,
        Err(CsvError::Header(err)) => return Err(err.into()),
        Err(CsvError::Row(failure)) => {
            tracing::warn!("Rejected CSV upload at {}", failure.describe());
            return Ok(respond(ImportResult::Failure(failure)));
        }
    };
    run_import(&state, rows).await
}

/// POST /api/categories/import/rows
pub async fn import_rows(
    State(state): State<AppState>,
    Json(rows): Json<Vec<RawRow>>,
) -> AppResult<(StatusCode, Json<ApiResponse<ImportResult>>)> {
    run_import(&state, rows).await
}

async fn run_import(
    state: &AppState,
    rows: Vec<RawRow>,
) -> AppResult<(StatusCode, Json<ApiResponse<ImportResult>>)> {
    let max_rows = state.config.import.max_rows;
    if rows.len() > max_rows {
        return Err(AppError::BadRequest(format!(
            "import has {} rows, the limit is {}",
            rows.len(),
            max_rows
        )));
    }

    let total = rows.len();
    let result = import::import_batch(&state.db, &state.deriver, &rows).await;

    match &result {
        ImportResult::Success { created, updated } => tracing::info!(
            "Imported {} rows: {} categories created, {} updated",
            total,
            created,
            updated
        ),
        ImportResult::Failure(failure) => {
            tracing::warn!("Import of {} rows rolled back at {}", total, failure.describe())
        }
    }

    Ok(respond(result))
}

/// 200 with the counts on success, 422 with the failing row otherwise
fn respond(result: ImportResult) -> (StatusCode, Json<ApiResponse<ImportResult>>) {
    let (status, response) = match &result {
        ImportResult::Success { created, updated } => {
            let message = format!("{} categories created, {} updated", created, updated);
            (StatusCode::OK, ApiResponse::success_with(message, result.clone()))
        }
        ImportResult::Failure(failure) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiResponse::failure_with(failure.describe(), result.clone()),
        ),
    };
    (status, Json(response))
}
