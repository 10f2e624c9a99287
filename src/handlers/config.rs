//! Configuration handlers
//!
//! Returns public configuration settings to the frontend

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// Public configuration response
#[derive(Debug, Serialize)]
pub struct PublicConfig {
    /// Maximum import upload size in bytes
    #[serde(rename = "maxUploadSize")]
    pub max_upload_size: usize,
    /// Maximum number of rows per import
    #[serde(rename = "maxImportRows")]
    pub max_import_rows: usize,
    /// Department token used for categories without a department
    #[serde(rename = "genericToken")]
    pub generic_token: String,
}

/// GET /api/config
/// Returns public configuration settings
pub async fn get_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig {
        max_upload_size: state.config.max_upload_size,
        max_import_rows: state.config.import.max_rows,
        generic_token: state.deriver.department_token(None),
    })
}
