//! Department handlers
//!
//! Implements department listing and creation

use axum::{extract::State, response::Json};
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entity::department;
use crate::error::{AppError, AppResult};
use crate::repo;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Add department request
#[derive(Debug, Deserialize)]
pub struct AddDepartmentRequest {
    pub name: String,
    /// Derived from the name when omitted
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    pub slug: Option<String>,
}

/// Department response
#[derive(Debug, Serialize)]
pub struct DepartmentResponse {
    pub id: i64,
    pub name: String,
    #[serde(rename = "shortName")]
    pub short_name: String,
    pub slug: String,
}

impl From<department::Model> for DepartmentResponse {
    fn from(m: department::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            short_name: m.short_name,
            slug: m.slug,
        }
    }
}

/// POST /api/departments
pub async fn add_department(
    State(state): State<AppState>,
    Json(req): Json<AddDepartmentRequest>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("department name must not be blank".to_string()));
    }
    if name.chars().count() > 128 {
        return Err(AppError::Validation(
            "department name must not exceed 128 characters".to_string(),
        ));
    }
    if let Some(short) = req.short_name.as_deref() {
        if short.trim().chars().count() > 16 {
            return Err(AppError::Validation(
                "department short name must not exceed 16 characters".to_string(),
            ));
        }
    }

    if repo::find_department_by_name(&state.db, name).await?.is_some() {
        return Err(AppError::Conflict(format!("department '{}' already exists", name)));
    }

    let dept = repo::create_department(
        &state.db,
        name,
        req.short_name.as_deref(),
        req.slug.as_deref(),
    )
    .await?;

    tracing::info!("Created department {} ({})", dept.name, dept.id);
    Ok(Json(ApiResponse::success(DepartmentResponse::from(dept))))
}

/// GET /api/departments
pub async fn get_departments(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentResponse>>>> {
    let depts = department::Entity::find()
        .order_by_asc(department::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(
        depts.into_iter().map(DepartmentResponse::from).collect(),
    )))
}
