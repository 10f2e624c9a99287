//! Work role handlers

use axum::{extract::State, response::Json};
use sea_orm::{EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::entity::work_role;
use crate::error::{AppError, AppResult};
use crate::repo;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// Add work role request
#[derive(Debug, Deserialize)]
pub struct AddWorkRoleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "isActive", default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Work role response
#[derive(Debug, Serialize)]
pub struct WorkRoleResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

impl From<work_role::Model> for WorkRoleResponse {
    fn from(m: work_role::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            is_active: m.is_active,
        }
    }
}

/// POST /api/work-roles
pub async fn add_work_role(
    State(state): State<AppState>,
    Json(req): Json<AddWorkRoleRequest>,
) -> AppResult<Json<ApiResponse<WorkRoleResponse>>> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("work role name must not be blank".to_string()));
    }
    if name.chars().count() > 128 {
        return Err(AppError::Validation(
            "work role name must not exceed 128 characters".to_string(),
        ));
    }

    if repo::find_work_role_by_name(&state.db, name).await?.is_some() {
        return Err(AppError::Conflict(format!("work role '{}' already exists", name)));
    }

    let role = repo::create_work_role(&state.db, name, &req.description, req.is_active).await?;

    tracing::info!("Created work role {} ({})", role.name, role.id);
    Ok(Json(ApiResponse::success(WorkRoleResponse::from(role))))
}

/// GET /api/work-roles
pub async fn get_work_roles(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<WorkRoleResponse>>>> {
    let roles = work_role::Entity::find()
        .order_by_asc(work_role::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(
        roles.into_iter().map(WorkRoleResponse::from).collect(),
    )))
}
