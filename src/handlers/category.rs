//! Activity category handlers
//!
//! Implements category CRUD, the category tree, and live code preview

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::{ConnectionTrait, EntityTrait, QueryOrder, TransactionError, TransactionTrait};
use serde::{Deserialize, Serialize};

use crate::codegen::CodeDeriver;
use crate::entity::activity_category::{self, CategoryTree};
use crate::error::{AppError, AppResult, CatalogError, CatalogResult, OptionExt};
use crate::repo::{self, CategoryFields};
use crate::routes::ApiResponse;
use crate::state::AppState;

const MAX_NAME_LEN: usize = 255;
const MAX_CODE_LEN: usize = 64;

/// Create / update category request
#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    /// Derived when omitted on create; kept when omitted on update
    pub code: Option<String>,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
    #[serde(rename = "standardTime")]
    pub standard_time: Option<i32>,
    pub description: Option<String>,
    pub definition: Option<String>,
    #[serde(rename = "referenceProtocol")]
    pub reference_protocol: Option<String>,
    pub objective: Option<String>,
    /// Replaces the role set when present
    #[serde(rename = "roleIds")]
    pub role_ids: Option<Vec<i64>>,
}

/// Category response
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
    #[serde(rename = "standardTime")]
    pub standard_time: Option<i32>,
    pub description: Option<String>,
    pub definition: Option<String>,
    #[serde(rename = "referenceProtocol")]
    pub reference_protocol: Option<String>,
    pub objective: Option<String>,
    #[serde(rename = "roleIds", skip_serializing_if = "Option::is_none")]
    pub role_ids: Option<Vec<i64>>,
}

impl From<activity_category::Model> for CategoryResponse {
    fn from(m: activity_category::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            code: m.code,
            parent_id: m.parent_id,
            department_id: m.department_id,
            standard_time: m.standard_time,
            description: m.description,
            definition: m.definition,
            reference_protocol: m.reference_protocol,
            objective: m.objective,
            role_ids: None,
        }
    }
}

impl CategoryResponse {
    fn with_roles(mut self, role_ids: Vec<i64>) -> Self {
        self.role_ids = Some(role_ids);
        self
    }
}

/// Code preview request
#[derive(Debug, Deserialize)]
pub struct PreviewCodeRequest {
    pub name: String,
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
}

/// Code preview response: `{"code": ...}` or `{"error": ...}`
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PreviewCodeResponse {
    Code { code: String },
    Error { error: String },
}

/// Derive the code a new category would get, without writing anything
pub async fn derive_preview<C: ConnectionTrait>(
    db: &C,
    deriver: &CodeDeriver,
    name: &str,
    department_id: Option<i64>,
    parent_id: Option<i64>,
) -> CatalogResult<String> {
    let department = match department_id {
        Some(id) => Some(
            repo::find_department(db, id)
                .await?
                .ok_or_else(|| CatalogError::Reference(format!("department {} not found", id)))?,
        ),
        None => None,
    };
    let parent = match parent_id {
        Some(id) => Some(
            repo::find_category(db, id)
                .await?
                .ok_or_else(|| CatalogError::Reference(format!("parent category {} not found", id)))?,
        ),
        None => None,
    };

    let existing = repo::list_all_category_codes(db).await?;
    deriver.derive(name, department.as_ref(), parent.as_ref(), &existing)
}

/// POST /api/categories/preview-code
pub async fn preview_code(
    State(state): State<AppState>,
    Json(req): Json<PreviewCodeRequest>,
) -> Json<PreviewCodeResponse> {
    match derive_preview(&state.db, &state.deriver, &req.name, req.department_id, req.parent_id).await {
        Ok(code) => Json(PreviewCodeResponse::Code { code }),
        Err(CatalogError::Storage(e)) => {
            tracing::error!("Code preview failed: {}", e);
            Json(PreviewCodeResponse::Error {
                error: "internal error".to_string(),
            })
        }
        Err(e) => Json(PreviewCodeResponse::Error {
            error: e.to_string(),
        }),
    }
}

/// GET /api/categories
pub async fn get_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<CategoryResponse>>>> {
    let categories = activity_category::Entity::find()
        .order_by_asc(activity_category::Column::Code)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(
        categories.into_iter().map(CategoryResponse::from).collect(),
    )))
}

/// GET /api/categories/tree
pub async fn get_category_tree(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<CategoryTree>>>> {
    let categories = activity_category::Entity::find()
        .order_by_asc(activity_category::Column::Code)
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::success(CategoryTree::build(categories))))
}

/// GET /api/categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    let category = repo::find_category(&state.db, id)
        .await?
        .ok_or_not_found(format!("category {}", id))?;
    let role_ids = repo::roles_for_category(&state.db, id).await?;

    Ok(Json(ApiResponse::success(
        CategoryResponse::from(category).with_roles(role_ids),
    )))
}

fn validate_request(req: &CategoryRequest) -> AppResult<()> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("category name must not be blank".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "category name must not exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    if let Some(code) = req.code.as_deref().map(str::trim) {
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(AppError::Validation(format!(
                "category code must be 1 to {} characters",
                MAX_CODE_LEN
            )));
        }
    }
    if matches!(req.standard_time, Some(minutes) if minutes <= 0) {
        return Err(AppError::Validation(
            "standard time must be a positive number of minutes".to_string(),
        ));
    }
    Ok(())
}

/// Check that referenced parent, department, and roles exist
async fn check_references<C: ConnectionTrait>(
    db: &C,
    req: &CategoryRequest,
) -> AppResult<Option<activity_category::Model>> {
    let parent = match req.parent_id {
        Some(pid) => Some(
            repo::find_category(db, pid)
                .await?
                .ok_or_else(|| CatalogError::Reference(format!("parent category {} not found", pid)))?,
        ),
        None => None,
    };

    if let Some(did) = req.department_id {
        if repo::find_department(db, did).await?.is_none() {
            return Err(CatalogError::Reference(format!("department {} not found", did)).into());
        }
    }

    for role_id in req.role_ids.iter().flatten() {
        if crate::entity::work_role::Entity::find_by_id(*role_id)
            .one(db)
            .await?
            .is_none()
        {
            return Err(CatalogError::Reference(format!("work role {} not found", role_id)).into());
        }
    }

    Ok(parent)
}

fn fields_from(req: &CategoryRequest, code: String) -> CategoryFields {
    CategoryFields {
        name: req.name.trim().to_string(),
        code,
        parent_id: req.parent_id,
        department_id: req.department_id,
        standard_time: req.standard_time,
        description: req.description.clone(),
        definition: req.definition.clone(),
        reference_protocol: req.reference_protocol.clone(),
        objective: req.objective.clone(),
    }
}

/// POST /api/categories
pub async fn add_category(
    State(state): State<AppState>,
    Json(req): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    validate_request(&req)?;

    let txn = state.db.begin().await?;
    let parent = check_references(&txn, &req).await?;

    let code = match req.code.as_deref().map(str::trim) {
        Some(code) => {
            if repo::find_category_by_code(&txn, code).await?.is_some() {
                return Err(CatalogError::DuplicateCode(format!(
                    "category code '{}' already exists",
                    code
                ))
                .into());
            }
            code.to_string()
        }
        None => {
            let department = match req.department_id {
                Some(did) => repo::find_department(&txn, did).await?,
                None => None,
            };
            let existing = repo::list_all_category_codes(&txn).await?;
            state
                .deriver
                .derive(&req.name, department.as_ref(), parent.as_ref(), &existing)?
        }
    };

    let category = repo::create_category(&txn, fields_from(&req, code))
        .await
        .map_err(CatalogError::from)?;
    let role_ids = req.role_ids.clone().unwrap_or_default();
    repo::set_category_roles(&txn, category.id, &role_ids).await?;
    txn.commit().await.map_err(CatalogError::from)?;

    tracing::info!("Created category {} ({})", category.code, category.id);
    Ok(Json(ApiResponse::success(
        CategoryResponse::from(category).with_roles(role_ids),
    )))
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    validate_request(&req)?;

    let txn = state.db.begin().await?;
    let existing = repo::find_category(&txn, id)
        .await?
        .ok_or_not_found(format!("category {}", id))?;
    check_references(&txn, &req).await?;

    if let Some(pid) = req.parent_id {
        if repo::would_create_cycle(&txn, id, pid).await? {
            return Err(CatalogError::Reference(format!(
                "category {} cannot be placed under itself or its descendant {}",
                id, pid
            ))
            .into());
        }
    }

    let code = match req.code.as_deref().map(str::trim) {
        Some(code) if code != existing.code => {
            if repo::find_category_by_code(&txn, code).await?.is_some() {
                return Err(CatalogError::DuplicateCode(format!(
                    "category code '{}' already exists",
                    code
                ))
                .into());
            }
            code.to_string()
        }
        _ => existing.code.clone(),
    };

    let category = repo::update_category(&txn, id, fields_from(&req, code))
        .await
        .map_err(CatalogError::from)?;
    if let Some(role_ids) = &req.role_ids {
        repo::set_category_roles(&txn, id, role_ids).await?;
    }
    let role_ids = repo::roles_for_category(&txn, id).await?;
    txn.commit().await.map_err(CatalogError::from)?;

    tracing::info!("Updated category {} ({})", category.code, category.id);
    Ok(Json(ApiResponse::success(
        CategoryResponse::from(category).with_roles(role_ids),
    )))
}

/// DELETE /api/categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    let category = repo::find_category(&state.db, id)
        .await?
        .ok_or_not_found(format!("category {}", id))?;

    let code = category.code.clone();
    state
        .db
        .transaction::<_, (), AppError>(|txn| {
            Box::pin(async move {
                if repo::has_children(txn, id).await? {
                    return Err(AppError::Conflict(format!(
                        "category {} has child categories; reassign or delete them first",
                        code
                    )));
                }
                repo::delete_category(txn, id).await?;
                Ok(())
            })
        })
        .await
        .map_err(|e| match e {
            TransactionError::Connection(err) => AppError::Database(err),
            TransactionError::Transaction(err) => err,
        })?;

    tracing::info!("Deleted category {} ({})", category.code, id);
    Ok(Json(ApiResponse::success_msg("success")))
}
