use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn success_with(message: impl Into<String>, data: T) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failed operation that still reports structured detail
    pub fn failure_with(message: impl Into<String>, data: T) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Config routes
        .route("/config", get(handlers::config::get_config))
        // Category routes
        .route(
            "/categories",
            get(handlers::category::get_categories).post(handlers::category::add_category),
        )
        .route("/categories/tree", get(handlers::category::get_category_tree))
        .route("/categories/preview-code", post(handlers::category::preview_code))
        .route(
            "/categories/import",
            post(handlers::import::import_file)
                .layer(DefaultBodyLimit::max(state.config.max_upload_size)),
        )
        .route("/categories/import/rows", post(handlers::import::import_rows))
        .route(
            "/categories/:id",
            get(handlers::category::get_category)
                .put(handlers::category::update_category)
                .delete(handlers::category::delete_category),
        )
        // Department routes
        .route(
            "/departments",
            get(handlers::department::get_departments).post(handlers::department::add_department),
        )
        // Work role routes
        .route(
            "/work-roles",
            get(handlers::work_role::get_work_roles).post(handlers::work_role::add_work_role),
        );

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}
