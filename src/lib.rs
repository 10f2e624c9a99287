//! Activity Catalog - hierarchical activity categories for activity tracking
//!
//! This crate provides category code derivation, transactional bulk import of
//! categories with their departments and work roles, and the JSON API that
//! exposes them.

pub mod codegen;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod import;
pub mod repo;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use codegen::CodeDeriver;
pub use config::Config;
pub use import::{import_batch, ImportResult};
pub use state::AppState;
