//! WorkRole entity - work roles assigned to activity categories
//!
//! Table: work_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Role name, matched case-insensitively on import
    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub is_active: bool,

    /// Unix timestamp
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
