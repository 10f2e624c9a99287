//! ActivityCategory entity - hierarchical activity category taxonomy
//!
//! Table: activity_category

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_category")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(255))")]
    pub name: String,

    /// Hierarchical code, e.g. `IT_PM_001` or `IT_PM_001-PLN` (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub code: String,

    /// Parent category (None for top-level categories)
    pub parent_id: Option<i64>,

    pub department_id: Option<i64>,

    /// Advisory duration in minutes
    pub standard_time: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub definition: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub reference_protocol: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub objective: Option<String>,

    /// Unix timestamps
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// Parent/child links are resolved with manual queries in `repo`

impl ActiveModelBehavior for ActiveModel {}

/// Category tree node (API response)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategoryTree {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
    #[serde(rename = "standardTime")]
    pub standard_time: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CategoryTree>,
}

impl From<Model> for CategoryTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            parent_id: model.parent_id,
            department_id: model.department_id,
            standard_time: model.standard_time,
            children: Vec::new(),
        }
    }
}

impl CategoryTree {
    /// Build a forest from a flat list. Nodes whose parent is missing from the
    /// list are promoted to roots. Siblings keep the input order.
    pub fn build(models: Vec<Model>) -> Vec<CategoryTree> {
        use std::collections::{HashMap, HashSet};

        let ids: HashSet<i64> = models.iter().map(|m| m.id).collect();
        let mut children: HashMap<i64, Vec<Model>> = HashMap::new();
        let mut roots = Vec::new();

        for model in models {
            match model.parent_id {
                Some(pid) if pid != model.id && ids.contains(&pid) => {
                    children.entry(pid).or_default().push(model)
                }
                _ => roots.push(model),
            }
        }

        fn attach(model: Model, children: &mut HashMap<i64, Vec<Model>>) -> CategoryTree {
            let kids = children.remove(&model.id).unwrap_or_default();
            let mut node = CategoryTree::from(model);
            node.children = kids.into_iter().map(|k| attach(k, children)).collect();
            node
        }

        roots
            .into_iter()
            .map(|root| attach(root, &mut children))
            .collect()
    }
}
