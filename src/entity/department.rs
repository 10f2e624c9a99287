//! Department entity - departments owning activity categories
//!
//! Table: department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Department name, matched case-insensitively on import
    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    /// Prefix token used when deriving category codes
    #[sea_orm(column_type = "String(Some(16))")]
    pub short_name: String,

    #[sea_orm(column_type = "String(Some(128))")]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Short name derived from a department name: the initials of its
/// significant words, or the first three letters of a single-word name.
pub fn derive_short_name(name: &str) -> String {
    const STOP_WORDS: [&str; 6] = ["and", "of", "the", "for", "de", "to"];

    let words: Vec<String> = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .filter(|w| !STOP_WORDS.contains(&w.to_ascii_lowercase().as_str()))
        .map(|w| w.to_ascii_uppercase())
        .collect();

    match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(3).collect(),
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .take(4)
            .collect(),
    }
}

/// URL-friendly slug: lowercase ASCII alphanumeric runs joined by `-`.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
