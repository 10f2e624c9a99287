//! Entity module - SeaORM entity definitions
//!
//! One module per table

pub mod activity_category;
pub mod category_work_role;
pub mod department;
pub mod work_role;
