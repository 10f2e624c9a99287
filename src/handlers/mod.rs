//! Request handlers module

pub mod category;
pub mod config;
pub mod department;
pub mod import;
pub mod work_role;
