//! Category code generation
//!
//! Derives short hierarchical codes such as `IT_PM_001` (top level) and
//! `IT_PM_001-PLN` (child) from a category name, its department, and its
//! parent. Everything here is pure: callers pass the set of codes already in
//! use and persist the result themselves.

pub mod deriver;
pub mod rules;

pub use deriver::CodeDeriver;
pub use rules::{KeywordRule, KeywordRules};
