//! Bulk category import
//!
//! Tabular rows (CSV) are parsed into [`RawRow`]s and reconciled against the
//! store by [`import_batch`], which either commits every row or none.

pub mod reconciler;
pub mod row;

use serde::Serialize;

use crate::error::{CatalogError, ErrorKind};

pub use reconciler::import_batch;
pub use row::{parse_csv, CsvError, ImportRow, RawRow};

/// First failing row of an aborted import
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 0-based data-row index (header excluded)
    pub row: usize,
    pub reason: ErrorKind,
    pub message: String,
}

impl RowFailure {
    pub fn new(row: usize, err: CatalogError) -> Self {
        Self {
            row,
            reason: err.kind(),
            message: err.to_string(),
        }
    }

    /// Message for display, with a 1-based row number
    pub fn describe(&self) -> String {
        format!("row {}: {:?}: {}", self.row + 1, self.reason, self.message)
    }
}

/// Outcome of one import batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImportResult {
    Success { created: usize, updated: usize },
    Failure(RowFailure),
}

impl ImportResult {
    pub fn failure(row: usize, err: CatalogError) -> Self {
        ImportResult::Failure(RowFailure::new(row, err))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ImportResult::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serializes_with_status_tag() {
        let result = ImportResult::failure(4, CatalogError::Validation("category_name is required".into()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["row"], 4);
        assert_eq!(json["reason"], "ValidationError");
    }

    #[test]
    fn failure_description_uses_one_based_rows() {
        let failure = RowFailure::new(0, CatalogError::Reference("unknown parent category code 'X'".into()));
        assert_eq!(
            failure.describe(),
            "row 1: ReferenceError: unknown parent category code 'X'"
        );
    }
}
