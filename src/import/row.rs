//! Import rows: CSV parsing and per-row validation

use std::io::Read;

use serde::Deserialize;

use crate::error::{CatalogError, CatalogResult};

use super::RowFailure;

/// Column that must be present in every import file
pub const REQUIRED_COLUMN: &str = "category_name";

// Column widths of the target tables
const MAX_NAME_LEN: usize = 255;
const MAX_CODE_LEN: usize = 64;
const MAX_LOOKUP_NAME_LEN: usize = 128;

/// One data row as read from the file. Columns are matched by header name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub category_name: Option<String>,
    pub category_code: Option<String>,
    pub category_description: Option<String>,
    pub standard_time: Option<String>,
    pub parent_category_code: Option<String>,
    pub role_names: Option<String>,
    pub department_name: Option<String>,
}

impl RawRow {
    pub fn named(name: &str) -> Self {
        Self {
            category_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Check required fields and normalise the row
    pub fn validate(&self) -> CatalogResult<ImportRow> {
        let name = non_blank(&self.category_name).ok_or_else(|| {
            CatalogError::Validation("category_name is required".to_string())
        })?;

        check_len("category_name", &name, MAX_NAME_LEN)?;

        let standard_time = match non_blank(&self.standard_time) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(minutes) if minutes > 0 => Some(minutes),
                _ => {
                    return Err(CatalogError::Validation(format!(
                        "standard_time must be a positive whole number of minutes, got '{}'",
                        raw
                    )))
                }
            },
        };

        let code = non_blank(&self.category_code);
        if let Some(code) = &code {
            check_len("category_code", code, MAX_CODE_LEN)?;
        }
        let department_name = non_blank(&self.department_name);
        if let Some(dept) = &department_name {
            check_len("department_name", dept, MAX_LOOKUP_NAME_LEN)?;
        }
        let role_names = split_role_names(self.role_names.as_deref().unwrap_or_default());
        for role in &role_names {
            check_len("role_names", role, MAX_LOOKUP_NAME_LEN)?;
        }

        Ok(ImportRow {
            name,
            code,
            description: non_blank(&self.category_description),
            standard_time,
            parent_code: non_blank(&self.parent_category_code),
            role_names,
            department_name,
        })
    }
}

/// A validated row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRow {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub standard_time: Option<i32>,
    pub parent_code: Option<String>,
    pub role_names: Vec<String>,
    pub department_name: Option<String>,
}

fn check_len(column: &str, value: &str, max: usize) -> CatalogResult<()> {
    if value.chars().count() > max {
        return Err(CatalogError::Validation(format!(
            "{} must not exceed {} characters",
            column, max
        )));
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Split a comma-separated role list, trimming names and dropping blanks and
/// case-insensitive repeats.
pub fn split_role_names(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// A CSV file that could not be turned into rows
#[derive(Debug)]
pub enum CsvError {
    /// Header row unreadable or without the required column
    Header(CatalogError),
    /// A data record could not be decoded
    Row(RowFailure),
}

/// Parse CSV with a header row. Column order does not matter; unknown columns
/// are ignored.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<RawRow>, CsvError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| {
            CsvError::Header(CatalogError::Validation(format!("unreadable header row: {}", e)))
        })?
        .clone();

    if !headers
        .iter()
        .any(|h| h.trim_start_matches('\u{feff}') == REQUIRED_COLUMN)
    {
        return Err(CsvError::Header(CatalogError::Validation(format!(
            "missing required column '{}'",
            REQUIRED_COLUMN
        ))));
    }

    // Byte-order marks from spreadsheet exports would otherwise hide the first column
    let cleaned: csv::StringRecord = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();
    csv_reader.set_headers(cleaned);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        let row = record.map_err(|e| {
            CsvError::Row(RowFailure::new(
                index,
                CatalogError::Validation(format!("malformed record: {}", e)),
            ))
        })?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn columns_are_matched_by_header_name() {
        let data = "\
department_name,category_code,category_name,role_names
Information Technology,,Project Management,\"Engineer, Manager\"
,GEN_QA_001,Quality audit,
";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category_name.as_deref(), Some("Project Management"));
        assert_eq!(rows[0].department_name.as_deref(), Some("Information Technology"));
        assert_eq!(rows[1].category_code.as_deref(), Some("GEN_QA_001"));

        let valid = rows[0].validate().unwrap();
        assert_eq!(valid.code, None);
        assert_eq!(valid.role_names, vec!["Engineer", "Manager"]);
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let data = "category_code,department_name\nX,IT\n";
        let err = parse_csv(data.as_bytes()).unwrap_err();
        assert!(matches!(err, CsvError::Header(CatalogError::Validation(_))));
    }

    #[test]
    fn undecodable_record_is_a_row_failure() {
        let data = b"category_name,category_code
Planning,PLN
\xFF\xFE,BAD
";
        match parse_csv(&data[..]) {
            Err(CsvError::Row(failure)) => {
                assert_eq!(failure.row, 1);
                assert_eq!(failure.reason, ErrorKind::ValidationError);
            }
            other => panic!("expected row failure, got {:?}", other),
        }
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let data = "\u{feff}category_name,standard_time\nPlanning,30\n";
        let rows = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(rows[0].validate().unwrap().standard_time, Some(30));
    }

    #[test]
    fn blank_name_fails_validation() {
        let row = RawRow::named("   ");
        assert!(matches!(row.validate(), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn standard_time_must_be_positive() {
        for bad in ["0", "-5", "ten", "1.5"] {
            let row = RawRow {
                standard_time: Some(bad.to_string()),
                ..RawRow::named("Planning")
            };
            assert!(row.validate().is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn overlong_code_fails_validation() {
        let row = RawRow {
            category_code: Some("X".repeat(65)),
            ..RawRow::named("Planning")
        };
        assert!(matches!(row.validate(), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn role_names_are_trimmed_and_deduplicated() {
        assert_eq!(
            split_role_names(" Engineer ,engineer,, Analyst"),
            vec!["Engineer", "Analyst"]
        );
        assert!(split_role_names("").is_empty());
    }
}
