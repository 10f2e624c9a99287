//! Hierarchical code derivation

use std::collections::HashSet;

use crate::entity::{activity_category, department};
use crate::error::{CatalogError, CatalogResult};

use super::rules::KeywordRules;

/// Token used for categories without a department
pub const DEFAULT_GENERIC_TOKEN: &str = "GEN";

/// Derives category codes from a rule table and a generic department token
#[derive(Clone, Debug)]
pub struct CodeDeriver {
    rules: KeywordRules,
    generic_token: String,
}

impl Default for CodeDeriver {
    fn default() -> Self {
        Self::new(KeywordRules::default(), DEFAULT_GENERIC_TOKEN)
    }
}

impl CodeDeriver {
    pub fn new(rules: KeywordRules, generic_token: impl Into<String>) -> Self {
        let token = normalize_token(&generic_token.into());
        Self {
            rules,
            generic_token: if token.is_empty() {
                DEFAULT_GENERIC_TOKEN.to_string()
            } else {
                token
            },
        }
    }

    pub fn rules(&self) -> &KeywordRules {
        &self.rules
    }

    /// Compute a code for a category that is unique within `existing`.
    ///
    /// Top-level categories get `{DEPT}_{SUBJECT}_{NNN}` with the smallest
    /// free sequence number; children get `{parent.code}-{SUBJECT}`, with a
    /// `-2`, `-3`, ... suffix when that is already taken.
    pub fn derive(
        &self,
        name: &str,
        department: Option<&department::Model>,
        parent: Option<&activity_category::Model>,
        existing: &HashSet<String>,
    ) -> CatalogResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput(
                "category name must not be blank".to_string(),
            ));
        }

        let subject = self.rules.subject_token(name);

        let code = match parent {
            Some(parent) => child_code(&parent.code, &subject, existing),
            None => {
                let prefix = format!("{}_{}", self.department_token(department), subject);
                top_level_code(&prefix, existing)
            }
        };

        Ok(code)
    }

    /// Department prefix: its short name, else the first letters of its
    /// name, else the generic token.
    pub fn department_token(&self, department: Option<&department::Model>) -> String {
        let Some(dept) = department else {
            return self.generic_token.clone();
        };

        let short = normalize_token(&dept.short_name);
        if !short.is_empty() {
            return short;
        }

        let from_name: String = dept
            .name
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(3)
            .collect::<String>()
            .to_ascii_uppercase();

        if from_name.is_empty() {
            self.generic_token.clone()
        } else {
            from_name
        }
    }
}

/// Uppercased ASCII alphanumerics only, so tokens never contain the `_` or `-`
/// separators.
fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn top_level_code(prefix: &str, existing: &HashSet<String>) -> String {
    (1u32..)
        .map(|seq| format!("{}_{:03}", prefix, seq))
        .find(|code| !existing.contains(code))
        .unwrap_or_else(|| format!("{}_{:03}", prefix, existing.len() + 1))
}

fn child_code(parent_code: &str, subject: &str, existing: &HashSet<String>) -> String {
    let base = format!("{}-{}", parent_code, subject);
    if !existing.contains(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|code| !existing.contains(code))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::KeywordRule;

    fn dept(name: &str, short_name: &str) -> department::Model {
        department::Model {
            id: 1,
            name: name.to_string(),
            short_name: short_name.to_string(),
            slug: department::slugify(name),
        }
    }

    fn category(code: &str) -> activity_category::Model {
        activity_category::Model {
            id: 10,
            name: "Project Management".to_string(),
            code: code.to_string(),
            parent_id: None,
            department_id: Some(1),
            standard_time: None,
            description: None,
            definition: None,
            reference_protocol: None,
            objective: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn codes(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn derivation_is_deterministic() {
        let deriver = CodeDeriver::default();
        let it = dept("Information Technology", "it");
        let existing = codes(&["IT_PM_001", "GEN_QA_001"]);

        let first = deriver.derive("Project Management", Some(&it), None, &existing).unwrap();
        let second = deriver.derive("Project Management", Some(&it), None, &existing).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn top_level_code_uses_next_free_sequence() {
        let deriver = CodeDeriver::default();
        let it = dept("Information Technology", "IT");

        let fresh = deriver.derive("Project Management", Some(&it), None, &HashSet::new());
        assert_eq!(fresh.unwrap(), "IT_PM_001");

        let taken = codes(&["IT_PM_001"]);
        let next = deriver.derive("Project Management", Some(&it), None, &taken);
        assert_eq!(next.unwrap(), "IT_PM_002");
    }

    #[test]
    fn sequence_fills_the_smallest_gap() {
        let deriver = CodeDeriver::default();
        let it = dept("Information Technology", "IT");
        let taken = codes(&["IT_PM_001", "IT_PM_003"]);

        let code = deriver.derive("Project review", Some(&it), None, &taken).unwrap();
        assert_eq!(code, "IT_PM_002");
    }

    #[test]
    fn child_code_appends_subject_to_parent_code() {
        let deriver = CodeDeriver::default();
        let parent = category("IT_PM_001");

        let code = deriver.derive("Planning", None, Some(&parent), &HashSet::new()).unwrap();
        assert_eq!(code, "IT_PM_001-PLN");
    }

    #[test]
    fn child_code_collisions_get_numeric_suffix() {
        let deriver = CodeDeriver::default();
        let parent = category("IT_PM_001");
        let taken = codes(&["IT_PM_001-PLN", "IT_PM_001-PLN-2"]);

        let code = deriver.derive("Sprint planning", None, Some(&parent), &taken).unwrap();
        assert_eq!(code, "IT_PM_001-PLN-3");
    }

    #[test]
    fn missing_department_uses_generic_token() {
        let deriver = CodeDeriver::default();
        let code = deriver.derive("Quality audit", None, None, &HashSet::new()).unwrap();
        assert_eq!(code, "GEN_QA_001");

        let custom = CodeDeriver::new(KeywordRules::default(), "misc");
        let code = custom.derive("Quality audit", None, None, &HashSet::new()).unwrap();
        assert_eq!(code, "MISC_QA_001");
    }

    #[test]
    fn blank_short_name_falls_back_to_department_name() {
        let deriver = CodeDeriver::default();
        let finance = dept("Finance", "  ");
        let code = deriver.derive("Budget review", Some(&finance), None, &HashSet::new());
        assert_eq!(code.unwrap(), "FIN_REV_001");
    }

    #[test]
    fn unmatched_names_use_fallback_subject() {
        let deriver = CodeDeriver::default();
        let code = deriver.derive("Operations", None, None, &HashSet::new()).unwrap();
        assert_eq!(code, "GEN_OPR_001");
    }

    #[test]
    fn configured_rules_are_applied() {
        let rules = KeywordRules::new(vec![KeywordRule::new("onboard", "ONB")]);
        let deriver = CodeDeriver::new(rules, "GEN");
        let code = deriver.derive("Employee onboarding", None, None, &HashSet::new());
        assert_eq!(code.unwrap(), "GEN_ONB_001");
    }

    #[test]
    fn blank_name_is_invalid_input() {
        let deriver = CodeDeriver::default();
        let err = deriver.derive("   ", None, None, &HashSet::new()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }
}
