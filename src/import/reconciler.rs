//! Batch import reconciliation
//!
//! The whole batch runs inside one transaction. Rows are processed in two
//! passes: pass 1 handles every row whose parent (if any) already exists and
//! queues the rest; pass 2 retries the queue once, so a child may appear
//! before its parent in the file. Any failure rolls back everything written
//! by the batch. Explicit codes are reserved before pass 1, so a derived code
//! never takes a code another row of the file asks for.
//!
//! A row moves Pending -> `ResolvedRow` (department and parent known) ->
//! `CodedRow` (code assigned) -> persisted; an error at any step fails the
//! batch.

use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait};

use crate::codegen::CodeDeriver;
use crate::entity::{activity_category, department};
use crate::error::{CatalogError, CatalogResult};
use crate::repo::{self, CategoryFields};

use super::row::{ImportRow, RawRow};
use super::{ImportResult, RowFailure};

/// Row whose department and parent are resolved
struct ResolvedRow<'r> {
    row: &'r ImportRow,
    department: Option<department::Model>,
    parent: Option<activity_category::Model>,
}

/// Row with its final code and the category it will overwrite, if any
struct CodedRow<'r> {
    resolved: ResolvedRow<'r>,
    code: String,
    existing: Option<activity_category::Model>,
}

/// Running state of one batch
struct Batch<'a> {
    deriver: &'a CodeDeriver,
    /// Store codes, explicit codes of the batch and every code assigned so far
    codes: HashSet<String>,
    /// Codes written by earlier rows of this batch
    written: HashSet<String>,
    /// Ids of categories created or updated by this batch
    touched: HashSet<i64>,
    created: usize,
    updated: usize,
}

enum Outcome {
    Persisted,
    /// Parent not found yet; retry in pass 2
    Deferred,
}

/// Import `rows` atomically.
///
/// Rows are validated up front; the first invalid row fails the batch before
/// anything is written. Row indices in failures are 0-based data-row indices.
pub async fn import_batch<D>(db: &D, deriver: &CodeDeriver, rows: &[RawRow]) -> ImportResult
where
    D: TransactionTrait,
{
    let mut validated = Vec::with_capacity(rows.len());
    for (index, raw) in rows.iter().enumerate() {
        match raw.validate() {
            Ok(row) => validated.push(row),
            Err(err) => return ImportResult::failure(index, err),
        }
    }

    if validated.is_empty() {
        return ImportResult::Success {
            created: 0,
            updated: 0,
        };
    }

    let txn = match db.begin().await {
        Ok(txn) => txn,
        Err(err) => return ImportResult::failure(0, CatalogError::from(err)),
    };

    match run(&txn, deriver, &validated).await {
        Ok((created, updated)) => match txn.commit().await {
            Ok(()) => ImportResult::Success { created, updated },
            Err(err) => ImportResult::failure(validated.len() - 1, CatalogError::from(err)),
        },
        Err(failure) => {
            // the row failure is what gets reported, not a rollback error
            let _ = txn.rollback().await;
            ImportResult::Failure(failure)
        }
    }
}

async fn run(
    txn: &DatabaseTransaction,
    deriver: &CodeDeriver,
    rows: &[ImportRow],
) -> Result<(usize, usize), RowFailure> {
    let mut codes = repo::list_all_category_codes(txn)
        .await
        .map_err(|e| RowFailure::new(0, CatalogError::from(e)))?;

    reserve_explicit_codes(rows, &mut codes)?;

    let batch = Batch {
        deriver,
        codes,
        written: HashSet::new(),
        touched: HashSet::new(),
        created: 0,
        updated: 0,
    };

    reconcile(txn, batch, rows).await
}

/// Add every explicit code of the batch to `codes` so derived codes never
/// take one. A code given by two rows fails at the second of them.
fn reserve_explicit_codes(rows: &[ImportRow], codes: &mut HashSet<String>) -> Result<(), RowFailure> {
    let mut seen = HashSet::new();
    for (index, row) in rows.iter().enumerate() {
        if let Some(code) = &row.code {
            if !seen.insert(code.as_str()) {
                return Err(RowFailure::new(
                    index,
                    CatalogError::DuplicateCode(format!(
                        "category code '{}' appears more than once in this import",
                        code
                    )),
                ));
            }
            codes.insert(code.clone());
        }
    }
    Ok(())
}

async fn reconcile(
    txn: &DatabaseTransaction,
    mut batch: Batch<'_>,
    rows: &[ImportRow],
) -> Result<(usize, usize), RowFailure> {
    let mut deferred = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match batch.process(txn, row, false).await {
            Ok(Outcome::Persisted) => {}
            Ok(Outcome::Deferred) => deferred.push(index),
            Err(err) => return Err(RowFailure::new(index, err)),
        }
    }

    for index in deferred {
        match batch.process(txn, &rows[index], true).await {
            Ok(Outcome::Persisted) => {}
            Ok(Outcome::Deferred) => {
                return Err(RowFailure::new(
                    index,
                    CatalogError::Reference("parent category could not be resolved".to_string()),
                ))
            }
            Err(err) => return Err(RowFailure::new(index, err)),
        }
    }

    Ok((batch.created, batch.updated))
}

impl<'a> Batch<'a> {
    async fn process<C: ConnectionTrait>(
        &mut self,
        db: &C,
        row: &ImportRow,
        final_pass: bool,
    ) -> CatalogResult<Outcome> {
        let parent = match &row.parent_code {
            None => None,
            Some(code) => match repo::find_category_by_code(db, code).await? {
                Some(parent) => Some(parent),
                None if final_pass => {
                    return Err(CatalogError::Reference(format!(
                        "unknown parent category code '{}'",
                        code
                    )))
                }
                None => return Ok(Outcome::Deferred),
            },
        };

        let department = match &row.department_name {
            Some(name) => Some(resolve_department(db, name).await?),
            None => None,
        };

        let resolved = ResolvedRow {
            row,
            department,
            parent,
        };

        let coded = self.assign_code(db, resolved).await?;

        let category = self.persist(db, coded).await?;

        for role_name in &row.role_names {
            let role = match repo::find_work_role_by_name(db, role_name).await? {
                Some(role) => role,
                None => repo::create_work_role(db, role_name, "", true).await?,
            };
            repo::attach_role_to_category(db, category.id, role.id).await?;
        }

        Ok(Outcome::Persisted)
    }

    async fn assign_code<'r, C: ConnectionTrait>(
        &self,
        db: &C,
        resolved: ResolvedRow<'r>,
    ) -> CatalogResult<CodedRow<'r>> {
        let row = resolved.row;

        let (code, existing) = match &row.code {
            Some(code) => {
                if self.written.contains(code) {
                    return Err(CatalogError::DuplicateCode(format!(
                        "category code '{}' appears more than once in this import",
                        code
                    )));
                }
                (code.clone(), repo::find_category_by_code(db, code).await?)
            }
            None => {
                let parent_id = resolved.parent.as_ref().map(|p| p.id);
                // only categories from before this batch are re-import targets
                let matched = repo::find_category_by_name_and_parent(db, &row.name, parent_id)
                    .await?
                    .filter(|existing| !self.touched.contains(&existing.id));
                match matched {
                    Some(existing) => (existing.code.clone(), Some(existing)),
                    None => {
                        let code = self.deriver.derive(
                            &row.name,
                            resolved.department.as_ref(),
                            resolved.parent.as_ref(),
                            &self.codes,
                        )?;
                        (code, None)
                    }
                }
            }
        };

        if let (Some(existing), Some(parent)) = (&existing, &resolved.parent) {
            if repo::would_create_cycle(db, existing.id, parent.id).await? {
                return Err(CatalogError::Reference(format!(
                    "category '{}' cannot be placed under its own descendant '{}'",
                    existing.code, parent.code
                )));
            }
        }

        Ok(CodedRow {
            resolved,
            code,
            existing,
        })
    }

    async fn persist<C: ConnectionTrait>(
        &mut self,
        db: &C,
        coded: CodedRow<'_>,
    ) -> CatalogResult<activity_category::Model> {
        let row = coded.resolved.row;
        let fields = |existing: Option<&activity_category::Model>| CategoryFields {
            name: row.name.clone(),
            code: coded.code.clone(),
            parent_id: coded.resolved.parent.as_ref().map(|p| p.id),
            department_id: coded.resolved.department.as_ref().map(|d| d.id),
            standard_time: row.standard_time,
            description: row.description.clone(),
            definition: existing.and_then(|e| e.definition.clone()),
            reference_protocol: existing.and_then(|e| e.reference_protocol.clone()),
            objective: existing.and_then(|e| e.objective.clone()),
        };

        let category = match &coded.existing {
            Some(existing) => {
                let updated = repo::update_category(db, existing.id, fields(Some(existing))).await?;
                self.updated += 1;
                updated
            }
            None => {
                let created = repo::create_category(db, fields(None)).await?;
                self.created += 1;
                created
            }
        };

        self.codes.insert(category.code.clone());
        self.written.insert(category.code.clone());
        self.touched.insert(category.id);
        Ok(category)
    }
}

async fn resolve_department<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> CatalogResult<department::Model> {
    if let Some(dept) = repo::find_department_by_name(db, name).await? {
        return Ok(dept);
    }
    Ok(repo::create_department(db, name, None, None).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::entity::{department, work_role};
    use crate::error::ErrorKind;
    use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

    fn row(name: &str) -> RawRow {
        RawRow::named(name)
    }

    fn child(name: &str, parent_code: &str) -> RawRow {
        RawRow {
            parent_category_code: Some(parent_code.to_string()),
            ..row(name)
        }
    }

    fn with_dept(mut raw: RawRow, dept: &str) -> RawRow {
        raw.department_name = Some(dept.to_string());
        raw
    }

    fn with_code(mut raw: RawRow, code: &str) -> RawRow {
        raw.category_code = Some(code.to_string());
        raw
    }

    async fn category_count(db: &DatabaseConnection) -> u64 {
        activity_category::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn child_before_parent_resolves_in_second_pass() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let rows = vec![
            child("Planning", "IT_PM_001"),
            with_code(with_dept(row("Project Management"), "IT"), "IT_PM_001"),
        ];

        let result = import_batch(&db, &deriver, &rows).await;
        assert_eq!(result, ImportResult::Success { created: 2, updated: 0 });

        let parent = repo::find_category_by_code(&db, "IT_PM_001").await.unwrap().unwrap();
        let planning = repo::find_category_by_code(&db, "IT_PM_001-PLN").await.unwrap().unwrap();
        assert_eq!(planning.parent_id, Some(parent.id));
    }

    #[tokio::test]
    async fn derived_codes_follow_department_and_sequence() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let rows = vec![
            with_dept(row("Project Management"), "Information Technology"),
            with_dept(row("Project Reporting"), "Information Technology"),
            row("Quality audit"),
        ];

        let result = import_batch(&db, &deriver, &rows).await;
        assert_eq!(result, ImportResult::Success { created: 3, updated: 0 });

        let codes = repo::list_all_category_codes(&db).await.unwrap();
        assert!(codes.contains("IT_PM_001"));
        assert!(codes.contains("IT_PM_002"));
        assert!(codes.contains("GEN_QA_001"));
    }

    #[tokio::test]
    async fn blank_name_rolls_back_the_whole_batch() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let mut rows: Vec<RawRow> = (1..=5).map(|i| row(&format!("Task {}", i))).collect();
        rows.push(row("  "));

        let result = import_batch(&db, &deriver, &rows).await;
        match result {
            ImportResult::Failure(failure) => {
                assert_eq!(failure.row, 5);
                assert_eq!(failure.reason, ErrorKind::ValidationError);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(category_count(&db).await, 0);
    }

    #[tokio::test]
    async fn reference_error_rolls_back_departments_and_roles() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let mut first = with_dept(row("Project Management"), "Finance");
        first.role_names = Some("Controller".to_string());
        let rows = vec![first, child("Planning", "NOPE_001")];

        let result = import_batch(&db, &deriver, &rows).await;
        match result {
            ImportResult::Failure(failure) => {
                assert_eq!(failure.row, 1);
                assert_eq!(failure.reason, ErrorKind::ReferenceError);
            }
            other => panic!("expected failure, got {:?}", other),
        }

        assert_eq!(category_count(&db).await, 0);
        assert_eq!(department::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(work_role::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shared_department_and_roles_are_created_once() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let mut a = with_dept(row("Project Management"), "Information Technology");
        a.role_names = Some("Engineer, Manager".to_string());
        let mut b = with_dept(row("Testing"), "information technology");
        b.role_names = Some("engineer".to_string());

        let result = import_batch(&db, &deriver, &[a, b]).await;
        assert_eq!(result, ImportResult::Success { created: 2, updated: 0 });

        let depts = department::Entity::find().all(&db).await.unwrap();
        assert_eq!(depts.len(), 1);
        assert_eq!(work_role::Entity::find().count(&db).await.unwrap(), 2);

        let pm = repo::find_category_by_code(&db, "IT_PM_001").await.unwrap().unwrap();
        let tst = repo::find_category_by_code(&db, "IT_TST_001").await.unwrap().unwrap();
        assert_eq!(pm.department_id, Some(depts[0].id));
        assert_eq!(tst.department_id, Some(depts[0].id));
        assert_eq!(repo::roles_for_category(&db, pm.id).await.unwrap().len(), 2);
        assert_eq!(repo::roles_for_category(&db, tst.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn explicit_code_upserts_existing_category() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        let first = with_code(row("Project Management"), "IT_PM_001");
        import_batch(&db, &deriver, &[first]).await;
        let before = repo::list_all_category_codes(&db).await.unwrap().len();

        let mut second = with_code(row("Project Governance"), "IT_PM_001");
        second.category_description = Some("Steering and oversight".to_string());
        let result = import_batch(&db, &deriver, &[second]).await;
        assert_eq!(result, ImportResult::Success { created: 0, updated: 1 });

        let after = repo::list_all_category_codes(&db).await.unwrap().len();
        assert_eq!(before, after);

        let cat = repo::find_category_by_code(&db, "IT_PM_001").await.unwrap().unwrap();
        assert_eq!(cat.name, "Project Governance");
        assert_eq!(cat.description.as_deref(), Some("Steering and oversight"));
    }

    #[tokio::test]
    async fn reimport_without_codes_matches_by_name_and_parent() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_code(row("Project Management"), "IT_PM_001"),
            child("Planning", "IT_PM_001"),
        ];

        import_batch(&db, &deriver, &rows).await;
        let result = import_batch(&db, &deriver, &rows).await;

        assert_eq!(result, ImportResult::Success { created: 0, updated: 2 });
        assert_eq!(category_count(&db).await, 2);
    }

    #[tokio::test]
    async fn repeated_explicit_code_in_one_batch_is_duplicate() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_code(row("Project Management"), "IT_PM_001"),
            with_code(row("Project Oversight"), "IT_PM_001"),
        ];

        match import_batch(&db, &deriver, &rows).await {
            ImportResult::Failure(failure) => {
                assert_eq!(failure.row, 1);
                assert_eq!(failure.reason, ErrorKind::DuplicateCode);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(category_count(&db).await, 0);
    }

    #[tokio::test]
    async fn reparenting_under_a_descendant_is_a_cycle() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_code(row("Project Management"), "IT_PM_001"),
            with_code(child("Planning", "IT_PM_001"), "IT_PM_001-PLN"),
        ];
        import_batch(&db, &deriver, &rows).await;

        let looped = with_code(child("Project Management", "IT_PM_001-PLN"), "IT_PM_001");
        match import_batch(&db, &deriver, &[looped]).await {
            ImportResult::Failure(failure) => {
                assert_eq!(failure.row, 0);
                assert_eq!(failure.reason, ErrorKind::ReferenceError);
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let root = repo::find_category_by_code(&db, "IT_PM_001").await.unwrap().unwrap();
        assert_eq!(root.parent_id, None);
    }

    #[tokio::test]
    async fn explicit_codes_of_deferred_rows_are_reserved() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_code(child("Sprint planning", "IT_PM_001"), "IT_PM_001-PLN"),
            with_code(row("Project Management"), "IT_PM_001"),
            child("Planning", "IT_PM_001"),
        ];

        let result = import_batch(&db, &deriver, &rows).await;
        assert_eq!(result, ImportResult::Success { created: 3, updated: 0 });

        let sprint = repo::find_category_by_code(&db, "IT_PM_001-PLN").await.unwrap().unwrap();
        assert_eq!(sprint.name, "Sprint planning");
        let planning = repo::find_category_by_code(&db, "IT_PM_001-PLN-2").await.unwrap().unwrap();
        assert_eq!(planning.name, "Planning");
        assert_eq!(planning.parent_id, sprint.parent_id);
    }

    #[tokio::test]
    async fn repeated_explicit_code_fails_before_any_write() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_code(child("Planning", "IT_PM_001"), "IT_PM_001-PLN"),
            with_code(row("Project Management"), "IT_PM_001"),
            with_code(child("Sprint planning", "IT_PM_001"), "IT_PM_001-PLN"),
        ];

        match import_batch(&db, &deriver, &rows).await {
            ImportResult::Failure(failure) => {
                assert_eq!(failure.row, 2);
                assert_eq!(failure.reason, ErrorKind::DuplicateCode);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(category_count(&db).await, 0);
    }

    #[tokio::test]
    async fn repeated_name_in_one_batch_creates_separate_categories() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();
        let rows = vec![
            with_dept(row("Planning"), "Finance"),
            with_dept(row("Planning"), "Information Technology"),
        ];

        let result = import_batch(&db, &deriver, &rows).await;
        assert_eq!(result, ImportResult::Success { created: 2, updated: 0 });

        let fin = repo::find_category_by_code(&db, "FIN_PLN_001").await.unwrap().unwrap();
        let it = repo::find_category_by_code(&db, "IT_PLN_001").await.unwrap().unwrap();
        assert_ne!(fin.department_id, it.department_id);

        let finance = repo::find_department_by_name(&db, "Finance").await.unwrap().unwrap();
        assert_eq!(fin.department_id, Some(finance.id));
    }

    #[tokio::test]
    async fn unique_violation_in_store_is_duplicate_code() {
        let db = db::connect_in_memory().await.unwrap();
        let deriver = CodeDeriver::default();

        // committed by another writer after this batch read the store codes
        repo::create_category(
            &db,
            CategoryFields {
                name: "Project Management".to_string(),
                code: "GEN_PM_001".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let rows: Vec<ImportRow> = [
            with_dept(row("Operations setup"), "Operations"),
            row("Project Planning"),
        ]
        .iter()
        .map(|raw| raw.validate().unwrap())
        .collect();

        let txn = db.begin().await.unwrap();
        let stale = Batch {
            deriver: &deriver,
            codes: HashSet::new(),
            written: HashSet::new(),
            touched: HashSet::new(),
            created: 0,
            updated: 0,
        };
        let failure = reconcile(&txn, stale, &rows).await.unwrap_err();
        txn.rollback().await.unwrap();

        assert_eq!(failure.row, 1);
        assert_eq!(failure.reason, ErrorKind::DuplicateCode);
        assert_eq!(category_count(&db).await, 1);
        assert_eq!(department::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_batch_succeeds_without_writes() {
        let db = db::connect_in_memory().await.unwrap();
        let result = import_batch(&db, &CodeDeriver::default(), &[]).await;
        assert_eq!(result, ImportResult::Success { created: 0, updated: 0 });
    }
}
