//! Persistence operations used by code derivation, import, and the CRUD
//! handlers.
//!
//! Every function is generic over [`ConnectionTrait`], so the same calls run on
//! the pooled connection or inside an import transaction.

use std::collections::HashSet;

use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entity::{activity_category, category_work_role, department, work_role};

/// Writable category fields, shared by insert and update
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryFields {
    pub name: String,
    pub code: String,
    pub parent_id: Option<i64>,
    pub department_id: Option<i64>,
    pub standard_time: Option<i32>,
    pub description: Option<String>,
    pub definition: Option<String>,
    pub reference_protocol: Option<String>,
    pub objective: Option<String>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub async fn find_department<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<department::Model>, DbErr> {
    department::Entity::find_by_id(id).one(db).await
}

/// Case-insensitive name lookup
pub async fn find_department_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<department::Model>, DbErr> {
    department::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(department::Column::Name))).eq(name.trim().to_lowercase()))
        .order_by_asc(department::Column::Id)
        .one(db)
        .await
}

/// Insert a department; blank `short_name` / `slug` are derived from the name.
pub async fn create_department<C: ConnectionTrait>(
    db: &C,
    name: &str,
    short_name: Option<&str>,
    slug: Option<&str>,
) -> Result<department::Model, DbErr> {
    let name = name.trim();
    let short_name = match short_name.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_ascii_uppercase(),
        _ => department::derive_short_name(name),
    };
    let slug = match slug.map(str::trim) {
        Some(s) if !s.is_empty() => department::slugify(s),
        _ => department::slugify(name),
    };

    department::ActiveModel {
        name: Set(name.to_string()),
        short_name: Set(short_name),
        slug: Set(slug),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Case-insensitive name lookup
pub async fn find_work_role_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<work_role::Model>, DbErr> {
    work_role::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(work_role::Column::Name))).eq(name.trim().to_lowercase()))
        .order_by_asc(work_role::Column::Id)
        .one(db)
        .await
}

pub async fn create_work_role<C: ConnectionTrait>(
    db: &C,
    name: &str,
    description: &str,
    is_active: bool,
) -> Result<work_role::Model, DbErr> {
    work_role::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description.to_string()),
        is_active: Set(is_active),
        created_at: Set(now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn find_category<C: ConnectionTrait>(
    db: &C,
    id: i64,
) -> Result<Option<activity_category::Model>, DbErr> {
    activity_category::Entity::find_by_id(id).one(db).await
}

/// Exact code lookup
pub async fn find_category_by_code<C: ConnectionTrait>(
    db: &C,
    code: &str,
) -> Result<Option<activity_category::Model>, DbErr> {
    activity_category::Entity::find()
        .filter(activity_category::Column::Code.eq(code))
        .one(db)
        .await
}

/// Re-import match for rows without a code: same name under the same parent
pub async fn find_category_by_name_and_parent<C: ConnectionTrait>(
    db: &C,
    name: &str,
    parent_id: Option<i64>,
) -> Result<Option<activity_category::Model>, DbErr> {
    let parent_filter = match parent_id {
        Some(pid) => activity_category::Column::ParentId.eq(pid),
        None => activity_category::Column::ParentId.is_null(),
    };

    activity_category::Entity::find()
        .filter(activity_category::Column::Name.eq(name))
        .filter(parent_filter)
        .order_by_asc(activity_category::Column::Id)
        .one(db)
        .await
}

pub async fn list_all_category_codes<C: ConnectionTrait>(
    db: &C,
) -> Result<HashSet<String>, DbErr> {
    let codes: Vec<String> = activity_category::Entity::find()
        .select_only()
        .column(activity_category::Column::Code)
        .into_tuple()
        .all(db)
        .await?;

    Ok(codes.into_iter().collect())
}

pub async fn create_category<C: ConnectionTrait>(
    db: &C,
    fields: CategoryFields,
) -> Result<activity_category::Model, DbErr> {
    let ts = now();
    activity_category::ActiveModel {
        name: Set(fields.name),
        code: Set(fields.code),
        parent_id: Set(fields.parent_id),
        department_id: Set(fields.department_id),
        standard_time: Set(fields.standard_time),
        description: Set(fields.description),
        definition: Set(fields.definition),
        reference_protocol: Set(fields.reference_protocol),
        objective: Set(fields.objective),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Overwrite every writable field of category `id`
pub async fn update_category<C: ConnectionTrait>(
    db: &C,
    id: i64,
    fields: CategoryFields,
) -> Result<activity_category::Model, DbErr> {
    activity_category::ActiveModel {
        id: Set(id),
        name: Set(fields.name),
        code: Set(fields.code),
        parent_id: Set(fields.parent_id),
        department_id: Set(fields.department_id),
        standard_time: Set(fields.standard_time),
        description: Set(fields.description),
        definition: Set(fields.definition),
        reference_protocol: Set(fields.reference_protocol),
        objective: Set(fields.objective),
        updated_at: Set(now()),
        ..Default::default()
    }
    .update(db)
    .await
}

pub async fn delete_category<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
    category_work_role::Entity::delete_many()
        .filter(category_work_role::Column::CategoryId.eq(id))
        .exec(db)
        .await?;
    activity_category::Entity::delete_by_id(id).exec(db).await?;
    Ok(())
}

pub async fn has_children<C: ConnectionTrait>(db: &C, id: i64) -> Result<bool, DbErr> {
    let child = activity_category::Entity::find()
        .filter(activity_category::Column::ParentId.eq(id))
        .one(db)
        .await?;
    Ok(child.is_some())
}

/// Whether making `new_parent_id` the parent of `category_id` would place the
/// category among its own ancestors.
pub async fn would_create_cycle<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
    new_parent_id: i64,
) -> Result<bool, DbErr> {
    let mut visited = HashSet::new();
    let mut current = Some(new_parent_id);

    while let Some(id) = current {
        if id == category_id {
            return Ok(true);
        }
        // a pre-existing loop that does not pass through `category_id`
        if !visited.insert(id) {
            return Ok(false);
        }
        current = find_category(db, id).await?.and_then(|c| c.parent_id);
    }

    Ok(false)
}

/// Link a role to a category; a no-op when the link already exists.
pub async fn attach_role_to_category<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
    work_role_id: i64,
) -> Result<(), DbErr> {
    let existing = category_work_role::Entity::find_by_id((category_id, work_role_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    category_work_role::ActiveModel {
        category_id: Set(category_id),
        work_role_id: Set(work_role_id),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Replace the role set of a category
pub async fn set_category_roles<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
    work_role_ids: &[i64],
) -> Result<(), DbErr> {
    category_work_role::Entity::delete_many()
        .filter(category_work_role::Column::CategoryId.eq(category_id))
        .exec(db)
        .await?;
    for role_id in work_role_ids {
        attach_role_to_category(db, category_id, *role_id).await?;
    }
    Ok(())
}

pub async fn roles_for_category<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
) -> Result<Vec<i64>, DbErr> {
    let links = category_work_role::Entity::find()
        .filter(category_work_role::Column::CategoryId.eq(category_id))
        .order_by_asc(category_work_role::Column::WorkRoleId)
        .all(db)
        .await?;
    Ok(links.into_iter().map(|l| l.work_role_id).collect())
}
