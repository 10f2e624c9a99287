use sea_orm::{ConnectionTrait, ConnectOptions, Database, DatabaseConnection, DbBackend, DbErr, Schema, Statement};
use sea_orm::sea_query::TableCreateStatement;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{activity_category, category_work_role, department, work_role};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    info!("Connecting to {} database: {}", config.db_type, config.display_target());

    let mut opt = ConnectOptions::new(&database_url);
    opt.connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    if config.is_sqlite() {
        // SQLite serialises writers; one connection keeps import transactions simple
        opt.max_connections(1);
    } else {
        opt.max_connections(config.max_connections)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(600))
            .set_schema_search_path("public");
    }

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Auto-migrate database tables
pub async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // 1. Independent tables first
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(department::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(work_role::Entity)).await?;

    // 2. Tables referencing them
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(activity_category::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(category_work_role::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

/// Fresh migrated in-memory SQLite database
#[cfg(test)]
pub(crate) async fn connect_in_memory() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opt).await?;
    auto_migrate(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn migration_is_idempotent() {
        let db = connect_in_memory().await.unwrap();
        auto_migrate(&db).await.unwrap();

        let count = activity_category::Entity::find().count(&db).await.unwrap();
        assert_eq!(count, 0);
    }
}
