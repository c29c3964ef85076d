//! Database module for SQLite persistence using SeaORM

pub mod entities;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;

/// Initialize database connection and create tables
pub async fn init_database(db_path: &Path) -> Result<DatabaseConnection, DbErr> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    tracing::info!("Connecting to database: {}", db_url);

    let db = Database::connect(&db_url).await?;

    create_tables(&db).await?;

    Ok(db)
}

/// Create all tables if they don't exist
async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Converted imagery catalog (append-only)
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS imagery (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            original_name TEXT NOT NULL,
            base_name TEXT NOT NULL,
            cog_name TEXT NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            band_count INTEGER NOT NULL,
            projection TEXT,
            storage_path TEXT NOT NULL,
            sequence INTEGER NOT NULL,
            file_size INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#.to_string(),
    )).await?;

    // Max-sequence lookups group by base name
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"CREATE INDEX IF NOT EXISTS idx_imagery_base_name ON imagery(base_name, sequence)"#.to_string(),
    )).await?;
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"CREATE INDEX IF NOT EXISTS idx_imagery_original_name ON imagery(original_name)"#.to_string(),
    )).await?;

    tracing::info!("Database tables initialized");
    Ok(())
}
