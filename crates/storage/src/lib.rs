mod access;
mod catalog;
mod orders;
mod seed;

use std::{str::FromStr, time::Duration};

use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use thiserror::Error;

pub use access::{DataAccess, Normalization, Param, Record, Value, DATE_FORMAT};
pub use catalog::{CustomerRepository, ProductRepository};
pub use orders::{NewOrder, OrderRepository, SaveOutcome};
pub use seed::SeedSummary;

/// Top-level database handle that owns the SQLite connection.
///
/// The service is single-user: one connection is opened at startup and
/// reused until the process exits.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store at `database_url`, creating the file when missing.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates any missing table. Safe to call on every startup.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    let enabled: (i64,) = sqlx::query_as("PRAGMA foreign_keys;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;
    if enabled.0 != 1 {
        return Err(StorageError::ForeignKeysDisabled);
    }

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("sqlite refused to enable foreign key enforcement")]
    ForeignKeysDisabled,
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creates_the_five_tables() {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.ensure_schema().await.expect("schema");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("fetch tables");
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Clientes", "Cte_Pedido", "Detalle_Pedido", "Estados", "Productos"]
        );
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.ensure_schema().await.expect("first run");
        db.ensure_schema().await.expect("second run");
    }

    #[tokio::test]
    async fn schema_applies_over_preexisting_tables() {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        sqlx::query("CREATE TABLE Estados (Id_Estado TEXT PRIMARY KEY NOT NULL, Estado_Cte TEXT)")
            .execute(db.pool())
            .await
            .expect("legacy table");
        db.ensure_schema().await.expect("schema over legacy table");
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        db.ensure_schema().await.expect("schema");

        let err = sqlx::query("INSERT INTO Clientes VALUES ('C01', 'Nadie', NULL, NULL, 'E99', '00000', 'XXXX')")
            .execute(db.pool())
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(_)));
    }

    #[tokio::test]
    async fn file_backed_store_is_created_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("facturabd.db");
        let url = format!("sqlite://{}", path.display());

        let db = Database::connect(&url).await.expect("connect");
        db.ensure_schema().await.expect("schema");
        assert!(path.exists());
    }
}
