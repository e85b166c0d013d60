// Database connection and pool management

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseSettings;
use crate::domain::{FiscalOpsError, Result};

/// SQLite pool wrapper. The relational store runs on the embedded driver;
/// connection URLs use the `sqlite://` scheme (`sqlite::memory:` for tests).
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        if settings.url.starts_with("postgres") {
            return Err(FiscalOpsError::config(
                "this build ships the sqlite driver only; set DATABASE_URL to a sqlite:// path",
            ));
        }
        if settings.max_connections == 0 {
            return Err(FiscalOpsError::config("max_connections must be positive"));
        }

        info!(url = %settings.url, "connecting database pool");

        let options = SqliteConnectOptions::from_str(&settings.url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        if settings.run_migrations {
            database.run_migrations().await?;
        }
        Ok(database)
    }

    /// In-memory database with migrations applied; test harness entry point.
    pub async fn connect_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("running migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_migrates_and_responds() {
        let database = Database::connect_memory().await.unwrap();
        database.health_check().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(database.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_postgres_url_rejected() {
        let settings = DatabaseSettings {
            url: "postgresql://localhost/x".into(),
            max_connections: 5,
            run_migrations: false,
        };
        assert!(Database::connect(&settings).await.is_err());
    }
}
