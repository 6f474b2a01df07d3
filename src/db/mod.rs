//! Postgres connection pool, migrations, and health check.
//!
//! [`Db`] implements [`Store`](crate::store::Store) on two tables:
//! `queue_entries` for queue lists and `kv_entries` for lock records.

mod store;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Database handle. Owns the connection pool.
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres and create a connection pool.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Lock records currently held, as `(key, queue)` pairs sorted by key.
    pub async fn held_locks(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM kv_entries WHERE starts_with(key, $1) ORDER BY key",
        )
        .bind(crate::keys::LOCK_PREFIX)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
