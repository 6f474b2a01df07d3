//! [`Store`] over Postgres.
//!
//! Queue entries are rows ordered by a serial id; the `queue` column holds
//! the full list key (`queue:<name>`). Row-picking subqueries use
//! `FOR UPDATE SKIP LOCKED` so concurrent removals never pick the same row.

use super::Db;
use crate::error::Result;
use crate::keys::queue_key;
use crate::store::Store;

impl Store for Db {
    async fn peek(&self, queue: &str, offset: u64, count: u64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM queue_entries WHERE queue = $1 ORDER BY id OFFSET $2 LIMIT $3",
        )
        .bind(queue_key(queue))
        .bind(offset as i64)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(payload,)| payload).collect())
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn lrem(&self, queue_key: &str, count: i64, value: &str) -> Result<u64> {
        let removed = if count == 0 {
            sqlx::query("DELETE FROM queue_entries WHERE queue = $1 AND payload = $2")
                .bind(queue_key)
                .bind(value)
                .execute(&self.pool)
                .await?
                .rows_affected()
        } else {
            let sql = if count > 0 {
                "DELETE FROM queue_entries WHERE id IN (
                     SELECT id FROM queue_entries WHERE queue = $1 AND payload = $2
                     ORDER BY id ASC LIMIT $3 FOR UPDATE SKIP LOCKED)"
            } else {
                "DELETE FROM queue_entries WHERE id IN (
                     SELECT id FROM queue_entries WHERE queue = $1 AND payload = $2
                     ORDER BY id DESC LIMIT $3 FOR UPDATE SKIP LOCKED)"
            };
            sqlx::query(sql)
                .bind(queue_key)
                .bind(value)
                .bind(count.saturating_abs())
                .execute(&self.pool)
                .await?
                .rows_affected()
        };
        Ok(removed)
    }

    async fn push(&self, queue: &str, payload: &str) -> Result<()> {
        sqlx::query("INSERT INTO queue_entries (queue, payload) VALUES ($1, $2)")
            .bind(queue_key(queue))
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "DELETE FROM queue_entries WHERE id = (
                 SELECT id FROM queue_entries WHERE queue = $1
                 ORDER BY id LIMIT 1 FOR UPDATE SKIP LOCKED)
             RETURNING payload",
        )
        .bind(queue_key(queue))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(payload,)| payload))
    }

    async fn len(&self, queue: &str) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM queue_entries WHERE queue = $1")
                .bind(queue_key(queue))
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
