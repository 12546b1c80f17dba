// src/session/store.rs
// C14 session index: a SQLite cache over `(user_id, session_id, mtime,
// title)`, grounded on the teacher's `cache::session_state_store` pattern.
// The directory of session JSON files remains the sole source of truth;
// this table only saves `list` from re-`stat`-ing every file.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SessionIndexRow {
    pub session_id: String,
    pub mtime: i64,
    pub title: Option<String>,
}

pub struct SessionIndexStore {
    db: SqlitePool,
}

impl SessionIndexStore {
    pub async fn connect(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let db = SqlitePoolOptions::new().max_connections(4).connect(&url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_index (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                title TEXT,
                PRIMARY KEY (user_id, session_id)
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<SessionIndexRow>> {
        let rows = sqlx::query("SELECT session_id, mtime, title FROM session_index WHERE user_id = ? ORDER BY mtime DESC")
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SessionIndexRow {
                session_id: row.get("session_id"),
                mtime: row.get("mtime"),
                title: row.get("title"),
            })
            .collect())
    }

    pub async fn upsert(&self, user_id: &str, session_id: &str, mtime: i64, title: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_index (user_id, session_id, mtime, title)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, session_id) DO UPDATE SET
                mtime = excluded.mtime,
                title = excluded.title
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(mtime)
        .bind(title)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, user_id: &str, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_index WHERE user_id = ? AND session_id = ?")
            .bind(user_id)
            .bind(session_id)
            .execute(&self.db)
            .await?;
        debug!(user_id, session_id, "removed session index row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_list_roundtrips() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SessionIndexStore::connect(&dir.path().join("idx.db")).await.unwrap();

        store.upsert("alice", "20260101_000000", 100, Some("first chat")).await.unwrap();
        let rows = store.list("alice").await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "20260101_000000");
        assert_eq!(rows[0].title.as_deref(), Some("first chat"));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SessionIndexStore::connect(&dir.path().join("idx.db")).await.unwrap();

        store.upsert("alice", "s1", 100, None).await.unwrap();
        store.upsert("alice", "s1", 200, Some("renamed")).await.unwrap();

        let rows = store.list("alice").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mtime, 200);
    }

    #[tokio::test]
    async fn remove_deletes_the_row() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SessionIndexStore::connect(&dir.path().join("idx.db")).await.unwrap();

        store.upsert("alice", "s1", 100, None).await.unwrap();
        store.remove("alice", "s1").await.unwrap();

        assert!(store.list("alice").await.unwrap().is_empty());
    }
}
