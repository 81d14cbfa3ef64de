//! Session persistence.
//!
//! Records are keyed by the SHA-256 digest of the session token, so a leaked
//! store never yields usable cookies. Backends only store and expire records;
//! signing and renewal live in [`crate::auth::session`].

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRecord {
    /// SHA-256 hex digest of the session token.
    pub id: String,
    pub user_id: Uuid,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> AppResult<Option<SessionRecord>>;

    /// Insert or replace.
    async fn save(&self, record: &SessionRecord) -> AppResult<()>;

    /// Move the expiry of an existing record. Never recreates a deleted
    /// record; returns false when there was nothing to renew.
    async fn renew(&self, id: &str, expires_at: DateTime<Utc>) -> AppResult<bool>;

    /// Deleting a missing record is not an error.
    async fn delete(&self, id: &str) -> AppResult<()>;

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    async fn delete_expired(&self) -> AppResult<u64>;
}

/// Process-local store. Sessions are lost on restart and not shared between
/// instances.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionRecord>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> AppResult<()> {
        self.entries
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn renew(&self, id: &str, expires_at: DateTime<Utc>) -> AppResult<bool> {
        match self.entries.write().await.get_mut(id) {
            Some(record) => {
                record.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| record.user_id != user_id);
        Ok((before - entries.len()) as u64)
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

/// Store backed by the `sessions` table. Survives restarts and can be shared
/// by several API instances.
#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> AppResult<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, username, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn save(&self, record: &SessionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, username, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.id)
        .bind(record.user_id)
        .bind(&record.username)
        .bind(record.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn renew(&self, id: &str, expires_at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE sessions SET expires_at = $2 WHERE id = $1")
            .bind(id)
            .bind(expires_at)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, user_id: Uuid, expires_in: Duration) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            user_id,
            username: "alice".into(),
            expires_at: Utc::now() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = MemorySessionStore::new();
        let rec = record("a", Uuid::new_v4(), Duration::hours(1));

        store.save(&rec).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(rec));

        store.delete("a").await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
        // idempotent
        store.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_save_replaces_existing_record() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.save(&record("a", user, Duration::hours(1))).await.unwrap();
        let renewed = record("a", user, Duration::days(7));
        store.save(&renewed).await.unwrap();

        assert_eq!(store.count().await, 1);
        assert_eq!(store.load("a").await.unwrap().unwrap().expires_at, renewed.expires_at);
    }

    #[tokio::test]
    async fn test_renew_only_updates_existing_records() {
        let store = MemorySessionStore::new();
        let rec = record("a", Uuid::new_v4(), Duration::hours(1));
        store.save(&rec).await.unwrap();

        let later = Utc::now() + Duration::days(7);
        assert!(store.renew("a", later).await.unwrap());
        assert_eq!(store.load("a").await.unwrap().unwrap().expires_at, later);

        store.delete("a").await.unwrap();
        assert!(!store.renew("a", later).await.unwrap());
        assert!(store.load("a").await.unwrap().is_none());
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_sessions() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.save(&record("live", user, Duration::hours(1))).await.unwrap();
        store.save(&record("stale", user, -Duration::seconds(1))).await.unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert!(store.load("live").await.unwrap().is_some());
        assert!(store.load("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_for_user_only_touches_that_user() {
        let store = MemorySessionStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.save(&record("a1", alice, Duration::hours(1))).await.unwrap();
        store.save(&record("a2", alice, Duration::hours(1))).await.unwrap();
        store.save(&record("b1", bob, Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_for_user(alice).await.unwrap(), 2);
        assert_eq!(store.count().await, 1);
        assert!(store.load("b1").await.unwrap().is_some());
    }
}
