//! Session store: the sole authority for session state transitions.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::models::{Participant, Session, SessionData};
use super::pool::DbPool;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence port for sessions.
///
/// Expected conditions (unknown id, wrong owner) are reported through
/// `Option`/`bool` return values; `StoreError` is reserved for genuine
/// storage failure. Ownership-checked mutators deliberately do not
/// distinguish not-found from not-owned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session. Duration clamping is the caller's policy; the
    /// store applies whatever duration it is handed.
    async fn create(
        &self,
        owner_id: Uuid,
        name: Option<String>,
        duration_hours: f64,
    ) -> Result<Session, StoreError>;

    /// Fetch by id with no accessibility filtering; owner-facing reads need
    /// full visibility into expired and disabled sessions.
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Wholesale overwrite of the participant list (last full state wins).
    /// Returns false when the id is unknown.
    async fn replace_data(
        &self,
        id: Uuid,
        participants: Vec<Participant>,
    ) -> Result<bool, StoreError>;

    /// All sessions owned by the principal, newest-created first.
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Session>, StoreError>;

    /// Hard delete, gated on ownership in the same statement.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;

    async fn set_active(&self, id: Uuid, owner_id: Uuid, active: bool)
        -> Result<bool, StoreError>;

    /// Adds to the *stored* expiration, so repeated extensions compound
    /// predictably regardless of when they are applied.
    async fn extend_expiration(
        &self,
        id: Uuid,
        owner_id: Uuid,
        additional_hours: f64,
    ) -> Result<bool, StoreError>;

    /// Bulk delete of every session with `expires_at <= now`. Idempotent.
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Storage connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ensure the session table and its two access-pattern indexes exist
    /// (owner listing and expiration sweep).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let pool = self.pool.get_pool();

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS split_sessions (
                id UUID PRIMARY KEY,
                owner_id UUID NOT NULL,
                name TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT true,
                data JSONB NOT NULL
            )"#,
        )
        .execute(pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error creating session table: {}", e);
            StoreError::Database(e.to_string())
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_split_sessions_owner ON split_sessions(owner_id)",
        )
        .execute(pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error creating owner index: {}", e);
            StoreError::Database(e.to_string())
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_split_sessions_expires ON split_sessions(expires_at)",
        )
        .execute(pool)
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error creating expiration index: {}", e);
            StoreError::Database(e.to_string())
        })?;

        debug!("Session table and indexes ensured");
        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    owner_id: Uuid,
    name: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
    data: Json<SessionData>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            data: row.data.0,
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(
        &self,
        owner_id: Uuid,
        name: Option<String>,
        duration_hours: f64,
    ) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            owner_id,
            name,
            created_at: now,
            expires_at: now + Duration::milliseconds((duration_hours * 3_600_000.0) as i64),
            is_active: true,
            data: SessionData::default(),
        };

        sqlx::query(
            r#"
            INSERT INTO split_sessions (id, owner_id, name, created_at, expires_at, is_active, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(session.owner_id)
        .bind(&session.name)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.is_active)
        .bind(Json(&session.data))
        .execute(self.pool.get_pool())
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error creating session: {}", e);
            StoreError::Database(e.to_string())
        })?;

        info!("Session {} created for owner {}", session.id, owner_id);
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, created_at, expires_at, is_active, data
            FROM split_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error fetching session: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(row.map(|r| r.into()))
    }

    async fn replace_data(
        &self,
        id: Uuid,
        participants: Vec<Participant>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE split_sessions SET data = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(SessionData { participants }))
            .execute(self.pool.get_pool())
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error replacing session data: {}", e);
                StoreError::Database(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, created_at, expires_at, is_active, data
            FROM split_sessions
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.get_pool())
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error listing sessions for owner: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM split_sessions WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(self.pool.get_pool())
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error deleting session: {}", e);
                StoreError::Database(e.to_string())
            })?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Session {} deleted by owner {}", id, owner_id);
        }
        Ok(removed)
    }

    async fn set_active(
        &self,
        id: Uuid,
        owner_id: Uuid,
        active: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE split_sessions SET is_active = $3 WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(active)
        .execute(self.pool.get_pool())
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error toggling session active flag: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn extend_expiration(
        &self,
        id: Uuid,
        owner_id: Uuid,
        additional_hours: f64,
    ) -> Result<bool, StoreError> {
        // Single atomic statement against the stored value, never "now".
        let result = sqlx::query(
            r#"
            UPDATE split_sessions
            SET expires_at = expires_at + make_interval(secs => $3)
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(additional_hours * 3600.0)
        .execute(self.pool.get_pool())
        .await
        .map_err(|e: sqlx::Error| {
            error!("Database error extending session expiration: {}", e);
            StoreError::Database(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM split_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool.get_pool())
            .await
            .map_err(|e: sqlx::Error| {
                error!("Database error during expired-session cleanup: {}", e);
                StoreError::Database(e.to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.get_pool())
            .await
            .map_err(|e: sqlx::Error| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
