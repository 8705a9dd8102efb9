//! Access-control policy for anonymous collaborators.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::database::{Session, SessionStore};
use crate::utils::error::ApiError;

/// A session is accessible to anonymous holders of its id while it is both
/// active and not yet expired. Strict `>`: a session expiring exactly now is
/// already gone.
pub fn is_accessible(session: &Session, now: DateTime<Utc>) -> bool {
    session.is_active && session.expires_at > now
}

/// Clamp a requested session duration to the configured bounds. Absent,
/// non-finite, and non-positive requests fall back to the default; values
/// above the maximum are silently capped, not rejected.
pub fn clamp_duration_hours(requested: Option<f64>, config: &SessionConfig) -> f64 {
    match requested {
        Some(hours) if hours.is_finite() && hours > 0.0 => hours.min(config.max_duration_hours),
        _ => config.default_duration_hours,
    }
}

/// Session accessibility gate for the public collaborative endpoints.
pub struct SessionAccess {
    store: Arc<dyn SessionStore>,
}

impl SessionAccess {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Load a session on behalf of an anonymous collaborator. Missing,
    /// disabled, and expired sessions all answer with the same not-found
    /// condition so non-owners cannot probe which of the three it was.
    pub async fn require_accessible(&self, id: Uuid) -> Result<Session, ApiError> {
        let session = self
            .store
            .get(id)
            .await
            .map_err(|e| ApiError::Database(e.to_string()))?
            .ok_or(ApiError::SessionNotFoundOrExpired)?;

        if !is_accessible(&session, Utc::now()) {
            warn!("Denied collaborator access to session {}", id);
            return Err(ApiError::SessionNotFoundOrExpired);
        }

        debug!("Session {} is accessible", id);
        Ok(session)
    }
}
