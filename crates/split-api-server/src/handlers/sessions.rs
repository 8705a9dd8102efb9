//! Owner-facing session management handlers.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthOwner;
use crate::config::Settings;
use crate::database::{Session, SessionStore};
use crate::security::access;
use crate::utils::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expiration_hours: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub url: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub extend_hours: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionResponse {
    pub session: SessionSummary,
}

/// Management view of a session; `is_expired` is derived at read time.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub is_active: bool,
    pub is_expired: bool,
    pub url: String,
    pub participant_count: usize,
}

impl SessionSummary {
    fn from_session(session: &Session, settings: &Settings, now: DateTime<Utc>) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            created_at: session.created_at.timestamp_millis(),
            expires_at: session.expires_at.timestamp_millis(),
            is_active: session.is_active,
            is_expired: session.is_expired_at(now),
            url: share_url(settings, session.id),
            participant_count: session.data.participants.len(),
        }
    }
}

pub(crate) fn share_url(settings: &Settings, id: Uuid) -> String {
    format!(
        "{}/s/{}",
        settings.server.public_url.trim_end_matches('/'),
        id
    )
}

fn parse_owner_session_id(id: &str) -> Result<Uuid, ApiError> {
    // A malformed id cannot name any session.
    Uuid::parse_str(id).map_err(|_| ApiError::SessionNotFound)
}

/// POST /api/sessions
pub async fn create_session_handler(
    Extension(store): Extension<Arc<dyn SessionStore>>,
    Extension(settings): Extension<Arc<Settings>>,
    Extension(AuthOwner(owner_id)): Extension<AuthOwner>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let duration_hours =
        access::clamp_duration_hours(payload.expiration_hours, &settings.session);

    let session = store
        .create(owner_id, name, duration_hours)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    info!("Owner {} created session {}", owner_id, session.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            url: share_url(&settings, session.id),
            expires_at: session.expires_at.timestamp_millis(),
        }),
    ))
}

/// GET /api/sessions
pub async fn list_sessions_handler(
    Extension(store): Extension<Arc<dyn SessionStore>>,
    Extension(settings): Extension<Arc<Settings>>,
    Extension(AuthOwner(owner_id)): Extension<AuthOwner>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let sessions = store
        .list_by_owner(owner_id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let now = Utc::now();
    Ok(Json(ListSessionsResponse {
        sessions: sessions
            .iter()
            .map(|s| SessionSummary::from_session(s, &settings, now))
            .collect(),
    }))
}

/// PATCH /api/sessions/{id}
///
/// The caller is already authenticated here, so not-found and not-owned are
/// reported distinctly, unlike everywhere else.
pub async fn update_session_handler(
    Extension(store): Extension<Arc<dyn SessionStore>>,
    Extension(settings): Extension<Arc<Settings>>,
    Extension(AuthOwner(owner_id)): Extension<AuthOwner>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<UpdateSessionResponse>, ApiError> {
    let id = parse_owner_session_id(&id)?;

    let session = store
        .get(id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or(ApiError::SessionNotFound)?;

    if session.owner_id != owner_id {
        warn!(
            "Owner {} attempted to manage session {} they do not own",
            owner_id, id
        );
        return Err(ApiError::Forbidden(
            "session belongs to another owner".to_string(),
        ));
    }

    if let Some(active) = payload.is_active {
        let updated = store
            .set_active(id, owner_id, active)
            .await
            .map_err(|e| ApiError::Database(e.to_string()))?;
        if !updated {
            return Err(ApiError::SessionNotFound);
        }
        info!("Owner {} set session {} active={}", owner_id, id, active);
    }

    if let Some(hours) = payload.extend_hours {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ApiError::BadRequest(
                "extendHours must be a positive number".to_string(),
            ));
        }
        let updated = store
            .extend_expiration(id, owner_id, hours)
            .await
            .map_err(|e| ApiError::Database(e.to_string()))?;
        if !updated {
            return Err(ApiError::SessionNotFound);
        }
        info!("Owner {} extended session {} by {}h", owner_id, id, hours);
    }

    let session = store
        .get(id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?
        .ok_or(ApiError::SessionNotFound)?;

    Ok(Json(UpdateSessionResponse {
        session: SessionSummary::from_session(&session, &settings, Utc::now()),
    }))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session_handler(
    Extension(store): Extension<Arc<dyn SessionStore>>,
    Extension(AuthOwner(owner_id)): Extension<AuthOwner>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_owner_session_id(&id)?;

    // Not-found and not-owned share one answer so a non-owner cannot learn
    // whether the id exists.
    let removed = store
        .delete(id, owner_id)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    if !removed {
        return Err(ApiError::SessionNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}
