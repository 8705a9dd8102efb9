//! Anonymous collaborative data handlers.
//!
//! Any holder of a session id may read and replace its participant list
//! while the session is accessible. Writes are full-state overwrites; two
//! concurrent writers resolve via last-write-wins at the storage layer.

use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::{Participant, SessionData, SessionStore};
use crate::security::SessionAccess;
use crate::utils::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDataResponse {
    pub session_id: Uuid,
    pub name: Option<String>,
    pub expires_at: i64,
    pub is_active: bool,
    pub data: SessionData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceDataResponse {
    pub session_id: Uuid,
    pub data: SessionData,
}

fn parse_public_session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::SessionNotFoundOrExpired)
}

/// Validate the raw request body into a participant list. Runs before any
/// store call; a bad entry rejects the whole payload, nothing is clamped.
pub(crate) fn parse_participants(body: &Value) -> Result<Vec<Participant>, ApiError> {
    let entries = body
        .get("participants")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ApiError::InvalidParticipants("participants must be an array".to_string())
        })?;

    let mut participants = Vec::with_capacity(entries.len());
    for entry in entries {
        let object = entry.as_object().ok_or_else(|| {
            ApiError::InvalidParticipants("each participant must be an object".to_string())
        })?;

        let name = match object.get("name") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ApiError::InvalidParticipants(
                    "participant name must be a string".to_string(),
                ))
            }
        };

        let amount = object
            .get("amount")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                ApiError::InvalidParticipants("participant amount must be a number".to_string())
            })?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ApiError::InvalidParticipants(
                "participant amount must be non-negative".to_string(),
            ));
        }

        participants.push(Participant { name, amount });
    }

    Ok(participants)
}

/// GET /api/sessions/{id}/data
pub async fn get_session_data_handler(
    Extension(access): Extension<Arc<SessionAccess>>,
    Path(id): Path<String>,
) -> Result<Json<SessionDataResponse>, ApiError> {
    let id = parse_public_session_id(&id)?;
    let session = access.require_accessible(id).await?;

    Ok(Json(SessionDataResponse {
        session_id: session.id,
        name: session.name,
        expires_at: session.expires_at.timestamp_millis(),
        is_active: session.is_active,
        data: session.data,
    }))
}

/// PUT /api/sessions/{id}/data
pub async fn replace_session_data_handler(
    Extension(store): Extension<Arc<dyn SessionStore>>,
    Extension(access): Extension<Arc<SessionAccess>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<ReplaceDataResponse>, ApiError> {
    let participants = parse_participants(&body)?;
    let id = parse_public_session_id(&id)?;

    access.require_accessible(id).await?;

    let updated = store
        .replace_data(id, participants.clone())
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;
    if !updated {
        return Err(ApiError::SessionNotFoundOrExpired);
    }

    info!(
        "Session {} data replaced ({} participants)",
        id,
        participants.len()
    );

    Ok(Json(ReplaceDataResponse {
        session_id: id,
        data: SessionData { participants },
    }))
}
