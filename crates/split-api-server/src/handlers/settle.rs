//! Stateless settlement endpoint.

use axum::Json;
use serde_json::Value;

use crate::handlers::collab::parse_participants;
use crate::settlement::{self, Settlement};
use crate::utils::error::ApiError;

/// POST /api/settle
///
/// Computes the fair split and transfer plan for a submitted participant
/// list without touching any session.
pub async fn settle_handler(Json(body): Json<Value>) -> Result<Json<Settlement>, ApiError> {
    let participants = parse_participants(&body)?;
    Ok(Json(settlement::settle(&participants)))
}
