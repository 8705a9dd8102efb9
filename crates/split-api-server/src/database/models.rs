//! Session domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shareable, time-limited expense session. The id doubles as the public
/// share token, so it must stay unguessable (v4 uuid, 122 bits of entropy).
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub data: SessionData,
}

impl Session {
    /// Derived at read time, never stored.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// The JSON document stored in the `data` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub name: String,
    pub amount: f64,
}
