use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user profile row. `latest_drift_score` and `current_avatar_url` are
/// written only by the avatar pipeline; the rest by direct profile edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub id: Uuid,
    pub name: String,
    pub goal: String,
    pub base_description: String,
    pub base_photo_url: Option<String>,
    pub current_avatar_url: Option<String>,
    pub latest_drift_score: i32,
    pub created_at: DateTime<Utc>,
}
