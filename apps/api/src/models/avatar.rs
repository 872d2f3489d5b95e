use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only history of generated avatars. At most one row per user carries
/// `is_initial = true` (partial unique index on `(user_id) WHERE is_initial`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvatarRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub is_initial: bool,
    pub created_at: DateTime<Utc>,
}
