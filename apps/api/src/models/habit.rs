use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One check-in, keyed by (user, calendar day). Immutable once written except
/// for a same-day overwrite, where the last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HabitEntryRow {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}
