use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::habits::scoring::{compute_drift_score, HabitDay, HISTORY_WINDOW_DAYS};
use crate::models::habit::HabitEntryRow;
use crate::profile::store::ProfileStore;

/// Habit log persistence, keyed by (user, calendar day).
///
/// Carried in `AppState` as `Arc<dyn HabitStore>` so the pipeline can be
/// exercised against in-memory fakes.
#[async_trait]
pub trait HabitStore: Send + Sync {
    /// Records today's check-in. Idempotent per day — a second check-in on
    /// the same calendar day overwrites the first (last write wins).
    async fn log_habit(&self, user_id: Uuid, completed: bool) -> Result<HabitEntryRow, AppError>;

    /// Returns up to `limit_days` entries, newest first.
    async fn recent_entries(
        &self,
        user_id: Uuid,
        limit_days: u32,
    ) -> Result<Vec<HabitEntryRow>, AppError>;
}

pub struct PgHabitStore {
    pool: PgPool,
}

impl PgHabitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HabitStore for PgHabitStore {
    async fn log_habit(&self, user_id: Uuid, completed: bool) -> Result<HabitEntryRow, AppError> {
        let today = Utc::now().date_naive();

        let entry = sqlx::query_as::<_, HabitEntryRow>(
            r#"
            INSERT INTO habit_entries (user_id, date, completed)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, date)
            DO UPDATE SET completed = EXCLUDED.completed, created_at = now()
            RETURNING user_id, date, completed, created_at
            "#,
        )
        .bind(user_id)
        .bind(today)
        .bind(completed)
        .fetch_one(&self.pool)
        .await?;

        info!("Logged habit for user {user_id} on {today}: completed={completed}");
        Ok(entry)
    }

    async fn recent_entries(
        &self,
        user_id: Uuid,
        limit_days: u32,
    ) -> Result<Vec<HabitEntryRow>, AppError> {
        Ok(sqlx::query_as::<_, HabitEntryRow>(
            r#"
            SELECT user_id, date, completed, created_at
            FROM habit_entries
            WHERE user_id = $1
            ORDER BY date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit_days as i64)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Recomputes the user's drift score from the trailing window and persists it.
///
/// Atomic with respect to the profile: a failed history read propagates
/// before any write happens, and the pure recomputation has no side effects.
pub async fn recompute_drift_score(
    habits: &dyn HabitStore,
    profiles: &dyn ProfileStore,
    user_id: Uuid,
) -> Result<i32, AppError> {
    let mut entries = habits
        .recent_entries(user_id, HISTORY_WINDOW_DAYS as u32)
        .await?;
    // Store returns newest first; the scorer wants oldest first.
    entries.reverse();

    let window: Vec<HabitDay> = entries
        .iter()
        .map(|e| HabitDay {
            date: e.date,
            completed: e.completed,
        })
        .collect();
    let score = compute_drift_score(&window);

    profiles.set_latest_drift_score(user_id, score).await?;
    info!("Recomputed drift score for user {user_id}: {score}");
    Ok(score)
}
