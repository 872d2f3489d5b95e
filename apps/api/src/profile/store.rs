use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::habits::scoring::BASELINE_SCORE;
use crate::models::avatar::AvatarRecordRow;
use crate::models::user::UserProfileRow;

/// Fields a user can edit directly. `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileDetails {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub base_description: Option<String>,
}

/// Profile persistence, including the pipeline-owned score and avatar fields.
///
/// Carried in `AppState` as `Arc<dyn ProfileStore>` so the pipeline can be
/// exercised against in-memory fakes.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        goal: &str,
        base_description: &str,
    ) -> Result<UserProfileRow, AppError>;

    async fn fetch(&self, user_id: Uuid) -> Result<UserProfileRow, AppError>;

    async fn update_details(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<UserProfileRow, AppError>;

    /// Caches the recomputed drift score on the profile. Callers guarantee
    /// the score is already clamped to [0, 100].
    async fn set_latest_drift_score(&self, user_id: Uuid, score: i32) -> Result<(), AppError>;

    async fn set_base_photo_url(&self, user_id: Uuid, url: &str) -> Result<(), AppError>;

    async fn set_current_avatar_url(&self, user_id: Uuid, url: &str) -> Result<(), AppError>;

    /// Appends to the avatar history. An initial record upserts instead, so
    /// at most one row per user carries the flag.
    async fn save_avatar_record(
        &self,
        user_id: Uuid,
        url: &str,
        is_initial: bool,
    ) -> Result<AvatarRecordRow, AppError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        goal: &str,
        base_description: &str,
    ) -> Result<UserProfileRow, AppError> {
        let profile = sqlx::query_as::<_, UserProfileRow>(
            r#"
            INSERT INTO user_profiles (id, name, goal, base_description, latest_drift_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, goal, base_description, base_photo_url,
                      current_avatar_url, latest_drift_score, created_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(goal)
        .bind(base_description)
        .bind(BASELINE_SCORE)
        .fetch_one(&self.pool)
        .await?;

        info!("Created profile for user {user_id}");
        Ok(profile)
    }

    async fn fetch(&self, user_id: Uuid) -> Result<UserProfileRow, AppError> {
        sqlx::query_as::<_, UserProfileRow>(
            r#"
            SELECT id, name, goal, base_description, base_photo_url,
                   current_avatar_url, latest_drift_score, created_at
            FROM user_profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {user_id} not found")))
    }

    async fn update_details(
        &self,
        user_id: Uuid,
        details: &ProfileDetails,
    ) -> Result<UserProfileRow, AppError> {
        sqlx::query_as::<_, UserProfileRow>(
            r#"
            UPDATE user_profiles
            SET name = COALESCE($2, name),
                goal = COALESCE($3, goal),
                base_description = COALESCE($4, base_description)
            WHERE id = $1
            RETURNING id, name, goal, base_description, base_photo_url,
                      current_avatar_url, latest_drift_score, created_at
            "#,
        )
        .bind(user_id)
        .bind(details.name.as_deref())
        .bind(details.goal.as_deref())
        .bind(details.base_description.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {user_id} not found")))
    }

    async fn set_latest_drift_score(&self, user_id: Uuid, score: i32) -> Result<(), AppError> {
        update_profile_field(
            &self.pool,
            user_id,
            sqlx::query("UPDATE user_profiles SET latest_drift_score = $2 WHERE id = $1")
                .bind(user_id)
                .bind(score),
        )
        .await
    }

    async fn set_base_photo_url(&self, user_id: Uuid, url: &str) -> Result<(), AppError> {
        update_profile_field(
            &self.pool,
            user_id,
            sqlx::query("UPDATE user_profiles SET base_photo_url = $2 WHERE id = $1")
                .bind(user_id)
                .bind(url),
        )
        .await
    }

    async fn set_current_avatar_url(&self, user_id: Uuid, url: &str) -> Result<(), AppError> {
        update_profile_field(
            &self.pool,
            user_id,
            sqlx::query("UPDATE user_profiles SET current_avatar_url = $2 WHERE id = $1")
                .bind(user_id)
                .bind(url),
        )
        .await
    }

    async fn save_avatar_record(
        &self,
        user_id: Uuid,
        url: &str,
        is_initial: bool,
    ) -> Result<AvatarRecordRow, AppError> {
        let record = if is_initial {
            // Single initial record per user: refresh it in place.
            sqlx::query_as::<_, AvatarRecordRow>(
                r#"
                INSERT INTO avatar_records (id, user_id, url, is_initial)
                VALUES ($1, $2, $3, TRUE)
                ON CONFLICT (user_id) WHERE is_initial
                DO UPDATE SET url = EXCLUDED.url, created_at = now()
                RETURNING id, user_id, url, is_initial, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, AvatarRecordRow>(
                r#"
                INSERT INTO avatar_records (id, user_id, url, is_initial)
                VALUES ($1, $2, $3, FALSE)
                RETURNING id, user_id, url, is_initial, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(url)
            .fetch_one(&self.pool)
            .await?
        };

        info!("Saved avatar record for user {user_id} (initial: {is_initial})");
        Ok(record)
    }
}

/// Runs a single-row profile UPDATE, mapping a missing row to NotFound.
async fn update_profile_field(
    pool: &PgPool,
    user_id: Uuid,
    query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
) -> Result<(), AppError> {
    let result = query.execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Profile {user_id} not found")));
    }
    Ok(())
}
