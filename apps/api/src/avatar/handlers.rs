//! Axum route handlers for check-ins and avatar history.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::avatar::pipeline::{
    run_initial_avatar, run_timeline_update, TimelineOutcome, TimelineUpdate,
};
use crate::ctx::RequestContext;
use crate::errors::AppError;
use crate::models::avatar::AvatarRecordRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub completed: bool,
}

/// POST /api/v1/checkin
///
/// Full timeline update: log → score → prompt → image → upload → persist.
/// On failure the habit log and score may already be committed; the error
/// body names the failed step so the caller can display a stale avatar.
pub async fn handle_check_in(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CheckInRequest>,
) -> Result<Json<TimelineOutcome>, AppError> {
    let outcome = run_timeline_update(
        state.habits.as_ref(),
        state.profiles.as_ref(),
        state.text_gen.as_ref(),
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        TimelineUpdate {
            user_id: ctx.user_id,
            completed: req.completed,
        },
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /api/v1/avatar/initial
///
/// Generates the baseline avatar before any drift has accumulated. Safe to
/// repeat: the single initial record and its fixed object are refreshed.
pub async fn handle_initial_avatar(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<TimelineOutcome>, AppError> {
    let outcome = run_initial_avatar(
        state.profiles.as_ref(),
        state.text_gen.as_ref(),
        state.image_gen.as_ref(),
        state.storage.as_ref(),
        ctx.user_id,
    )
    .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/avatars
///
/// Append-only history of generated avatars, newest first.
pub async fn handle_avatar_history(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<AvatarRecordRow>>, AppError> {
    let records = sqlx::query_as::<_, AvatarRecordRow>(
        "SELECT id, user_id, url, is_initial, created_at FROM avatar_records WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(ctx.user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(records))
}
