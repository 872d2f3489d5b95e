use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::ctx::RequestContext;
use crate::errors::AppError;
use crate::habits::scoring::HISTORY_WINDOW_DAYS;
use crate::models::habit::HabitEntryRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

/// GET /api/v1/habits
///
/// Trailing check-in history, newest first. Defaults to the scoring window.
pub async fn handle_habit_history(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HabitEntryRow>>, AppError> {
    let days = params.days.unwrap_or(HISTORY_WINDOW_DAYS as u32).min(365);
    let entries = state.habits.recent_entries(ctx.user_id, days).await?;
    Ok(Json(entries))
}
