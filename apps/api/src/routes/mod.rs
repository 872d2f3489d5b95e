pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::avatar::handlers as avatar_handlers;
use crate::habits::handlers as habit_handlers;
use crate::profile::handlers as profile_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile API
        .route(
            "/api/v1/profile",
            post(profile_handlers::handle_create_profile)
                .get(profile_handlers::handle_get_profile)
                .patch(profile_handlers::handle_update_profile),
        )
        .route(
            "/api/v1/profile/photo",
            post(profile_handlers::handle_upload_base_photo),
        )
        // Check-in pipeline and habit history
        .route("/api/v1/checkin", post(avatar_handlers::handle_check_in))
        .route("/api/v1/habits", get(habit_handlers::handle_habit_history))
        // Avatars
        .route(
            "/api/v1/avatar/initial",
            post(avatar_handlers::handle_initial_avatar),
        )
        .route("/api/v1/avatars", get(avatar_handlers::handle_avatar_history))
        .with_state(state)
}
