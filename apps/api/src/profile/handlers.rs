//! Axum route handlers for profile CRUD and the base-photo upload.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::ctx::RequestContext;
use crate::errors::AppError;
use crate::models::user::UserProfileRow;
use crate::profile::store::ProfileDetails;
use crate::state::AppState;
use crate::storage::base_photo_key;

/// Defaults mirror a fresh demo profile.
#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_goal")]
    pub goal: String,
    #[serde(default = "default_base_description")]
    pub base_description: String,
}

fn default_name() -> String {
    "New User".to_string()
}

fn default_goal() -> String {
    "Achieve something great".to_string()
}

fn default_base_description() -> String {
    "A person with average build".to_string()
}

/// POST /api/v1/profile
pub async fn handle_create_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreateProfileRequest>,
) -> Result<Json<UserProfileRow>, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let profile = state
        .profiles
        .create(ctx.user_id, &req.name, &req.goal, &req.base_description)
        .await?;
    Ok(Json(profile))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<UserProfileRow>, AppError> {
    let profile = state.profiles.fetch(ctx.user_id).await?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub base_description: Option<String>,
}

/// PATCH /api/v1/profile
///
/// Updates the user-editable fields. Score and avatar URL are owned by the
/// pipeline and cannot be set here.
pub async fn handle_update_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfileRow>, AppError> {
    if req.name.is_none() && req.goal.is_none() && req.base_description.is_none() {
        return Err(AppError::Validation(
            "No profile fields to update".to_string(),
        ));
    }
    if matches!(&req.name, Some(n) if n.trim().is_empty()) {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let details = ProfileDetails {
        name: req.name,
        goal: req.goal,
        base_description: req.base_description,
    };
    let profile = state.profiles.update_details(ctx.user_id, &details).await?;
    Ok(Json(profile))
}

/// POST /api/v1/profile/photo
///
/// Multipart upload of the user's base photo. The photo is stored publicly
/// and its URL saved on the profile as the generation reference image.
pub async fn handle_upload_base_photo(
    State(state): State<AppState>,
    ctx: RequestContext,
    mut multipart: Multipart,
) -> Result<Json<UserProfileRow>, AppError> {
    let mut photo: Option<(Bytes, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("photo") {
            let content_type = field.content_type().unwrap_or("image/png").to_string();
            if !content_type.starts_with("image/") {
                return Err(AppError::Validation(format!(
                    "Unsupported content type '{content_type}'"
                )));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read photo field: {e}")))?;
            photo = Some((bytes, content_type));
        }
    }

    let (bytes, content_type) =
        photo.ok_or_else(|| AppError::Validation("Missing 'photo' field".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Photo field is empty".to_string()));
    }

    // Confirm the profile exists before touching storage.
    state.profiles.fetch(ctx.user_id).await?;

    let key = base_photo_key(ctx.user_id, &content_type);
    let url = state.storage.upload_public(bytes, &key, &content_type).await?;
    state.profiles.set_base_photo_url(ctx.user_id, &url).await?;
    info!("Base photo updated for user {}", ctx.user_id);

    let profile = state.profiles.fetch(ctx.user_id).await?;
    Ok(Json(profile))
}
