//! services/api/src/web/accounts.rs
//!
//! The signed-in account's own profile.

use axum::{extract::State, Extension, Json};
use chapterhouse_core::ProfileEdit;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::CurrentSession;
use crate::web::rest::AccountResponse;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

/// GET /user - The signed-in account
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn show_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state.profiles.current(session.actor()).await?;
    Ok(Json(account.into()))
}

/// PATCH /user - Update name, email or bio
#[utoipa::path(
    patch,
    path = "/user",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = AccountResponse),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let edit = ProfileEdit {
        name: req.name,
        email: req.email,
        bio: req.bio,
    };
    let account = state.profiles.update(session.actor(), edit).await?;
    Ok(Json(account.into()))
}
