//! services/api/src/web/reading_lists.rs
//!
//! The signed-in reader's saved stories.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentSession;
use crate::web::rest::{MessageResponse, ReadingListItemResponse};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ReadingListAddedResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub message: String,
}

/// GET /reading_lists
#[utoipa::path(
    get,
    path = "/reading_lists",
    responses(
        (status = 200, description = "Saved stories, most recently added first", body = [ReadingListItemResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_reading_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<ReadingListItemResponse>>, ApiError> {
    let items = state.reading_lists.list(session.actor()).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// POST /stories/{id}/reading_list
#[utoipa::path(
    post,
    path = "/stories/{id}/reading_list",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 201, description = "Story saved", body = ReadingListAddedResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such story"),
        (status = 422, description = "Already on the reading list")
    )
)]
pub async fn add_to_reading_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.reading_lists.add(session.actor(), story_id).await?;
    let response = ReadingListAddedResponse {
        id: entry.id,
        story_id: entry.story_id,
        message: "Story added to your reading list.".to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// DELETE /reading_lists/{id}
#[utoipa::path(
    delete,
    path = "/reading_lists/{id}",
    params(("id" = Uuid, Path, description = "Reading list entry id")),
    responses(
        (status = 200, description = "Removed", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such entry on your list")
    )
)]
pub async fn remove_from_reading_list_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.reading_lists.remove(session.actor(), entry_id).await?;
    Ok(Json(MessageResponse::new(
        "Story removed from your reading list.",
    )))
}
