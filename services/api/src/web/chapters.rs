//! services/api/src/web/chapters.rs
//!
//! Chapter endpoints. Path parameters are `{id}` for the story and
//! `{chapter_id}` for the chapter within it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chapterhouse_core::{ChapterEdit, ChapterInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentSession;
use crate::web::rest::{ChapterPageResponse, ChapterResponse, ChapterSummary, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateChapterRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Defaults to one past the highest existing order.
    pub order: Option<i32>,
    /// `draft` (default) or `published`.
    pub status: Option<String>,
}

/// Partial edit; also the editor's autosave payload.
#[derive(Deserialize, ToSchema)]
pub struct UpdateChapterRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<i32>,
}

#[derive(Serialize, ToSchema)]
pub struct NewChapterResponse {
    pub story_id: Uuid,
    pub order: i32,
}

#[derive(Serialize, ToSchema)]
pub struct AutosaveResponse {
    pub status: String,
    pub message: String,
    pub chapter: ChapterResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /stories/{id}/chapters/new - Defaults for the new-chapter form
#[utoipa::path(
    get,
    path = "/stories/{id}/chapters/new",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Suggested order for the next chapter", body = NewChapterResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such story")
    )
)]
pub async fn new_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
) -> Result<Json<NewChapterResponse>, ApiError> {
    let order = state
        .chapters
        .new_chapter_order(session.actor(), story_id)
        .await?;
    Ok(Json(NewChapterResponse { story_id, order }))
}

/// POST /stories/{id}/chapters - Add a chapter
#[utoipa::path(
    post,
    path = "/stories/{id}/chapters",
    params(("id" = Uuid, Path, description = "Story id")),
    request_body = CreateChapterRequest,
    responses(
        (status = 201, description = "Chapter created", body = ChapterResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such story"),
        (status = 422, description = "Validation failed, e.g. the order is taken")
    )
)]
pub async fn create_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
    Json(req): Json<CreateChapterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = ChapterInput {
        title: req.title,
        content: req.content,
        order: req.order,
        status: req.status,
    };
    let chapter = state
        .chapters
        .create(session.actor(), story_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ChapterResponse::from(chapter))))
}

/// GET /stories/{id}/chapters/{chapter_id} - Read a chapter
#[utoipa::path(
    get,
    path = "/stories/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter with previous/next links", body = ChapterPageResponse),
        (status = 404, description = "No such chapter, or hidden from this viewer")
    )
)]
pub async fn show_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChapterPageResponse>, ApiError> {
    let view = state
        .chapters
        .show(session.actor(), story_id, chapter_id)
        .await?;
    Ok(Json(ChapterPageResponse {
        previous: view.previous.as_ref().map(ChapterSummary::from),
        next: view.next.as_ref().map(ChapterSummary::from),
        story: view.story.into(),
        chapter: view.chapter.into(),
    }))
}

/// PATCH /stories/{id}/chapters/{chapter_id} - Edit or autosave a chapter
#[utoipa::path(
    patch,
    path = "/stories/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    request_body = UpdateChapterRequest,
    responses(
        (status = 200, description = "Saved", body = AutosaveResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such chapter"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateChapterRequest>,
) -> Result<Json<AutosaveResponse>, ApiError> {
    let edit = ChapterEdit {
        title: req.title,
        content: req.content,
        order: req.order,
    };
    let chapter = state
        .chapters
        .update(session.actor(), story_id, chapter_id, edit)
        .await?;
    Ok(Json(AutosaveResponse {
        status: "success".to_string(),
        message: "Auto-saved successfully".to_string(),
        chapter: chapter.into(),
    }))
}

/// DELETE /stories/{id}/chapters/{chapter_id} - Remove a chapter
#[utoipa::path(
    delete,
    path = "/stories/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter deleted", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn delete_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .chapters
        .destroy(session.actor(), story_id, chapter_id)
        .await?;
    Ok(Json(MessageResponse::new("Chapter was successfully deleted.")))
}

/// PATCH /stories/{id}/chapters/{chapter_id}/publish - Make a chapter readable
#[utoipa::path(
    patch,
    path = "/stories/{id}/chapters/{chapter_id}/publish",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter published", body = ChapterResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn publish_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChapterResponse>, ApiError> {
    let chapter = state
        .chapters
        .publish(session.actor(), story_id, chapter_id)
        .await?;
    Ok(Json(chapter.into()))
}

/// PATCH /stories/{id}/chapters/{chapter_id}/unpublish - Return a chapter to draft
#[utoipa::path(
    patch,
    path = "/stories/{id}/chapters/{chapter_id}/unpublish",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter back in draft", body = ChapterResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn unpublish_chapter_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ChapterResponse>, ApiError> {
    let chapter = state
        .chapters
        .unpublish(session.actor(), story_id, chapter_id)
        .await?;
    Ok(Json(chapter.into()))
}
