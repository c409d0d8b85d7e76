//! services/api/src/web/comments.rs
//!
//! Reader comments on stories and chapters.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentSession;
use crate::web::rest::CommentResponse;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
}

async fn list(
    state: &AppState,
    session: &CurrentSession,
    story_id: Uuid,
    chapter_id: Option<Uuid>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    let comments = state
        .comments
        .list(session.actor(), story_id, chapter_id)
        .await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

async fn create(
    state: &AppState,
    session: &CurrentSession,
    story_id: Uuid,
    chapter_id: Option<Uuid>,
    content: &str,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state
        .comments
        .add(session.actor(), story_id, chapter_id, content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// GET /stories/{id}/comments
#[utoipa::path(
    get,
    path = "/stories/{id}/comments",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Comments on the story, newest first", body = [CommentResponse]),
        (status = 404, description = "No such story")
    )
)]
pub async fn list_story_comments_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    list(&state, &session, story_id, None).await
}

/// POST /stories/{id}/comments
#[utoipa::path(
    post,
    path = "/stories/{id}/comments",
    params(("id" = Uuid, Path, description = "Story id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = CommentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such story"),
        (status = 422, description = "Empty or too long")
    )
)]
pub async fn create_story_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(story_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create(&state, &session, story_id, None, &req.content).await
}

/// GET /stories/{id}/chapters/{chapter_id}/comments
#[utoipa::path(
    get,
    path = "/stories/{id}/chapters/{chapter_id}/comments",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Comments on the chapter, newest first", body = [CommentResponse]),
        (status = 404, description = "No such chapter in this story")
    )
)]
pub async fn list_chapter_comments_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    list(&state, &session, story_id, Some(chapter_id)).await
}

/// POST /stories/{id}/chapters/{chapter_id}/comments
#[utoipa::path(
    post,
    path = "/stories/{id}/chapters/{chapter_id}/comments",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = CommentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such chapter in this story"),
        (status = 422, description = "Empty or too long")
    )
)]
pub async fn create_chapter_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path((story_id, chapter_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create(&state, &session, story_id, Some(chapter_id), &req.content).await
}
