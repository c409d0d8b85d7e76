//! services/api/src/web/stories.rs
//!
//! Story endpoints and the author dashboard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chapterhouse_core::{StoryEdit, StoryInput};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentSession;
use crate::web::rest::{
    ChapterSummary, DashboardResponse, MessageResponse, StoryPageResponse, StoryResponse,
};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoryIndexQuery {
    /// Only stories in this category.
    pub category: Option<String>,
    /// Only stories in this language code (`en`, `id`, `ms`).
    pub language: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateStoryRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub language: Option<String>,
    pub status: Option<String>,
    pub cover_image_url: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateStoryRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub cover_image_url: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /dashboard - The signed-in author's recent stories and counts
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let dashboard = state.stories.dashboard(session.actor()).await?;
    Ok(Json(dashboard.into()))
}

/// GET /stories - Newest published stories
#[utoipa::path(
    get,
    path = "/stories",
    params(StoryIndexQuery),
    responses((status = 200, description = "Published stories, newest first", body = [StoryResponse]))
)]
pub async fn list_stories_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StoryIndexQuery>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let stories = state.stories.index(query.category, query.language).await?;
    Ok(Json(stories.into_iter().map(Into::into).collect()))
}

/// GET /stories/mine - Every story the signed-in account wrote
#[utoipa::path(
    get,
    path = "/stories/mine",
    responses(
        (status = 200, description = "The author's stories, newest first", body = [StoryResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn my_stories_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<Vec<StoryResponse>>, ApiError> {
    let stories = state.stories.mine(session.actor()).await?;
    Ok(Json(stories.into_iter().map(Into::into).collect()))
}

/// POST /stories - Start a new story
#[utoipa::path(
    post,
    path = "/stories",
    request_body = CreateStoryRequest,
    responses(
        (status = 201, description = "Story created", body = StoryResponse),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = StoryInput {
        title: req.title,
        description: req.description,
        category: req.category,
        language: req.language,
        status: req.status,
        cover_image_url: req.cover_image_url,
    };
    let story = state.stories.create(session.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(StoryResponse::from(story))))
}

/// GET /stories/{id} - Read a story's page; counts as a view
#[utoipa::path(
    get,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story with its readable chapters", body = StoryPageResponse),
        (status = 404, description = "No such story, or a draft hidden from this viewer")
    )
)]
pub async fn show_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoryPageResponse>, ApiError> {
    let page = state.stories.show(session.actor(), id).await?;
    Ok(Json(StoryPageResponse {
        chapters: page.chapters.iter().map(ChapterSummary::from).collect(),
        story: page.story.into(),
    }))
}

/// PATCH /stories/{id} - Edit a story
#[utoipa::path(
    patch,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    request_body = UpdateStoryRequest,
    responses(
        (status = 200, description = "Story updated", body = StoryResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such story"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStoryRequest>,
) -> Result<Json<StoryResponse>, ApiError> {
    let edit = StoryEdit {
        title: req.title,
        description: req.description,
        category: req.category,
        language: req.language,
        status: req.status,
        cover_image_url: req.cover_image_url,
    };
    let story = state.stories.update(session.actor(), id, edit).await?;
    Ok(Json(story.into()))
}

/// DELETE /stories/{id} - Delete a story with its chapters
#[utoipa::path(
    delete,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story deleted", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not the story's author"),
        (status = 404, description = "No such story")
    )
)]
pub async fn delete_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.stories.destroy(session.actor(), id).await?;
    Ok(Json(MessageResponse::new("Story was successfully deleted.")))
}
