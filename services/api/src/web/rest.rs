//! services/api/src/web/rest.rs
//!
//! Contains the REST response payloads shared by the handlers, the health
//! endpoint, and the master definition for the OpenAPI specification.

use axum::{http::StatusCode, response::IntoResponse, Json};
use chapterhouse_core::chapters::excerpt;
use chapterhouse_core::{Account, Chapter, Comment, Dashboard, ReadingListEntry, Story};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{accounts, auth, chapters, comments, reading_lists, stories};

const EXCERPT_CHARS: usize = 200;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::request_code_handler,
        auth::validate_code_handler,
        auth::resend_code_handler,
        auth::sign_out_handler,
        accounts::show_profile_handler,
        accounts::update_profile_handler,
        stories::dashboard_handler,
        stories::list_stories_handler,
        stories::my_stories_handler,
        stories::create_story_handler,
        stories::show_story_handler,
        stories::update_story_handler,
        stories::delete_story_handler,
        chapters::new_chapter_handler,
        chapters::create_chapter_handler,
        chapters::show_chapter_handler,
        chapters::update_chapter_handler,
        chapters::delete_chapter_handler,
        chapters::publish_chapter_handler,
        chapters::unpublish_chapter_handler,
        comments::list_story_comments_handler,
        comments::create_story_comment_handler,
        comments::list_chapter_comments_handler,
        comments::create_chapter_comment_handler,
        reading_lists::list_reading_list_handler,
        reading_lists::add_to_reading_list_handler,
        reading_lists::remove_from_reading_list_handler,
    ),
    components(
        schemas(
            MessageResponse,
            AccountResponse,
            StoryResponse,
            StoryPageResponse,
            ChapterResponse,
            ChapterSummary,
            ChapterPageResponse,
            DashboardResponse,
            ReadingListItemResponse,
            CommentResponse,
        )
    ),
    tags(
        (name = "Chapterhouse API", description = "Serialized fiction publishing: stories, chapters and passcode sign-in.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            bio: account.bio,
            created_at: account.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StoryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub language: String,
    pub language_name: String,
    pub status: String,
    pub view_count: i64,
    pub chapters_count: i64,
    pub cover_image_url: Option<String>,
    pub has_cover_image: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StoryResponse {
    fn from(story: Story) -> Self {
        Self {
            has_cover_image: story.has_cover_image(),
            language: story.language.code().to_string(),
            language_name: story.language.name().to_string(),
            status: story.status.to_string(),
            id: story.id,
            user_id: story.user_id,
            title: story.title,
            description: story.description,
            category: story.category,
            view_count: story.view_count,
            chapters_count: story.chapters_count,
            cover_image_url: story.cover_image_url,
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

/// A chapter as listed in a story's table of contents.
#[derive(Serialize, ToSchema)]
pub struct ChapterSummary {
    pub id: Uuid,
    pub title: String,
    pub order: i32,
    pub status: String,
    pub excerpt: String,
}

impl From<&Chapter> for ChapterSummary {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title.clone(),
            order: chapter.order,
            status: chapter.status.to_string(),
            excerpt: excerpt(&chapter.content, EXCERPT_CHARS),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    pub id: Uuid,
    pub story_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            status: chapter.status.to_string(),
            id: chapter.id,
            story_id: chapter.story_id,
            title: chapter.title,
            content: chapter.content,
            order: chapter.order,
            created_at: chapter.created_at,
            updated_at: chapter.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StoryPageResponse {
    pub story: StoryResponse,
    pub chapters: Vec<ChapterSummary>,
}

/// A chapter being read, with links to its neighbors.
#[derive(Serialize, ToSchema)]
pub struct ChapterPageResponse {
    pub story: StoryResponse,
    pub chapter: ChapterResponse,
    pub previous: Option<ChapterSummary>,
    pub next: Option<ChapterSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub recent_stories: Vec<StoryResponse>,
    pub total_stories: usize,
    pub published_stories: usize,
    pub draft_stories: usize,
}

impl From<Dashboard> for DashboardResponse {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            recent_stories: dashboard.recent.into_iter().map(Into::into).collect(),
            total_stories: dashboard.total_stories,
            published_stories: dashboard.published_stories,
            draft_stories: dashboard.draft_stories,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReadingListItemResponse {
    pub id: Uuid,
    pub added_at: DateTime<Utc>,
    pub story: StoryResponse,
}

impl From<(ReadingListEntry, Story)> for ReadingListItemResponse {
    fn from((entry, story): (ReadingListEntry, Story)) -> Self {
        Self {
            id: entry.id,
            added_at: entry.created_at,
            story: story.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub commentable_type: String,
    pub commentable_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            user_id: comment.user_id,
            commentable_type: comment.target.kind().to_string(),
            commentable_id: comment.target.id(),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

//=========================================================================================
// Health
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/up",
    responses((status = 200, description = "The service is running"))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapterhouse_core::{Language, PublicationStatus};

    #[test]
    fn story_response_carries_derived_fields() {
        let now = Utc::now();
        let story = Story {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Tides".to_string(),
            description: "A harbour town".to_string(),
            category: "fantasy".to_string(),
            language: Language::Id,
            status: PublicationStatus::Published,
            view_count: 3,
            chapters_count: 2,
            cover_image_url: None,
            created_at: now,
            updated_at: now,
        };

        let response = StoryResponse::from(story);
        assert_eq!(response.language, "id");
        assert_eq!(response.language_name, "Bahasa Indonesia");
        assert_eq!(response.status, "published");
        assert!(!response.has_cover_image);
    }

    #[test]
    fn openapi_document_lists_the_chapter_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/stories/{id}/chapters/{chapter_id}/publish"));
        assert!(doc.paths.paths.contains_key("/session/validate_otp"));
    }
}
