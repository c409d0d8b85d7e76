//! crates/chapterhouse_core/src/stories.rs
//!
//! Story lifecycle: browsing, authoring and the author dashboard.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::authz::{authorize, require_identity, DraftVisibility};
use crate::domain::{Chapter, Language, NewStory, PublicationStatus, Story};
use crate::error::{CoreError, CoreResult};
use crate::ports::{DatabaseService, StoryFilter};
use crate::validation::{check_length, check_present, FieldErrors, TITLE_MAX_CHARS};

/// How many stories the public index shows.
pub const INDEX_LIMIT: i64 = 20;
/// How many recent stories the dashboard shows.
pub const DASHBOARD_RECENT: usize = 10;

/// Raw story fields as submitted by an author.
#[derive(Debug, Clone, Default)]
pub struct StoryInput {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Language code; defaults to `en`.
    pub language: Option<String>,
    /// Defaults to draft.
    pub status: Option<String>,
    pub cover_image_url: Option<String>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct StoryEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoryPage {
    pub story: Story,
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub recent: Vec<Story>,
    pub total_stories: usize,
    pub published_stories: usize,
    pub draft_stories: usize,
}

fn build_story(user_id: Uuid, input: StoryInput) -> Result<NewStory, FieldErrors> {
    let mut errors = FieldErrors::new();
    check_length(&mut errors, "title", &input.title, TITLE_MAX_CHARS);
    check_present(&mut errors, "category", &input.category);

    let language = match input.language.as_deref() {
        None => Language::default(),
        Some(code) => code.parse::<Language>().unwrap_or_else(|message: String| {
            errors.add("language", message);
            Language::default()
        }),
    };
    let status = match input.status.as_deref() {
        None => PublicationStatus::default(),
        Some(raw) => raw.parse::<PublicationStatus>().unwrap_or_else(|message: String| {
            errors.add("status", message);
            PublicationStatus::default()
        }),
    };
    errors.into_result()?;

    Ok(NewStory {
        user_id,
        title: input.title,
        description: input.description,
        category: input.category,
        language,
        status,
        cover_image_url: input.cover_image_url.filter(|url| !url.trim().is_empty()),
    })
}

#[derive(Clone)]
pub struct StoryService {
    db: Arc<dyn DatabaseService>,
    visibility: DraftVisibility,
}

impl StoryService {
    pub fn new(db: Arc<dyn DatabaseService>, visibility: DraftVisibility) -> Self {
        Self { db, visibility }
    }

    /// Newest published stories, optionally narrowed by category and language.
    pub async fn index(
        &self,
        category: Option<String>,
        language: Option<String>,
    ) -> CoreResult<Vec<Story>> {
        let filter = StoryFilter {
            category: category.filter(|c| !c.is_empty()),
            language: language.filter(|l| !l.is_empty()),
            limit: INDEX_LIMIT,
        };
        Ok(self.db.list_published_stories(&filter).await?)
    }

    pub async fn mine(&self, actor: Option<Uuid>) -> CoreResult<Vec<Story>> {
        let user_id = require_identity(actor)?;
        Ok(self.db.list_stories_by_user(user_id).await?)
    }

    /// Counts the visit and returns the story with its readable chapters.
    pub async fn show(&self, viewer: Option<Uuid>, story_id: Uuid) -> CoreResult<StoryPage> {
        let story = self.db.get_story(story_id).await?;
        if !self.visibility.can_view(story.status, story.user_id, viewer) {
            return Err(CoreError::NotFound(format!("Story {}", story_id)));
        }
        let story = self.db.increment_story_views(story.id).await?;

        let mut chapters = self.db.list_chapters(story.id).await?;
        chapters.retain(|c| self.visibility.can_view(c.status, story.user_id, viewer));
        chapters.sort_by_key(|c| c.order);
        Ok(StoryPage { story, chapters })
    }

    pub async fn create(&self, actor: Option<Uuid>, input: StoryInput) -> CoreResult<Story> {
        let user_id = require_identity(actor)?;
        let new_story = build_story(user_id, input)?;
        let story = self.db.create_story(new_story).await?;
        info!("Account {} created story {}", user_id, story.id);
        Ok(story)
    }

    pub async fn update(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        edit: StoryEdit,
    ) -> CoreResult<Story> {
        let story = self.db.get_story(story_id).await?;
        authorize(actor, story.user_id)?;

        let merged = StoryInput {
            title: edit.title.unwrap_or(story.title),
            description: edit.description.unwrap_or(story.description),
            category: edit.category.unwrap_or(story.category),
            language: Some(edit.language.unwrap_or_else(|| story.language.code().to_string())),
            status: Some(edit.status.unwrap_or_else(|| story.status.as_str().to_string())),
            cover_image_url: edit.cover_image_url.or(story.cover_image_url),
        };
        let changes = build_story(story.user_id, merged)?;
        Ok(self.db.update_story(story_id, changes).await?)
    }

    /// Deletes the story with everything hanging off it.
    pub async fn destroy(&self, actor: Option<Uuid>, story_id: Uuid) -> CoreResult<()> {
        let story = self.db.get_story(story_id).await?;
        authorize(actor, story.user_id)?;
        self.db.delete_story(story.id).await?;
        info!("Deleted story {} and its chapters", story.id);
        Ok(())
    }

    pub async fn dashboard(&self, actor: Option<Uuid>) -> CoreResult<Dashboard> {
        let user_id = require_identity(actor)?;
        let mut stories = self.db.list_stories_by_user(user_id).await?;

        let total_stories = stories.len();
        let published_stories = stories
            .iter()
            .filter(|s| s.status == PublicationStatus::Published)
            .count();

        stories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        stories.truncate(DASHBOARD_RECENT);

        Ok(Dashboard {
            recent: stories,
            total_stories,
            published_stories,
            draft_stories: total_stories - published_stories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> StoryInput {
        StoryInput {
            title: "The Long Road".to_string(),
            description: "A journey.".to_string(),
            category: "Adventure".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_to_english_draft() {
        let story = build_story(Uuid::new_v4(), input()).unwrap();
        assert_eq!(story.language, Language::En);
        assert_eq!(story.status, PublicationStatus::Draft);
    }

    #[test]
    fn rejects_unknown_language_and_blank_category() {
        let errors = build_story(
            Uuid::new_v4(),
            StoryInput {
                category: " ".to_string(),
                language: Some("fr".to_string()),
                ..input()
            },
        )
        .unwrap_err();
        assert_eq!(errors.get("category").unwrap(), ["can't be blank"]);
        assert_eq!(errors.get("language").unwrap(), ["fr is not a supported language"]);
    }

    #[test]
    fn blank_cover_locator_is_dropped() {
        let story = build_story(
            Uuid::new_v4(),
            StoryInput {
                cover_image_url: Some("".to_string()),
                ..input()
            },
        )
        .unwrap();
        assert!(story.cover_image_url.is_none());
    }
}
