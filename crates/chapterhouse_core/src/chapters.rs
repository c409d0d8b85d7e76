//! crates/chapterhouse_core/src/chapters.rs
//!
//! The chapter sequencer. Keeps every story's chapters uniquely ordered,
//! answers neighbor lookups and owns the draft/published transitions.
//!
//! Orders are positive and unique per story but need not be contiguous, so
//! neighbor search compares values instead of stepping by one.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::authz::{authorize, DraftVisibility};
use crate::domain::{Chapter, NewChapter, PublicationStatus, Story};
use crate::error::{conflict_as_field, CoreError, CoreResult};
use crate::ports::DatabaseService;
use crate::validation::{check_length, FieldErrors, TITLE_MAX_CHARS};

//=========================================================================================
// Inputs and Views
//=========================================================================================

/// Fields submitted when creating a chapter.
#[derive(Debug, Clone, Default)]
pub struct ChapterInput {
    pub title: String,
    pub content: String,
    /// Defaults to one past the story's highest order.
    pub order: Option<i32>,
    /// Raw status value; defaults to draft.
    pub status: Option<String>,
}

/// Content edits. Status is deliberately absent: it only moves through
/// publish and unpublish.
#[derive(Debug, Clone, Default)]
pub struct ChapterEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<i32>,
}

/// A chapter together with its reading neighbors.
#[derive(Debug, Clone)]
pub struct ChapterView {
    pub story: Story,
    pub chapter: Chapter,
    pub previous: Option<Chapter>,
    pub next: Option<Chapter>,
}

//=========================================================================================
// Pure Sequence Rules
//=========================================================================================

/// One past the highest order, or 1 for an empty story. `None` once the
/// highest order is `i32::MAX` and there is no room left at the end.
pub fn next_order_after(chapters: &[Chapter]) -> Option<i32> {
    match chapters.iter().map(|c| c.order).max() {
        None => Some(1),
        Some(max) => max.checked_add(1),
    }
}

fn order_exhausted() -> CoreError {
    CoreError::Validation(FieldErrors::single(
        "order",
        "has no room after the last chapter; choose one explicitly",
    ))
}

/// The chapter with the smallest order strictly greater than `order`.
pub fn next_in(chapters: &[Chapter], order: i32) -> Option<&Chapter> {
    chapters
        .iter()
        .filter(|c| c.order > order)
        .min_by_key(|c| c.order)
}

/// The chapter with the largest order strictly less than `order`.
pub fn previous_in(chapters: &[Chapter], order: i32) -> Option<&Chapter> {
    chapters
        .iter()
        .filter(|c| c.order < order)
        .max_by_key(|c| c.order)
}

fn check_order(errors: &mut FieldErrors, order: i32) {
    if order <= 0 {
        errors.add("order", "must be greater than 0");
    }
}

fn check_order_free(errors: &mut FieldErrors, siblings: &[Chapter], order: i32, except: Option<Uuid>) {
    let taken = siblings
        .iter()
        .any(|c| c.order == order && Some(c.id) != except);
    if taken {
        errors.add("order", "has already been taken");
    }
}

/// Strips markup from a chapter body and collapses whitespace.
pub fn plain_text(content: &str) -> String {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for ch in content.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The first `max_chars` characters of the plain-text body.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let text = plain_text(content);
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

//=========================================================================================
// The Sequencer
//=========================================================================================

#[derive(Clone)]
pub struct ChapterSequencer {
    db: Arc<dyn DatabaseService>,
    visibility: DraftVisibility,
}

impl ChapterSequencer {
    pub fn new(db: Arc<dyn DatabaseService>, visibility: DraftVisibility) -> Self {
        Self { db, visibility }
    }

    /// Advisory order for a new chapter form. The submitted value is what
    /// counts, and it is checked again at commit time.
    pub async fn next_order_value(&self, story_id: Uuid) -> CoreResult<i32> {
        let chapters = self.db.list_chapters(story_id).await?;
        next_order_after(&chapters).ok_or_else(order_exhausted)
    }

    /// Form data for a new chapter. Only the owner may ask.
    pub async fn new_chapter_order(&self, actor: Option<Uuid>, story_id: Uuid) -> CoreResult<i32> {
        let story = self.db.get_story(story_id).await?;
        authorize(actor, story.user_id)?;
        self.next_order_value(story_id).await
    }

    pub async fn create(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        input: ChapterInput,
    ) -> CoreResult<Chapter> {
        let story = self.db.get_story(story_id).await?;
        authorize(actor, story.user_id)?;

        let order = match input.order {
            Some(order) => order,
            None => self.next_order_value(story_id).await?,
        };

        let mut errors = FieldErrors::new();
        check_length(&mut errors, "title", &input.title, TITLE_MAX_CHARS);
        check_order(&mut errors, order);
        let status = match input.status.as_deref() {
            None => PublicationStatus::Draft,
            Some(raw) => raw.parse::<PublicationStatus>().unwrap_or_else(|message: String| {
                errors.add("status", message);
                PublicationStatus::Draft
            }),
        };
        let siblings = self.db.list_chapters(story_id).await?;
        check_order_free(&mut errors, &siblings, order, None);
        errors.into_result()?;

        let chapter = self
            .db
            .insert_chapter(NewChapter {
                story_id,
                title: input.title,
                content: input.content,
                order,
                status,
            })
            .await
            .map_err(conflict_as_field("order"))?;
        info!("Created chapter {} at order {} in story {}", chapter.id, order, story_id);
        Ok(chapter)
    }

    pub async fn update(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
        edit: ChapterEdit,
    ) -> CoreResult<Chapter> {
        let (_, mut chapter) = self.owned_chapter(actor, story_id, chapter_id).await?;

        if let Some(title) = edit.title {
            chapter.title = title;
        }
        if let Some(content) = edit.content {
            chapter.content = content;
        }

        let mut errors = FieldErrors::new();
        check_length(&mut errors, "title", &chapter.title, TITLE_MAX_CHARS);
        if let Some(order) = edit.order.filter(|order| *order != chapter.order) {
            check_order(&mut errors, order);
            let siblings = self.db.list_chapters(story_id).await?;
            check_order_free(&mut errors, &siblings, order, Some(chapter.id));
            chapter.order = order;
        }
        errors.into_result()?;

        self.db
            .update_chapter(&chapter)
            .await
            .map_err(conflict_as_field("order"))
    }

    pub async fn publish(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
    ) -> CoreResult<Chapter> {
        self.transition(actor, story_id, chapter_id, PublicationStatus::Published)
            .await
    }

    pub async fn unpublish(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
    ) -> CoreResult<Chapter> {
        self.transition(actor, story_id, chapter_id, PublicationStatus::Draft)
            .await
    }

    pub async fn destroy(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
    ) -> CoreResult<()> {
        let (_, chapter) = self.owned_chapter(actor, story_id, chapter_id).await?;
        self.db.delete_chapter(&chapter).await?;
        info!("Deleted chapter {} from story {}", chapter.id, story_id);
        Ok(())
    }

    /// The story's chapters the viewer may read, in ascending order.
    pub async fn list(&self, viewer: Option<Uuid>, story_id: Uuid) -> CoreResult<Vec<Chapter>> {
        let story = self.visible_story(viewer, story_id).await?;
        self.visible_chapters(viewer, &story).await
    }

    /// A readable chapter with its neighbors among the readable chapters.
    pub async fn show(
        &self,
        viewer: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
    ) -> CoreResult<ChapterView> {
        let story = self.visible_story(viewer, story_id).await?;
        let chapters = self.visible_chapters(viewer, &story).await?;
        let chapter = chapters
            .iter()
            .find(|c| c.id == chapter_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Chapter {}", chapter_id)))?;

        Ok(ChapterView {
            previous: previous_in(&chapters, chapter.order).cloned(),
            next: next_in(&chapters, chapter.order).cloned(),
            story,
            chapter,
        })
    }

    pub async fn next_chapter(&self, chapter: &Chapter) -> CoreResult<Option<Chapter>> {
        let chapters = self.db.list_chapters(chapter.story_id).await?;
        Ok(next_in(&chapters, chapter.order).cloned())
    }

    pub async fn previous_chapter(&self, chapter: &Chapter) -> CoreResult<Option<Chapter>> {
        let chapters = self.db.list_chapters(chapter.story_id).await?;
        Ok(previous_in(&chapters, chapter.order).cloned())
    }

    async fn transition(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
        status: PublicationStatus,
    ) -> CoreResult<Chapter> {
        let (_, chapter) = self.owned_chapter(actor, story_id, chapter_id).await?;
        if chapter.status == status {
            return Ok(chapter);
        }
        let chapter = self.db.set_chapter_status(chapter.id, status).await?;
        info!("Chapter {} is now {}", chapter.id, status);
        Ok(chapter)
    }

    /// Loads the story and chapter, then checks the actor owns the story.
    async fn owned_chapter(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Uuid,
    ) -> CoreResult<(Story, Chapter)> {
        let story = self.db.get_story(story_id).await?;
        let chapter = self.db.get_chapter(chapter_id).await?;
        if chapter.story_id != story.id {
            return Err(CoreError::NotFound(format!("Chapter {}", chapter_id)));
        }
        authorize(actor, story.user_id)?;
        Ok((story, chapter))
    }

    async fn visible_story(&self, viewer: Option<Uuid>, story_id: Uuid) -> CoreResult<Story> {
        let story = self.db.get_story(story_id).await?;
        if !self.visibility.can_view(story.status, story.user_id, viewer) {
            return Err(CoreError::NotFound(format!("Story {}", story_id)));
        }
        Ok(story)
    }

    async fn visible_chapters(&self, viewer: Option<Uuid>, story: &Story) -> CoreResult<Vec<Chapter>> {
        let mut chapters = self.db.list_chapters(story.id).await?;
        chapters.retain(|c| self.visibility.can_view(c.status, story.user_id, viewer));
        chapters.sort_by_key(|c| c.order);
        Ok(chapters)
    }
}
