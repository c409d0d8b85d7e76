//! crates/chapterhouse_core/src/reading_list.rs
//!
//! Per-user bookmarks of stories.

use std::sync::Arc;
use uuid::Uuid;

use crate::authz::{require_identity, DraftVisibility};
use crate::domain::{ReadingListEntry, Story};
use crate::error::{conflict_as_field, CoreError, CoreResult};
use crate::ports::DatabaseService;

#[derive(Clone)]
pub struct ReadingListService {
    db: Arc<dyn DatabaseService>,
    visibility: DraftVisibility,
}

impl ReadingListService {
    pub fn new(db: Arc<dyn DatabaseService>, visibility: DraftVisibility) -> Self {
        Self { db, visibility }
    }

    /// The actor's entries, newest first. Entries whose story has since
    /// become unreadable to the actor are left out.
    pub async fn list(&self, actor: Option<Uuid>) -> CoreResult<Vec<(ReadingListEntry, Story)>> {
        let user_id = require_identity(actor)?;
        let mut entries = self.db.list_reading_list(user_id).await?;
        entries.retain(|(_, story)| self.visibility.can_view(story.status, story.user_id, actor));
        Ok(entries)
    }

    /// Bookmarks the story. Adding it twice is a validation error.
    pub async fn add(&self, actor: Option<Uuid>, story_id: Uuid) -> CoreResult<ReadingListEntry> {
        let user_id = require_identity(actor)?;
        let story = self.db.get_story(story_id).await?;
        if !self.visibility.can_view(story.status, story.user_id, actor) {
            return Err(CoreError::NotFound(format!("Story {}", story_id)));
        }
        self.db
            .add_reading_list_entry(user_id, story.id)
            .await
            .map_err(conflict_as_field("story"))
    }

    /// Removes one of the actor's own entries; returns the story it pointed at.
    /// Someone else's entry reads as not found.
    pub async fn remove(&self, actor: Option<Uuid>, entry_id: Uuid) -> CoreResult<Uuid> {
        let user_id = require_identity(actor)?;
        let entry = self.db.get_reading_list_entry(entry_id).await?;
        if entry.user_id != user_id {
            return Err(CoreError::NotFound(format!("Reading list entry {}", entry_id)));
        }
        self.db.delete_reading_list_entry(entry.id).await?;
        Ok(entry.story_id)
    }
}
