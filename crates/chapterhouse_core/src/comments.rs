//! crates/chapterhouse_core/src/comments.rs
//!
//! Reader comments on stories and chapters.

use std::sync::Arc;
use uuid::Uuid;

use crate::authz::{require_identity, DraftVisibility};
use crate::domain::{Comment, Commentable};
use crate::error::{CoreError, CoreResult};
use crate::ports::DatabaseService;
use crate::validation::{check_length, FieldErrors, COMMENT_MAX_CHARS};

#[derive(Clone)]
pub struct CommentService {
    db: Arc<dyn DatabaseService>,
    visibility: DraftVisibility,
}

impl CommentService {
    pub fn new(db: Arc<dyn DatabaseService>, visibility: DraftVisibility) -> Self {
        Self { db, visibility }
    }

    /// Resolves the target for `viewer`. A chapter outside `story_id`, or a
    /// story or chapter the viewer cannot read, is not found.
    async fn target(
        &self,
        viewer: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> CoreResult<Commentable> {
        let story = self.db.get_story(story_id).await?;
        if !self.visibility.can_view(story.status, story.user_id, viewer) {
            return Err(CoreError::NotFound(format!("Story {}", story_id)));
        }
        match chapter_id {
            None => Ok(Commentable::Story(story.id)),
            Some(chapter_id) => {
                let chapter = self.db.get_chapter(chapter_id).await?;
                if chapter.story_id != story.id
                    || !self.visibility.can_view(chapter.status, story.user_id, viewer)
                {
                    return Err(CoreError::NotFound(format!("Chapter {}", chapter_id)));
                }
                Ok(Commentable::Chapter(chapter.id))
            }
        }
    }

    pub async fn add(
        &self,
        actor: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Option<Uuid>,
        content: &str,
    ) -> CoreResult<Comment> {
        let user_id = require_identity(actor)?;
        let target = self.target(Some(user_id), story_id, chapter_id).await?;

        let mut errors = FieldErrors::new();
        check_length(&mut errors, "content", content, COMMENT_MAX_CHARS);
        errors.into_result()?;

        Ok(self.db.create_comment(user_id, target, content).await?)
    }

    pub async fn list(
        &self,
        viewer: Option<Uuid>,
        story_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> CoreResult<Vec<Comment>> {
        let target = self.target(viewer, story_id, chapter_id).await?;
        Ok(self.db.list_comments(target).await?)
    }
}
