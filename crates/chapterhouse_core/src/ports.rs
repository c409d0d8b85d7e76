//! crates/chapterhouse_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or mailers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Account, Chapter, Comment, Commentable, NewChapter, NewStory, PublicationStatus,
    ReadingListEntry, Story, WebSession,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint in the store rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Filters accepted by the public story index.
#[derive(Debug, Clone, Default)]
pub struct StoryFilter {
    pub category: Option<String>,
    pub language: Option<String>,
    pub limit: i64,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Accounts ---
    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<Account>>;

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account>;

    /// Fails with `Conflict` when the email is already taken.
    async fn create_account(&self, email: &str, name: &str) -> PortResult<Account>;

    async fn update_profile(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
        bio: Option<&str>,
    ) -> PortResult<Account>;

    // --- Passcode credential ---
    async fn store_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Clears the credential only if it is still the one issued at `issued_at`
    /// with `code`. Returns whether this call cleared it.
    async fn clear_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    // --- Browser sessions ---
    async fn load_web_session(&self, session_id: &str) -> PortResult<Option<WebSession>>;

    /// Inserts or replaces the session row.
    async fn save_web_session(&self, session: &WebSession) -> PortResult<()>;

    async fn delete_web_session(&self, session_id: &str) -> PortResult<()>;

    // --- Stories ---
    async fn create_story(&self, story: NewStory) -> PortResult<Story>;

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story>;

    async fn update_story(&self, story_id: Uuid, story: NewStory) -> PortResult<Story>;

    /// Removes the story together with its chapters, reading-list entries and
    /// comments in one transaction.
    async fn delete_story(&self, story_id: Uuid) -> PortResult<()>;

    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<Story>;

    /// Published stories, newest first.
    async fn list_published_stories(&self, filter: &StoryFilter) -> PortResult<Vec<Story>>;

    /// Every story owned by the user, newest first.
    async fn list_stories_by_user(&self, user_id: Uuid) -> PortResult<Vec<Story>>;

    // --- Chapters ---
    /// Chapters of the story in ascending order.
    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>>;

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter>;

    /// Inserts the chapter and bumps the story's chapter counter atomically.
    /// Fails with `Conflict` when the order is already taken in the story.
    async fn insert_chapter(&self, chapter: NewChapter) -> PortResult<Chapter>;

    /// Writes title, content and order. Fails with `Conflict` on an order collision.
    async fn update_chapter(&self, chapter: &Chapter) -> PortResult<Chapter>;

    async fn set_chapter_status(
        &self,
        chapter_id: Uuid,
        status: PublicationStatus,
    ) -> PortResult<Chapter>;

    /// Removes the chapter and its comments and decrements the story's
    /// chapter counter atomically.
    async fn delete_chapter(&self, chapter: &Chapter) -> PortResult<()>;

    // --- Reading lists ---
    /// Fails with `Conflict` when the story is already on the user's list.
    async fn add_reading_list_entry(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<ReadingListEntry>;

    async fn get_reading_list_entry(&self, entry_id: Uuid) -> PortResult<ReadingListEntry>;

    async fn list_reading_list(&self, user_id: Uuid)
        -> PortResult<Vec<(ReadingListEntry, Story)>>;

    async fn delete_reading_list_entry(&self, entry_id: Uuid) -> PortResult<()>;

    // --- Comments ---
    async fn create_comment(
        &self,
        user_id: Uuid,
        target: Commentable,
        content: &str,
    ) -> PortResult<Comment>;

    /// Comments on the target, newest first.
    async fn list_comments(&self, target: Commentable) -> PortResult<Vec<Comment>>;
}

#[async_trait]
pub trait CodeDeliveryService: Send + Sync {
    /// Hands a passcode to the outside world. Best effort: callers do not retry.
    async fn deliver(&self, email: &str, code: &str) -> PortResult<()>;
}

/// Source of the current time, swappable so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
