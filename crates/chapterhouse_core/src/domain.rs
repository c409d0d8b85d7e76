//! crates/chapterhouse_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Enumerated Values
//=========================================================================================

/// Publication state shared by stories and chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PublicationStatus::Draft),
            "published" => Ok(PublicationStatus::Published),
            other => Err(format!("{} is not a valid status", other)),
        }
    }
}

/// The languages a story can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Id,
    Ms,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Id, Language::Ms];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Id => "id",
            Language::Ms => "ms",
        }
    }

    /// Human readable name shown next to a story.
    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Id => "Bahasa Indonesia",
            Language::Ms => "Bahasa Melayu",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| format!("{} is not a supported language", s))
    }
}

//=========================================================================================
// Accounts and Sessions
//=========================================================================================

/// An outstanding one-time passcode. Both halves are always present together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCredential {
    pub code: String,
    pub issued_at: DateTime<Utc>,
}

/// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub bio: Option<String>,
    pub otp: Option<OtpCredential>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity slots of a single browser session, passed explicitly into
/// every request handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Account awaiting passcode verification.
    pub pending_account_id: Option<Uuid>,
    /// Account the session is signed in as.
    pub authenticated_account_id: Option<Uuid>,
}

/// Represents a browser session as persisted by the session store.
#[derive(Debug, Clone)]
pub struct WebSession {
    pub id: String,
    pub pending_account_id: Option<Uuid>,
    pub pending_expires_at: Option<DateTime<Utc>>,
    pub authenticated_account_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

impl WebSession {
    /// Projects the stored slots onto a request context, dropping a pending
    /// reference whose own lifetime has run out.
    pub fn context_at(&self, now: DateTime<Utc>) -> SessionContext {
        let pending_alive = self.pending_expires_at.map_or(false, |at| at > now);
        SessionContext {
            pending_account_id: self.pending_account_id.filter(|_| pending_alive),
            authenticated_account_id: self.authenticated_account_id,
        }
    }
}

//=========================================================================================
// Stories and Chapters
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Story {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub language: Language,
    pub status: PublicationStatus,
    pub view_count: i64,
    pub chapters_count: i64,
    /// Locator handed out by the attachment store, if a cover was uploaded.
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub fn has_cover_image(&self) -> bool {
        self.cover_image_url.is_some()
    }
}

/// Story fields accepted on create and update.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub language: Language,
    pub status: PublicationStatus,
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: Uuid,
    pub story_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: i32,
    pub status: PublicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChapter {
    pub story_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: i32,
    pub status: PublicationStatus,
}

//=========================================================================================
// Reading Lists and Comments
//=========================================================================================

/// A bookmark of a story by a user.
#[derive(Debug, Clone)]
pub struct ReadingListEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// What a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commentable {
    Story(Uuid),
    Chapter(Uuid),
}

impl Commentable {
    pub fn kind(&self) -> &'static str {
        match self {
            Commentable::Story(_) => "story",
            Commentable::Chapter(_) => "chapter",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Commentable::Story(id) | Commentable::Chapter(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind {
            "story" => Some(Commentable::Story(id)),
            "chapter" => Some(Commentable::Chapter(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: Commentable,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn language_codes_round_trip_through_from_str() {
        for lang in Language::ALL {
            assert_eq!(lang.code().parse::<Language>(), Ok(lang));
        }
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::Id.name(), "Bahasa Indonesia");
    }

    #[test]
    fn unknown_status_is_rejected_with_message() {
        let err = "archived".parse::<PublicationStatus>().unwrap_err();
        assert_eq!(err, "archived is not a valid status");
    }

    #[test]
    fn expired_pending_slot_is_dropped_from_context() {
        let now = Utc::now();
        let account = Uuid::new_v4();
        let mut session = WebSession {
            id: "abc".to_string(),
            pending_account_id: Some(account),
            pending_expires_at: Some(now + Duration::minutes(5)),
            authenticated_account_id: None,
            expires_at: now + Duration::days(30),
        };
        assert_eq!(session.context_at(now).pending_account_id, Some(account));

        session.pending_expires_at = Some(now - Duration::seconds(1));
        assert_eq!(session.context_at(now).pending_account_id, None);
    }
}
