//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chapterhouse_core::domain::{
    Account, Chapter, Comment, Commentable, NewChapter, NewStory, OtpCredential,
    PublicationStatus, ReadingListEntry, Story, WebSession,
};
use chapterhouse_core::ports::{DatabaseService, PortError, PortResult, StoryFilter};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

fn unexpected(e: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return PortError::Conflict(db_err.message().to_string());
        }
    }
    PortError::Unexpected(e.to_string())
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

fn corrupt(column: &str, message: String) -> PortError {
    PortError::Unexpected(format!("Invalid value in column {}: {}", column, message))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const ACCOUNT_COLUMNS: &str =
    "id, email, name, bio, otp_code, otp_sent_at, created_at, updated_at";

#[derive(FromRow)]
struct AccountRecord {
    id: Uuid,
    email: String,
    name: String,
    bio: Option<String>,
    otp_code: Option<String>,
    otp_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AccountRecord {
    fn to_domain(self) -> Account {
        let otp = match (self.otp_code, self.otp_sent_at) {
            (Some(code), Some(issued_at)) => Some(OtpCredential { code, issued_at }),
            _ => None,
        };
        Account {
            id: self.id,
            email: self.email,
            name: self.name,
            bio: self.bio,
            otp,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct WebSessionRecord {
    id: String,
    pending_account_id: Option<Uuid>,
    pending_expires_at: Option<DateTime<Utc>>,
    authenticated_account_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
}
impl WebSessionRecord {
    fn to_domain(self) -> WebSession {
        WebSession {
            id: self.id,
            pending_account_id: self.pending_account_id,
            pending_expires_at: self.pending_expires_at,
            authenticated_account_id: self.authenticated_account_id,
            expires_at: self.expires_at,
        }
    }
}

const STORY_COLUMNS: &str = "id, user_id, title, description, category, language, status, \
     view_count, chapters_count, cover_image_url, created_at, updated_at";

#[derive(FromRow)]
struct StoryRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    category: String,
    language: String,
    status: String,
    view_count: i64,
    chapters_count: i64,
    cover_image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl StoryRecord {
    fn to_domain(self) -> PortResult<Story> {
        Ok(Story {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            category: self.category,
            language: self.language.parse().map_err(|e| corrupt("language", e))?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            view_count: self.view_count,
            chapters_count: self.chapters_count,
            cover_image_url: self.cover_image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const CHAPTER_COLUMNS: &str =
    r#"id, story_id, title, content, "order", status, created_at, updated_at"#;

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    story_id: Uuid,
    title: String,
    content: String,
    order: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ChapterRecord {
    fn to_domain(self) -> PortResult<Chapter> {
        Ok(Chapter {
            id: self.id,
            story_id: self.story_id,
            title: self.title,
            content: self.content,
            order: self.order,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ReadingListRecord {
    id: Uuid,
    user_id: Uuid,
    story_id: Uuid,
    created_at: DateTime<Utc>,
}
impl ReadingListRecord {
    fn to_domain(self) -> ReadingListEntry {
        ReadingListEntry {
            id: self.id,
            user_id: self.user_id,
            story_id: self.story_id,
            created_at: self.created_at,
        }
    }
}

/// A reading-list entry joined with the story it bookmarks.
#[derive(FromRow)]
struct ReadingListStoryRecord {
    entry_id: Uuid,
    entry_user_id: Uuid,
    entry_created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    story: StoryRecord,
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    user_id: Uuid,
    commentable_type: String,
    commentable_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}
impl CommentRecord {
    fn to_domain(self) -> PortResult<Comment> {
        let target = Commentable::from_parts(&self.commentable_type, self.commentable_id)
            .ok_or_else(|| corrupt("commentable_type", self.commentable_type.clone()))?;
        Ok(Comment {
            id: self.id,
            user_id: self.user_id,
            target,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

fn collect<R, T>(records: Vec<R>, f: impl Fn(R) -> PortResult<T>) -> PortResult<Vec<T>> {
    records.into_iter().map(f).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<Account>> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM accounts WHERE email = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(AccountRecord::to_domain))
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Account {}", account_id)))?;
        Ok(record.to_domain())
    }

    async fn create_account(&self, email: &str, name: &str) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "INSERT INTO accounts (id, email, name) VALUES ($1, $2, $3) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
        bio: Option<&str>,
    ) -> PortResult<Account> {
        let record = sqlx::query_as::<_, AccountRecord>(&format!(
            "UPDATE accounts SET name = $2, email = $3, bio = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(name)
        .bind(email)
        .bind(bio)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Account {}", account_id)))?;
        Ok(record.to_domain())
    }

    async fn store_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE accounts SET otp_code = $2, otp_sent_at = $3, updated_at = NOW() WHERE id = $1")
            .bind(account_id)
            .bind(code)
            .bind(issued_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn clear_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET otp_code = NULL, otp_sent_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND otp_code = $2 AND otp_sent_at = $3",
        )
        .bind(account_id)
        .bind(code)
        .bind(issued_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn load_web_session(&self, session_id: &str) -> PortResult<Option<WebSession>> {
        let record = sqlx::query_as::<_, WebSessionRecord>(
            "SELECT id, pending_account_id, pending_expires_at, authenticated_account_id, expires_at \
             FROM web_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(WebSessionRecord::to_domain))
    }

    async fn save_web_session(&self, session: &WebSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO web_sessions \
                 (id, pending_account_id, pending_expires_at, authenticated_account_id, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                 pending_account_id = EXCLUDED.pending_account_id, \
                 pending_expires_at = EXCLUDED.pending_expires_at, \
                 authenticated_account_id = EXCLUDED.authenticated_account_id, \
                 expires_at = EXCLUDED.expires_at",
        )
        .bind(&session.id)
        .bind(session.pending_account_id)
        .bind(session.pending_expires_at)
        .bind(session.authenticated_account_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_web_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM web_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_story(&self, story: NewStory) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "INSERT INTO stories \
                 (id, user_id, title, description, category, language, status, cover_image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            STORY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(story.user_id)
        .bind(&story.title)
        .bind(&story.description)
        .bind(&story.category)
        .bind(story.language.code())
        .bind(story.status.as_str())
        .bind(&story.cover_image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories WHERE id = $1",
            STORY_COLUMNS
        ))
        .bind(story_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Story {}", story_id)))?;
        record.to_domain()
    }

    async fn update_story(&self, story_id: Uuid, story: NewStory) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "UPDATE stories SET title = $2, description = $3, category = $4, language = $5, \
                 status = $6, cover_image_url = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            STORY_COLUMNS
        ))
        .bind(story_id)
        .bind(&story.title)
        .bind(&story.description)
        .bind(&story.category)
        .bind(story.language.code())
        .bind(story.status.as_str())
        .bind(&story.cover_image_url)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Story {}", story_id)))?;
        record.to_domain()
    }

    async fn delete_story(&self, story_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "DELETE FROM comments WHERE commentable_type = 'chapter' \
             AND commentable_id IN (SELECT id FROM chapters WHERE story_id = $1)",
        )
        .bind(story_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query("DELETE FROM comments WHERE commentable_type = 'story' AND commentable_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        sqlx::query("DELETE FROM reading_lists WHERE story_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        sqlx::query("DELETE FROM chapters WHERE story_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Story {}", story_id)));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<Story> {
        let record = sqlx::query_as::<_, StoryRecord>(&format!(
            "UPDATE stories SET view_count = view_count + 1 WHERE id = $1 RETURNING {}",
            STORY_COLUMNS
        ))
        .bind(story_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Story {}", story_id)))?;
        record.to_domain()
    }

    async fn list_published_stories(&self, filter: &StoryFilter) -> PortResult<Vec<Story>> {
        let records = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories \
             WHERE status = 'published' \
               AND ($1::text IS NULL OR category = $1) \
               AND ($2::text IS NULL OR language = $2) \
             ORDER BY created_at DESC LIMIT $3",
            STORY_COLUMNS
        ))
        .bind(&filter.category)
        .bind(&filter.language)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, StoryRecord::to_domain)
    }

    async fn list_stories_by_user(&self, user_id: Uuid) -> PortResult<Vec<Story>> {
        let records = sqlx::query_as::<_, StoryRecord>(&format!(
            "SELECT {} FROM stories WHERE user_id = $1 ORDER BY created_at DESC",
            STORY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, StoryRecord::to_domain)
    }

    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        let records = sqlx::query_as::<_, ChapterRecord>(&format!(
            r#"SELECT {} FROM chapters WHERE story_id = $1 ORDER BY "order" ASC"#,
            CHAPTER_COLUMNS
        ))
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, ChapterRecord::to_domain)
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            "SELECT {} FROM chapters WHERE id = $1",
            CHAPTER_COLUMNS
        ))
        .bind(chapter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Chapter {}", chapter_id)))?;
        record.to_domain()
    }

    async fn insert_chapter(&self, chapter: NewChapter) -> PortResult<Chapter> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // A lost race on (story_id, "order") fails here and rolls back the counter too.
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            r#"INSERT INTO chapters (id, story_id, title, content, "order", status)
               VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}"#,
            CHAPTER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(chapter.story_id)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.order)
        .bind(chapter.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query("UPDATE stories SET chapters_count = chapters_count + 1 WHERE id = $1")
            .bind(chapter.story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_chapter(&self, chapter: &Chapter) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            r#"UPDATE chapters SET title = $2, content = $3, "order" = $4, updated_at = NOW()
               WHERE id = $1 RETURNING {}"#,
            CHAPTER_COLUMNS
        ))
        .bind(chapter.id)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.order)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Chapter {}", chapter.id)))?;
        record.to_domain()
    }

    async fn set_chapter_status(
        &self,
        chapter_id: Uuid,
        status: PublicationStatus,
    ) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            "UPDATE chapters SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CHAPTER_COLUMNS
        ))
        .bind(chapter_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Chapter {}", chapter_id)))?;
        record.to_domain()
    }

    async fn delete_chapter(&self, chapter: &Chapter) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("DELETE FROM comments WHERE commentable_type = 'chapter' AND commentable_id = $1")
            .bind(chapter.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let deleted = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter.id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Chapter {}", chapter.id)));
        }

        sqlx::query("UPDATE stories SET chapters_count = chapters_count - 1 WHERE id = $1")
            .bind(chapter.story_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn add_reading_list_entry(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        let record = sqlx::query_as::<_, ReadingListRecord>(
            "INSERT INTO reading_lists (id, user_id, story_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, story_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(story_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_reading_list_entry(&self, entry_id: Uuid) -> PortResult<ReadingListEntry> {
        let record = sqlx::query_as::<_, ReadingListRecord>(
            "SELECT id, user_id, story_id, created_at FROM reading_lists WHERE id = $1",
        )
        .bind(entry_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Reading list entry {}", entry_id)))?;
        Ok(record.to_domain())
    }

    async fn list_reading_list(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(ReadingListEntry, Story)>> {
        let records = sqlx::query_as::<_, ReadingListStoryRecord>(
            "SELECT rl.id AS entry_id, rl.user_id AS entry_user_id, rl.created_at AS entry_created_at, \
                    s.id, s.user_id, s.title, s.description, s.category, s.language, s.status, \
                    s.view_count, s.chapters_count, s.cover_image_url, s.created_at, s.updated_at \
             FROM reading_lists rl JOIN stories s ON s.id = rl.story_id \
             WHERE rl.user_id = $1 ORDER BY rl.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        collect(records, |record| {
            let entry = ReadingListEntry {
                id: record.entry_id,
                user_id: record.entry_user_id,
                story_id: record.story.id,
                created_at: record.entry_created_at,
            };
            Ok((entry, record.story.to_domain()?))
        })
    }

    async fn delete_reading_list_entry(&self, entry_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM reading_lists WHERE id = $1")
            .bind(entry_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        target: Commentable,
        content: &str,
    ) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            "INSERT INTO comments (id, user_id, commentable_type, commentable_id, content) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, commentable_type, commentable_id, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(target.kind())
        .bind(target.id())
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_comments(&self, target: Commentable) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, user_id, commentable_type, commentable_id, content, created_at \
             FROM comments WHERE commentable_type = $1 AND commentable_id = $2 \
             ORDER BY created_at DESC",
        )
        .bind(target.kind())
        .bind(target.id())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, CommentRecord::to_domain)
    }
}
