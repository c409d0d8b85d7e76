//! services/api/src/testing/mod.rs
//!
//! In-process stand-ins for the service ports, used by the integration tests
//! to drive the core services and the router without Postgres or SMTP.

use async_trait::async_trait;
use chapterhouse_core::domain::{
    Account, Chapter, Comment, Commentable, NewChapter, NewStory, OtpCredential,
    PublicationStatus, ReadingListEntry, Story, WebSession,
};
use chapterhouse_core::ports::{
    Clock, CodeDeliveryService, DatabaseService, PortError, PortResult, StoryFilter,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

//=========================================================================================
// Clock
//=========================================================================================

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// A fixed, readable starting instant.
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

//=========================================================================================
// Code Delivery
//=========================================================================================

/// Remembers every passcode handed to it instead of sending mail.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<(String, String)>>,
    failing: bool,
}

impl RecordingDelivery {
    /// A transport whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            failing: true,
        }
    }

    /// The most recent code sent to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CodeDeliveryService for RecordingDelivery {
    async fn deliver(&self, email: &str, code: &str) -> PortResult<()> {
        if self.failing {
            return Err(PortError::Unexpected("mail transport unavailable".to_string()));
        }
        self.store()?.push((email.to_string(), code.to_string()));
        Ok(())
    }
}

impl RecordingDelivery {
    fn store(&self) -> PortResult<MutexGuard<'_, Vec<(String, String)>>> {
        self.sent
            .lock()
            .map_err(|_| PortError::Unexpected("delivery log poisoned".to_string()))
    }
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Store {
    accounts: Vec<Account>,
    sessions: Vec<WebSession>,
    stories: Vec<Story>,
    chapters: Vec<Chapter>,
    reading_lists: Vec<ReadingListEntry>,
    comments: Vec<Comment>,
}

impl Store {
    fn account_mut(&mut self, id: Uuid) -> PortResult<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Account {}", id)))
    }

    fn story_mut(&mut self, id: Uuid) -> PortResult<&mut Story> {
        self.stories
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Story {}", id)))
    }

    fn chapter_mut(&mut self, id: Uuid) -> PortResult<&mut Chapter> {
        self.chapters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Chapter {}", id)))
    }

    fn order_taken(&self, story_id: Uuid, order: i32, except: Option<Uuid>) -> bool {
        self.chapters
            .iter()
            .any(|c| c.story_id == story_id && c.order == order && Some(c.id) != except)
    }
}

/// Newest first; later insertions win ties.
fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted: Vec<T> = items.iter().rev().cloned().collect();
    sorted.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    sorted
}

/// A `DatabaseService` over plain vectors with the same uniqueness rules,
/// counters and cascades as the Postgres schema.
pub struct InMemoryDatabase {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDatabase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::default(),
            clock,
        }
    }

    fn store(&self) -> PortResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| PortError::Unexpected("store poisoned".to_string()))
    }

    /// Writes a raw credential, for setting up expiry scenarios directly.
    pub fn put_otp(&self, account_id: Uuid, credential: OtpCredential) -> PortResult<()> {
        self.store()?.account_mut(account_id)?.otp = Some(credential);
        Ok(())
    }

    pub fn comment_count(&self) -> usize {
        self.store.lock().map(|s| s.comments.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<Account>> {
        Ok(self
            .store()?
            .accounts
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        Ok(self.store()?.account_mut(account_id)?.clone())
    }

    async fn create_account(&self, email: &str, name: &str) -> PortResult<Account> {
        let now = self.clock.now();
        let mut store = self.store()?;
        if store.accounts.iter().any(|a| a.email == email) {
            return Err(PortError::Conflict(format!("email {} is taken", email)));
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            bio: None,
            otp: None,
            created_at: now,
            updated_at: now,
        };
        store.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
        bio: Option<&str>,
    ) -> PortResult<Account> {
        let now = self.clock.now();
        let mut store = self.store()?;
        if store
            .accounts
            .iter()
            .any(|a| a.email == email && a.id != account_id)
        {
            return Err(PortError::Conflict(format!("email {} is taken", email)));
        }
        let account = store.account_mut(account_id)?;
        account.name = name.to_string();
        account.email = email.to_string();
        account.bio = bio.map(str::to_string);
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn store_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.store()?.account_mut(account_id)?.otp = Some(OtpCredential {
            code: code.to_string(),
            issued_at,
        });
        Ok(())
    }

    async fn clear_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut store = self.store()?;
        let account = store.account_mut(account_id)?;
        let current = account
            .otp
            .as_ref()
            .is_some_and(|otp| otp.code == code && otp.issued_at == issued_at);
        if current {
            account.otp = None;
        }
        Ok(current)
    }

    async fn load_web_session(&self, session_id: &str) -> PortResult<Option<WebSession>> {
        let now = self.clock.now();
        Ok(self
            .store()?
            .sessions
            .iter()
            .find(|s| s.id == session_id && s.expires_at > now)
            .cloned())
    }

    async fn save_web_session(&self, session: &WebSession) -> PortResult<()> {
        let mut store = self.store()?;
        store.sessions.retain(|s| s.id != session.id);
        store.sessions.push(session.clone());
        Ok(())
    }

    async fn delete_web_session(&self, session_id: &str) -> PortResult<()> {
        self.store()?.sessions.retain(|s| s.id != session_id);
        Ok(())
    }

    async fn create_story(&self, story: NewStory) -> PortResult<Story> {
        let now = self.clock.now();
        let created = Story {
            id: Uuid::new_v4(),
            user_id: story.user_id,
            title: story.title,
            description: story.description,
            category: story.category,
            language: story.language,
            status: story.status,
            view_count: 0,
            chapters_count: 0,
            cover_image_url: story.cover_image_url,
            created_at: now,
            updated_at: now,
        };
        self.store()?.stories.push(created.clone());
        Ok(created)
    }

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story> {
        Ok(self.store()?.story_mut(story_id)?.clone())
    }

    async fn update_story(&self, story_id: Uuid, changes: NewStory) -> PortResult<Story> {
        let now = self.clock.now();
        let mut store = self.store()?;
        let story = store.story_mut(story_id)?;
        story.title = changes.title;
        story.description = changes.description;
        story.category = changes.category;
        story.language = changes.language;
        story.status = changes.status;
        story.cover_image_url = changes.cover_image_url;
        story.updated_at = now;
        Ok(story.clone())
    }

    async fn delete_story(&self, story_id: Uuid) -> PortResult<()> {
        let mut store = self.store()?;
        store.story_mut(story_id)?;

        let chapter_ids: Vec<Uuid> = store
            .chapters
            .iter()
            .filter(|c| c.story_id == story_id)
            .map(|c| c.id)
            .collect();
        store.comments.retain(|c| match c.target {
            Commentable::Story(id) => id != story_id,
            Commentable::Chapter(id) => !chapter_ids.contains(&id),
        });
        store.chapters.retain(|c| c.story_id != story_id);
        store.reading_lists.retain(|e| e.story_id != story_id);
        store.stories.retain(|s| s.id != story_id);
        Ok(())
    }

    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<Story> {
        let mut store = self.store()?;
        let story = store.story_mut(story_id)?;
        story.view_count += 1;
        Ok(story.clone())
    }

    async fn list_published_stories(&self, filter: &StoryFilter) -> PortResult<Vec<Story>> {
        let store = self.store()?;
        let mut stories: Vec<Story> = newest_first(&store.stories, |s| s.created_at)
            .into_iter()
            .filter(|s| s.status == PublicationStatus::Published)
            .filter(|s| filter.category.as_ref().map_or(true, |c| &s.category == c))
            .filter(|s| {
                filter
                    .language
                    .as_deref()
                    .map_or(true, |l| s.language.code() == l)
            })
            .collect();
        stories.truncate(filter.limit.max(0) as usize);
        Ok(stories)
    }

    async fn list_stories_by_user(&self, user_id: Uuid) -> PortResult<Vec<Story>> {
        let store = self.store()?;
        Ok(newest_first(&store.stories, |s| s.created_at)
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect())
    }

    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        let mut chapters: Vec<Chapter> = self
            .store()?
            .chapters
            .iter()
            .filter(|c| c.story_id == story_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.order);
        Ok(chapters)
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        Ok(self.store()?.chapter_mut(chapter_id)?.clone())
    }

    async fn insert_chapter(&self, chapter: NewChapter) -> PortResult<Chapter> {
        let now = self.clock.now();
        let mut store = self.store()?;
        if store.order_taken(chapter.story_id, chapter.order, None) {
            return Err(PortError::Conflict(format!(
                "order {} is taken in story {}",
                chapter.order, chapter.story_id
            )));
        }
        store.story_mut(chapter.story_id)?.chapters_count += 1;

        let created = Chapter {
            id: Uuid::new_v4(),
            story_id: chapter.story_id,
            title: chapter.title,
            content: chapter.content,
            order: chapter.order,
            status: chapter.status,
            created_at: now,
            updated_at: now,
        };
        store.chapters.push(created.clone());
        Ok(created)
    }

    async fn update_chapter(&self, chapter: &Chapter) -> PortResult<Chapter> {
        let now = self.clock.now();
        let mut store = self.store()?;
        if store.order_taken(chapter.story_id, chapter.order, Some(chapter.id)) {
            return Err(PortError::Conflict(format!(
                "order {} is taken in story {}",
                chapter.order, chapter.story_id
            )));
        }
        let stored = store.chapter_mut(chapter.id)?;
        stored.title = chapter.title.clone();
        stored.content = chapter.content.clone();
        stored.order = chapter.order;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn set_chapter_status(
        &self,
        chapter_id: Uuid,
        status: PublicationStatus,
    ) -> PortResult<Chapter> {
        let now = self.clock.now();
        let mut store = self.store()?;
        let stored = store.chapter_mut(chapter_id)?;
        stored.status = status;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn delete_chapter(&self, chapter: &Chapter) -> PortResult<()> {
        let mut store = self.store()?;
        store.chapter_mut(chapter.id)?;
        store
            .comments
            .retain(|c| c.target != Commentable::Chapter(chapter.id));
        store.chapters.retain(|c| c.id != chapter.id);
        store.story_mut(chapter.story_id)?.chapters_count -= 1;
        Ok(())
    }

    async fn add_reading_list_entry(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        let now = self.clock.now();
        let mut store = self.store()?;
        if store
            .reading_lists
            .iter()
            .any(|e| e.user_id == user_id && e.story_id == story_id)
        {
            return Err(PortError::Conflict(format!(
                "story {} is already listed",
                story_id
            )));
        }
        let entry = ReadingListEntry {
            id: Uuid::new_v4(),
            user_id,
            story_id,
            created_at: now,
        };
        store.reading_lists.push(entry.clone());
        Ok(entry)
    }

    async fn get_reading_list_entry(&self, entry_id: Uuid) -> PortResult<ReadingListEntry> {
        self.store()?
            .reading_lists
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Reading list entry {}", entry_id)))
    }

    async fn list_reading_list(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(ReadingListEntry, Story)>> {
        let store = self.store()?;
        Ok(newest_first(&store.reading_lists, |e| e.created_at)
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                let story = store.stories.iter().find(|s| s.id == e.story_id)?.clone();
                Some((e, story))
            })
            .collect())
    }

    async fn delete_reading_list_entry(&self, entry_id: Uuid) -> PortResult<()> {
        self.store()?.reading_lists.retain(|e| e.id != entry_id);
        Ok(())
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        target: Commentable,
        content: &str,
    ) -> PortResult<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            user_id,
            target,
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        self.store()?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, target: Commentable) -> PortResult<Vec<Comment>> {
        let store = self.store()?;
        Ok(newest_first(&store.comments, |c| c.created_at)
            .into_iter()
            .filter(|c| c.target == target)
            .collect())
    }
}

//=========================================================================================
// Interleaving
//=========================================================================================

/// Wraps an `InMemoryDatabase` to stage the interleavings two concurrent
/// requests can produce. Writes always reach the real store, so its
/// uniqueness rules and counters still decide the outcome.
pub struct LaggingDatabase {
    inner: Arc<InMemoryDatabase>,
    yield_after_account_reads: AtomicBool,
    stale_chapter_lists: AtomicBool,
}

impl LaggingDatabase {
    pub fn new(inner: Arc<InMemoryDatabase>) -> Self {
        Self {
            inner,
            yield_after_account_reads: AtomicBool::new(false),
            stale_chapter_lists: AtomicBool::new(false),
        }
    }

    /// Account reads hand control back to the runtime before returning, so a
    /// joined sibling task reads the same snapshot.
    pub fn yield_after_account_reads(&self, on: bool) {
        self.yield_after_account_reads.store(on, Ordering::SeqCst);
    }

    /// Chapter listings come back empty, as if read before a sibling commit.
    pub fn stale_chapter_lists(&self, on: bool) {
        self.stale_chapter_lists.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl DatabaseService for LaggingDatabase {
    async fn find_account_by_email(&self, email: &str) -> PortResult<Option<Account>> {
        self.inner.find_account_by_email(email).await
    }

    async fn get_account(&self, account_id: Uuid) -> PortResult<Account> {
        let account = self.inner.get_account(account_id).await?;
        if self.yield_after_account_reads.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(account)
    }

    async fn create_account(&self, email: &str, name: &str) -> PortResult<Account> {
        self.inner.create_account(email, name).await
    }

    async fn update_profile(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
        bio: Option<&str>,
    ) -> PortResult<Account> {
        self.inner.update_profile(account_id, name, email, bio).await
    }

    async fn store_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner.store_otp(account_id, code, issued_at).await
    }

    async fn clear_otp(
        &self,
        account_id: Uuid,
        code: &str,
        issued_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        self.inner.clear_otp(account_id, code, issued_at).await
    }

    async fn load_web_session(&self, session_id: &str) -> PortResult<Option<WebSession>> {
        self.inner.load_web_session(session_id).await
    }

    async fn save_web_session(&self, session: &WebSession) -> PortResult<()> {
        self.inner.save_web_session(session).await
    }

    async fn delete_web_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.delete_web_session(session_id).await
    }

    async fn create_story(&self, story: NewStory) -> PortResult<Story> {
        self.inner.create_story(story).await
    }

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story> {
        self.inner.get_story(story_id).await
    }

    async fn update_story(&self, story_id: Uuid, story: NewStory) -> PortResult<Story> {
        self.inner.update_story(story_id, story).await
    }

    async fn delete_story(&self, story_id: Uuid) -> PortResult<()> {
        self.inner.delete_story(story_id).await
    }

    async fn increment_story_views(&self, story_id: Uuid) -> PortResult<Story> {
        self.inner.increment_story_views(story_id).await
    }

    async fn list_published_stories(&self, filter: &StoryFilter) -> PortResult<Vec<Story>> {
        self.inner.list_published_stories(filter).await
    }

    async fn list_stories_by_user(&self, user_id: Uuid) -> PortResult<Vec<Story>> {
        self.inner.list_stories_by_user(user_id).await
    }

    async fn list_chapters(&self, story_id: Uuid) -> PortResult<Vec<Chapter>> {
        if self.stale_chapter_lists.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        self.inner.list_chapters(story_id).await
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        self.inner.get_chapter(chapter_id).await
    }

    async fn insert_chapter(&self, chapter: NewChapter) -> PortResult<Chapter> {
        self.inner.insert_chapter(chapter).await
    }

    async fn update_chapter(&self, chapter: &Chapter) -> PortResult<Chapter> {
        self.inner.update_chapter(chapter).await
    }

    async fn set_chapter_status(
        &self,
        chapter_id: Uuid,
        status: PublicationStatus,
    ) -> PortResult<Chapter> {
        self.inner.set_chapter_status(chapter_id, status).await
    }

    async fn delete_chapter(&self, chapter: &Chapter) -> PortResult<()> {
        self.inner.delete_chapter(chapter).await
    }

    async fn add_reading_list_entry(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> PortResult<ReadingListEntry> {
        self.inner.add_reading_list_entry(user_id, story_id).await
    }

    async fn get_reading_list_entry(&self, entry_id: Uuid) -> PortResult<ReadingListEntry> {
        self.inner.get_reading_list_entry(entry_id).await
    }

    async fn list_reading_list(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(ReadingListEntry, Story)>> {
        self.inner.list_reading_list(user_id).await
    }

    async fn delete_reading_list_entry(&self, entry_id: Uuid) -> PortResult<()> {
        self.inner.delete_reading_list_entry(entry_id).await
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        target: Commentable,
        content: &str,
    ) -> PortResult<Comment> {
        self.inner.create_comment(user_id, target, content).await
    }

    async fn list_comments(&self, target: Commentable) -> PortResult<Vec<Comment>> {
        self.inner.list_comments(target).await
    }
}
