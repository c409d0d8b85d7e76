#![allow(dead_code)]

use anyhow::Result;
use api_lib::config::Config;
use api_lib::testing::{InMemoryDatabase, LaggingDatabase, ManualClock, RecordingDelivery};
use api_lib::web::state::AppState;
use chapterhouse_core::authz::DraftVisibility;
use chapterhouse_core::domain::{Chapter, SessionContext, Story};
use chapterhouse_core::ports::DatabaseService;
use chapterhouse_core::{ChapterInput, StoryInput};
use std::sync::Arc;
use uuid::Uuid;

/// Every service wired over in-memory adapters with a hand-driven clock.
pub struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub clock: Arc<ManualClock>,
    pub delivery: Arc<RecordingDelivery>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn owner_only() -> Self {
        Self::with_config(Config {
            draft_visibility: DraftVisibility::OwnerOnly,
            ..Config::default()
        })
    }

    pub fn with_delivery(delivery: RecordingDelivery) -> Self {
        Self::build(Config::default(), delivery)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, RecordingDelivery::default())
    }

    /// Services see the store through a `LaggingDatabase`; `db` is still the
    /// store itself, for assertions.
    pub fn lagging() -> (Self, Arc<LaggingDatabase>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let db = Arc::new(InMemoryDatabase::new(clock.clone()));
        let lagging = Arc::new(LaggingDatabase::new(db.clone()));
        let h = Self::assemble(
            Config::default(),
            RecordingDelivery::default(),
            clock,
            db,
            lagging.clone(),
        );
        (h, lagging)
    }

    fn build(config: Config, delivery: RecordingDelivery) -> Self {
        let clock = Arc::new(ManualClock::at_epoch());
        let db = Arc::new(InMemoryDatabase::new(clock.clone()));
        Self::assemble(config, delivery, clock, db.clone(), db)
    }

    fn assemble(
        config: Config,
        delivery: RecordingDelivery,
        clock: Arc<ManualClock>,
        db: Arc<InMemoryDatabase>,
        port: Arc<dyn DatabaseService>,
    ) -> Self {
        let delivery = Arc::new(delivery);
        let state = Arc::new(AppState::new(
            port,
            delivery.clone(),
            clock.clone(),
            Arc::new(config),
        ));
        Self {
            db,
            clock,
            delivery,
            state,
        }
    }

    /// Runs the full passcode flow and returns the signed-in account id.
    pub async fn sign_in(&self, email: &str) -> Result<Uuid> {
        let mut session = SessionContext::default();
        self.state
            .authenticator
            .request_code(&mut session, email)
            .await?;
        let code = self
            .delivery
            .last_code_for(email)
            .ok_or_else(|| anyhow::anyhow!("no code sent to {}", email))?;
        let account = self.state.authenticator.validate(&mut session, &code).await?;
        Ok(account.id)
    }

    pub async fn story(&self, owner: Uuid, title: &str, status: &str) -> Result<Story> {
        let input = StoryInput {
            title: title.to_string(),
            description: format!("About {}", title),
            category: "fantasy".to_string(),
            language: None,
            status: Some(status.to_string()),
            cover_image_url: None,
        };
        Ok(self.state.stories.create(Some(owner), input).await?)
    }

    pub async fn chapter(
        &self,
        owner: Uuid,
        story_id: Uuid,
        order: Option<i32>,
        status: &str,
    ) -> Result<Chapter> {
        let input = ChapterInput {
            title: format!("Chapter {}", order.unwrap_or_default()),
            content: "<p>Once upon a time.</p>".to_string(),
            order,
            status: Some(status.to_string()),
        };
        Ok(self.state.chapters.create(Some(owner), story_id, input).await?)
    }
}
