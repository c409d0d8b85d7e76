//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chapterhouse_core::ports::{Clock, CodeDeliveryService, DatabaseService};
use chapterhouse_core::{
    ChapterSequencer, CommentService, OtpAuthenticator, ProfileService, ReadingListService,
    StoryService,
};
use chrono::Duration;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub authenticator: OtpAuthenticator,
    pub stories: StoryService,
    pub chapters: ChapterSequencer,
    pub reading_lists: ReadingListService,
    pub comments: CommentService,
    pub profiles: ProfileService,
}

impl AppState {
    /// Wires every core service to the given adapters.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        delivery: Arc<dyn CodeDeliveryService>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        let visibility = config.draft_visibility;
        let authenticator = OtpAuthenticator::new(db.clone(), delivery, clock.clone())
            .with_ttl(Duration::minutes(config.otp_ttl_minutes));

        Self {
            authenticator,
            stories: StoryService::new(db.clone(), visibility),
            chapters: ChapterSequencer::new(db.clone(), visibility),
            reading_lists: ReadingListService::new(db.clone(), visibility),
            comments: CommentService::new(db.clone(), visibility),
            profiles: ProfileService::new(db.clone()),
            db,
            config,
            clock,
        }
    }
}
