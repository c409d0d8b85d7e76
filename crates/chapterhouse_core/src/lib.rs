pub mod accounts;
pub mod authz;
pub mod chapters;
pub mod comments;
pub mod domain;
pub mod error;
pub mod otp;
pub mod ports;
pub mod reading_list;
pub mod stories;
pub mod validation;

pub use accounts::{ProfileEdit, ProfileService};
pub use authz::DraftVisibility;
pub use chapters::{ChapterEdit, ChapterInput, ChapterSequencer, ChapterView};
pub use comments::CommentService;
pub use domain::{
    Account, Chapter, Comment, Commentable, Language, NewChapter, NewStory, OtpCredential,
    PublicationStatus, ReadingListEntry, SessionContext, Story, WebSession,
};
pub use error::{CoreError, CoreResult};
pub use otp::OtpAuthenticator;
pub use ports::{
    Clock, CodeDeliveryService, DatabaseService, PortError, PortResult, StoryFilter, SystemClock,
};
pub use reading_list::ReadingListService;
pub use stories::{Dashboard, StoryEdit, StoryInput, StoryPage, StoryService};
pub use validation::FieldErrors;
