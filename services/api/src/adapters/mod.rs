pub mod db;
pub mod delivery;

pub use db::DbAdapter;
pub use delivery::{LogDelivery, QueuedDelivery, SmtpDelivery};
