//! Stored data model.

mod record;
mod timestamp;

pub use record::{EventOrigin, NotificationRecord, UpdateEvent, UserId};
pub use timestamp::Timestamp;
