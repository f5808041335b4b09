//! Database models split into separate files.
//! This module re-exports individual model modules so imports like
//! `use crate::db::models::*;` work.

pub mod note;
pub mod notification_log;
pub mod recurrence;
pub mod reminder;

pub use self::note::*;
pub use self::notification_log::*;
pub use self::recurrence::*;
pub use self::reminder::*;
