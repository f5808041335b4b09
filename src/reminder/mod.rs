//! Reminder lifecycle: parsing commands, storing occurrences, computing
//! recurrences, delivering due reminders and escalating priority ones.

pub mod clock;
pub mod escalation;
pub mod parser;
pub mod recurrence;
pub mod scheduler;
pub mod service;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use escalation::EscalationRegistry;
pub use parser::{ParsedRecurring, ParsedReminder, TimeParser};
pub use recurrence::{OccurrenceCalculator, RecurrenceEngine};
pub use scheduler::ReminderScheduler;
pub use service::ReminderService;
pub use store::{ReminderStore, SqliteReminderStore};
