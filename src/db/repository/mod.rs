pub mod note_repository;
pub mod notification_log_repository;
pub mod reminder_repository;

pub use note_repository::NoteRepository;
pub use notification_log_repository::NotificationLogRepository;
pub use reminder_repository::ReminderRepository;
