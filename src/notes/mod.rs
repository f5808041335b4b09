pub mod service;
pub mod session;

pub use service::{backup_file_name, NoteService, UndoOutcome};
pub use session::SessionStore;
