pub mod init;
pub mod notifications;
pub mod telegram;
