//! Outbound notification plumbing shared by the scheduler and the chat bot.

use async_trait::async_trait;

use crate::db::models::Reminder;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Deliver plain text to a chat.
    async fn send_text(&self, recipient: i64, text: &str) -> AppResult<()>;
}

/// Reminder owners are stored as string-encoded Telegram chat ids.
pub fn parse_recipient(user_id: &str) -> AppResult<i64> {
    user_id
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::InvalidRecipient(user_id.to_string()))
}

/// Body of the primary reminder message.
pub fn render_reminder_notification(reminder: &Reminder) -> String {
    let mut text = String::from("🔔 Reminder!\n\n");
    text.push_str(&reminder.title);

    if let Some(description) = reminder.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str("\n\n");
        text.push_str(description);
    }
    if reminder.priority {
        text.push_str("\n\n⭐ This is a priority reminder!");
    }
    if reminder.is_recurring() {
        text.push_str("\n\n🔄 This reminder will recur.");
    }

    text
}

/// Follow-up sent when a priority reminder goes unacknowledged.
pub fn render_escalation(reminder: &Reminder) -> String {
    format!("⚠️ Priority Reminder: {}", reminder.title)
}
