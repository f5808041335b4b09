use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// The primary reminder message.
    Message,
    /// The escalation sent for priority reminders that stay unacknowledged.
    Call,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Message => "telegram_message",
            NotificationType::Call => "telegram_call",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "telegram_message" => Some(NotificationType::Message),
            "telegram_call" => Some(NotificationType::Call),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(DeliveryStatus::Success),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

/// One notification attempt for a reminder. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: String,
    pub reminder_id: String,
    pub notification_type: NotificationType,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationLog {
    pub reminder_id: String,
    pub notification_type: NotificationType,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}

impl CreateNotificationLog {
    /// Build a log entry from the outcome of a send attempt.
    pub fn from_outcome<T, E: std::fmt::Display>(
        reminder_id: &str,
        notification_type: NotificationType,
        outcome: &Result<T, E>,
    ) -> Self {
        let (status, error_message) = match outcome {
            Ok(_) => (DeliveryStatus::Success, None),
            Err(e) => (DeliveryStatus::Failed, Some(e.to_string())),
        };
        Self {
            reminder_id: reminder_id.to_string(),
            notification_type,
            status,
            error_message,
        }
    }
}
