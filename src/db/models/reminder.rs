use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecurrencePattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl ReminderStatus {
    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ReminderStatus::Pending),
            "completed" => Some(ReminderStatus::Completed),
            "cancelled" => Some(ReminderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReminderStatus::Pending)
    }
}

impl TryFrom<&str> for ReminderStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid reminder status: {}", value))
    }
}

/// A single occurrence of a (possibly recurring) reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    /// Owning chat, a string-encoded numeric Telegram id.
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_time: DateTime<Utc>,
    pub recurrence: Option<RecurrencePattern>,
    pub priority: bool,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    /// A new pending reminder. Timestamps are refreshed by the store on insert.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, due_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            due_time,
            recurrence: None,
            priority: false,
            status: ReminderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_recurrence(mut self, pattern: RecurrencePattern) -> Self {
        self.recurrence = Some(pattern);
        self
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// The pending reminder for the occurrence after this one.
    pub fn successor(&self, due_time: DateTime<Utc>) -> Reminder {
        Reminder {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            due_time,
            recurrence: self.recurrence.clone(),
            priority: self.priority,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Short id shown in chat listings.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Filters for listing reminders. All bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<ReminderStatus>,
    pub priority: Option<bool>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
}

impl ListFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(ReminderStatus::Pending),
            ..Default::default()
        }
    }

    pub fn matches(&self, reminder: &Reminder) -> bool {
        self.status.map_or(true, |s| reminder.status == s)
            && self.priority.map_or(true, |p| reminder.priority == p)
            && self.from_time.map_or(true, |from| reminder.due_time >= from)
            && self.to_time.map_or(true, |to| reminder.due_time <= to)
    }
}
