use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::db::models::*;
use crate::error::AppError;
use crate::reminder::{RecurrenceEngine, ReminderService, TimeParser};

pub const REMINDME_USAGE: &str = "Usage: /remindme <time> to <message> [-call]\nExamples:\n\
    • /remindme in 2 hours to check email\n\
    • /remindme tomorrow at 3pm to call mom -call\n\
    • /remindme every Sunday at 10am to water plants\n\
    • /remindme 2024-03-20 15:00 to submit report";

/// Chat replies for the reminder commands.
#[derive(Clone)]
pub struct ReminderCommands {
    service: ReminderService,
    parser: TimeParser,
    engine: RecurrenceEngine,
}

impl ReminderCommands {
    pub fn new(service: ReminderService, parser: TimeParser, engine: RecurrenceEngine) -> Self {
        Self {
            service,
            parser,
            engine,
        }
    }

    fn location(&self) -> Tz {
        self.engine.location()
    }

    /// `/remindme <expr>`
    pub async fn remind_me(&self, user_id: &str, args: &str) -> String {
        let args = args.trim();
        if args.is_empty() {
            return REMINDME_USAGE.to_string();
        }

        if args.to_lowercase().starts_with("every") {
            return self.remind_recurring(user_id, args).await;
        }

        let parsed = match self.parser.parse_command(args) {
            Ok(parsed) => parsed,
            Err(e) => return format!("❌ Error: {}", e.user_message()),
        };
        let reminder =
            Reminder::new(user_id, parsed.title, parsed.due_time).with_priority(parsed.priority);

        match self.service.create(reminder).await {
            Ok(created) => format!(
                "✅ Reminder set for {}\n{}",
                format_time(created.due_time, self.location()),
                format_reminder(&created, self.location())
            ),
            Err(e) => failure("create reminder", e),
        }
    }

    async fn remind_recurring(&self, user_id: &str, args: &str) -> String {
        let parsed = match self.parser.parse_recurring_command(args) {
            Ok(parsed) => parsed,
            Err(e) => return format!("❌ Error: {}", e.user_message()),
        };
        let now = self.service.clock().now();
        let due = match self.engine.first_occurrence(&parsed.pattern, parsed.anchor, now) {
            Ok(due) => due,
            Err(e) => return format!("❌ Error: {}", e.user_message()),
        };

        let reminder = Reminder::new(user_id, parsed.title, due)
            .with_recurrence(parsed.pattern)
            .with_priority(parsed.priority);

        match self.service.create(reminder).await {
            Ok(created) => format!(
                "✅ Recurring reminder set\n{}",
                format_reminder(&created, self.location())
            ),
            Err(e) => failure("create recurring reminder", e),
        }
    }

    /// `/reminders [priority|call|regular]`
    pub async fn list(&self, user_id: &str, args: &str) -> String {
        let filter = ListFilter {
            priority: match args.trim().to_lowercase().as_str() {
                "priority" | "call" => Some(true),
                "regular" => Some(false),
                _ => None,
            },
            ..Default::default()
        };

        let reminders = match self.service.list(Some(user_id), &filter).await {
            Ok(reminders) => reminders,
            Err(e) => return failure("list reminders", e),
        };

        let (pending, completed): (Vec<&Reminder>, Vec<&Reminder>) = reminders
            .iter()
            .filter(|r| r.status != ReminderStatus::Cancelled)
            .partition(|r| r.status == ReminderStatus::Pending);

        if pending.is_empty() && completed.is_empty() {
            return "No reminders found".to_string();
        }

        let mut out = String::from("📅 Your Reminders\n\n");
        if !pending.is_empty() {
            out.push_str("Pending:\n");
            for r in &pending {
                out.push_str(&format_reminder(r, self.location()));
                out.push('\n');
            }
        }
        if !completed.is_empty() {
            if !pending.is_empty() {
                out.push('\n');
            }
            out.push_str("Completed:\n");
            for r in &completed {
                out.push_str(&format_reminder(r, self.location()));
                out.push('\n');
            }
        }
        out
    }

    /// `/complete <id>`
    pub async fn complete(&self, user_id: &str, args: &str) -> String {
        if args.trim().is_empty() {
            return "Usage: /complete <reminder_id>".to_string();
        }
        let result = match self.service.resolve(user_id, args).await {
            Ok(reminder) => self.service.complete(&reminder.id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => "✅ Reminder marked as completed".to_string(),
            Err(e) => failure("complete reminder", e),
        }
    }

    /// `/cancel <id>`
    pub async fn cancel(&self, user_id: &str, args: &str) -> String {
        if args.trim().is_empty() {
            return "Usage: /cancel <reminder_id>".to_string();
        }
        let result = match self.service.resolve(user_id, args).await {
            Ok(reminder) => self.service.cancel(&reminder.id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => "✅ Reminder cancelled".to_string(),
            Err(e) => failure("cancel reminder", e),
        }
    }

    /// `/unremind <id>`
    pub async fn delete(&self, user_id: &str, args: &str) -> String {
        if args.trim().is_empty() {
            return "Usage: /unremind <reminder_id>".to_string();
        }
        let result = match self.service.resolve(user_id, args).await {
            Ok(reminder) => self.service.delete(&reminder.id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => "✅ Reminder deleted".to_string(),
            Err(e) => failure("delete reminder", e),
        }
    }
}

fn failure(action: &str, e: AppError) -> String {
    if e.is_user_error() {
        format!("❌ Failed to {}: {}", action, e.user_message())
    } else {
        tracing::warn!("Failed to {}: {:?}", action, e);
        format!("❌ Failed to {}", action)
    }
}

pub fn format_time(at: DateTime<Utc>, location: Tz) -> String {
    let local = at.with_timezone(&location);
    format!(
        "{} ({})",
        local.format("%a, %b %-d at %-I:%M %p"),
        local.format("%Y-%m-%d %H:%M")
    )
}

pub fn format_reminder(reminder: &Reminder, location: Tz) -> String {
    let mut out = format!("🔔 [{}] {}\n", reminder.short_id(), reminder.title);
    out.push_str(&format!("   📅 {}\n", format_time(reminder.due_time, location)));
    if let Some(pattern) = &reminder.recurrence {
        out.push_str(&format!("   🔄 {}\n", pattern));
    }
    if reminder.priority {
        out.push_str("   ⭐ Priority\n");
    }
    out
}
