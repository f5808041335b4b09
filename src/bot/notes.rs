use crate::db::models::ImportSummary;
use crate::notes::{backup_file_name, NoteService, UndoOutcome};

pub const HELP_TEXT: &str = "I understand these commands:
/add <text> - Store new text
/pull - Get a random item
/delete - Delete the last pulled item
/list - Show all stored items
/deleted - Show deleted items
/undo - Restore the last deleted item (within 1 hour)
/export - Download a backup of all your data
/import - Import items from a backup file (attach it with /import as caption)
/remindme <time> to <message> [-call] - Set a reminder
/reminders [priority|call|regular] - List your reminders
/complete <id> - Mark a reminder as done
/cancel <id> - Cancel a reminder
/unremind <id> - Delete a reminder
/help - Show this help message";

pub const IMPORT_USAGE: &str =
    "Please attach a backup file (JSON format) with the /import command";

/// A backup ready to be sent as a document.
#[derive(Debug)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// Chat replies for the note commands.
#[derive(Clone)]
pub struct NoteCommands {
    notes: NoteService,
}

impl NoteCommands {
    pub fn new(notes: NoteService) -> Self {
        Self { notes }
    }

    pub async fn add(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "Usage: /add something".to_string();
        }
        match self.notes.add(text).await {
            Ok(item) => format!("Added: {} ✅", item.text),
            Err(e) => {
                tracing::error!("Error storing item: {:?}", e);
                "Failed to store item.".to_string()
            }
        }
    }

    pub async fn pull(&self, chat_id: i64) -> String {
        match self.notes.pull(chat_id).await {
            Ok(Some(item)) => format!("🎲 {}", item.text),
            Ok(None) => "No items available.".to_string(),
            Err(e) => {
                tracing::error!("Error pulling item: {:?}", e);
                "Failed to pull item.".to_string()
            }
        }
    }

    pub async fn delete(&self, chat_id: i64) -> String {
        match self.notes.delete_pulled(chat_id).await {
            Ok(Some(deleted)) => format!("Deleted: {} 🗑️", deleted.text),
            Ok(None) => "Pull an item first using /pull".to_string(),
            Err(e) => {
                tracing::error!("Error deleting item: {:?}", e);
                "Failed to delete item.".to_string()
            }
        }
    }

    pub async fn list(&self) -> String {
        match self.notes.list().await {
            Ok(items) if items.is_empty() => "No items stored.".to_string(),
            Ok(items) => {
                let lines: Vec<String> = items.iter().map(|i| format!("• {}", i.text)).collect();
                format!("📝 Stored items:\n{}", lines.join("\n"))
            }
            Err(e) => {
                tracing::error!("Error listing items: {:?}", e);
                "Failed to list items.".to_string()
            }
        }
    }

    pub async fn list_deleted(&self) -> String {
        match self.notes.list_deleted().await {
            Ok(items) if items.is_empty() => "No deleted items.".to_string(),
            Ok(items) => {
                let lines: Vec<String> = items.iter().map(|i| format!("• {}", i.text)).collect();
                format!("🗑️ Deleted items:\n{}", lines.join("\n"))
            }
            Err(e) => {
                tracing::error!("Error listing deleted items: {:?}", e);
                "Failed to list deleted items.".to_string()
            }
        }
    }

    pub async fn undo(&self, chat_id: i64) -> String {
        match self.notes.undo(chat_id).await {
            Ok(UndoOutcome::Restored(item)) => format!("✅ Restored: {}", item.text),
            Ok(UndoOutcome::Nothing) => "❌ Nothing to undo".to_string(),
            Ok(UndoOutcome::Expired) => "❌ Can't undo deletions older than 1 hour".to_string(),
            Err(e) => {
                tracing::error!("Error restoring item: {:?}", e);
                "❌ Failed to undo deletion".to_string()
            }
        }
    }

    pub async fn export(&self) -> Result<ExportFile, String> {
        let backup = self.notes.export().await.map_err(|e| {
            tracing::error!("Error exporting notes: {:?}", e);
            "❌ Failed to fetch items".to_string()
        })?;
        let bytes = serde_json::to_vec_pretty(&backup).map_err(|e| {
            tracing::error!("Error encoding backup: {:?}", e);
            "❌ Failed to create backup".to_string()
        })?;

        Ok(ExportFile {
            file_name: backup_file_name(backup.exported_at),
            caption: format!(
                "📦 Your MindBot Backup\n• {} items\n• {} deleted items",
                backup.items.len(),
                backup.deleted_items.len()
            ),
            bytes,
        })
    }

    pub async fn import(&self, raw: &[u8]) -> String {
        match self.notes.import(raw).await {
            Ok((summary, exported_at)) => import_report(&summary, exported_at),
            Err(crate::error::AppError::Serialization(e)) => {
                tracing::warn!("Error parsing backup: {}", e);
                "Invalid backup file format".to_string()
            }
            Err(e) => {
                tracing::error!("Error importing backup: {:?}", e);
                "Failed to complete import".to_string()
            }
        }
    }
}

fn import_report(summary: &ImportSummary, exported_at: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "Import completed successfully!\n\n\
         📥 Items imported: {}\n\
         ⏭️ Items skipped (duplicates): {}\n\
         🗑️ Deleted items imported: {}\n\
         ⏭️ Deleted items skipped: {}\n\n\
         Backup was from: {}",
        summary.imported,
        summary.skipped,
        summary.deleted_imported,
        summary.deleted_skipped,
        exported_at.format("%Y-%m-%d %H:%M:%S")
    )
}
