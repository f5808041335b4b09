//! Telegram command surface: parses incoming messages into [`Command`]s and
//! replies through [`TelegramService`].

pub mod notes;
pub mod reminders;

use std::error::Error;
use std::sync::Arc;

use teloxide::dispatching::{DefaultKey, HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::services::telegram::TelegramService;

pub use notes::NoteCommands;
pub use reminders::ReminderCommands;

type HandlerError = Box<dyn Error + Send + Sync + 'static>;
type HandlerResult = Result<(), HandlerError>;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "MindBot commands:")]
pub enum Command {
    #[command(description = "store new text")]
    Add(String),
    #[command(description = "get a random item")]
    Pull,
    #[command(description = "delete the last pulled item")]
    Delete,
    #[command(description = "show all stored items")]
    List,
    #[command(description = "show deleted items")]
    Deleted,
    #[command(description = "restore the last deleted item")]
    Undo,
    #[command(description = "download a backup")]
    Export,
    #[command(description = "import a backup file")]
    Import,
    #[command(description = "set a reminder")]
    Remindme(String),
    #[command(description = "list reminders")]
    Reminders(String),
    #[command(description = "mark a reminder as done")]
    Complete(String),
    #[command(description = "cancel a reminder")]
    Cancel(String),
    #[command(description = "delete a reminder")]
    Unremind(String),
    #[command(description = "show help")]
    Help,
    #[command(description = "start the bot")]
    Start,
}

/// Everything the handlers need, injected into the dispatcher.
pub struct BotState {
    pub notes: NoteCommands,
    pub reminders: ReminderCommands,
    pub telegram: TelegramService,
}

pub fn schema() -> UpdateHandler<HandlerError> {
    let import_upload = dptree::filter(|msg: Message| {
        msg.document().is_some()
            && msg
                .caption()
                .map_or(false, |c| c.trim_start().to_lowercase().starts_with("/import"))
    })
    .endpoint(handle_import_upload);

    let commands = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let unknown = dptree::filter(|msg: Message| msg.text().map_or(false, |t| t.starts_with('/')))
        .endpoint(handle_unknown);

    Update::filter_message()
        .branch(import_upload)
        .branch(commands)
        .branch(unknown)
}

pub fn dispatcher(bot: Bot, state: Arc<BotState>) -> Dispatcher<Bot, HandlerError, DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            tracing::debug!("Ignoring update {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error occurred in the bot dispatcher",
        ))
        .build()
}

async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> HandlerResult {
    let chat_id = msg.chat.id.0;
    let user_id = chat_id.to_string();
    tracing::info!("Chat {} sent {:?}", chat_id, cmd);

    let reply = match cmd {
        Command::Add(text) => state.notes.add(&text).await,
        Command::Pull => state.notes.pull(chat_id).await,
        Command::Delete => state.notes.delete(chat_id).await,
        Command::List => state.notes.list().await,
        Command::Deleted => state.notes.list_deleted().await,
        Command::Undo => state.notes.undo(chat_id).await,
        Command::Export => match state.notes.export().await {
            Ok(file) => match state
                .telegram
                .send_document(chat_id, &file.file_name, file.bytes, &file.caption)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Failed to send backup to {}: {}", chat_id, e);
                    "❌ Failed to send backup file".to_string()
                }
            },
            Err(reply) => reply,
        },
        Command::Import => notes::IMPORT_USAGE.to_string(),
        Command::Remindme(args) => state.reminders.remind_me(&user_id, &args).await,
        Command::Reminders(args) => state.reminders.list(&user_id, &args).await,
        Command::Complete(args) => state.reminders.complete(&user_id, &args).await,
        Command::Cancel(args) => state.reminders.cancel(&user_id, &args).await,
        Command::Unremind(args) => state.reminders.delete(&user_id, &args).await,
        Command::Help | Command::Start => notes::HELP_TEXT.to_string(),
    };

    state.telegram.send_message(chat_id, &reply).await?;
    Ok(())
}

async fn handle_import_upload(msg: Message, state: Arc<BotState>) -> HandlerResult {
    let chat_id = msg.chat.id.0;
    let Some(document) = msg.document() else {
        return Ok(());
    };

    let reply = match state.telegram.download_document(document).await {
        Ok(raw) => state.notes.import(&raw).await,
        Err(e) => {
            tracing::warn!("Failed to download backup from {}: {}", chat_id, e);
            "Failed to download the backup file".to_string()
        }
    };

    state.telegram.send_message(chat_id, &reply).await?;
    Ok(())
}

async fn handle_unknown(msg: Message, state: Arc<BotState>) -> HandlerResult {
    state
        .telegram
        .send_message(msg.chat.id.0, "I don't know that command. Try /help")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_free_form_arguments() {
        let cmd = Command::parse("/remindme in 2 hours to check email", "mindbot").unwrap();
        assert_eq!(cmd, Command::Remindme("in 2 hours to check email".to_string()));

        let cmd = Command::parse("/add buy milk", "mindbot").unwrap();
        assert_eq!(cmd, Command::Add("buy milk".to_string()));

        let cmd = Command::parse("/pull", "mindbot").unwrap();
        assert_eq!(cmd, Command::Pull);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Command::parse("/time what is it", "mindbot").is_err());
    }
}
