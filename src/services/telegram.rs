use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Document, InputFile};

use crate::error::{AppError, AppResult};
use crate::services::notifications::Notifier;

/// Telegram caps a message at 4096 characters; stay a little below it.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Largest backup upload accepted by `/import`.
const MAX_DOWNLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct TelegramService {
    bot: Bot,
}

impl TelegramService {
    pub async fn new(token: String) -> AppResult<Self> {
        let bot = Bot::new(token);

        // Verify the bot token by getting bot info
        match bot.get_me().await {
            Ok(me) => {
                tracing::info!("Telegram bot initialized: @{}", me.username());
                Ok(Self { bot })
            }
            Err(e) => {
                tracing::error!("Failed to initialize Telegram bot: {}", e);
                Err(AppError::Telegram(format!("Failed to initialize bot: {}", e)))
            }
        }
    }

    pub fn get_bot(&self) -> &Bot {
        &self.bot
    }

    /// Send text, split into several messages when it is too long for one.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            match self.bot.send_message(ChatId(chat_id), chunk).await {
                Ok(sent) => {
                    tracing::debug!("Telegram message sent to {}: message_id={}", chat_id, sent.id);
                }
                Err(e) => {
                    tracing::error!("Failed to send Telegram message to {}: {}", chat_id, e);
                    return Err(AppError::Delivery(format!("Failed to send message: {}", e)));
                }
            }
        }
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> AppResult<()> {
        let file = InputFile::memory(bytes).file_name(file_name.to_string());
        self.bot
            .send_document(ChatId(chat_id), file)
            .caption(caption)
            .await
            .map(|_| ())
            .map_err(|e| {
                tracing::error!("Failed to send document to {}: {}", chat_id, e);
                AppError::Delivery(format!("Failed to send document: {}", e))
            })
    }

    /// Download an uploaded document into memory.
    pub async fn download_document(&self, document: &Document) -> AppResult<Vec<u8>> {
        if u64::from(document.file.size) > MAX_DOWNLOAD_BYTES {
            return Err(AppError::Validation("backup file is too large".to_string()));
        }

        let file = self
            .bot
            .get_file(document.file.id.clone())
            .await
            .map_err(|e| AppError::Telegram(format!("Failed to access file: {}", e)))?;

        let mut buf = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(|e| AppError::Telegram(format!("Failed to download file: {}", e)))?;

        Ok(buf)
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send_text(&self, recipient: i64, text: &str) -> AppResult<()> {
        self.send_message(recipient, text).await
    }
}

/// Split `text` into pieces of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let mut line = line;
        loop {
            let line_len = line.chars().count();
            if current_len + line_len <= limit {
                current.push_str(line);
                current_len += line_len;
                break;
            }
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // A single line longer than the limit is cut at a char boundary.
            let cut = line
                .char_indices()
                .nth(limit)
                .map_or(line.len(), |(idx, _)| idx);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
        assert_eq!(split_message("", 10), vec![String::new()]);
    }

    #[test]
    fn splits_on_line_breaks() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn long_line_is_cut_by_chars() {
        let chunks = split_message("ééééé", 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }
}
