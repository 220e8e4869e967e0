//! Telegram transport and dispatcher endpoints

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{debug, warn};

use super::{AdapterResult, EventKind, InboundEvent, Transport};
use crate::bot::dialogue_manager::DialogRouter;
use crate::bot::ui_builder::Keyboard;
use crate::errors::AdapterError;
use crate::session_store::SessionId;

/// `Transport` implementation on top of the Telegram Bot API
pub struct TelegramTransport {
    bot: Bot,
    http: reqwest::Client,
    max_download_size: usize,
}

impl TelegramTransport {
    /// `max_download_size` caps how many bytes of one file are read
    pub fn new(bot: Bot, max_download_size: usize) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
            max_download_size,
        }
    }
}

/// Reject a download once its size is known to exceed the limit
fn check_download_size(size: u64, max: usize) -> AdapterResult<()> {
    if size > max as u64 {
        warn!(size, max, "Refusing oversized download");
        return Err(AdapterError::UnsupportedImage);
    }
    Ok(())
}

/// Convert a transport-neutral keyboard into Telegram inline markup
pub fn to_inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.to_wire()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn transport_error(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::Transport(e.to_string())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        session: SessionId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> AdapterResult<()> {
        let request = self.bot.send_message(ChatId(session.0), text);
        let sent = match keyboard {
            Some(keyboard) => request.reply_markup(to_inline_markup(keyboard)).await,
            None => request.await,
        };
        sent.map_err(transport_error)?;
        Ok(())
    }

    async fn get_file_url(&self, file_ref: &str) -> AdapterResult<String> {
        let file = self
            .bot
            .get_file(FileId(file_ref.to_string()))
            .await
            .map_err(transport_error)?;
        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        ))
    }

    async fn download_file(&self, url: &str) -> AdapterResult<Vec<u8>> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport_error)?;

        if let Some(declared) = response.content_length() {
            check_download_size(declared, self.max_download_size)?;
        }

        // The declared length may be missing, so the running total is checked too.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            check_download_size((bytes.len() + chunk.len()) as u64, self.max_download_size)?;
            bytes.extend_from_slice(&chunk);
        }
        debug!(bytes = bytes.len(), "File downloaded");
        Ok(bytes)
    }
}

/// Classify a Telegram message into a dialog event
pub fn classify_message(msg: &Message) -> EventKind {
    if let Some(photos) = msg.photo() {
        // Telegram lists sizes ascending; the last one is the original.
        if let Some(largest) = photos.last() {
            return EventKind::Photo {
                file_ref: largest.file.id.0.clone(),
            };
        }
    }

    if let Some(document) = msg.document() {
        let is_image = document
            .mime_type
            .as_ref()
            .is_some_and(|mime| mime.essence_str().starts_with("image/"));
        if is_image {
            return EventKind::Photo {
                file_ref: document.file.id.0.clone(),
            };
        }
    }

    match msg.text() {
        Some(text) => EventKind::Text(text.to_string()),
        None => EventKind::Unsupported,
    }
}

/// Dispatcher endpoint for messages
pub async fn message_endpoint(msg: Message, router: Arc<DialogRouter>) -> Result<()> {
    let session_id = SessionId(msg.chat.id.0);
    let kind = classify_message(&msg);
    debug!(session_id = %session_id, "Received message");
    router.handle_event(InboundEvent::new(session_id, kind)).await;
    Ok(())
}

/// Dispatcher endpoint for inline keyboard presses
pub async fn callback_endpoint(bot: Bot, q: CallbackQuery, router: Arc<DialogRouter>) -> Result<()> {
    // Acknowledge first so the client stops its spinner even if handling is slow.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.clone() else {
        debug!("Callback query without data");
        return Ok(());
    };
    let chat_id = match q.message.as_ref() {
        Some(message) => message.chat().id,
        None => ChatId::from(q.from.id),
    };

    router
        .handle_event(InboundEvent::callback(SessionId(chat_id.0), data))
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_IMAGE_SIZE;

    #[test]
    fn test_download_size_limit() {
        assert!(check_download_size(0, MAX_IMAGE_SIZE).is_ok());
        assert!(check_download_size(MAX_IMAGE_SIZE as u64, MAX_IMAGE_SIZE).is_ok());
        assert_eq!(
            check_download_size(MAX_IMAGE_SIZE as u64 + 1, MAX_IMAGE_SIZE),
            Err(AdapterError::UnsupportedImage)
        );
    }
}
