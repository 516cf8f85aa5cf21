//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ParseMode, ReplyParameters};
use tracing::{info, warn};

use crate::assistant::format::{format_reply, plain_reply};

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send a model reply, rendered as HTML. If Telegram rejects the markup,
    /// resend it as plain text.
    pub async fn send_reply(
        &self,
        chat_id: i64,
        raw_text: &str,
        reply_to_message_id: Option<i32>,
    ) -> Result<i32, String> {
        match self
            .send_message(chat_id, &format_reply(raw_text), Some(ParseMode::Html), reply_to_message_id)
            .await
        {
            Ok(id) => Ok(id),
            Err(e) => {
                info!("Retrying chat {} as plain text after: {}", chat_id, e);
                self.send_message(chat_id, &plain_reply(raw_text), None, reply_to_message_id)
                    .await
            }
        }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
        reply_to_message_id: Option<i32>,
    ) -> Result<i32, String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(mode) = parse_mode {
            request = request.parse_mode(mode);
        }
        if let Some(msg_id) = reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id)));
        }

        request.await.map(|msg| msg.id.0).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Show "typing…" while the reply is being prepared.
    pub async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send typing action: {e}");
                warn!("{}", msg);
                msg
            })
    }
}
