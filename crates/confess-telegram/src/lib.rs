//! Telegram adapter (teloxide).
//!
//! Implements the confess-core `MessengerPort` over the Telegram Bot API and
//! converts inbound `Update`s into the core event model. The webhook server
//! lives in [`webhook`].

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ParseMode,
        Recipient, UpdateKind,
    },
};

use tokio::time::sleep;

pub mod webhook;

use confess_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessengerPort,
        types::{
            ButtonAction, CallbackEvent, InboundEvent, InlineButton, InlineKeyboard, ReplyMenu,
            TextMessage,
        },
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Bot::new(token.to_string()))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    /// `@name` stays a channel username; anything numeric is a chat id.
    fn recipient(channel: &str) -> Recipient {
        match channel.parse::<i64>() {
            Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
            Err(_) => Recipient::ChannelUsername(channel.to_string()),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| row.into_iter().filter_map(Self::button).collect())
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    fn button(button: InlineButton) -> Option<InlineKeyboardButton> {
        match button.action {
            ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(button.label, data)),
            ButtonAction::Url(raw) => match url::Url::parse(&raw) {
                Ok(parsed) => Some(InlineKeyboardButton::url(button.label, parsed)),
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "dropping button with invalid url");
                    None
                }
            },
        }
    }

    fn menu_markup(menu: ReplyMenu) -> KeyboardMarkup {
        let rows: Vec<Vec<KeyboardButton>> = menu
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(KeyboardButton::new).collect())
            .collect();
        KeyboardMarkup::new(rows).resize_keyboard(true)
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessengerPort for TelegramMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = Self::markup(keyboard);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_menu(&self, chat_id: ChatId, text: &str, menu: ReplyMenu) -> Result<MessageRef> {
        let markup = Self::menu_markup(menu);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_message_buttons(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()> {
        let markup = Self::markup(keyboard);
        self.with_retry(|| {
            self.bot
                .edit_message_reply_markup(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn send_channel_post(
        &self,
        channel: &str,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = Self::markup(keyboard);
        let recipient = Self::recipient(channel);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(recipient.clone(), text.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        })
    }
}

/// Converts a Telegram update into the core event model. Updates the core
/// does not consume (edits, channel posts, member changes) yield `None`.
pub fn inbound_event(update: teloxide::types::Update) -> Option<InboundEvent> {
    match update.kind {
        UpdateKind::Message(msg) => {
            let user = msg.from()?;
            let text = msg.text()?;
            Some(InboundEvent::Text(TextMessage {
                chat_id: ChatId(msg.chat.id.0),
                user_id: UserId(user.id.0 as i64),
                text: text.to_string(),
            }))
        }
        UpdateKind::CallbackQuery(q) => {
            let data = q.data?;
            let message = q.message?;
            let chat_id = ChatId(message.chat.id.0);
            Some(InboundEvent::Callback(CallbackEvent {
                chat_id,
                user_id: UserId(q.from.id.0 as i64),
                callback_id: q.id,
                data,
                message: Some(MessageRef {
                    chat_id,
                    message_id: MessageId(message.id.0),
                }),
            }))
        }
        _ => None,
    }
}
