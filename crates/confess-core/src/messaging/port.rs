use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, ReplyMenu},
    Result,
};

/// Outbound transport port.
///
/// Telegram is the first implementation; the shape stays narrow enough that
/// other chat transports could fit behind it. All `text` arguments are HTML.
#[async_trait]
pub trait MessengerPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn send_menu(&self, chat_id: ChatId, text: &str, menu: ReplyMenu) -> Result<MessageRef>;

    /// Replaces the inline keyboard of an already-delivered message.
    async fn edit_message_buttons(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()>;

    /// Acknowledges a button press, optionally with a toast text.
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    /// Posts to the public channel (`@name` or numeric id).
    async fn send_channel_post(
        &self,
        channel: &str,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;
}
