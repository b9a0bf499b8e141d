use crate::domain::{ChatId, MessageRef, UserId};

/// Transport-neutral inbound event model.
///
/// Telegram-specific fields live in the Telegram adapter; the router only
/// ever sees these two shapes.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Text(TextMessage),
    Callback(CallbackEvent),
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}

/// Button press. `data` is an opaque `verb_argument` token.
#[derive(Clone, Debug)]
pub struct CallbackEvent {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub callback_id: String,
    pub data: String,
    /// The message the pressed button was attached to, when known.
    pub message: Option<MessageRef>,
}

/// Inline keyboard attached to a single message.
#[derive(Clone, Debug, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Single-row keyboard.
    pub fn row(buttons: Vec<InlineButton>) -> Self {
        Self { rows: vec![buttons] }
    }

    /// Keyboard with no buttons; editing a message to this clears them.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, buttons: Vec<InlineButton>) {
        self.rows.push(buttons);
    }
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Clone, Debug)]
pub enum ButtonAction {
    /// Sends the token back as a callback event.
    Callback(String),
    /// Opens an external link.
    Url(String),
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Persistent reply keyboard (the main menu). Rows of button labels; pressing
/// one sends its label back as a plain text message.
#[derive(Clone, Debug)]
pub struct ReplyMenu {
    pub rows: Vec<Vec<String>>,
}

impl ReplyMenu {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}
