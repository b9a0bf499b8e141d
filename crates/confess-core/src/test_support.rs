//! Shared test fixtures: an app wired to the in-memory store and a recording
//! messenger double.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    callback::CallbackAction,
    comments::CommentThreads,
    confession::ModerationPipeline,
    config::Config,
    cooldown::Cooldowns,
    domain::{ChatId, ConfessionId, MessageId, MessageRef, UserId},
    messaging::{
        port::MessengerPort,
        types::{ButtonAction, InlineKeyboard, ReplyMenu},
    },
    router::App,
    state::StateStore,
    store::{DocumentStore, MemoryStore},
    users::UserDirectory,
    Result,
};

/// The single admin configured by [`test_config`].
pub const ADMIN: UserId = UserId(99);

pub fn test_config() -> Config {
    Config {
        bot_token: "TEST:TOKEN".to_string(),
        admin_ids: vec![ADMIN.0],
        channel_id: "@confessions".to_string(),
        bot_username: "confessor_bot".to_string(),
        webhook_addr: "127.0.0.1:0".parse().unwrap(),
        webhook_path: "/api/bot".to_string(),
        confession_cooldown: std::time::Duration::from_millis(60_000),
        comment_page_size: 5,
        store_path: None,
    }
}

#[derive(Clone, Debug)]
pub enum Sent {
    Text {
        chat: i64,
        text: String,
    },
    Keyboard {
        chat: i64,
        text: String,
        keyboard: InlineKeyboard,
    },
    Menu {
        chat: i64,
        text: String,
    },
    ChannelPost {
        channel: String,
        text: String,
        keyboard: InlineKeyboard,
    },
    ButtonsEdited {
        message: MessageRef,
        buttons: usize,
    },
    CallbackAnswered {
        callback_id: String,
        toast: Option<String>,
    },
}

/// MessengerPort double that records every outbound call.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    next_message_id: AtomicI32,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ref(&self, chat: i64) -> MessageRef {
        MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn texts_for(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text } if *c == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn keyboards_for(&self, chat: i64) -> Vec<(String, InlineKeyboard)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Keyboard {
                    chat: c,
                    text,
                    keyboard,
                } if *c == chat => Some((text.clone(), keyboard.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn menus_for(&self, chat: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Menu { chat: c, text } if *c == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn channel_posts(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::ChannelPost { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn channel_targets(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::ChannelPost { channel, .. } => Some(channel.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn channel_keyboards(&self) -> Vec<InlineKeyboard> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::ChannelPost { keyboard, .. } => Some(keyboard.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn callback_answers(&self) -> Vec<(String, Option<String>)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::CallbackAnswered { callback_id, toast } => {
                    Some((callback_id.clone(), toast.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub async fn button_edits(&self) -> Vec<(MessageRef, usize)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::ButtonsEdited { message, buttons } => Some((*message, *buttons)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessengerPort for RecordingMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.sent.lock().await.push(Sent::Text {
            chat: chat_id.0,
            text: text.to_string(),
        });
        Ok(self.next_ref(chat_id.0))
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.sent.lock().await.push(Sent::Keyboard {
            chat: chat_id.0,
            text: text.to_string(),
            keyboard,
        });
        Ok(self.next_ref(chat_id.0))
    }

    async fn send_menu(&self, chat_id: ChatId, text: &str, _menu: ReplyMenu) -> Result<MessageRef> {
        self.sent.lock().await.push(Sent::Menu {
            chat: chat_id.0,
            text: text.to_string(),
        });
        Ok(self.next_ref(chat_id.0))
    }

    async fn edit_message_buttons(&self, msg: MessageRef, keyboard: InlineKeyboard) -> Result<()> {
        self.sent.lock().await.push(Sent::ButtonsEdited {
            message: msg,
            buttons: keyboard.rows.iter().map(Vec::len).sum(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.sent.lock().await.push(Sent::CallbackAnswered {
            callback_id: callback_id.to_string(),
            toast: text.map(|s| s.to_string()),
        });
        Ok(())
    }

    async fn send_channel_post(
        &self,
        channel: &str,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.sent.lock().await.push(Sent::ChannelPost {
            channel: channel.to_string(),
            text: text.to_string(),
            keyboard,
        });
        Ok(self.next_ref(0))
    }
}

/// A fully wired app over MemoryStore + RecordingMessenger, with the service
/// handles the component tests drive directly.
pub struct Fixture {
    pub cfg: Arc<Config>,
    pub app: Arc<App>,
    pub messenger: Arc<RecordingMessenger>,
    pub users: Arc<UserDirectory>,
    pub states: StateStore,
    pub cooldowns: Cooldowns,
    pub pipeline: Arc<ModerationPipeline>,
    pub threads: Arc<CommentThreads>,
}

impl Fixture {
    pub async fn new() -> Self {
        let cfg = Arc::new(test_config());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let port: Arc<dyn MessengerPort> = messenger.clone();
        let app = Arc::new(App::new(cfg.clone(), store, port));

        Self {
            cfg,
            messenger,
            users: app.users.clone(),
            states: app.states.clone(),
            cooldowns: app.cooldowns.clone(),
            pipeline: app.pipeline.clone(),
            threads: app.threads.clone(),
            app,
        }
    }

    /// Creates a profile with a chosen display name.
    pub async fn named_user(&self, id: i64, name: &str) {
        self.users
            .set_username(UserId(id), name)
            .await
            .expect("set_username");
    }

    /// Submits and approves a confession, returning its id.
    pub async fn published_confession(&self, author: UserId, text: &str) -> ConfessionId {
        let confession = self.pipeline.submit(author, text).await.expect("submit");
        self.pipeline
            .approve(ADMIN, &confession.id)
            .await
            .expect("approve");
        confession.id
    }

    /// Extracts the confession id from the approve button of the last
    /// moderation request sent to the admin.
    pub async fn only_confession_id(&self) -> ConfessionId {
        let keyboards = self.messenger.keyboards_for(ADMIN.0).await;
        let (_, keyboard) = keyboards.last().expect("no moderation request sent");

        for row in &keyboard.rows {
            for button in row {
                if let ButtonAction::Callback(data) = &button.action {
                    if let Some(CallbackAction::Approve(id)) = CallbackAction::parse(data) {
                        return id;
                    }
                }
            }
        }
        panic!("no approve button in the moderation request");
    }
}
