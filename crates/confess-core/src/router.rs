//! Inbound event routing.
//!
//! Control flow per event: blocked-user check, then the conversation state
//! machine (a pending state consumes the message), then command dispatch,
//! then menu-button dispatch. Every externally triggered operation converts
//! its failure into a user-facing message here; nothing propagates to the
//! transport.

use std::sync::Arc;

use crate::{
    callback::{parse_start_payload, CallbackAction},
    comments::CommentThreads,
    confession::{ModerationOutcome, ModerationPipeline},
    config::Config,
    cooldown::{Cooldowns, ACTION_CONFESSION},
    domain::{ChatId, ConfessionId, UserId},
    errors::Error,
    messaging::{
        port::MessengerPort,
        types::{CallbackEvent, InboundEvent, InlineKeyboard, TextMessage},
    },
    notify::Notifier,
    sequence::SequenceGenerator,
    state::{ConversationState, StateStore},
    store::DocumentStore,
    users::UserDirectory,
    views, Result,
};

/// Number of comments shown on the deep-link landing view.
const LANDING_COMMENTS: usize = 3;

/// The application graph: one instance per process, shared by every inbound
/// event.
pub struct App {
    pub cfg: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub users: Arc<UserDirectory>,
    pub states: StateStore,
    pub cooldowns: Cooldowns,
    pub threads: Arc<CommentThreads>,
    pub notifier: Arc<Notifier>,
    pub pipeline: Arc<ModerationPipeline>,
    pub messenger: Arc<dyn MessengerPort>,
}

impl App {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn DocumentStore>,
        messenger: Arc<dyn MessengerPort>,
    ) -> Self {
        let users = Arc::new(UserDirectory::new(store.clone()));
        let notifier = Arc::new(Notifier::new(users.clone(), messenger.clone()));
        let threads = Arc::new(CommentThreads::new(
            store.clone(),
            users.clone(),
            notifier.clone(),
        ));
        let cooldowns = Cooldowns::new(store.clone());
        let pipeline = Arc::new(ModerationPipeline::new(
            cfg.clone(),
            store.clone(),
            users.clone(),
            SequenceGenerator::new(store.clone()),
            cooldowns.clone(),
            threads.clone(),
            notifier.clone(),
            messenger.clone(),
        ));

        Self {
            cfg,
            store: store.clone(),
            users,
            states: StateStore::new(store),
            cooldowns,
            threads,
            notifier,
            pipeline,
            messenger,
        }
    }

    /// Entry point for the transport. Never fails: every error ends as a
    /// user-facing message plus a log line.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Text(msg) => {
                let chat = msg.chat_id;
                let user = msg.user_id;
                if let Err(err) = self.handle_text(msg).await {
                    self.report_text_error(chat, user, err).await;
                }
            }
            InboundEvent::Callback(ev) => {
                let callback_id = ev.callback_id.clone();
                if let Err(err) = self.handle_callback(ev).await {
                    tracing::error!(error = %err, "callback handling failed");
                    let _ = self
                        .messenger
                        .answer_callback(&callback_id, Some(&err.user_message()))
                        .await;
                }
            }
        }
    }

    // ============== Text messages ==============

    async fn handle_text(&self, msg: TextMessage) -> Result<()> {
        if msg.text.trim().is_empty() {
            return Ok(());
        }

        let profile = self.users.get_or_create(msg.user_id).await?;
        if !profile.active {
            self.messenger
                .send_text(msg.chat_id, views::BLOCKED_NOTICE)
                .await?;
            return Ok(());
        }

        // A pending state consumes the message, whatever it contains.
        if let Some(state) = self.states.take(msg.user_id).await? {
            return self.handle_stateful_text(msg, state).await;
        }

        if msg.text.trim().starts_with('/') {
            return self.handle_command(msg).await;
        }

        self.handle_menu_text(msg).await
    }

    async fn handle_stateful_text(&self, msg: TextMessage, state: ConversationState) -> Result<()> {
        match state {
            ConversationState::AwaitingUsername => {
                let requested = msg.text.trim();
                match self.users.set_username(msg.user_id, requested).await {
                    Ok(profile) => {
                        self.messenger
                            .send_text(
                                msg.chat_id,
                                &format!("✅ Display name updated to {}!", profile.username),
                            )
                            .await?;
                        self.show_main_menu(msg.chat_id, msg.user_id).await
                    }
                    Err(Error::Validation(reason)) => {
                        // The one retry loop: re-arm and re-prompt.
                        self.states
                            .set(msg.user_id, ConversationState::AwaitingUsername)
                            .await?;
                        self.messenger
                            .send_text(msg.chat_id, &format!("❌ {reason}"))
                            .await?;
                        Ok(())
                    }
                    Err(other) => Err(other),
                }
            }

            ConversationState::AwaitingConfession => {
                self.pipeline.submit(msg.user_id, &msg.text).await?;
                let (text, keyboard) = views::submitted_view();
                self.messenger
                    .send_keyboard(msg.chat_id, &text, keyboard)
                    .await?;
                Ok(())
            }

            ConversationState::AwaitingComment { confession } => {
                self.threads
                    .append(&confession, msg.user_id, &msg.text)
                    .await?;
                self.messenger
                    .send_text(msg.chat_id, "✅ Comment added successfully!")
                    .await?;
                self.send_comment_page(msg.chat_id, &confession, 1).await
            }

            ConversationState::AwaitingRejectionReason { confession } => {
                // Defense in depth: the state was armed through an admin-only
                // button, but re-check before acting. Failure is silent.
                if !self.cfg.is_admin(msg.user_id) {
                    tracing::warn!(
                        user_id = msg.user_id.0,
                        confession = %confession,
                        "dropping rejection reason from non-admin"
                    );
                    return Ok(());
                }

                match self
                    .pipeline
                    .reject(msg.user_id, &confession, msg.text.trim())
                    .await?
                {
                    ModerationOutcome::Rejected(_) => {
                        self.messenger
                            .send_text(msg.chat_id, "✅ Confession rejected.")
                            .await?;
                    }
                    ModerationOutcome::AlreadyModerated(_) => {
                        self.messenger
                            .send_text(msg.chat_id, "ℹ️ This confession was already moderated.")
                            .await?;
                    }
                    ModerationOutcome::Approved(_) => {}
                }
                Ok(())
            }
        }
    }

    async fn handle_command(&self, msg: TextMessage) -> Result<()> {
        let (cmd, args) = parse_command(&msg.text);
        match cmd.as_str() {
            "start" => self.handle_start(msg.chat_id, msg.user_id, &args).await,
            "admin" => {
                if !self.cfg.is_admin(msg.user_id) {
                    tracing::warn!(user_id = msg.user_id.0, "/admin denied");
                    return Err(Error::Permission(format!(
                        "user {} is not an admin",
                        msg.user_id.0
                    )));
                }
                self.messenger
                    .send_text(msg.chat_id, &views::admin_panel_view())
                    .await?;
                Ok(())
            }
            _ => self.show_main_menu(msg.chat_id, msg.user_id).await,
        }
    }

    async fn handle_start(&self, chat: ChatId, user: UserId, args: &str) -> Result<()> {
        // Deep link from a channel post: land on the comment view.
        if let Some(confession) = parse_start_payload(args) {
            return self.send_comment_landing(chat, &confession).await;
        }

        let profile = self.users.get_or_create(user).await?;
        if profile.is_anonymous() {
            self.states
                .set(user, ConversationState::AwaitingUsername)
                .await?;
            self.messenger.send_text(chat, views::USERNAME_PROMPT).await?;
            return Ok(());
        }

        self.messenger
            .send_text(chat, &views::welcome_back(&profile))
            .await?;
        self.show_main_menu(chat, user).await
    }

    async fn handle_menu_text(&self, msg: TextMessage) -> Result<()> {
        match msg.text.trim() {
            views::BTN_SEND_CONFESSION => self.begin_confession(msg.chat_id, msg.user_id).await,
            views::BTN_PROFILE => {
                let profile = self.users.get_or_create(msg.user_id).await?;
                self.messenger
                    .send_text(msg.chat_id, &views::profile_view(&profile))
                    .await?;
                Ok(())
            }
            views::BTN_PROMOTE => self.send_promote(msg.chat_id).await,
            views::BTN_RULES => {
                self.messenger
                    .send_text(msg.chat_id, &views::rules_view())
                    .await?;
                Ok(())
            }
            views::BTN_ABOUT => {
                self.messenger
                    .send_text(msg.chat_id, &views::about_view())
                    .await?;
                Ok(())
            }
            _ => self.show_main_menu(msg.chat_id, msg.user_id).await,
        }
    }

    // ============== Callbacks ==============

    async fn handle_callback(&self, ev: CallbackEvent) -> Result<()> {
        let profile = self.users.get_or_create(ev.user_id).await?;
        if !profile.active {
            self.messenger
                .answer_callback(&ev.callback_id, Some(views::BLOCKED_NOTICE))
                .await?;
            return Ok(());
        }

        let Some(action) = CallbackAction::parse(&ev.data) else {
            tracing::debug!(data = %ev.data, "ignoring unknown callback data");
            self.messenger.answer_callback(&ev.callback_id, None).await?;
            return Ok(());
        };

        match self.dispatch_callback(&ev, action).await {
            Ok(toast) => {
                self.messenger
                    .answer_callback(&ev.callback_id, toast.as_deref())
                    .await?;
                Ok(())
            }
            Err(err) => {
                self.report_callback_error(&ev, err).await;
                Ok(())
            }
        }
    }

    /// Returns the toast text for the callback answer.
    async fn dispatch_callback(
        &self,
        ev: &CallbackEvent,
        action: CallbackAction,
    ) -> Result<Option<String>> {
        match action {
            CallbackAction::Approve(id) => {
                match self.pipeline.approve(ev.user_id, &id).await? {
                    ModerationOutcome::Approved(_) => {
                        // Remove the accept/reject controls from the
                        // moderation request message, best-effort.
                        if let Some(msg) = ev.message {
                            let _ = self
                                .messenger
                                .edit_message_buttons(msg, InlineKeyboard::empty())
                                .await;
                        }
                        Ok(Some("✅ Confession approved!".to_string()))
                    }
                    ModerationOutcome::AlreadyModerated(_) => {
                        Ok(Some("ℹ️ Already moderated.".to_string()))
                    }
                    ModerationOutcome::Rejected(_) => Ok(None),
                }
            }

            CallbackAction::Reject(id) => {
                if !self.cfg.is_admin(ev.user_id) {
                    tracing::warn!(user_id = ev.user_id.0, "reject denied");
                    return Err(Error::Permission(format!(
                        "user {} is not an admin",
                        ev.user_id.0
                    )));
                }
                self.states
                    .set(
                        ev.user_id,
                        ConversationState::AwaitingRejectionReason { confession: id },
                    )
                    .await?;
                self.messenger
                    .send_text(ev.chat_id, views::REJECTION_REASON_PROMPT)
                    .await?;
                Ok(Some("Please provide rejection reason".to_string()))
            }

            CallbackAction::AddComment(id) => {
                self.states
                    .set(
                        ev.user_id,
                        ConversationState::AwaitingComment { confession: id },
                    )
                    .await?;
                self.messenger
                    .send_text(ev.chat_id, views::COMMENT_PROMPT)
                    .await?;
                Ok(None)
            }

            CallbackAction::CommentsPage(id, page) => {
                self.send_comment_page(ev.chat_id, &id, page).await?;
                Ok(None)
            }

            CallbackAction::SendConfession => {
                self.begin_confession(ev.chat_id, ev.user_id).await?;
                Ok(None)
            }

            CallbackAction::BackToMenu => {
                self.show_main_menu(ev.chat_id, ev.user_id).await?;
                Ok(None)
            }

            CallbackAction::PromoteBot => {
                self.send_promote(ev.chat_id).await?;
                Ok(None)
            }

            CallbackAction::CurrentPage => Ok(None),
        }
    }

    // ============== Shared steps ==============

    /// Cooldown gate, then arm the confession state and prompt.
    async fn begin_confession(&self, chat: ChatId, user: UserId) -> Result<()> {
        let window = self.cfg.confession_cooldown;
        if !self
            .cooldowns
            .allowed(user, ACTION_CONFESSION, window)
            .await?
        {
            let remaining = self
                .cooldowns
                .remaining(user, ACTION_CONFESSION, window)
                .await?
                .unwrap_or_default();
            return Err(Error::RateLimited {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        self.states
            .set(user, ConversationState::AwaitingConfession)
            .await?;
        self.messenger
            .send_text(chat, views::CONFESSION_PROMPT)
            .await?;
        Ok(())
    }

    async fn show_main_menu(&self, chat: ChatId, user: UserId) -> Result<()> {
        let profile = self.users.get_or_create(user).await?;
        let (text, menu) = views::main_menu(&profile);
        self.messenger.send_menu(chat, &text, menu).await?;
        Ok(())
    }

    async fn send_promote(&self, chat: ChatId) -> Result<()> {
        let (text, keyboard) = views::promote_view(&self.cfg);
        self.messenger.send_keyboard(chat, &text, keyboard).await?;
        Ok(())
    }

    async fn send_comment_page(
        &self,
        chat: ChatId,
        confession: &ConfessionId,
        page: usize,
    ) -> Result<()> {
        let page = self
            .threads
            .page(confession, page, self.cfg.comment_page_size)
            .await?;
        let (text, keyboard) = views::comment_page_view(&page, confession);
        self.messenger.send_keyboard(chat, &text, keyboard).await?;
        Ok(())
    }

    async fn send_comment_landing(&self, chat: ChatId, confession: &ConfessionId) -> Result<()> {
        let page = self.threads.page(confession, 1, LANDING_COMMENTS).await?;
        let (text, keyboard) = views::comment_landing_view(&page, confession);
        self.messenger.send_keyboard(chat, &text, keyboard).await?;
        Ok(())
    }

    // ============== Error reporting ==============

    async fn report_text_error(&self, chat: ChatId, user: UserId, err: Error) {
        match &err {
            Error::Validation(_) | Error::RateLimited { .. } | Error::NotFound(_) => {
                tracing::info!(user_id = user.0, error = %err, "rejected input")
            }
            Error::Permission(_) => {
                tracing::warn!(user_id = user.0, error = %err, "permission denied")
            }
            other => tracing::error!(user_id = user.0, error = %other, "handler failed"),
        }

        let _ = self.messenger.send_text(chat, &err.user_message()).await;
        if matches!(err, Error::NotFound(_)) {
            let _ = self.show_main_menu(chat, user).await;
        }
    }

    async fn report_callback_error(&self, ev: &CallbackEvent, err: Error) {
        match &err {
            Error::Validation(_) | Error::RateLimited { .. } | Error::NotFound(_) => {
                tracing::info!(user_id = ev.user_id.0, error = %err, "rejected callback")
            }
            Error::Permission(_) => {
                tracing::warn!(user_id = ev.user_id.0, error = %err, "permission denied")
            }
            other => tracing::error!(user_id = ev.user_id.0, error = %other, "callback failed"),
        }

        let _ = self
            .messenger
            .answer_callback(&ev.callback_id, Some(&err.user_message()))
            .await;
        if matches!(err, Error::NotFound(_)) {
            let _ = self.show_main_menu(ev.chat_id, ev.user_id).await;
        }
    }
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confession::ConfessionStatus;
    use crate::test_support::{Fixture, ADMIN};

    fn text(user: i64, text: &str) -> InboundEvent {
        InboundEvent::Text(TextMessage {
            chat_id: ChatId(user),
            user_id: UserId(user),
            text: text.to_string(),
        })
    }

    fn callback(user: i64, data: &str) -> InboundEvent {
        InboundEvent::Callback(CallbackEvent {
            chat_id: ChatId(user),
            user_id: UserId(user),
            callback_id: format!("cb-{user}-{data}"),
            data: data.to_string(),
            message: None,
        })
    }

    fn callback_on_message(user: i64, data: &str, message_id: i32) -> InboundEvent {
        InboundEvent::Callback(CallbackEvent {
            chat_id: ChatId(user),
            user_id: UserId(user),
            callback_id: format!("cb-{user}-{data}"),
            data: data.to_string(),
            message: Some(crate::domain::MessageRef {
                chat_id: ChatId(user),
                message_id: crate::domain::MessageId(message_id),
            }),
        })
    }

    #[test]
    fn commands_parse_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/start comment_confess_1_2"),
            ("start".to_string(), "comment_confess_1_2".to_string())
        );
        assert_eq!(parse_command("/START@confessor_bot"), ("start".to_string(), String::new()));
        assert_eq!(parse_command("/admin"), ("admin".to_string(), String::new()));
    }

    #[tokio::test]
    async fn first_contact_prompts_for_a_display_name() {
        let fx = Fixture::new().await;
        fx.app.handle_event(text(1, "/start")).await;

        let sent = fx.messenger.texts_for(1).await;
        assert!(sent.iter().any(|t| t.contains("display name")));
        assert_eq!(
            fx.states.peek(UserId(1)).await.unwrap(),
            Some(ConversationState::AwaitingUsername)
        );

        fx.app.handle_event(text(1, "fresh_user")).await;
        let profile = fx.users.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(profile.username, "fresh_user");
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);
        assert_eq!(fx.messenger.menus_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn username_validation_failure_re_arms_the_state() {
        let fx = Fixture::new().await;
        fx.app.handle_event(text(1, "/start")).await;

        fx.app.handle_event(text(1, "ab")).await;
        assert!(fx
            .messenger
            .texts_for(1)
            .await
            .iter()
            .any(|t| t.contains("Invalid username")));
        assert_eq!(
            fx.states.peek(UserId(1)).await.unwrap(),
            Some(ConversationState::AwaitingUsername)
        );

        fx.app.handle_event(text(1, "better_name")).await;
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn confession_flow_submits_and_publishes() {
        let fx = Fixture::new().await;
        fx.named_user(1, "author_one").await;

        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;
        assert_eq!(
            fx.states.peek(UserId(1)).await.unwrap(),
            Some(ConversationState::AwaitingConfession)
        );

        fx.app.handle_event(text(1, "my deep secret #first")).await;
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);

        // One moderation request reached the admin.
        let requests = fx.messenger.keyboards_for(ADMIN.0).await;
        assert_eq!(requests.len(), 1);

        // Admin approves via the inline button.
        let confession_id = fx.only_confession_id().await;
        fx.app
            .handle_event(callback_on_message(
                ADMIN.0,
                &format!("approve_{confession_id}"),
                77,
            ))
            .await;

        let posts = fx.messenger.channel_posts().await;
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("my deep secret"));

        let stored = fx.pipeline.get(&confession_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Approved);

        // The moderation request had its accept/reject controls cleared.
        let edits = fx.messenger.button_edits().await;
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0.message_id, crate::domain::MessageId(77));
        assert_eq!(edits[0].1, 0);
    }

    #[tokio::test]
    async fn cooldown_rejects_a_quick_second_submission() {
        let fx = Fixture::new().await;
        fx.named_user(1, "author_one").await;

        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;
        fx.app.handle_event(text(1, "first confession today")).await;

        fx.messenger.clear().await;
        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;

        let sent = fx.messenger.texts_for(1).await;
        assert!(sent.iter().any(|t| t.contains("Please wait")));
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn blocked_users_get_a_notice_and_nothing_else() {
        let fx = Fixture::new().await;
        let mut profile = fx.users.get_or_create(UserId(1)).await.unwrap();
        profile.active = false;
        fx.users.save(&profile).await.unwrap();

        fx.app.handle_event(text(1, "/start")).await;
        let sent = fx.messenger.texts_for(1).await;
        assert_eq!(sent, vec![views::BLOCKED_NOTICE.to_string()]);
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);

        fx.app.handle_event(callback(1, "send_confession")).await;
        let answers = fx.messenger.callback_answers().await;
        assert!(answers
            .iter()
            .any(|(_, toast)| toast.as_deref() == Some(views::BLOCKED_NOTICE)));
        assert_eq!(fx.states.peek(UserId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_comment_still_consumes_the_state() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "a published one").await;

        fx.app
            .handle_event(callback(2, &format!("add_comment_{id}")))
            .await;
        assert!(fx.states.peek(UserId(2)).await.unwrap().is_some());

        fx.app.handle_event(text(2, "no")).await;
        assert!(fx
            .messenger
            .texts_for(2)
            .await
            .iter()
            .any(|t| t.contains("Comment too short")));
        // Ask-once: the state is gone even though the input was invalid.
        assert_eq!(fx.states.peek(UserId(2)).await.unwrap(), None);

        // The next message falls through to the menu.
        fx.messenger.clear().await;
        fx.app.handle_event(text(2, "no")).await;
        assert_eq!(fx.messenger.menus_for(2).await.len(), 1);
    }

    #[tokio::test]
    async fn rejection_is_a_two_step_flow() {
        let fx = Fixture::new().await;
        fx.named_user(1, "author_one").await;
        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;
        fx.app.handle_event(text(1, "about to be rejected")).await;
        let id = fx.only_confession_id().await;

        fx.app
            .handle_event(callback(ADMIN.0, &format!("reject_{id}")))
            .await;
        assert_eq!(
            fx.states.peek(ADMIN).await.unwrap(),
            Some(ConversationState::AwaitingRejectionReason {
                confession: id.clone()
            })
        );

        fx.messenger.clear().await;
        fx.app.handle_event(text(ADMIN.0, "spam")).await;

        let stored = fx.pipeline.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("spam"));

        // Author saw the reason; admin saw the confirmation.
        assert!(fx
            .messenger
            .texts_for(1)
            .await
            .iter()
            .any(|t| t.contains("spam")));
        assert!(fx
            .messenger
            .texts_for(ADMIN.0)
            .await
            .iter()
            .any(|t| t.contains("Confession rejected")));
    }

    #[tokio::test]
    async fn non_admins_cannot_moderate() {
        let fx = Fixture::new().await;
        fx.named_user(1, "author_one").await;
        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;
        fx.app.handle_event(text(1, "pending confession")).await;
        let id = fx.only_confession_id().await;

        fx.app.handle_event(callback(2, &format!("approve_{id}"))).await;
        let answers = fx.messenger.callback_answers().await;
        assert!(answers
            .iter()
            .any(|(_, toast)| toast.as_deref() == Some("❌ Access denied")));

        let stored = fx.pipeline.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Pending);
    }

    #[tokio::test]
    async fn replayed_rejection_state_from_non_admin_is_dropped() {
        let fx = Fixture::new().await;
        fx.named_user(1, "author_one").await;
        fx.app.handle_event(text(1, views::BTN_SEND_CONFESSION)).await;
        fx.app.handle_event(text(1, "pending confession")).await;
        let id = fx.only_confession_id().await;

        // A non-admin somehow holding the admin-only state.
        fx.states
            .set(
                UserId(2),
                ConversationState::AwaitingRejectionReason {
                    confession: id.clone(),
                },
            )
            .await
            .unwrap();

        fx.messenger.clear().await;
        fx.app.handle_event(text(2, "bogus reason")).await;

        // Silently dropped: state cleared, nothing rejected, no reply.
        assert_eq!(fx.states.peek(UserId(2)).await.unwrap(), None);
        let stored = fx.pipeline.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfessionStatus::Pending);
        assert!(fx.messenger.texts_for(2).await.is_empty());
    }

    #[tokio::test]
    async fn deep_link_lands_on_the_comment_view() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "a published one").await;
        fx.threads.append(&id, UserId(3), "first comment").await.unwrap();

        fx.messenger.clear().await;
        fx.app
            .handle_event(text(2, &format!("/start comment_{id}")))
            .await;

        let sent = fx.messenger.keyboards_for(2).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("a published one"));
        assert!(sent[0].0.contains("first comment"));
    }

    #[tokio::test]
    async fn missing_confession_deep_link_reports_and_shows_menu() {
        let fx = Fixture::new().await;
        fx.named_user(2, "curious_cat").await;
        fx.messenger.clear().await;

        fx.app
            .handle_event(text(2, "/start comment_confess_9_9"))
            .await;

        let sent = fx.messenger.texts_for(2).await;
        assert!(sent.iter().any(|t| t.contains("not found")));
        assert_eq!(fx.messenger.menus_for(2).await.len(), 1);
    }

    #[tokio::test]
    async fn comments_pagination_via_callbacks() {
        let fx = Fixture::new().await;
        let id = fx.published_confession(UserId(10), "a published one").await;
        for i in 1..=12 {
            fx.threads
                .append(&id, UserId(100 + i), &format!("comment number {i}"))
                .await
                .unwrap();
        }

        fx.messenger.clear().await;
        fx.app
            .handle_event(callback(2, &format!("comments_page_{id}_3")))
            .await;

        let sent = fx.messenger.keyboards_for(2).await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("comment number 11"));
        assert!(sent[0].0.contains("comment number 12"));
        assert!(!sent[0].0.contains("comment number 10"));
    }

    #[tokio::test]
    async fn unknown_text_and_commands_fall_back_to_the_menu() {
        let fx = Fixture::new().await;
        fx.named_user(1, "wanderer_7").await;
        fx.messenger.clear().await;

        fx.app.handle_event(text(1, "/help")).await;
        fx.app.handle_event(text(1, "what is this")).await;
        assert_eq!(fx.messenger.menus_for(1).await.len(), 2);
    }

    #[tokio::test]
    async fn admin_command_is_admin_only() {
        let fx = Fixture::new().await;
        fx.named_user(1, "plain_user").await;
        fx.messenger.clear().await;

        fx.app.handle_event(text(1, "/admin")).await;
        assert!(fx
            .messenger
            .texts_for(1)
            .await
            .iter()
            .any(|t| t.contains("Access denied")));

        fx.app.handle_event(text(ADMIN.0, "/admin")).await;
        assert!(fx
            .messenger
            .texts_for(ADMIN.0)
            .await
            .iter()
            .any(|t| t.contains("Admin Panel")));
    }

    #[tokio::test]
    async fn unknown_callback_data_is_answered_and_ignored() {
        let fx = Fixture::new().await;
        fx.app.handle_event(callback(1, "launch_missiles")).await;
        let answers = fx.messenger.callback_answers().await;
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].1, None);
    }
}
