//! User-facing message composition. All output is Telegram HTML; dynamic
//! content is escaped here, next to where it is interpolated.

use crate::{
    callback::CallbackAction,
    comments::CommentPage,
    config::Config,
    domain::ConfessionId,
    formatting::{escape_html, truncate_chars},
    messaging::types::{InlineButton, InlineKeyboard, ReplyMenu},
    users::UserProfile,
};

// Main-menu button labels. Pressing one arrives as a plain text message.
pub const BTN_SEND_CONFESSION: &str = "📝 Send Confession";
pub const BTN_PROFILE: &str = "👤 My Profile";
pub const BTN_PROMOTE: &str = "📢 Promote Bot";
pub const BTN_RULES: &str = "📌 Rules";
pub const BTN_ABOUT: &str = "ℹ️ About Us";

pub const BLOCKED_NOTICE: &str = "❌ Your account has been blocked by admin.";

pub const CONFESSION_PROMPT: &str = "✍️ <b>Send Your Confession</b>\n\nType your confession below (max 1000 characters):\n\nYou can add hashtags like #love #study #funny";

pub const COMMENT_PROMPT: &str = "📝 <b>Add Comment</b>\n\nType your comment for this confession:";

pub const REJECTION_REASON_PROMPT: &str =
    "❌ <b>Rejecting Confession</b>\n\nPlease provide rejection reason:";

pub const USERNAME_PROMPT: &str = "🤫 <b>Welcome to the Confession Bot!</b>\n\nFirst, please set your display name:\n\nEnter your desired name (3-20 characters, letters/numbers/underscores only):";

pub fn welcome_back(profile: &UserProfile) -> String {
    format!(
        "🤫 <b>Welcome back, {}!</b>\n\nSend me your confession and it will be submitted anonymously for admin approval.\n\nYour identity will never be revealed!",
        escape_html(&profile.username)
    )
}

pub fn main_menu(profile: &UserProfile) -> (String, ReplyMenu) {
    let level = profile.level();
    let text = format!(
        "🤫 <b>Confession Bot</b>\n\n👤 Profile: {}\n⭐ Reputation: {}\n🏆 Level: {} {} ({} comments)\n\nChoose an option below:",
        escape_html(&profile.username),
        profile.reputation,
        level.symbol,
        level.name(),
        profile.total_comments
    );

    let menu = ReplyMenu::new(vec![
        vec![BTN_SEND_CONFESSION.to_string(), BTN_PROFILE.to_string()],
        vec![BTN_PROMOTE.to_string(), BTN_RULES.to_string()],
        vec![BTN_ABOUT.to_string()],
    ]);

    (text, menu)
}

pub fn profile_view(profile: &UserProfile) -> String {
    let level = profile.level();
    let member_since = profile
        .joined_at
        .split('T')
        .next()
        .unwrap_or(&profile.joined_at)
        .to_string();

    format!(
        "👤 <b>My Profile</b>\n\n<b>Display Name:</b> {}\n<b>Level:</b> {} {} ({} comments)\n<b>Reputation:</b> {}⭐\n<b>Confessions:</b> {}\n<b>Member Since:</b> {}",
        escape_html(&profile.username),
        level.symbol,
        level.name(),
        profile.total_comments,
        profile.reputation,
        profile.total_confessions,
        member_since
    )
}

pub fn promote_view(cfg: &Config) -> (String, InlineKeyboard) {
    let text = format!(
        "📢 <b>Help Us Grow!</b>\n\nShare our bot with friends:\n{}\n\nJoin our channel for confessions:",
        cfg.bot_link()
    );

    let share_url = format!(
        "https://t.me/share/url?url={}&text=Check%20out%20this%20anonymous%20confession%20bot!",
        cfg.bot_link()
    );
    let mut keyboard = InlineKeyboard::row(vec![InlineButton::url("📤 Share Bot", share_url)]);
    if let Some(channel) = cfg.channel_link() {
        keyboard.push_row(vec![InlineButton::url("📢 Join Channel", channel)]);
    }

    (text, keyboard)
}

pub fn rules_view() -> String {
    "📌 <b>Rules</b>\n\n1. Stay anonymous — do not reveal names.\n2. No harassment, threats or doxxing.\n3. No advertising.\n4. Every confession is reviewed by moderators before it is posted.".to_string()
}

pub fn about_view() -> String {
    "ℹ️ <b>About Us</b>\n\nAn anonymous confession board. You write, moderators review, the channel reads. Your identity is never shown anywhere.".to_string()
}

pub fn submitted_view() -> (String, InlineKeyboard) {
    let text = "✅ <b>Confession Submitted!</b>\n\nYour confession is under review. You'll be notified when approved.".to_string();
    let keyboard = InlineKeyboard::new(vec![
        vec![
            InlineButton::callback("📝 Send Another", CallbackAction::SendConfession.encode()),
            InlineButton::callback("📢 Promote Bot", CallbackAction::PromoteBot.encode()),
        ],
        vec![InlineButton::callback(
            "🔙 Back to Menu",
            CallbackAction::BackToMenu.encode(),
        )],
    ]);
    (text, keyboard)
}

/// Full comment listing, one page at a time.
pub fn comment_page_view(page: &CommentPage, id: &ConfessionId) -> (String, InlineKeyboard) {
    let mut text = format!(
        "💬 <b>Comments for Confession #{}</b>\n\n<b>Confession Preview:</b>\n{}\n\n",
        page.confession_number,
        escape_html(&truncate_chars(&page.confession_text, 150))
    );

    if page.entries.is_empty() {
        text.push_str("No comments yet. Be the first to comment!\n");
    } else {
        let first = page.entries.first().map(|e| e.index).unwrap_or(0);
        let last = page.entries.last().map(|e| e.index).unwrap_or(0);
        text.push_str(&format!(
            "<b>Comments ({first}-{last} of {}):</b>\n\n",
            page.total_comments
        ));
        for entry in &page.entries {
            text.push_str(&format!(
                "{}. {}\n   - {} {}\n   📅 {}\n\n",
                entry.index,
                escape_html(&entry.comment.text),
                entry.author_level.symbol,
                escape_html(&entry.author_name),
                entry.comment.posted_at
            ));
        }
    }

    let mut keyboard = InlineKeyboard::row(vec![InlineButton::callback(
        "📝 Add Comment",
        CallbackAction::AddComment(id.clone()).encode(),
    )]);

    if page.total_pages > 1 {
        let mut row = Vec::new();
        if page.page > 1 {
            row.push(InlineButton::callback(
                "⬅️ Previous",
                CallbackAction::CommentsPage(id.clone(), page.page - 1).encode(),
            ));
        }
        row.push(InlineButton::callback(
            format!("{}/{}", page.page, page.total_pages),
            CallbackAction::CurrentPage.encode(),
        ));
        if page.page < page.total_pages {
            row.push(InlineButton::callback(
                "Next ➡️",
                CallbackAction::CommentsPage(id.clone(), page.page + 1).encode(),
            ));
        }
        keyboard.push_row(row);
    }

    keyboard.push_row(vec![
        InlineButton::callback("📝 Send Confession", CallbackAction::SendConfession.encode()),
        InlineButton::callback("🔙 Main Menu", CallbackAction::BackToMenu.encode()),
    ]);

    (text, keyboard)
}

/// Deep-link landing: confession preview plus the first few comments.
pub fn comment_landing_view(page: &CommentPage, id: &ConfessionId) -> (String, InlineKeyboard) {
    let mut text = format!(
        "💬 <b>Comments for Confession #{}</b>\n\n<b>Confession:</b>\n{}\n\n",
        page.confession_number,
        escape_html(&truncate_chars(&page.confession_text, 200))
    );

    if page.entries.is_empty() {
        text.push_str("No comments yet. Be the first to comment!\n");
    } else {
        text.push_str(&format!(
            "<b>Recent Comments ({} total):</b>\n\n",
            page.total_comments
        ));
        for entry in &page.entries {
            text.push_str(&format!(
                "{}. {}\n   - {}\n\n",
                entry.index,
                escape_html(&entry.comment.text),
                escape_html(&entry.author_name)
            ));
        }
    }

    let keyboard = InlineKeyboard::new(vec![
        vec![
            InlineButton::callback("📝 Add Comment", CallbackAction::AddComment(id.clone()).encode()),
            InlineButton::callback(
                "👁️ View All Comments",
                CallbackAction::CommentsPage(id.clone(), 1).encode(),
            ),
        ],
        vec![
            InlineButton::callback(
                "📝 Send Your Confession",
                CallbackAction::SendConfession.encode(),
            ),
            InlineButton::callback("🔙 Main Menu", CallbackAction::BackToMenu.encode()),
        ],
    ]);

    (text, keyboard)
}

pub fn admin_panel_view() -> String {
    "🔐 <b>Admin Panel</b>\n\nNew confessions arrive here automatically with Approve / Reject buttons. Reply to a reject prompt to record the reason.".to_string()
}
