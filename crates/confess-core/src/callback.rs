//! Inbound `verb_argument` callback tokens and `/start` deep-link payloads.

use crate::domain::ConfessionId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Approve(ConfessionId),
    Reject(ConfessionId),
    AddComment(ConfessionId),
    CommentsPage(ConfessionId, usize),
    SendConfession,
    BackToMenu,
    PromoteBot,
    /// The inert page indicator between the pagination arrows.
    CurrentPage,
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            CallbackAction::Approve(id) => format!("approve_{id}"),
            CallbackAction::Reject(id) => format!("reject_{id}"),
            CallbackAction::AddComment(id) => format!("add_comment_{id}"),
            CallbackAction::CommentsPage(id, page) => format!("comments_page_{id}_{page}"),
            CallbackAction::SendConfession => "send_confession".to_string(),
            CallbackAction::BackToMenu => "back_to_menu".to_string(),
            CallbackAction::PromoteBot => "promote_bot".to_string(),
            CallbackAction::CurrentPage => "current_page".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "send_confession" => return Some(CallbackAction::SendConfession),
            "back_to_menu" => return Some(CallbackAction::BackToMenu),
            "promote_bot" => return Some(CallbackAction::PromoteBot),
            "current_page" => return Some(CallbackAction::CurrentPage),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("approve_") {
            return Some(CallbackAction::Approve(ConfessionId(rest.to_string())));
        }
        if let Some(rest) = data.strip_prefix("reject_") {
            return Some(CallbackAction::Reject(ConfessionId(rest.to_string())));
        }
        if let Some(rest) = data.strip_prefix("add_comment_") {
            return Some(CallbackAction::AddComment(ConfessionId(rest.to_string())));
        }
        if let Some(rest) = data.strip_prefix("comments_page_") {
            // Confession ids contain underscores; the page number is the part
            // after the last one.
            let (id, page) = rest.rsplit_once('_')?;
            let page = page.parse::<usize>().ok()?;
            if id.is_empty() {
                return None;
            }
            return Some(CallbackAction::CommentsPage(
                ConfessionId(id.to_string()),
                page,
            ));
        }

        None
    }
}

/// `/start comment_<confessionId>` deep-link payload.
pub fn parse_start_payload(args: &str) -> Option<ConfessionId> {
    args.trim()
        .strip_prefix("comment_")
        .filter(|rest| !rest.is_empty())
        .map(|rest| ConfessionId(rest.to_string()))
}
