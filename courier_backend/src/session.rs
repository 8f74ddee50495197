use serde::Serialize;

use crate::model::Message;

/// The page the operator is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Menu,
    UserList,
    Compose,
    Inbox,
    Conversation,
}

/// Transient interaction state. Lives only as long as the process.
#[derive(Debug, Clone)]
pub struct Session {
    pub active_recipient: String,
    pub current_page: PageState,
    pub draft_text: String,
    pub pending_outbound: Option<Message>,
    /// Lit when an inbox entry arrives, cleared once the inbox is drained.
    pub unread: bool,
}

impl Session {
    pub fn new(default_recipient: impl Into<String>) -> Self {
        Self {
            active_recipient: default_recipient.into(),
            current_page: PageState::Menu,
            draft_text: String::new(),
            pending_outbound: None,
            unread: false,
        }
    }
}
