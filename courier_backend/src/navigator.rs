//! Operator page state machine.
//!
//! | page         | key          | effect                                  | next         |
//! |--------------|--------------|-----------------------------------------|--------------|
//! | Menu         | `1`          | load user list                          | UserList     |
//! | Menu         | `2`          |                                         | Compose      |
//! | Menu         | `3`          | inbox cursor to 0                       | Inbox        |
//! | Menu         | `4`          | load active recipient's history         | Conversation |
//! | UserList     | Down / Up    | move selection, clamped                 | UserList     |
//! | UserList     | Confirm      | selected user becomes active recipient  | Compose      |
//! | Inbox        | Confirm      | pop entry under cursor                  | Inbox        |
//! | Inbox        | Space        | cursor to next entry, wrapping          | Inbox        |
//! | Compose      | Backspace    | drop last draft character               | Compose      |
//! | Compose      | SendCombo    | store + stage draft, clear it           | Menu         |
//! | Compose      | printable    | append to draft                         | Compose      |
//! | any          | Escape       |                                         | Menu         |
//!
//! Any other pair leaves the page unchanged.

use crate::chat::ChatCore;
use crate::keys::KeyEvent;
use crate::model::{now_epoch_secs, InboxEntry, Message};
use crate::session::PageState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageView {
    Menu,
    UserList {
        users: Vec<String>,
        selected: usize,
    },
    Compose {
        recipient: String,
        draft: String,
    },
    Inbox {
        /// 1-based position and total, when there is anything to show.
        position: Option<(usize, usize)>,
        entry: Option<InboxEntry>,
    },
    Conversation {
        username: String,
        messages: Vec<Message>,
    },
}

impl PageView {
    pub fn title(&self) -> String {
        match self {
            PageView::Menu => "Menu".to_string(),
            PageView::UserList { .. } => "Users".to_string(),
            PageView::Compose { recipient, .. } => format!("Writing to: {}", recipient),
            PageView::Inbox {
                position: Some((index, total)),
                ..
            } => format!("Inbox ({}/{})", index, total),
            PageView::Inbox { position: None, .. } => "Inbox".to_string(),
            PageView::Conversation { .. } => "Conversation".to_string(),
        }
    }
}

/// Everything the rendering side needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub page: PageView,
    pub unread: bool,
    /// Outcome of the last key, e.g. a failed send.
    pub status: Option<String>,
    pub alert: Option<String>,
}

#[derive(Debug, Default)]
pub struct Navigator {
    users: Vec<String>,
    selected: usize,
    history: Vec<Message>,
    status: Option<String>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_user(&self) -> Option<&str> {
        self.users.get(self.selected).map(String::as_str)
    }

    pub fn handle_key(&mut self, key: KeyEvent, core: &mut ChatCore) -> PageState {
        self.status = None;
        let page = core.session().current_page;
        let next = if key == KeyEvent::Escape {
            PageState::Menu
        } else {
            match page {
                PageState::Menu => self.on_menu(key, core),
                PageState::UserList => self.on_user_list(key, core),
                PageState::Compose => self.on_compose(key, core),
                PageState::Inbox => self.on_inbox(key, core),
                PageState::Conversation => PageState::Conversation,
            }
        };
        if next != page {
            tracing::debug!("Page {:?} -> {:?} on {:?}", page, next, key);
        }
        core.session_mut().current_page = next;
        next
    }

    fn on_menu(&mut self, key: KeyEvent, core: &mut ChatCore) -> PageState {
        match key {
            KeyEvent::Char('1') => {
                self.users = match core.list_users() {
                    Ok(users) => users,
                    Err(e) => {
                        self.status = Some(format!("Could not list users: {}", e));
                        Vec::new()
                    }
                };
                self.selected = 0;
                PageState::UserList
            }
            KeyEvent::Char('2') => PageState::Compose,
            KeyEvent::Char('3') => {
                core.inbox_mut().reset_cursor();
                PageState::Inbox
            }
            KeyEvent::Char('4') => {
                let recipient = core.session().active_recipient.clone();
                self.history = match core.conversation_history(&recipient) {
                    Ok(messages) => messages,
                    Err(e) => {
                        self.status = Some(format!("Could not load conversation: {}", e));
                        Vec::new()
                    }
                };
                PageState::Conversation
            }
            _ => PageState::Menu,
        }
    }

    fn on_user_list(&mut self, key: KeyEvent, core: &mut ChatCore) -> PageState {
        match key {
            KeyEvent::Down => {
                if !self.users.is_empty() {
                    self.selected = (self.selected + 1).min(self.users.len() - 1);
                }
                PageState::UserList
            }
            KeyEvent::Up => {
                self.selected = self.selected.saturating_sub(1);
                PageState::UserList
            }
            KeyEvent::Confirm => match self.users.get(self.selected) {
                Some(user) => {
                    core.session_mut().active_recipient = user.clone();
                    PageState::Compose
                }
                None => PageState::UserList,
            },
            _ => PageState::UserList,
        }
    }

    fn on_compose(&mut self, key: KeyEvent, core: &mut ChatCore) -> PageState {
        match key {
            KeyEvent::Backspace => {
                core.session_mut().draft_text.pop();
                PageState::Compose
            }
            KeyEvent::SendCombo => match core.send_draft(now_epoch_secs()) {
                Ok(_) => PageState::Menu,
                Err(e) => {
                    self.status = Some(format!("Send failed: {}", e));
                    PageState::Compose
                }
            },
            KeyEvent::Confirm => {
                core.session_mut().draft_text.push('\n');
                PageState::Compose
            }
            other => {
                if let Some(c) = other.printable() {
                    core.session_mut().draft_text.push(c);
                }
                PageState::Compose
            }
        }
    }

    fn on_inbox(&mut self, key: KeyEvent, core: &mut ChatCore) -> PageState {
        match key {
            KeyEvent::Confirm => {
                if let Err(e) = core.acknowledge_inbox() {
                    self.status = Some(format!("Could not clear entry: {}", e));
                }
            }
            KeyEvent::Space => core.inbox_mut().advance_cursor(),
            _ => {}
        }
        PageState::Inbox
    }

    pub fn screen(&self, core: &ChatCore) -> Screen {
        let session = core.session();
        let page = match session.current_page {
            PageState::Menu => PageView::Menu,
            PageState::UserList => PageView::UserList {
                users: self.users.clone(),
                selected: self.selected,
            },
            PageState::Compose => PageView::Compose {
                recipient: session.active_recipient.clone(),
                draft: session.draft_text.clone(),
            },
            PageState::Inbox => {
                let inbox = core.inbox();
                let entry = inbox.current().cloned();
                PageView::Inbox {
                    position: entry.as_ref().map(|_| (inbox.cursor() + 1, inbox.size())),
                    entry,
                }
            }
            PageState::Conversation => PageView::Conversation {
                username: session.active_recipient.clone(),
                messages: self.history.clone(),
            },
        };
        Screen {
            page,
            unread: session.unread,
            status: self.status.clone(),
            alert: core.storage_alert(),
        }
    }
}
