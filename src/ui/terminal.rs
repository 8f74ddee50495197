use std::io::Write;

use courier_backend::model::Direction;
use courier_backend::navigator::{PageView, Screen};
use courier_backend::runtime::OperatorSurface;
use courier_backend::view::format_time;

const MENU_ITEMS: [&str; 4] = [
    "[1] List Users",
    "[2] Write msg",
    "[3] Inbox",
    "[4] Conversation",
];

/// Draws frames as plain text. Identical consecutive frames are skipped so
/// push timer ticks do not flood the terminal.
pub struct TerminalSurface<W> {
    out: W,
    last_frame: Option<String>,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
        }
    }
}

impl<W: Write + Send + 'static> OperatorSurface for TerminalSurface<W> {
    fn present(&mut self, screen: &Screen) {
        let frame = render_screen(screen);
        if self.last_frame.as_deref() == Some(frame.as_str()) {
            return;
        }
        let written = self
            .out
            .write_all(frame.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to draw screen: {}", e);
        }
        self.last_frame = Some(frame);
    }
}

pub fn render_screen(screen: &Screen) -> String {
    let mut lines = Vec::new();
    let marker = if screen.unread { " *" } else { "" };
    lines.push(format!("== {}{} ==", screen.page.title(), marker));
    if let Some(alert) = &screen.alert {
        lines.push(format!("!! {}", alert));
    }
    if let Some(status) = &screen.status {
        lines.push(format!("-- {}", status));
    }

    match &screen.page {
        PageView::Menu => lines.extend(MENU_ITEMS.iter().map(|item| item.to_string())),
        PageView::UserList { users, selected } => {
            if users.is_empty() {
                lines.push("(no users)".to_string());
            }
            for (i, user) in users.iter().enumerate() {
                let cursor = if i == *selected { ">" } else { " " };
                lines.push(format!("{} {}", cursor, user));
            }
        }
        PageView::Compose { draft, .. } => {
            lines.push(format!("{}_", draft));
            lines.push("(:send to send, :esc for menu)".to_string());
        }
        PageView::Inbox { entry, .. } => match entry {
            Some(entry) => {
                lines.push(format!(
                    "From {} at {}",
                    entry.from_user,
                    format_time(entry.message.time)
                ));
                lines.push(entry.message.body.clone());
            }
            None => lines.push("(inbox empty)".to_string()),
        },
        PageView::Conversation { username, messages } => {
            if messages.is_empty() {
                lines.push(format!("(no messages with {})", username));
            }
            for message in messages {
                let who = match message.direction {
                    Direction::Inbound => username.as_str(),
                    Direction::Outbound => "me",
                };
                lines.push(format!(
                    "[{}] {}: {}",
                    format_time(message.time),
                    who,
                    message.body
                ));
            }
        }
    }

    let mut frame = lines.join("\n");
    frame.push_str("\n\n");
    frame
}
