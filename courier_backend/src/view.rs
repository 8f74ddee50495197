//! View models handed to the rendering side, and the small amount of markup
//! the HTTP surface produces from them.

use chrono::DateTime;
use serde::Serialize;

use crate::model::{Conversation, Direction};

pub const CLIENT_PAGE: &str = include_str!("../static/client.html");

#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub username: String,
    pub messages: Vec<MessageView>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    /// Body escaped for markup with line breaks turned into `<br>`.
    pub data: String,
    pub time: i64,
    pub to: Direction,
    pub time_label: String,
}

impl ChatView {
    pub fn build(username: &str, conversation: &Conversation, timestamp: i64) -> Self {
        let messages = conversation
            .messages
            .iter()
            .map(|msg| MessageView {
                data: shape_body(&msg.body),
                time: msg.time,
                to: msg.direction,
                time_label: format_time(msg.time),
            })
            .collect();
        Self {
            username: username.to_string(),
            messages,
            timestamp,
        }
    }
}

pub fn shape_body(body: &str) -> String {
    escape_html(&body.replace("\r\n", "\n")).replace('\n', "<br>")
}

pub fn format_time(epoch_secs: i64) -> String {
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn render_chat_page(view: &ChatView) -> String {
    let username = escape_html(&view.username);
    let mut rows = String::new();
    for msg in &view.messages {
        let (class, who) = match msg.to {
            Direction::Inbound => ("in", username.as_str()),
            Direction::Outbound => ("out", "me"),
        };
        rows.push_str(&format!(
            "<div class=\"msg {}\" data-time=\"{}\"><span class=\"who\">{}</span> \
             <span class=\"time\">{}</span><p>{}</p></div>\n",
            class, msg.time, who, msg.time_label, msg.data
        ));
    }
    if rows.is_empty() {
        rows.push_str("<p class=\"empty\">No messages yet.</p>\n");
    }

    format!(
        r#"<html lang="en">
    <head>
        <title>Chat with {username}</title>
        <style>
            .msg {{ margin: 6px 0; padding: 4px 8px; border-radius: 6px; max-width: 70%; }}
            .in {{ background: #e8f0fe; }}
            .out {{ background: #e6f4ea; margin-left: auto; }}
            .time {{ color: #888; font-size: 0.8em; }}
        </style>
    </head>
    <body data-timestamp="{timestamp}">
        <h2>Chat with {username}</h2>
        <div id="messages">
{rows}        </div>
        <form id="send">
            <textarea name="message" rows="3" cols="40"></textarea>
            <button type="submit">Send</button>
        </form>
        <script>
            document.getElementById('send').onsubmit = async (event) => {{
                event.preventDefault();
                const message = event.target.message.value;
                await fetch(location.pathname, {{
                    method: 'POST',
                    headers: {{ 'Content-Type': 'application/json' }},
                    body: JSON.stringify({{ message }}),
                }});
                location.reload();
            }};
        </script>
    </body>
</html>
"#,
        username = username,
        timestamp = view.timestamp,
        rows = rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    #[test]
    fn bodies_are_escaped_before_line_breaks() {
        assert_eq!(shape_body("a<b>\nc"), "a&lt;b&gt;<br>c");
        assert_eq!(shape_body("x\r\ny"), "x<br>y");
    }

    #[test]
    fn build_keeps_order_and_direction() {
        let conversation = Conversation {
            messages: vec![Message::inbound("hi\nthere", 0), Message::outbound("yo", 60)],
        };
        let view = ChatView::build("alice", &conversation, 99);
        assert_eq!(view.timestamp, 99);
        assert_eq!(view.messages[0].data, "hi<br>there");
        assert_eq!(view.messages[0].to, Direction::Inbound);
        assert_eq!(view.messages[1].to, Direction::Outbound);
        assert_eq!(view.messages[1].time_label, "1970-01-01 00:01:00");
    }

    #[test]
    fn rendered_page_contains_messages_and_escaped_username() {
        let conversation = Conversation {
            messages: vec![Message::inbound("hello", 5)],
        };
        let html = render_chat_page(&ChatView::build("<bob>", &conversation, 5));
        assert!(html.contains("Chat with &lt;bob&gt;"));
        assert!(html.contains("<p>hello</p>"));
        assert!(!html.contains("No messages yet"));
    }

    #[test]
    fn empty_conversation_renders_placeholder() {
        let html = render_chat_page(&ChatView::build("z", &Conversation::default(), 0));
        assert!(html.contains("No messages yet"));
    }
}
