/// Logical key events produced by the input collaborator.
///
/// The handheld keyboard has no arrow keys: `.` doubles as Down, `;` as Up.
/// Those keys still type their character on the compose page, which is why
/// [`KeyEvent::printable`] maps them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Char(char),
    Down,
    Up,
    Space,
    Confirm,
    Backspace,
    SendCombo,
    Escape,
}

impl KeyEvent {
    /// Map a raw keyboard code (as scanned by the device) to a logical key.
    pub fn from_code(code: &str) -> Option<Self> {
        let key = match code {
            "." => KeyEvent::Down,
            ";" => KeyEvent::Up,
            " " => KeyEvent::Space,
            "\n" | "\r" => KeyEvent::Confirm,
            "\x08" | "\x7f" => KeyEvent::Backspace,
            "FN\n" => KeyEvent::SendCombo,
            "ESC" | "`" | "\x1b" => KeyEvent::Escape,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_control() => KeyEvent::Char(c),
                    _ => return None,
                }
            }
        };
        Some(key)
    }

    /// The character this key types on a text entry page, if any.
    pub fn printable(self) -> Option<char> {
        match self {
            KeyEvent::Char(c) => Some(c),
            KeyEvent::Down => Some('.'),
            KeyEvent::Up => Some(';'),
            KeyEvent::Space => Some(' '),
            _ => None,
        }
    }
}
