//! Line-oriented operator input.
//!
//! Each line typed on stdin becomes zero or more key events. An empty line
//! is Confirm; a line starting with `:` names a special key; anything else
//! is fed through the device key map one character at a time, so `.` and `;`
//! still navigate lists the way they do on the handheld keyboard.

use std::io::BufRead;

use courier_backend::keys::KeyEvent;

/// Parse one stdin line (without its terminator) into key events.
pub fn parse_line(line: &str) -> Vec<KeyEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return vec![KeyEvent::Confirm];
    }
    if let Some(command) = line.strip_prefix(':') {
        if let Some(key) = command_key(command.trim()) {
            return vec![key];
        }
    }
    line.chars()
        .filter_map(|c| KeyEvent::from_code(c.encode_utf8(&mut [0; 4])))
        .collect()
}

fn command_key(command: &str) -> Option<KeyEvent> {
    let key = match command {
        "send" => KeyEvent::SendCombo,
        "esc" => KeyEvent::Escape,
        "bs" => KeyEvent::Backspace,
        "up" => KeyEvent::Up,
        "down" => KeyEvent::Down,
        "space" => KeyEvent::Space,
        "enter" => KeyEvent::Confirm,
        _ => return None,
    };
    Some(key)
}

/// Read stdin on a plain thread and forward key events. The receiver sees a
/// disconnect once stdin reaches end of file.
pub fn spawn_stdin_keys() -> flume::Receiver<KeyEvent> {
    let (tx, rx) = flume::unbounded();
    let spawned = std::thread::Builder::new()
        .name("courier-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Failed to read operator input: {}", e);
                        break;
                    }
                };
                for key in parse_line(&line) {
                    if tx.send(key).is_err() {
                        return;
                    }
                }
            }
            tracing::debug!("Operator input reached end of stream");
        });
    if let Err(e) = spawned {
        tracing::warn!("Could not start input thread: {}", e);
    }
    rx
}
