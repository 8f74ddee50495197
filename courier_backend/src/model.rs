use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which side of a conversation a message came from.
///
/// On disk and on the wire this is the `to` field: `0` means the message was
/// received from the remote user, `1` means the operator sent it to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn wire_code(self) -> u8 {
        match self {
            Direction::Inbound => 0,
            Direction::Outbound => 1,
        }
    }

    pub fn from_wire_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Direction::Inbound),
            1 => Some(Direction::Outbound),
            _ => None,
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.wire_code())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        Direction::from_wire_code(code).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid direction code {} (expected 0 or 1)", code))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "data")]
    pub body: String,
    /// Epoch seconds.
    pub time: i64,
    #[serde(rename = "to")]
    pub direction: Direction,
}

impl Message {
    pub fn inbound(body: impl Into<String>, time: i64) -> Self {
        Self {
            body: body.into(),
            time,
            direction: Direction::Inbound,
        }
    }

    pub fn outbound(body: impl Into<String>, time: i64) -> Self {
        Self {
            body: body.into(),
            time,
            direction: Direction::Outbound,
        }
    }
}

/// Full history with one remote user, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

/// An unread notification pointing at a message some user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxEntry {
    #[serde(rename = "message_obj")]
    pub message: Message,
    #[serde(rename = "from")]
    pub from_user: String,
}

/// On-disk shape of the inbox record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxRecord {
    pub inbox: Vec<InboxEntry>,
}

/// Result of looking up a record that may legitimately not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Absent,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }
}

/// Current wall-clock time in epoch seconds.
pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
