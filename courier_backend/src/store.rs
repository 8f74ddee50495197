use crate::error::{StoreError, StoreResult};
use crate::model::{Conversation, Lookup, Message};
use crate::storage::{conversation_record, Namespace, MESSAGES_DIR};

const EMPTY_CONVERSATION: &str = r#"{"messages":[]}"#;

/// Per-user conversation logs, one JSON record per user under `messages/`.
///
/// Every mutation is a whole-record read-modify-write; records are small
/// and this keeps them self-describing and easy to repair by hand.
#[derive(Debug, Clone)]
pub struct MessageStore {
    namespace: Namespace,
}

impl MessageStore {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    /// Create an empty record for `username` unless one exists.
    /// Returns `true` when a record was created.
    pub fn ensure_conversation(&self, username: &str) -> StoreResult<bool> {
        validate_username(username)?;
        let record = conversation_record(username);
        if self.namespace.exists(&record)? {
            return Ok(false);
        }
        self.namespace.write(&record, EMPTY_CONVERSATION)?;
        tracing::info!("Created conversation record for '{}'", username);
        Ok(true)
    }

    pub fn lookup(&self, username: &str) -> StoreResult<Lookup<Conversation>> {
        validate_username(username)?;
        let record = conversation_record(username);
        match self.namespace.read(&record)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Lookup::Found)
                .map_err(|e| StoreError::malformed(record, e)),
            None => Ok(Lookup::Absent),
        }
    }

    pub fn load(&self, username: &str) -> StoreResult<Conversation> {
        match self.lookup(username)? {
            Lookup::Found(conversation) => Ok(conversation),
            Lookup::Absent => Err(StoreError::NotFound {
                record: conversation_record(username),
            }),
        }
    }

    pub fn append(&self, username: &str, message: Message) -> StoreResult<Conversation> {
        let mut conversation = self.load(username)?;
        conversation.messages.push(message);
        let record = conversation_record(username);
        let serialized =
            serde_json::to_string(&conversation).map_err(|e| StoreError::malformed(&record, e))?;
        self.namespace.write(&record, &serialized)?;
        tracing::debug!(
            "Appended message to '{}' ({} total)",
            username,
            conversation.messages.len()
        );
        Ok(conversation)
    }

    pub fn list_users(&self) -> StoreResult<Vec<String>> {
        self.namespace.list(MESSAGES_DIR)
    }
}

/// Usernames double as file names, so they must stay inside `messages/`.
pub fn validate_username(username: &str) -> StoreResult<()> {
    let unsafe_name = username.is_empty()
        || username == "."
        || username == ".."
        || username.starts_with('.')
        || username.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(StoreError::InvalidUsername(username.to_string()));
    }
    Ok(())
}
