//! The single owner of all mutable chat state.
//!
//! HTTP handlers, the key input path and the push timer all reach the store,
//! the inbox and the session through one `ChatCore` value that lives on the
//! event loop task. Nothing else holds a reference to it, so store mutations
//! are serialized without locks.

use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::config::CourierConfig;
use crate::error::StoreResult;
use crate::health::IoFailureTracker;
use crate::inbox::InboxQueue;
use crate::model::{now_epoch_secs, InboxEntry, Lookup, Message};
use crate::session::Session;
use crate::storage::{conversation_record, Namespace, INBOX_RECORD, MESSAGES_DIR};
use crate::store::MessageStore;
use crate::view::ChatView;

/// Work submitted to the event loop by the HTTP surface.
#[derive(Debug)]
pub enum CoreRequest {
    ViewChat {
        username: String,
        reply: oneshot::Sender<StoreResult<ChatView>>,
    },
    ReceiveMessage {
        username: String,
        body: String,
        reply: oneshot::Sender<StoreResult<Message>>,
    },
    AttachChannel {
        outbound: flume::Sender<String>,
        reply: oneshot::Sender<u64>,
    },
    DetachChannel {
        id: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Timer not due, or nothing staged.
    Idle,
    Delivered,
    /// A message was staged but no live channel took it.
    Dropped,
}

#[derive(Debug)]
struct PushChannel {
    id: u64,
    outbound: flume::Sender<String>,
}

#[derive(Debug)]
pub struct ChatCore {
    namespace: Namespace,
    store: MessageStore,
    inbox: InboxQueue,
    session: Session,
    health: IoFailureTracker,
    channel: Option<PushChannel>,
    next_channel_id: u64,
    push_interval: Duration,
    next_push_at: Instant,
}

impl ChatCore {
    pub fn open(config: &CourierConfig) -> StoreResult<Self> {
        let namespace = Namespace::open(&config.data_dir)?;
        let store = MessageStore::new(namespace.clone());
        let inbox = InboxQueue::open(namespace.clone())?;
        let mut session = Session::new(config.default_recipient.clone());
        session.unread = !inbox.is_empty();

        Ok(Self {
            namespace,
            store,
            inbox,
            session,
            health: IoFailureTracker::new(config.io_failure_alert_threshold),
            channel: None,
            next_channel_id: 1,
            push_interval: config.push_interval(),
            next_push_at: Instant::now(),
        })
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn inbox(&self) -> &InboxQueue {
        &self.inbox
    }

    pub fn inbox_mut(&mut self) -> &mut InboxQueue {
        &mut self.inbox
    }

    pub fn storage_alert(&self) -> Option<String> {
        self.health.alert()
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn handle(&mut self, request: CoreRequest) {
        match request {
            CoreRequest::ViewChat { username, reply } => {
                let _ = reply.send(self.view_chat(&username, now_epoch_secs()));
            }
            CoreRequest::ReceiveMessage {
                username,
                body,
                reply,
            } => {
                let _ = reply.send(self.receive_message(&username, body, now_epoch_secs()));
            }
            CoreRequest::AttachChannel { outbound, reply } => {
                let id = self.attach_channel(outbound);
                let _ = reply.send(id);
            }
            CoreRequest::DetachChannel { id } => self.detach_channel(id),
        }
    }

    /// Ensure and load `username`'s conversation and make them the active
    /// recipient.
    pub fn view_chat(&mut self, username: &str, now: i64) -> StoreResult<ChatView> {
        let result = self
            .store
            .ensure_conversation(username)
            .and_then(|_| self.store.load(username));
        self.health.observe(&conversation_record(username), &result);
        let conversation = result?;
        self.session.active_recipient = username.to_string();
        Ok(ChatView::build(username, &conversation, now))
    }

    /// Record a message a remote user sent to the operator and queue an
    /// unread notification for it.
    pub fn receive_message(&mut self, username: &str, body: String, now: i64) -> StoreResult<Message> {
        let message = Message::inbound(body, now);
        let result = self
            .store
            .ensure_conversation(username)
            .and_then(|_| self.store.append(username, message.clone()));
        self.health.observe(&conversation_record(username), &result);
        result?;
        self.session.active_recipient = username.to_string();

        let pushed = self.inbox.push(InboxEntry {
            message: message.clone(),
            from_user: username.to_string(),
        });
        self.health.observe(INBOX_RECORD, &pushed);
        pushed?;
        self.session.unread = true;
        tracing::info!("Message received from '{}'", username);
        Ok(message)
    }

    pub fn list_users(&mut self) -> StoreResult<Vec<String>> {
        let result = self.store.list_users();
        self.health.observe(MESSAGES_DIR, &result);
        result
    }

    /// Read-only history for `username`; an unknown user has no messages.
    pub fn conversation_history(&mut self, username: &str) -> StoreResult<Vec<Message>> {
        let result = self.store.lookup(username);
        self.health.observe(&conversation_record(username), &result);
        Ok(match result? {
            Lookup::Found(conversation) => conversation.messages,
            Lookup::Absent => Vec::new(),
        })
    }

    /// Store the draft as an outbound message to the active recipient and
    /// stage it for push delivery. The draft is kept if storing fails.
    pub fn send_draft(&mut self, now: i64) -> StoreResult<Message> {
        let recipient = self.session.active_recipient.clone();
        let message = Message::outbound(self.session.draft_text.clone(), now);
        let result = self
            .store
            .ensure_conversation(&recipient)
            .and_then(|_| self.store.append(&recipient, message.clone()));
        self.health.observe(&conversation_record(&recipient), &result);
        result?;

        if self.session.pending_outbound.is_some() {
            tracing::warn!("Replacing undelivered outbound message");
        }
        self.session.pending_outbound = Some(message.clone());
        self.session.draft_text.clear();
        tracing::info!("Message to '{}' stored and staged for push", recipient);
        Ok(message)
    }

    /// Remove the inbox entry under the cursor. `Ok(None)` when the inbox is
    /// already empty.
    pub fn acknowledge_inbox(&mut self) -> StoreResult<Option<InboxEntry>> {
        if self.inbox.is_empty() {
            return Ok(None);
        }
        let cursor = self.inbox.cursor();
        let result = self.inbox.pop_at(cursor);
        self.health.observe(INBOX_RECORD, &result);
        let entry = result?;
        if self.inbox.is_empty() {
            self.session.unread = false;
        }
        Ok(Some(entry))
    }

    /// Install a new push channel, closing any previous one.
    pub fn attach_channel(&mut self, outbound: flume::Sender<String>) -> u64 {
        let id = self.next_channel_id;
        self.next_channel_id += 1;
        if let Some(previous) = self.channel.replace(PushChannel { id, outbound }) {
            tracing::info!("Push channel {} replaced by {}", previous.id, id);
        } else {
            tracing::info!("Push channel {} opened", id);
        }
        id
    }

    pub fn detach_channel(&mut self, id: u64) {
        if self.channel.as_ref().map(|c| c.id) == Some(id) {
            self.channel = None;
            tracing::info!("Push channel {} closed", id);
        }
    }

    /// Drive the push timer. When due, the staged outbound message (if any)
    /// is sent over the live channel or dropped, and the timer advances
    /// either way.
    pub fn tick_push(&mut self, now: Instant) -> PushOutcome {
        if now < self.next_push_at {
            return PushOutcome::Idle;
        }
        self.next_push_at = now + self.push_interval;

        let Some(message) = self.session.pending_outbound.take() else {
            return PushOutcome::Idle;
        };
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode outbound message: {}", e);
                return PushOutcome::Dropped;
            }
        };

        let Some(channel) = self.channel.as_ref() else {
            tracing::info!("No push channel open; dropping outbound message");
            return PushOutcome::Dropped;
        };
        if channel.outbound.send(payload).is_err() {
            tracing::info!("Push channel {} went away; dropping outbound message", channel.id);
            self.channel = None;
            return PushOutcome::Dropped;
        }
        tracing::debug!("Outbound message pushed on channel {}", channel.id);
        PushOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::Direction;

    fn core() -> (tempfile::TempDir, ChatCore) {
        let dir = tempfile::tempdir().unwrap();
        let config = CourierConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..CourierConfig::default()
        };
        let core = ChatCore::open(&config).unwrap();
        (dir, core)
    }

    #[test]
    fn receive_message_from_new_user() {
        let (_dir, mut core) = core();
        let msg = core.receive_message("alice", "hi".to_string(), 1234).unwrap();
        assert_eq!(msg, Message::inbound("hi", 1234));
        assert_eq!(core.session().active_recipient, "alice");
        assert!(core.session().unread);

        assert_eq!(core.inbox().size(), 1);
        assert_eq!(core.inbox().peek_at(0).unwrap().from_user, "alice");

        let view = core.view_chat("alice", 2000).unwrap();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].data, "hi");
        assert_eq!(view.messages[0].to, Direction::Inbound);
    }

    #[test]
    fn view_chat_creates_record_and_sets_recipient() {
        let (dir, mut core) = core();
        let view = core.view_chat("bob", 7).unwrap();
        assert!(view.messages.is_empty());
        assert!(dir.path().join("messages/bob.json").is_file());
        assert_eq!(core.session().active_recipient, "bob");
    }

    #[test]
    fn invalid_username_is_rejected_without_side_effects() {
        let (_dir, mut core) = core();
        let err = core.receive_message("../x", "hi".to_string(), 1).unwrap_err();
        assert!(matches!(err, StoreError::InvalidUsername(_)));
        assert!(core.inbox().is_empty());
        assert_eq!(core.session().active_recipient, "another");
    }

    #[test]
    fn unread_is_lit_at_startup_when_inbox_has_entries() {
        let (dir, mut core) = core();
        core.receive_message("alice", "hi".to_string(), 1).unwrap();
        drop(core);

        let config = CourierConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            ..CourierConfig::default()
        };
        let reopened = ChatCore::open(&config).unwrap();
        assert!(reopened.session().unread);
        assert_eq!(reopened.inbox().size(), 1);
    }

    #[test]
    fn send_draft_stores_and_stages_message() {
        let (_dir, mut core) = core();
        core.session_mut().active_recipient = "bob".to_string();
        core.session_mut().draft_text = "yo".to_string();

        let sent = core.send_draft(50).unwrap();
        assert_eq!(sent, Message::outbound("yo", 50));
        assert!(core.session().draft_text.is_empty());
        assert_eq!(core.session().pending_outbound, Some(sent.clone()));
        assert_eq!(core.conversation_history("bob").unwrap(), vec![sent]);
    }

    #[test]
    fn staged_message_is_delivered_exactly_once() {
        let (_dir, mut core) = core();
        let (tx, rx) = flume::unbounded();
        core.attach_channel(tx);
        core.session_mut().draft_text = "yo".to_string();
        core.send_draft(9).unwrap();

        let start = Instant::now();
        assert_eq!(core.tick_push(start), PushOutcome::Delivered);
        assert_eq!(rx.try_recv().unwrap(), r#"{"data":"yo","time":9,"to":1}"#);

        assert_eq!(core.tick_push(start + Duration::from_secs(2)), PushOutcome::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn push_timer_waits_a_full_interval() {
        let (_dir, mut core) = core();
        let (tx, rx) = flume::unbounded();
        core.attach_channel(tx);

        let start = Instant::now();
        assert_eq!(core.tick_push(start), PushOutcome::Idle);

        core.session_mut().pending_outbound = Some(Message::outbound("later", 1));
        assert_eq!(
            core.tick_push(start + Duration::from_millis(500)),
            PushOutcome::Idle
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(
            core.tick_push(start + Duration::from_millis(1000)),
            PushOutcome::Delivered
        );
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn message_without_channel_is_dropped() {
        let (_dir, mut core) = core();
        core.session_mut().pending_outbound = Some(Message::outbound("lost", 1));
        assert_eq!(core.tick_push(Instant::now()), PushOutcome::Dropped);
        assert!(core.session().pending_outbound.is_none());
    }

    #[test]
    fn attaching_closes_previous_channel() {
        let (_dir, mut core) = core();
        let (old_tx, old_rx) = flume::unbounded::<String>();
        let (new_tx, new_rx) = flume::unbounded::<String>();
        let old_id = core.attach_channel(old_tx);
        let new_id = core.attach_channel(new_tx);
        assert_ne!(old_id, new_id);
        assert!(old_rx.recv().is_err());

        // A late detach from the replaced socket must not close the new one.
        core.detach_channel(old_id);
        assert!(core.has_channel());

        core.session_mut().pending_outbound = Some(Message::outbound("x", 1));
        assert_eq!(core.tick_push(Instant::now()), PushOutcome::Delivered);
        assert!(new_rx.try_recv().is_ok());

        core.detach_channel(new_id);
        assert!(!core.has_channel());
    }

    #[test]
    fn acknowledge_inbox_clears_unread_when_drained() {
        let (_dir, mut core) = core();
        core.receive_message("alice", "a".to_string(), 1).unwrap();
        core.receive_message("bob", "b".to_string(), 2).unwrap();

        let first = core.acknowledge_inbox().unwrap().unwrap();
        assert_eq!(first.from_user, "alice");
        assert!(core.session().unread);

        core.acknowledge_inbox().unwrap().unwrap();
        assert!(!core.session().unread);
        assert!(core.acknowledge_inbox().unwrap().is_none());
        // Conversation records are untouched by acknowledgement.
        assert_eq!(core.conversation_history("alice").unwrap().len(), 1);
    }

    #[test]
    fn history_of_unknown_user_is_empty_and_not_created() {
        let (dir, mut core) = core();
        assert!(core.conversation_history("nobody").unwrap().is_empty());
        assert!(!dir.path().join("messages/nobody.json").exists());
    }

    #[test]
    fn repeated_storage_failures_raise_alert() {
        let (dir, mut core) = core();
        core.view_chat("alice", 1).unwrap();
        std::fs::remove_dir_all(dir.path().join("messages")).unwrap();

        for _ in 0..2 {
            core.session_mut().active_recipient = "alice".to_string();
            assert!(core.send_draft(1).unwrap_err().is_io_failure());
        }
        assert!(core.storage_alert().is_none());
        assert!(core.send_draft(1).is_err());
        assert!(core.storage_alert().unwrap().contains("messages/alice"));
    }
}
