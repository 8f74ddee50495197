use crate::error::{StoreError, StoreResult};
use crate::model::{InboxEntry, InboxRecord};
use crate::storage::{Namespace, INBOX_RECORD};

/// Durable FIFO of unread notifications plus the operator's viewing cursor.
///
/// The queue is mirrored in memory and the whole record is rewritten on every
/// mutation. If the write fails the in-memory change is rolled back so memory
/// and disk never disagree.
#[derive(Debug)]
pub struct InboxQueue {
    namespace: Namespace,
    entries: Vec<InboxEntry>,
    cursor: usize,
}

impl InboxQueue {
    /// Load the persisted inbox, creating an empty record if none exists.
    pub fn open(namespace: Namespace) -> StoreResult<Self> {
        let entries = match namespace.read(INBOX_RECORD)? {
            Some(raw) => {
                serde_json::from_str::<InboxRecord>(&raw)
                    .map_err(|e| StoreError::malformed(INBOX_RECORD, e))?
                    .inbox
            }
            None => {
                tracing::info!("No inbox record found; creating an empty one");
                let queue = Self {
                    namespace: namespace.clone(),
                    entries: Vec::new(),
                    cursor: 0,
                };
                queue.persist()?;
                return Ok(queue);
            }
        };
        tracing::info!("Loaded inbox with {} unread entr(ies)", entries.len());
        Ok(Self {
            namespace,
            entries,
            cursor: 0,
        })
    }

    pub fn push(&mut self, entry: InboxEntry) -> StoreResult<()> {
        self.entries.push(entry);
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }
        tracing::debug!("Inbox push ({} unread)", self.entries.len());
        Ok(())
    }

    pub fn peek_at(&self, index: usize) -> StoreResult<&InboxEntry> {
        self.entries.get(index).ok_or(StoreError::OutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    pub fn pop_at(&mut self, index: usize) -> StoreResult<InboxEntry> {
        if index >= self.entries.len() {
            return Err(StoreError::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let previous_cursor = self.cursor;
        let entry = self.entries.remove(index);
        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }
        if let Err(e) = self.persist() {
            self.entries.insert(index, entry);
            self.cursor = previous_cursor;
            return Err(e);
        }
        tracing::debug!(
            "Inbox pop at {} from '{}' ({} unread)",
            index,
            entry.from_user,
            self.entries.len()
        );
        Ok(entry)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[InboxEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Move to the next entry, wrapping to the first. No-op when empty.
    pub fn advance_cursor(&mut self) {
        if self.entries.is_empty() {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor + 1) % self.entries.len();
    }

    /// Entry under the cursor, if any.
    pub fn current(&self) -> Option<&InboxEntry> {
        self.entries.get(self.cursor)
    }

    fn persist(&self) -> StoreResult<()> {
        let record = InboxRecord {
            inbox: self.entries.clone(),
        };
        let serialized =
            serde_json::to_string(&record).map_err(|e| StoreError::malformed(INBOX_RECORD, e))?;
        self.namespace.write(INBOX_RECORD, &serialized)
    }
}
