use thiserror::Error;

/// Failures surfaced by the message store and the inbox queue.
///
/// `record` is the namespace-relative name of the backing record
/// (`messages/<user>` or `inbox`), which is also the key the
/// [`IoFailureTracker`](crate::health::IoFailureTracker) counts against.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {record}")]
    NotFound { record: String },

    #[error("inbox index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("malformed record {record}: {source}")]
    MalformedRecord {
        record: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage failure on {record}: {source}")]
    IoFailure {
        record: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),
}

impl StoreError {
    pub fn io(record: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::IoFailure {
            record: record.into(),
            source,
        }
    }

    pub fn malformed(record: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::MalformedRecord {
            record: record.into(),
            source,
        }
    }

    pub fn is_io_failure(&self) -> bool {
        matches!(self, StoreError::IoFailure { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
