//! The mounted file namespace that backs every persisted record.
//!
//! Records are addressed by namespace-relative names without extension
//! (`messages/alice`, `inbox`) and stored as `<name>.json` under the root.
//! Writes go to a hidden sibling temp file that is renamed into place, so a
//! failed write never leaves a half-written record behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

pub const MESSAGES_DIR: &str = "messages";
pub const INBOX_RECORD: &str = "inbox";
const RECORD_EXTENSION: &str = "json";

pub fn conversation_record(username: &str) -> String {
    format!("{}/{}", MESSAGES_DIR, username)
}

#[derive(Debug, Clone)]
pub struct Namespace {
    root: PathBuf,
}

impl Namespace {
    /// Open the namespace rooted at `root`, creating the root and the
    /// `messages/` directory if they are missing.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let messages = root.join(MESSAGES_DIR);
        if !messages.is_dir() {
            tracing::info!("Creating message directory {:?}", messages);
            fs::create_dir_all(&messages).map_err(|e| StoreError::io(MESSAGES_DIR, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, record: &str) -> PathBuf {
        self.root.join(format!("{}.{}", record, RECORD_EXTENSION))
    }

    pub fn exists(&self, record: &str) -> StoreResult<bool> {
        match fs::metadata(self.record_path(record)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(record, e)),
        }
    }

    /// Read a record's raw contents; `Ok(None)` when it does not exist.
    pub fn read(&self, record: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.record_path(record)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(record, e)),
        }
    }

    /// Replace a record's contents.
    pub fn write(&self, record: &str, contents: &str) -> StoreResult<()> {
        let path = self.record_path(record);
        let tmp = temp_path_for(&path);
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::io(record, e));
        }
        Ok(())
    }

    /// Names (without extension) of the records directly inside `dir`.
    pub fn list(&self, dir: &str) -> StoreResult<Vec<String>> {
        let entries = fs::read_dir(self.root.join(dir)).map_err(|e| StoreError::io(dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            names.push(stem.to_string());
        }
        names.sort();
        Ok(names)
    }

    /// Flush directory metadata before the process lets go of the namespace.
    pub fn release(&self) -> std::io::Result<()> {
        for dir in [self.root.join(MESSAGES_DIR), self.root.clone()] {
            if dir.is_dir() {
                fs::File::open(&dir)?.sync_all()?;
            }
        }
        tracing::info!("Released storage namespace {:?}", self.root);
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_messages_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path().join("sd")).unwrap();
        assert!(ns.root().join(MESSAGES_DIR).is_dir());
    }

    #[test]
    fn read_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        assert!(ns.read("inbox").unwrap().is_none());
        assert!(!ns.exists("inbox").unwrap());
    }

    #[test]
    fn write_replaces_contents_without_leaving_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        ns.write("messages/bob", "first").unwrap();
        ns.write("messages/bob", "second").unwrap();
        assert_eq!(ns.read("messages/bob").unwrap().as_deref(), Some("second"));
        assert_eq!(ns.list(MESSAGES_DIR).unwrap(), vec!["bob".to_string()]);
    }

    #[test]
    fn list_skips_hidden_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        ns.write("messages/alice", "{}").unwrap();
        std::fs::write(dir.path().join("messages/.carol.json.tmp"), "x").unwrap();
        std::fs::write(dir.path().join("messages/notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("messages/.hidden.json"), "x").unwrap();
        assert_eq!(ns.list(MESSAGES_DIR).unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn write_into_missing_directory_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        let err = ns.write("nowhere/record", "x").unwrap_err();
        assert!(err.is_io_failure());
    }

    #[test]
    fn release_succeeds_on_open_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::open(dir.path()).unwrap();
        ns.release().unwrap();
    }
}
