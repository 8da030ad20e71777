//! Persisted high-water UID per monitored mailbox.
//!
//! Stored as pretty-printed JSON: `{ "last_processed_id": 123 }`. A missing
//! or unreadable file means "start from zero", never an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// The last processed UID and the file it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    last_processed_id: u32,
    #[serde(skip)]
    path: PathBuf,
}

impl Watermark {
    /// Watermark file for `mailbox` under `dir`.
    ///
    /// Path separators in the mailbox name are replaced so nested mailboxes
    /// still map to one file in `dir`.
    pub fn path_for(dir: &Path, mailbox: &str) -> PathBuf {
        let name = mailbox.replace(['/', '\\'], "_");
        dir.join(format!("last_processed_{name}.json"))
    }

    /// Read the watermark at `path`, or a zero watermark bound to `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let last_processed_id = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<Watermark>(&data) {
                Ok(stored) => stored.last_processed_id,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "watermark_parse_failed");
                    0
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "watermark_not_found");
                0
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "watermark_read_failed");
                0
            }
        };

        Self {
            last_processed_id,
            path,
        }
    }

    pub fn last_processed_id(&self) -> u32 {
        self.last_processed_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move forward to `uid`. Never moves backwards; returns whether it moved.
    pub fn advance(&mut self, uid: u32) -> bool {
        if uid > self.last_processed_id {
            self.last_processed_id = uid;
            true
        } else {
            false
        }
    }

    /// Overwrite the backing file.
    pub fn persist(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        fs::write(&self.path, data)?;

        info!(
            path = %self.path.display(),
            last_processed_id = self.last_processed_id,
            "watermark_persisted"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_processed_INBOX.json");

        let watermark = Watermark::load(&path);
        assert_eq!(watermark.last_processed_id(), 0);
        assert_eq!(watermark.path(), path);
    }

    #[test]
    fn test_corrupt_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm.json");
        fs::write(&path, "not json").unwrap();

        assert_eq!(Watermark::load(&path).last_processed_id(), 0);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wm.json");

        let mut watermark = Watermark::load(&path);
        assert!(watermark.advance(42));
        watermark.persist().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\n  \"last_processed_id\": 42\n}");
        assert_eq!(Watermark::load(&path).last_processed_id(), 42);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let mut watermark = Watermark::load(dir.path().join("wm.json"));

        assert!(watermark.advance(10));
        assert!(!watermark.advance(5));
        assert!(!watermark.advance(10));
        assert_eq!(watermark.last_processed_id(), 10);
    }

    #[test]
    fn test_persist_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let watermark = Watermark::load(dir.path().join("missing").join("wm.json"));

        assert!(matches!(watermark.persist(), Err(Error::Io(_))));
    }

    #[test]
    fn test_path_for_flattens_nested_mailboxes() {
        let path = Watermark::path_for(Path::new("/var/lib/antispam"), "INBOX/Newsletters");
        assert_eq!(path, PathBuf::from("/var/lib/antispam/last_processed_INBOX_Newsletters.json"));
    }
}
