//! Mailbox capabilities the classifier is driven by.
//!
//! The wire protocol lives behind these traits. A message source hands over
//! unread messages as a stream with a parallel list of sequence numbers; a
//! mover relocates a set of sequence numbers between mailboxes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// One fetched message: its stable UID and the raw RFC 5322 bytes.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub uid: u32,
    pub raw: Vec<u8>,
}

impl RawMessage {
    pub fn new(uid: u32, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            uid,
            raw: raw.into(),
        }
    }
}

/// Unread messages of one mailbox.
///
/// `sequence_numbers[i]` belongs to the i-th message yielded by `messages`.
/// The pairing is positional; sources must keep both in the same order.
pub struct FetchedBatch {
    pub messages: BoxStream<'static, RawMessage>,
    pub sequence_numbers: Vec<u32>,
    /// Resolves with the final status of the fetch once the stream is drained.
    pub completion: oneshot::Receiver<Result<()>>,
}

impl FetchedBatch {
    /// A batch whose messages are already in memory.
    pub fn from_messages(messages: Vec<RawMessage>, sequence_numbers: Vec<u32>) -> Self {
        let (done, completion) = oneshot::channel();
        let _ = done.send(Ok(()));

        Self {
            messages: stream::iter(messages).boxed(),
            sequence_numbers,
            completion,
        }
    }

    /// A batch with nothing to process.
    pub fn empty() -> Self {
        Self::from_messages(Vec::new(), Vec::new())
    }
}

/// Wait for a fetch's completion signal.
pub async fn fetch_status(completion: oneshot::Receiver<Result<()>>) -> Result<()> {
    completion
        .await
        .unwrap_or_else(|_| Err(Error::Fetch("message source dropped its completion signal".to_string())))
}

/// Source of unread messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Select `mailbox` and start fetching every unread message in it.
    async fn fetch_unread(&self, mailbox: &str) -> Result<FetchedBatch>;
}

/// Relocates messages between mailboxes.
///
/// Implementations copy the messages to `to`, flag the originals deleted and
/// expunge. The steps are not atomic: a failure part way through can leave a
/// message copied but not removed. An empty set must be a no-op.
#[async_trait]
pub trait Mover: Send + Sync {
    async fn move_messages(&self, sequence_numbers: &BTreeSet<u32>, from: &str, to: &str) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory doubles for the mailbox capabilities.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Serves one canned batch per mailbox.
    #[derive(Default)]
    pub struct MemorySource {
        pub batches: Mutex<HashMap<String, (Vec<RawMessage>, Vec<u32>)>>,
        pub fetch_error: Option<String>,
    }

    impl MemorySource {
        pub fn with_batch(mailbox: &str, messages: Vec<RawMessage>, sequence_numbers: Vec<u32>) -> Self {
            let source = Self::default();
            source
                .batches
                .lock()
                .unwrap()
                .insert(mailbox.to_string(), (messages, sequence_numbers));
            source
        }
    }

    #[async_trait]
    impl MessageSource for MemorySource {
        async fn fetch_unread(&self, mailbox: &str) -> Result<FetchedBatch> {
            if let Some(e) = &self.fetch_error {
                return Err(Error::Fetch(e.clone()));
            }
            Ok(match self.batches.lock().unwrap().remove(mailbox) {
                Some((messages, sequence_numbers)) => FetchedBatch::from_messages(messages, sequence_numbers),
                None => FetchedBatch::empty(),
            })
        }
    }

    /// Records every move request; optionally fails them.
    #[derive(Default)]
    pub struct RecordingMover {
        pub moves: Mutex<Vec<(BTreeSet<u32>, String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mover for RecordingMover {
        async fn move_messages(&self, sequence_numbers: &BTreeSet<u32>, from: &str, to: &str) -> Result<()> {
            if sequence_numbers.is_empty() {
                return Ok(());
            }
            self.moves
                .lock()
                .unwrap()
                .push((sequence_numbers.clone(), from.to_string(), to.to_string()));
            if self.fail {
                return Err(Error::Move("expunge failed".to_string()));
            }
            Ok(())
        }
    }
}
