//! Classification pipeline - the per-batch spam decision workflow.
//!
//! For every fetched message, in arrival order:
//! 1. Record its UID as the high-water candidate (before any skip)
//! 2. Skip it if the UID is at or below the starting watermark
//! 3. Parse it, resolve the sender, skip allow-listed senders
//! 4. Read the prior spam score and sanitize the body
//! 5. Dispatch a scoring task
//!
//! Once the stream is drained and every task has resolved, successful
//! scores are split into spam / not-spam by threshold. A failure on one
//! message is logged and never aborts the batch.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::allowlist::is_allowlisted;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::mailbox::RawMessage;
use crate::process::{format_address, prior_spam_score, sanitize_body, Email};
use crate::scoring::{Score, Scorer};

/// What the scorer sees of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationTask {
    /// Bare sender address
    pub sender: String,
    /// Sender as rendered in the From line, display name included
    pub from: String,
    pub subject: String,
    /// Sanitized body text
    pub body: String,
}

impl ClassificationTask {
    /// The message as presented to a scoring model.
    pub fn render(&self) -> String {
        format!("FROM: {}\nSUBJECT: {}\n\n{}", self.from, self.subject, self.body)
    }
}

/// Outcome of one dispatched task.
#[derive(Debug)]
pub struct ClassificationResult {
    /// Mailbox sequence number of the message
    pub sequence: u32,
    pub uid: u32,
    pub sender: String,
    pub subject: String,
    /// Score left by an upstream filter, for comparison only
    pub prior_score: f64,
    pub outcome: Result<Score>,
}

/// Disjoint spam / not-spam sets of sequence numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub spam: BTreeSet<u32>,
    pub not_spam: BTreeSet<u32>,
}

impl Partition {
    /// File a successful score; anything strictly above `threshold` is spam.
    pub fn record(&mut self, sequence: u32, score: f64, threshold: f64) {
        if score > threshold {
            self.not_spam.remove(&sequence);
            self.spam.insert(sequence);
        } else {
            self.spam.remove(&sequence);
            self.not_spam.insert(sequence);
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub partition: Partition,
    /// Highest UID seen in the batch, skipped messages included
    pub high_water_uid: u32,
    /// Number of scoring tasks dispatched
    pub dispatched: usize,
    /// Number of dispatched tasks that failed
    pub failed: usize,
}

/// Runs batches of messages through the scoring capability.
///
/// The allow-list and scorer are shared read-only by every task. With
/// `concurrency` on, each eligible message gets its own task and they all
/// run at once; with it off, each task finishes before the next message is
/// looked at.
pub struct Classifier {
    scorer: Arc<dyn Scorer>,
    allowlist: Vec<String>,
    concurrency: bool,
}

impl Classifier {
    pub fn new(scorer: Arc<dyn Scorer>, allowlist: Vec<String>, concurrency: bool) -> Self {
        Self {
            scorer,
            allowlist,
            concurrency,
        }
    }

    /// A classifier using the configured allow-list and concurrency flag.
    pub fn from_config(scorer: Arc<dyn Scorer>, config: &Config) -> Self {
        Self::new(scorer, config.allowlist.clone(), config.concurrency)
    }

    /// Classify one batch.
    ///
    /// `sequence_numbers[i]` is paired with the i-th message of `messages`.
    /// A message without a paired sequence number is logged and skipped.
    /// There is no timeout: a scorer that never answers stalls the batch.
    pub async fn classify<S>(
        &self,
        mut messages: S,
        sequence_numbers: &[u32],
        threshold: f64,
        watermark: u32,
    ) -> BatchOutcome
    where
        S: Stream<Item = RawMessage> + Unpin,
    {
        info!(
            expected_messages = sequence_numbers.len(),
            threshold = threshold,
            watermark = watermark,
            concurrency = self.concurrency,
            "pipeline_batch_start"
        );

        let mut high_water_uid = 0;
        let mut index = 0;
        let mut dispatched = 0;
        let mut results = Vec::new();
        let mut in_flight = FuturesUnordered::new();

        while let Some(message) = messages.next().await {
            let position = index;
            index += 1;
            high_water_uid = high_water_uid.max(message.uid);

            let Some(&sequence) = sequence_numbers.get(position) else {
                error!(uid = message.uid, position = position, "pipeline_sequence_missing");
                continue;
            };

            if message.uid <= watermark {
                debug!(uid = message.uid, sequence = sequence, "pipeline_already_processed");
                continue;
            }

            let uid = message.uid;
            let Some((task, prior_score)) = self.prepare(message, sequence) else {
                continue;
            };

            dispatched += 1;
            let pending = self.dispatch(task, sequence, uid, prior_score);
            if self.concurrency {
                in_flight.push(pending);
            } else {
                results.push(pending.await);
            }
        }

        // Every dispatched task resolves to exactly one result.
        while let Some(result) = in_flight.next().await {
            results.push(result);
        }

        let mut partition = Partition::default();
        let mut failed = 0;

        for result in results {
            match &result.outcome {
                Ok(score) => {
                    info!(
                        uid = result.uid,
                        sequence = result.sequence,
                        from = %result.sender,
                        subject = %result.subject,
                        prior_score = result.prior_score,
                        score = score.score,
                        reason = %score.reason,
                        "pipeline_message_classified"
                    );
                    partition.record(result.sequence, score.score, threshold);
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        uid = result.uid,
                        sequence = result.sequence,
                        from = %result.sender,
                        subject = %result.subject,
                        error = %e,
                        "classification_failed"
                    );
                }
            }
        }

        info!(
            seen = index,
            dispatched = dispatched,
            failed = failed,
            spam = partition.spam.len(),
            not_spam = partition.not_spam.len(),
            high_water_uid = high_water_uid,
            "pipeline_batch_complete"
        );

        BatchOutcome {
            partition,
            high_water_uid,
            dispatched,
            failed,
        }
    }

    /// Parse, filter and sanitize one message into a scoring task.
    ///
    /// Returns `None` when the message is skipped; failures are logged here.
    fn prepare(&self, message: RawMessage, sequence: u32) -> Option<(ClassificationTask, f64)> {
        let uid = message.uid;

        let email = match Email::parse(message.raw) {
            Ok(email) => email,
            Err(e) => {
                warn!(uid = uid, sequence = sequence, error = %e, "pipeline_parse_failed");
                return None;
            }
        };

        let sender = match email.sender() {
            Ok(sender) => sender,
            Err(e) => {
                warn!(uid = uid, sequence = sequence, error = %e, "pipeline_sender_failed");
                return None;
            }
        };

        if is_allowlisted(&sender.addr, &self.allowlist) {
            debug!(uid = uid, sequence = sequence, from = %sender.addr, "pipeline_sender_allowlisted");
            return None;
        }

        let prior_score = prior_spam_score(&email);

        let body = match sanitize_body(&email) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    uid = uid,
                    sequence = sequence,
                    from = %sender.addr,
                    subject = %email.subject(),
                    error = %e,
                    "pipeline_sanitize_failed"
                );
                return None;
            }
        };

        let task = ClassificationTask {
            sender: sender.addr.clone(),
            from: format_address(sender),
            subject: email.subject().to_string(),
            body,
        };

        Some((task, prior_score))
    }

    /// Spawn the scoring call and return a handle resolving to its result.
    ///
    /// The call starts running immediately; a task that panics or is
    /// cancelled still yields a failed result.
    fn dispatch(
        &self,
        task: ClassificationTask,
        sequence: u32,
        uid: u32,
        prior_score: f64,
    ) -> impl Future<Output = ClassificationResult> + Send + 'static {
        let scorer = Arc::clone(&self.scorer);
        let sender = task.sender.clone();
        let subject = task.subject.clone();

        debug!(uid = uid, sequence = sequence, from = %sender, "pipeline_task_dispatched");

        let handle = tokio::spawn(async move { scorer.score(&task).await });

        async move {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Classification(format!("scoring task did not complete: {e}"))),
            };

            ClassificationResult {
                sequence,
                uid,
                sender,
                subject,
                prior_score,
                outcome,
            }
        }
    }
}
