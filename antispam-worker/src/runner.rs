//! Rule runner - one fetch, classify, move, persist cycle per rule.
//!
//! This module ties the capabilities together:
//! 1. Fetches unread messages from the rule's origin mailbox
//! 2. Loads the mailbox watermark
//! 3. Classifies the batch
//! 4. Moves the spam set (or the not-spam set) to the destination
//! 5. Persists the advanced watermark
//!
//! A failed move is logged and the watermark still advances: those messages
//! will not be looked at again, which trades a missed move for never
//! reclassifying the same batch in a loop.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::classifier::{Classifier, Partition};
use crate::config::Config;
use crate::mailbox::{fetch_status, MessageSource, Mover};
use crate::watermark::Watermark;

/// One monitored mailbox and what to do with its messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rule {
    /// Mailbox to scan for unread messages
    pub origin: String,
    /// Mailbox the selected set is moved to
    pub destination: String,
    /// Scores strictly above this are spam
    pub threshold: f64,
    /// Move the not-spam set instead of the spam set
    #[serde(default)]
    pub move_not_spam: bool,
}

impl Rule {
    /// The set this rule moves out of the origin mailbox.
    pub fn selected<'a>(&self, partition: &'a Partition) -> &'a BTreeSet<u32> {
        if self.move_not_spam {
            &partition.not_spam
        } else {
            &partition.spam
        }
    }
}

/// Result of running one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleReport {
    pub partition: Partition,
    /// Sequence numbers handed to the mover
    pub moved: BTreeSet<u32>,
    /// Whether the mover reported success
    pub move_succeeded: bool,
    /// Watermark after the run
    pub watermark: u32,
}

/// Run one rule end to end.
///
/// Only a failure to start fetching is returned as an error; everything
/// after that is logged and the run completes.
pub async fn run_rule(
    source: &dyn MessageSource,
    mover: &dyn Mover,
    classifier: &Classifier,
    rule: &Rule,
    uid_files_path: &Path,
) -> Result<RuleReport> {
    info!(origin = %rule.origin, destination = %rule.destination, "rule_start");

    let batch = source
        .fetch_unread(&rule.origin)
        .await
        .with_context(|| format!("Failed to fetch unread messages from {}", rule.origin))?;

    let mut watermark = Watermark::load(Watermark::path_for(uid_files_path, &rule.origin));

    let outcome = classifier
        .classify(
            batch.messages,
            &batch.sequence_numbers,
            rule.threshold,
            watermark.last_processed_id(),
        )
        .await;

    info!(
        origin = %rule.origin,
        spam = ?outcome.partition.spam,
        not_spam = ?outcome.partition.not_spam,
        "rule_classified"
    );

    let selected = rule.selected(&outcome.partition).clone();
    let mut move_succeeded = true;

    if !selected.is_empty() {
        info!(
            origin = %rule.origin,
            destination = %rule.destination,
            sequence_numbers = ?selected,
            "rule_moving"
        );

        if let Err(e) = mover
            .move_messages(&selected, &rule.origin, &rule.destination)
            .await
        {
            move_succeeded = false;
            error!(
                origin = %rule.origin,
                destination = %rule.destination,
                sequence_numbers = ?selected,
                error = %e,
                "rule_move_failed"
            );
        }
    }

    if let Err(e) = fetch_status(batch.completion).await {
        warn!(origin = %rule.origin, error = %e, "rule_fetch_incomplete");
    }

    if outcome.high_water_uid > 0 && watermark.advance(outcome.high_water_uid) {
        if let Err(e) = watermark.persist() {
            error!(
                origin = %rule.origin,
                path = %watermark.path().display(),
                error = %e,
                "rule_watermark_persist_failed"
            );
        }
    }

    info!(
        origin = %rule.origin,
        moved = selected.len(),
        move_succeeded = move_succeeded,
        watermark = watermark.last_processed_id(),
        "rule_complete"
    );

    Ok(RuleReport {
        partition: outcome.partition,
        moved: selected,
        move_succeeded,
        watermark: watermark.last_processed_id(),
    })
}

/// Run every configured rule once, in order.
///
/// A rule that fails is logged and the remaining rules still run.
pub async fn run_rules(
    source: &dyn MessageSource,
    mover: &dyn Mover,
    classifier: &Classifier,
    config: &Config,
) -> Vec<RuleReport> {
    let mut reports = Vec::with_capacity(config.rules.len());

    for rule in &config.rules {
        match run_rule(source, mover, classifier, rule, &config.uid_files_path).await {
            Ok(report) => reports.push(report),
            Err(e) => error!(origin = %rule.origin, error = %e, "rule_failed"),
        }
    }

    reports
}
