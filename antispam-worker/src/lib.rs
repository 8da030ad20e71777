//! LLM antispam - mailbox spam classification worker.
//!
//! Periodically scans a mailbox for unread email, asks a scoring model how
//! likely each message is to be spam, and moves messages by threshold while
//! remembering the highest UID it has seen.
//!
//! ## Architecture
//!
//! ```text
//! MessageSource → Classifier (parse → allow-list → sanitize → Scorer) → Partition
//!                                                                      ↓
//!                                                  Mover ← Rule ← run_rule → Watermark
//! ```

pub mod allowlist;
pub mod classifier;
pub mod config;
pub mod error;
pub mod html;
pub mod mailbox;
pub mod process;
pub mod runner;
pub mod scoring;
pub mod watermark;

// Re-export commonly used types
pub use allowlist::is_allowlisted;
pub use classifier::{BatchOutcome, ClassificationResult, ClassificationTask, Classifier, Partition};
pub use config::Config;
pub use error::{Error, Result};
pub use mailbox::{FetchedBatch, MessageSource, Mover, RawMessage};
pub use process::{sanitize_body, Email};
pub use runner::{run_rule, run_rules, Rule, RuleReport};
pub use scoring::{LlmConfig, LlmScorer, Provider, Score, Scorer};
pub use watermark::Watermark;
