//! HTML parsing utilities for reducing markup to visible text.

pub mod parser;
pub mod types;

pub use parser::{extract_text, html_to_text};
pub use types::NodeKind;
