//! Per-message processing: parsing, body sanitization and prior score.
//!
//! ## Processing Flow
//!
//! ```text
//! raw bytes → Email::parse() → sender / subject / prior_spam_score()
//!                            → sanitize_body() → plain text
//! ```

pub mod email;
pub mod sanitizer;
pub mod spam_status;

pub use email::{format_address, Email};
pub use sanitizer::sanitize_body;
pub use spam_status::prior_spam_score;
