//! Error types for the classifier.
//!
//! Every per-message failure maps onto one of these variants so the
//! pipeline can log it with context and move on to the next message.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unparseable message, header, address or markup.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or invalid Content-Type.
    #[error("Format error: {0}")]
    Format(String),

    /// Stream or file read/write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scoring capability failure or malformed model output.
    #[error("Classification error: {0}")]
    Classification(String),

    /// Mailbox mutation (copy, flag, expunge) failure.
    #[error("Move error: {0}")]
    Move(String),

    /// Message source failure (select, search, fetch).
    #[error("Fetch error: {0}")]
    Fetch(String),
}

impl From<mailparse::MailParseError> for Error {
    fn from(e: mailparse::MailParseError) -> Self {
        Error::Parse(e.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
