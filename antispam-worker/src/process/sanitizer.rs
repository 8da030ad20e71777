//! Reduce a message body to the plain text handed to the scorer.
//!
//! Handles:
//! - multipart/* (direct parts only: text/html is extracted, text/plain is
//!   appended verbatim, everything else is ignored)
//! - single-part text/html (extracted)
//! - any other single-part body contributes nothing
//!
//! The last rule is asymmetric with the multipart case, where plain text
//! parts are kept. It is long-standing behavior and tests pin it.

use mailparse::MailHeaderMap;
use tracing::{debug, info};

use super::email::Email;
use crate::error::{Error, Result};
use crate::html::html_to_text;

/// Characters that may not appear in a media type token (RFC 2045).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Sanitize the body of `email` into plain visible text.
///
/// Fails with [`Error::Format`] when the Content-Type header is missing or
/// malformed, and with [`Error::Parse`] when a part cannot be decoded. Any
/// failure discards the whole result.
pub fn sanitize_body(email: &Email) -> Result<String> {
    let content_type = email.header("Content-Type");
    let media_type = parse_media_type(content_type)?;
    let mail = email.mime()?;

    let mut text = String::new();

    if media_type.starts_with("multipart/") {
        if !mail.ctype.params.contains_key("boundary") {
            return Err(Error::Format(format!(
                "multipart body without boundary: {content_type}"
            )));
        }

        for (index, part) in mail.subparts.iter().enumerate() {
            let part_type = part.headers.get_first_value("Content-Type").unwrap_or_default();

            if part_type.contains("text/html") {
                text.push_str(&html_to_text(trim_boundary_newline(&part.get_body()?)));
            } else if part_type.contains("text/plain") {
                text.push_str(trim_boundary_newline(&part.get_body()?));
            } else {
                debug!(part_index = index, part_type = %part_type, "sanitize_part_ignored");
            }
        }
    } else if content_type.contains("text/html") {
        text.push_str(&html_to_text(&mail.get_body()?));
    } else {
        debug!(content_type = content_type, "sanitize_plain_body_dropped");
    }

    info!(
        media_type = %media_type,
        parts_count = mail.subparts.len(),
        text_length = text.len(),
        "sanitize_complete"
    );

    Ok(text)
}

/// Drop the single line break that precedes a boundary delimiter.
///
/// mailparse leaves it on the part body, but RFC 2046 assigns it to the
/// delimiter line that follows.
fn trim_boundary_newline(body: &str) -> &str {
    body.strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
}

/// Validate a Content-Type value and return its lowercased `type/subtype`.
fn parse_media_type(content_type: &str) -> Result<String> {
    let (essence, params) = content_type.split_once(';').unwrap_or((content_type, ""));
    let essence = essence.trim();
    if essence.is_empty() {
        return Err(Error::Format("missing Content-Type header".to_string()));
    }

    match essence.split_once('/') {
        Some((kind, subtype)) if is_token(kind) && is_token(subtype) => {}
        _ => return Err(Error::Format(format!("invalid media type: {essence}"))),
    }

    validate_params(params)
        .map_err(|reason| Error::Format(format!("invalid media parameter ({reason}): {content_type}")))?;

    Ok(essence.to_ascii_lowercase())
}

/// Check `name=value` pairs following the media type.
///
/// `rest` starts just after the first `;`. Values are tokens or quoted
/// strings; a trailing `;` is tolerated.
fn validate_params(mut rest: &str) -> std::result::Result<(), &'static str> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }

        let (name, after) = split_token(rest);
        if name.is_empty() {
            return Err("expected parameter name");
        }
        let after = after.trim_start();
        let Some(after) = after.strip_prefix('=') else {
            return Err("expected '='");
        };
        let after = after.trim_start();

        let after = if let Some(quoted) = after.strip_prefix('"') {
            skip_quoted(quoted).ok_or("unterminated quoted string")?
        } else {
            let (value, after) = split_token(after);
            if value.is_empty() {
                return Err("expected parameter value");
            }
            after
        };

        let after = after.trim_start();
        if after.is_empty() {
            return Ok(());
        }
        match after.strip_prefix(';') {
            Some(next) => rest = next,
            None => return Err("expected ';'"),
        }
    }
}

/// Skip a quoted string body (opening quote already consumed), returning
/// what follows the closing quote.
fn skip_quoted(s: &str) -> Option<&str> {
    let mut chars = s.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next()?;
            }
            '"' => return Some(&s[index + 1..]),
            _ => {}
        }
    }
    None
}

fn split_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !TSPECIALS.contains(c)
}
