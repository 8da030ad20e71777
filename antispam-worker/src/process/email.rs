//! RFC 5322 message model using mailparse.
//!
//! An [`Email`] is built once from the raw bytes a message source hands us
//! and is read-only afterwards. Header lookup is case-insensitive and yields
//! the first value for a key, or an empty string when the key is absent.

use std::collections::HashMap;

use mailparse::{addrparse_header, parse_mail, MailAddr, MailHeader, MailHeaderMap, ParsedMail, SingleInfo};
use tracing::debug;

use crate::error::{Error, Result};

/// A mailbox message with its headers decoded up front.
#[derive(Debug, Clone)]
pub struct Email {
    raw: Vec<u8>,
    /// Lowercased header name -> values in the order they appear.
    headers: HashMap<String, Vec<String>>,
    subject: String,
    sender: Option<SingleInfo>,
}

impl Email {
    /// Parse raw RFC 5322 bytes (headers + body).
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let (headers, sender) = {
            let mail = parse_mail(&raw)?;

            let mut headers: HashMap<String, Vec<String>> = HashMap::new();
            for header in &mail.headers {
                headers
                    .entry(header.get_key().to_ascii_lowercase())
                    .or_default()
                    .push(header.get_value());
            }

            let sender = first_address(&mail.headers, "Sender")
                .or_else(|| first_address(&mail.headers, "From"));

            (headers, sender)
        };

        let subject = headers
            .get("subject")
            .and_then(|values| values.first())
            .cloned()
            .unwrap_or_default();

        debug!(
            raw_length = raw.len(),
            header_count = headers.len(),
            has_sender = sender.is_some(),
            "email_parsed"
        );

        Ok(Self {
            raw,
            headers,
            subject,
            sender,
        })
    }

    /// All headers, keyed by lowercased name.
    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of `name`, or `""` when the header is absent.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The first address of `Sender`, falling back to the first address of `From`.
    pub fn sender(&self) -> Result<&SingleInfo> {
        self.sender
            .as_ref()
            .ok_or_else(|| Error::Parse("no valid address in Sender or From header".to_string()))
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Re-parse the raw bytes into a MIME tree borrowing from this email.
    pub fn mime(&self) -> Result<ParsedMail<'_>> {
        Ok(parse_mail(&self.raw)?)
    }

    /// Top-level body with its transfer encoding removed.
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(self.mime()?.get_body_raw()?)
    }
}

/// Render an address the way it appears in a header: `"Name" <addr>` or `<addr>`.
pub fn format_address(address: &SingleInfo) -> String {
    match address.display_name.as_deref() {
        Some(name) if !name.is_empty() => format!("\"{}\" <{}>", name, address.addr),
        _ => format!("<{}>", address.addr),
    }
}

fn first_address(headers: &[MailHeader], name: &str) -> Option<SingleInfo> {
    let header = headers.get_first_header(name)?;
    let list = match addrparse_header(header) {
        Ok(list) => list,
        Err(e) => {
            debug!(header = name, error = %e, "email_address_parse_failed");
            return None;
        }
    };

    let first = match list.first()? {
        MailAddr::Single(info) => info.clone(),
        MailAddr::Group(group) => group.addrs.first()?.clone(),
    };

    if is_valid_address(&first.addr) {
        Some(first)
    } else {
        debug!(header = name, addr = %first.addr, "email_address_invalid");
        None
    }
}

fn is_valid_address(addr: &str) -> bool {
    matches!(addr.rsplit_once('@'), Some((local, domain)) if !local.is_empty() && !domain.is_empty())
}
