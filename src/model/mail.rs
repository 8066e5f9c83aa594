//! The parsed message facade.

use chrono::{DateTime, Utc};

use crate::error::{EmlError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::Attachment;
use crate::model::part::Part;
use crate::parser::header::{self, HeaderKind};
use crate::parser::mime;

/// A fully parsed message: the root of the part tree plus the identity
/// extracted from it.
///
/// Constructed once from a byte buffer at parse time and immutable
/// thereafter. Two messages compare equal when their identifiers are
/// equal — see [`Message::identifier`] and the `PartialEq` impl.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Root part; its headers are the message headers.
    pub root: Part,

    /// Raw identity: the `Message-ID` header, falling back to
    /// `DKIM-Signature` when absent.
    raw_identity: Option<String>,
}

impl Message {
    /// Wrap a built part tree, extracting the message identity.
    pub(crate) fn new(root: Part) -> Self {
        let raw_identity = root
            .header_body(HeaderKind::MessageId)
            .or_else(|| root.header_body(HeaderKind::DkimSignature))
            .map(str::to_string);
        Self { root, raw_identity }
    }

    /// Parse a message loaded from a file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmlError::FileNotFound(path.to_path_buf())
            } else {
                EmlError::io(path, e)
            }
        })?;
        crate::parser::parse_message(&data).ok_or(EmlError::NotText)
    }

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub fn subject(&self) -> Option<String> {
        self.root
            .header_body(HeaderKind::Subject)
            .map(header::decode_encoded_words)
    }

    /// The message identity: `Message-ID`, else `DKIM-Signature`, else
    /// absent.
    pub fn identifier(&self) -> Option<&str> {
        self.raw_identity.as_deref()
    }

    /// Parsed `Date:` header.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.root
            .header_body(HeaderKind::Date)
            .and_then(header::parse_date)
    }

    /// Sender, from the first `From:` header.
    pub fn from_addr(&self) -> Option<EmailAddress> {
        self.root
            .header_body(HeaderKind::From)
            .map(|raw| EmailAddress::parse(&header::decode_encoded_words(raw)))
    }

    /// Primary recipients from the `To:` header.
    pub fn to_addrs(&self) -> Vec<EmailAddress> {
        self.root
            .header_body(HeaderKind::To)
            .map(|raw| EmailAddress::parse_list(&header::decode_encoded_words(raw)))
            .unwrap_or_default()
    }

    /// Best-effort HTML body.
    ///
    /// The first `text/html` part's decoded body; a message with only a
    /// `text/plain` part gets that body wrapped in a minimal
    /// `<html><body>…</body></html>` shell; a message with neither yields
    /// `None`.
    pub fn html_body(&self) -> Option<String> {
        mime::html_body(&self.root)
    }

    /// Plain-text body: the first `text/plain` part, or the HTML body
    /// stripped to text.
    pub fn text_body(&self) -> Option<String> {
        mime::text_body(&self.root)
    }

    /// All attachments, in the order their parts appear in the message.
    pub fn attachments(&self) -> Vec<Attachment> {
        mime::find_attachments(&self.root)
    }

    /// Find an attachment by its resolved filename.
    pub fn attachment_named(&self, name: &str) -> Result<Attachment> {
        self.attachments()
            .into_iter()
            .find(|a| a.filename.as_deref() == Some(name))
            .ok_or_else(|| EmlError::AttachmentNotFound(name.to_string()))
    }
}

/// Equality is identifier equality only — a deliberate identity shortcut,
/// not structural comparison. Two messages with the same `Message-ID` but
/// different (e.g. corrupted) bodies compare equal; a message without any
/// identifier compares unequal to everything.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (&self.raw_identity, &other.raw_identity) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
