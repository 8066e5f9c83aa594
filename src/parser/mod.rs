//! Message parsing: line segmentation, encoding repair, header and part
//! tree construction, and attachment location.

pub mod header;
pub mod lines;
pub mod mime;
pub mod part;
pub mod quoted_printable;
pub mod repair;

use tracing::debug;

use crate::model::mail::Message;
use crate::model::part::Part;

/// Parse a raw RFC 822 / MIME message.
///
/// Returns `None` only when the buffer cannot be interpreted as UTF-8 or
/// ASCII text at all — the sole hard failure of the whole subsystem.
/// Everything else degrades: a message with a missing boundary, broken
/// encodings, or an unparseable body still yields a `Message` exposing
/// whatever headers were recoverable.
pub fn parse_message(bytes: &[u8]) -> Option<Message> {
    if std::str::from_utf8(bytes).is_err() {
        debug!("buffer is not UTF-8/ASCII text, refusing to parse");
        return None;
    }

    let root = part::build_part(bytes).unwrap_or_else(|| {
        // Nothing header-shaped at all: keep the content as a bare body
        // so callers can still show something.
        Part {
            headers: Vec::new(),
            body: repair::correct_mangled_utf8(bytes),
            sub_parts: Vec::new(),
        }
    });

    Some(Message::new(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_message() {
        let msg = parse_message(b"Subject: Hi\nFrom: a@b.com\n\nHello\n").unwrap();
        assert_eq!(msg.subject().as_deref(), Some("Hi"));
        assert_eq!(msg.root.body, b"Hello\n");
    }

    #[test]
    fn test_parse_rejects_non_text() {
        // Invalid UTF-8 with high bytes: not decodable as text.
        let bytes = [0xFF, 0xFE, 0x00, 0x81, 0x92];
        assert!(parse_message(&bytes).is_none());
    }

    #[test]
    fn test_parse_unstructured_text_degrades() {
        let msg = parse_message(b"no headers here, just prose").unwrap();
        assert!(msg.root.headers.is_empty());
        assert_eq!(msg.root.body, b"no headers here, just prose");
        assert!(msg.subject().is_none());
    }

    #[test]
    fn test_parse_headers_only_message() {
        let msg = parse_message(b"Subject: stub\nFrom: a@b.com\n").unwrap();
        assert_eq!(msg.subject().as_deref(), Some("stub"));
        assert!(msg.root.body.is_empty());
        assert!(msg.html_body().is_none());
    }
}
