//! One node of a MIME message's body tree.

use crate::parser::header::{first_of, Header, HeaderKind};

/// A MIME part: headers, raw body bytes, and child parts.
///
/// Leaf parts have no children; a part whose `Content-Type` carried a
/// resolvable `boundary` parameter has one child per boundary-delimited
/// segment that parsed successfully, in wire order. The tree is immutable
/// after construction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Part {
    /// Headers in wire order. Unrecognized names are kept with
    /// [`HeaderKind::Unknown`].
    pub headers: Vec<Header>,

    /// Raw body bytes as sliced out of the input buffer, after one pass
    /// of the mangled-escape repair. Still transfer-encoded.
    pub body: Vec<u8>,

    /// Child parts for multipart content; empty for leaves.
    pub sub_parts: Vec<Part>,
}

impl Part {
    /// First header of the given kind, in wire order.
    pub fn header(&self, kind: HeaderKind) -> Option<&Header> {
        first_of(&self.headers, kind)
    }

    /// Body of the first header of the given kind.
    pub fn header_body(&self, kind: HeaderKind) -> Option<&str> {
        self.header(kind).map(|h| h.body.as_str())
    }

    /// The MIME type: first token of `Content-Type`, lowercased
    /// (e.g. `text/html`, `multipart/mixed`).
    pub fn mime_type(&self) -> Option<String> {
        self.header(HeaderKind::ContentType).map(Header::leading_token)
    }

    /// `Content-Transfer-Encoding`, lowercased.
    pub fn transfer_encoding(&self) -> Option<String> {
        self.header(HeaderKind::ContentTransferEncoding)
            .map(Header::leading_token)
    }

    /// True when the MIME type starts with the given prefix
    /// (e.g. `is_type("text/")` or `is_type("text/html")`).
    pub fn is_type(&self, prefix: &str) -> bool {
        self.mime_type().is_some_and(|t| t.starts_with(prefix))
    }

    /// True when this part has no children.
    pub fn is_leaf(&self) -> bool {
        self.sub_parts.is_empty()
    }

    /// The body run through the transfer-encoding / repair pipeline
    /// selected by `Content-Transfer-Encoding`.
    ///
    /// Computed on demand, always from the raw `body` — never from a
    /// previous decode — so decoding twice yields the same bytes as
    /// decoding once.
    pub fn decoded_body(&self) -> Vec<u8> {
        crate::parser::part::decode_body(self)
    }

    /// The decoded body as text (lossy UTF-8).
    pub fn decoded_text(&self) -> String {
        String::from_utf8_lossy(&self.decoded_body()).into_owned()
    }

    /// Pre-order, left-to-right iteration over this part and all
    /// descendants. This order matches the wire order of the multipart
    /// body and governs attachment display order downstream.
    pub fn walk(&self) -> PartWalk<'_> {
        PartWalk { stack: vec![self] }
    }
}

/// Depth-first iterator returned by [`Part::walk`].
pub struct PartWalk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for PartWalk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        // Children pushed in reverse so the leftmost comes off first.
        for child in part.sub_parts.iter().rev() {
            self.stack.push(child);
        }
        Some(part)
    }
}
