//! Attachment views over parsed parts.

/// One attachment located in a message's part tree.
///
/// A derived view, not independently stored: the fields are resolved from
/// the source part's `Content-Disposition` / `Content-Type` headers, and
/// `data` holds the part's transfer-decoded bytes. The payload is skipped
/// in JSON output — only the metadata is serialized.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Attachment {
    /// Resolved filename: `Content-Disposition`'s `filename` parameter,
    /// else `Content-Type`'s `name` parameter, else absent.
    pub filename: Option<String>,

    /// `Content-ID` with any surrounding angle brackets removed, for
    /// inline attachments referenced from HTML (`cid:` links).
    pub content_id: Option<String>,

    /// MIME type of the source part (e.g. `image/png`, `application/pdf`).
    pub mime_type: Option<String>,

    /// True when the disposition marks the part `inline` rather than
    /// `attachment`.
    pub is_inline: bool,

    /// Decoded content bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Filename for display, falling back to a generated name.
    pub fn display_name(&self, index: usize) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("attachment_{index}"))
    }
}
