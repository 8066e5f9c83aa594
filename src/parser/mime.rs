//! Attachment location, display-body selection, and HTML-to-text
//! conversion over a built part tree.

use crate::model::attachment::Attachment;
use crate::model::part::Part;
use crate::parser::header::HeaderKind;

/// Collect every attachment in the tree.
///
/// Traversal is pre-order, left-to-right — the order parts appear in the
/// original multipart body. This governs attachment display order
/// downstream and is preserved exactly.
///
/// A part qualifies when its `Content-Disposition`'s first token is
/// `attachment` (case-insensitive), or when it carries a `Content-ID`
/// and is not the textual part already selected as the display body.
pub fn find_attachments(root: &Part) -> Vec<Attachment> {
    let display = display_body_part(root).map(|p| p as *const Part);

    root.walk()
        .filter(|part| qualifies_as_attachment(part, display))
        .map(attachment_view)
        .collect()
}

fn qualifies_as_attachment(part: &Part, display: Option<*const Part>) -> bool {
    if let Some(cd) = part.header(HeaderKind::ContentDisposition) {
        if cd.leading_token() == "attachment" {
            return true;
        }
    }

    part.header(HeaderKind::ContentId).is_some() && display != Some(part as *const Part)
}

fn attachment_view(part: &Part) -> Attachment {
    let disposition = part.header(HeaderKind::ContentDisposition);
    let content_type = part.header(HeaderKind::ContentType);

    // Filename: Content-Disposition's filename, else Content-Type's name.
    let filename = disposition
        .and_then(|h| h.key_values().get("filename").cloned())
        .or_else(|| content_type.and_then(|h| h.key_values().get("name").cloned()))
        .filter(|n| !n.is_empty());

    let content_id = part
        .header_body(HeaderKind::ContentId)
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string());

    let is_inline = disposition.is_some_and(|h| h.leading_token() == "inline");

    Attachment {
        filename,
        content_id,
        mime_type: part.mime_type(),
        is_inline,
        data: part.decoded_body(),
    }
}

/// The part selected as the display body: the first `text/html` part,
/// else the first `text/plain` part.
pub fn display_body_part(root: &Part) -> Option<&Part> {
    root.walk()
        .find(|p| p.is_type("text/html"))
        .or_else(|| root.walk().find(|p| p.is_type("text/plain")))
}

/// Best-effort HTML body.
///
/// The first `text/html` part's decoded text; a tree with only a
/// `text/plain` part gets that text wrapped in a minimal HTML shell;
/// neither yields `None`.
pub fn html_body(root: &Part) -> Option<String> {
    if let Some(html) = root.walk().find(|p| p.is_type("text/html")) {
        return Some(html.decoded_text());
    }
    root.walk()
        .find(|p| p.is_type("text/plain"))
        .map(|p| format!("<html><body>{}</body></html>", p.decoded_text()))
}

/// Plain-text body: the first `text/plain` part's decoded text, else the
/// HTML body stripped down to text.
pub fn text_body(root: &Part) -> Option<String> {
    if let Some(plain) = root.walk().find(|p| p.is_type("text/plain")) {
        return Some(plain.decoded_text());
    }
    root.walk()
        .find(|p| p.is_type("text/html"))
        .map(|p| html_to_text(&p.decoded_text()))
}

/// Convert HTML to plain text for terminal display.
///
/// - Preserves line breaks from `<br>`, `<p>`, `<div>`, `<li>`, headings
/// - Removes script and style blocks
/// - Decodes common HTML entities
/// - Collapses runs of blank lines
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    // Strip tags, inserting newlines for block-level elements.
    let mut result = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(open) = rest.find('<') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[..close].trim_start_matches('/');
        let tag_name: String = tag
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if matches!(
            tag_name.as_str(),
            "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
        ) {
            result.push('\n');
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);

    // Decode HTML entities
    let mut result = result
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&#160;", " ");
    result = result.replace("&amp;", "&");

    // Collapse multiple blank lines
    let mut cleaned = String::with_capacity(result.len());
    let mut prev_was_blank = false;
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    while let Some(start) = remaining.to_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        if let Some(end) = after.to_lowercase().find(&close) {
            remaining = &after[end + close.len()..];
        } else {
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);
    result
}
