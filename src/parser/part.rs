//! Recursive MIME part-tree construction and transfer decoding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use crate::model::part::Part;
use crate::parser::header::{Header, HeaderKind};
use crate::parser::lines::{line_content, mime_content_start, segment};
use crate::parser::repair;

/// Maximum depth for recursive multipart descent. Real-world nesting
/// rarely exceeds 5–10 levels; beyond the cap a part stays a leaf rather
/// than erroring.
const MAX_DEPTH: usize = 10;

/// Build the part tree for a byte range.
///
/// Top-level entry: a buffer with no header/body marker degrades to an
/// all-headers part, and a buffer with nothing parseable at all yields
/// `None` (the caller decides how to absorb that).
pub fn build_part(bytes: &[u8]) -> Option<Part> {
    build_part_at(bytes, 0)
}

fn build_part_at(bytes: &[u8], depth: usize) -> Option<Part> {
    let (head, raw_body, had_marker) = match mime_content_start(bytes) {
        Some(pos) => (&bytes[..pos], &bytes[pos..], true),
        // No double line-break: the whole range is headers, empty body.
        None => (bytes, &[][..], false),
    };

    // Normalize vendor soft-break separators before unfolding so folded
    // parameter lists splice back together cleanly.
    let head = repair::unwrap_quoted_breaks(head);
    let unfolded = repair::unfold_headers(&head);
    let head_text = String::from_utf8_lossy(&unfolded);
    let headers: Vec<Header> = head_text.lines().filter_map(Header::parse).collect();

    // A segment with neither a head/body split nor any parseable header
    // is not a part (this is what drops multipart preamble text).
    if !had_marker && headers.is_empty() {
        return None;
    }

    // Body content, not just headers, can be mis-escaped by some senders.
    let body = repair::correct_mangled_utf8(raw_body);

    let sub_parts = match boundary_of(&headers) {
        Some(boundary) if depth < MAX_DEPTH => split_multipart(&body, &boundary)
            .into_iter()
            .filter_map(|range| build_part_at(&body[range], depth + 1))
            .collect(),
        Some(_) => {
            debug!(depth, "multipart nesting exceeds cap, keeping as leaf");
            Vec::new()
        }
        None => Vec::new(),
    };

    Some(Part {
        headers,
        body,
        sub_parts,
    })
}

/// The `boundary` parameter of the `Content-Type` header, if any.
fn boundary_of(headers: &[Header]) -> Option<String> {
    crate::parser::header::first_of(headers, HeaderKind::ContentType)?
        .key_values()
        .get("boundary")
        .filter(|b| !b.is_empty())
        .cloned()
}

/// Split a multipart body into segments on boundary delimiter lines.
///
/// A delimiter is a line whose trimmed content equals `--boundary` — a
/// full-line match, not a substring search. A line equal to
/// `--boundary--` closes the multipart; anything after it (the epilogue)
/// is ignored. Returned ranges index into `body` and preserve wire order.
fn split_multipart(body: &[u8], boundary: &str) -> Vec<std::ops::Range<usize>> {
    let delimiter = format!("--{boundary}");
    let closing = format!("--{boundary}--");

    let mut segments = Vec::new();
    let mut current_start = 0;

    for range in segment(body) {
        let content = line_content(body, &range);
        let trimmed = trim_ascii(content);

        if trimmed == delimiter.as_bytes() {
            if range.start > current_start {
                segments.push(current_start..range.start);
            }
            current_start = range.end;
        } else if trimmed == closing.as_bytes() {
            if range.start > current_start {
                segments.push(current_start..range.start);
            }
            return segments;
        }
    }

    if current_start < body.len() {
        segments.push(current_start..body.len());
    }

    segments
}

fn trim_ascii(mut s: &[u8]) -> &[u8] {
    while matches!(s.first(), Some(b) if b.is_ascii_whitespace()) {
        s = &s[1..];
    }
    while matches!(s.last(), Some(b) if b.is_ascii_whitespace()) {
        s = &s[..s.len() - 1];
    }
    s
}

/// Decode a part's body according to its `Content-Transfer-Encoding`.
///
/// - `base64`: whitespace stripped, truncated trailing padding repaired,
///   then decoded; on failure the raw body is returned unchanged.
/// - anything else (quoted-printable included): soft line breaks removed,
///   then the mangled-escape corrector, but only when a probe still finds
///   `=XX`-looking escapes. `=XX` escapes themselves were already
///   resolved by the corrector pass at build time, so this path never
///   decodes an escape twice.
pub fn decode_body(part: &Part) -> Vec<u8> {
    match part.transfer_encoding().as_deref() {
        Some("base64") => decode_base64_repairing(&part.body),
        _ => {
            let unwrapped = repair::unwrap_7bit_line_breaks(&part.body);
            if has_hex_escapes(&unwrapped) {
                repair::correct_mangled_utf8(&unwrapped)
            } else {
                unwrapped
            }
        }
    }
}

/// Base64-decode with the padding repair applied.
///
/// Senders routinely truncate trailing `=` padding; the stripped length
/// is padded back to a multiple of 4 before decoding. A body that still
/// fails to decode is returned as-is.
fn decode_base64_repairing(body: &[u8]) -> Vec<u8> {
    let mut cleaned: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let remainder = cleaned.len() % 4;
    if remainder != 0 {
        cleaned.resize(cleaned.len() + (4 - remainder), b'=');
    }

    match BASE64.decode(&cleaned) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(%err, "base64 body failed to decode, keeping raw bytes");
            body.to_vec()
        }
    }
}

/// ASCII/UTF-8 probe: does plain text still contain `=XX` escapes?
fn has_hex_escapes(buf: &[u8]) -> bool {
    if std::str::from_utf8(buf).is_err() {
        return false;
    }
    buf.windows(3).any(|w| {
        w[0] == b'=' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple_message() {
        let raw = b"Subject: Hi\nFrom: a@b.com\n\nHello there\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.headers.len(), 2);
        assert_eq!(part.body, b"Hello there\n");
        assert!(part.is_leaf());
    }

    #[test]
    fn test_build_headers_only_degrades() {
        let raw = b"Subject: Hi\nFrom: a@b.com\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.headers.len(), 2);
        assert!(part.body.is_empty());
    }

    #[test]
    fn test_build_nothing_parseable() {
        assert!(build_part(b"just some text with no structure").is_none());
    }

    #[test]
    fn test_multipart_three_segments() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"X\"\n\
                    \n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    first\n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    second\n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    third\n\
                    --X--\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.sub_parts.len(), 3);
        assert_eq!(part.sub_parts[0].body, b"first\n");
        assert_eq!(part.sub_parts[1].body, b"second\n");
        assert_eq!(part.sub_parts[2].body, b"third\n");
    }

    #[test]
    fn test_multipart_preamble_dropped() {
        let raw = b"Content-Type: multipart/mixed; boundary=X\n\
                    \n\
                    This is a multi-part message in MIME format.\n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    real content\n\
                    --X--\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.sub_parts.len(), 1);
        assert_eq!(part.sub_parts[0].body, b"real content\n");
    }

    #[test]
    fn test_multipart_boundary_is_full_line_match() {
        // A line merely containing --X must not split.
        let raw = b"Content-Type: multipart/mixed; boundary=X\n\
                    \n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    the token --X appears mid-line here\n\
                    --X--\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.sub_parts.len(), 1);
        assert!(std::str::from_utf8(&part.sub_parts[0].body)
            .unwrap()
            .contains("the token --X appears"));
    }

    #[test]
    fn test_multipart_unparseable_segment_dropped() {
        let raw = b"Content-Type: multipart/mixed; boundary=X\n\
                    \n\
                    --X\n\
                    Content-Type: text/plain\n\
                    \n\
                    good\n\
                    --X\n\
                    garbage segment without any structure\n\
                    --X--\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.sub_parts.len(), 1);
    }

    #[test]
    fn test_missing_boundary_is_leaf() {
        let raw = b"Content-Type: multipart/mixed\n\nno boundary declared\n";
        let part = build_part(raw).unwrap();
        assert!(part.is_leaf());
        assert_eq!(part.body, b"no boundary declared\n");
    }

    #[test]
    fn test_nested_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=OUTER\n\
                    \n\
                    --OUTER\n\
                    Content-Type: multipart/alternative; boundary=INNER\n\
                    \n\
                    --INNER\n\
                    Content-Type: text/plain\n\
                    \n\
                    plain\n\
                    --INNER\n\
                    Content-Type: text/html\n\
                    \n\
                    <p>html</p>\n\
                    --INNER--\n\
                    --OUTER\n\
                    Content-Type: application/pdf\n\
                    \n\
                    data\n\
                    --OUTER--\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.sub_parts.len(), 2);
        assert_eq!(part.sub_parts[0].sub_parts.len(), 2);
        assert!(part.sub_parts[0].sub_parts[1].is_type("text/html"));
        assert!(part.sub_parts[1].is_type("application/pdf"));
    }

    #[test]
    fn test_decode_base64_body() {
        let raw = b"Content-Transfer-Encoding: base64\n\nSGVsbG8sIHdvcmxkIQ==\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), b"Hello, world!");
    }

    #[test]
    fn test_decode_base64_repairs_truncated_padding() {
        // Same content with the trailing == stripped by a broken sender.
        let raw = b"Content-Transfer-Encoding: base64\n\nSGVsbG8sIHdvcmxkIQ\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), b"Hello, world!");
    }

    #[test]
    fn test_decode_base64_ignores_line_breaks() {
        let raw = b"Content-Transfer-Encoding: base64\n\nSGVsbG8s\nIHdvcmxk\nIQ==\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), b"Hello, world!");
    }

    #[test]
    fn test_decode_invalid_base64_keeps_raw() {
        let raw = b"Content-Transfer-Encoding: base64\n\n!!!not base64!!!\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), part.body);
    }

    #[test]
    fn test_decode_quoted_printable_body() {
        let raw = b"Content-Transfer-Encoding: quoted-printable\n\ncaf=C3=A9 soft=\nbreak\n";
        let part = build_part(raw).unwrap();
        assert_eq!(
            String::from_utf8(part.decoded_body()).unwrap(),
            "café softbreak\n"
        );
    }

    #[test]
    fn test_decode_is_idempotent_on_body() {
        let raw = b"Content-Transfer-Encoding: base64\n\nSGVsbG8=\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), part.decoded_body());
        assert_eq!(part.body, b"SGVsbG8=\n");
    }

    #[test]
    fn test_decode_plain_body_unwraps_soft_breaks() {
        let raw = b"Subject: x\n\nfirst half=\nsecond half\n";
        let part = build_part(raw).unwrap();
        assert_eq!(part.decoded_body(), b"first halfsecond half\n");
    }
}
