//! RFC 5322 header parsing: typed header lines, parameter extraction,
//! encoded-words (RFC 2047), and date parsing.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// The well-known header names this crate gives a typed kind.
///
/// Derived from a case-insensitive match of the header name; anything
/// unmatched keeps [`HeaderKind::Unknown`] but the header itself is never
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HeaderKind {
    ReturnPath,
    Received,
    Subject,
    From,
    To,
    Cc,
    Date,
    ReplyTo,
    MessageId,
    InReplyTo,
    MimeVersion,
    DkimSignature,
    ContentType,
    ContentTransferEncoding,
    ContentId,
    ContentDisposition,
    Unknown,
}

impl HeaderKind {
    /// Map a header name to its kind (case-insensitive).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "return-path" => Self::ReturnPath,
            "received" => Self::Received,
            "subject" => Self::Subject,
            "from" => Self::From,
            "to" => Self::To,
            "cc" => Self::Cc,
            "date" => Self::Date,
            "reply-to" => Self::ReplyTo,
            "message-id" => Self::MessageId,
            "in-reply-to" => Self::InReplyTo,
            "mime-version" => Self::MimeVersion,
            "dkim-signature" => Self::DkimSignature,
            "content-type" => Self::ContentType,
            "content-transfer-encoding" => Self::ContentTransferEncoding,
            "content-id" => Self::ContentId,
            "content-disposition" => Self::ContentDisposition,
            _ => Self::Unknown,
        }
    }
}

/// One parsed header line.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Header {
    /// Header name as it appeared on the wire (case preserved).
    pub name: String,
    /// Typed kind derived from `name`.
    pub kind: HeaderKind,
    /// Value with surrounding whitespace trimmed.
    pub body: String,
    /// The untouched input line.
    pub raw_line: String,
}

impl Header {
    /// Parse one logical (already unfolded) header line.
    ///
    /// Splits on the first `:`. Lines without a colon are not headers and
    /// yield `None`; the caller skips them rather than aborting.
    pub fn parse(line: &str) -> Option<Self> {
        let colon = line.find(':')?;
        let name = line[..colon].trim().to_string();
        if name.is_empty() {
            return None;
        }
        let body = line[colon + 1..].trim().to_string();
        let kind = HeaderKind::from_name(&name);
        Some(Self {
            name,
            kind,
            body,
            raw_line: line.to_string(),
        })
    }

    /// Extract `key=value` parameters from the header body.
    ///
    /// Segments split on `;`, falling back to `,` only when the body
    /// contains no `;` at all — semicolon is the structurally correct MIME
    /// parameter separator, and commas legitimately appear inside quoted
    /// values. Each segment splits on its first `=`; quotes and
    /// whitespace are trimmed from both sides. Segments without `=` (bare
    /// tokens like `multipart/mixed`) carry no key/value and are skipped.
    pub fn key_values(&self) -> HashMap<String, String> {
        let separator = if self.body.contains(';') { ';' } else { ',' };
        let mut map = HashMap::new();

        for segment in self.body.split(separator) {
            let Some(eq) = segment.find('=') else {
                continue;
            };
            let key = segment[..eq].trim().trim_matches('"').to_string();
            let value = segment[eq + 1..].trim().trim_matches('"').to_string();
            if !key.is_empty() {
                map.insert(key, value);
            }
        }

        map
    }

    /// The first `;`/whitespace-delimited token of the body, lowercased.
    ///
    /// For `Content-Type: text/html; charset=utf-8` this is `text/html`;
    /// for `Content-Disposition: attachment; filename="a.pdf"` it is
    /// `attachment`.
    pub fn leading_token(&self) -> String {
        self.body
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }
}

/// First header of the given kind, in wire order.
///
/// Duplicate headers of the same kind are not merged; lookup always
/// returns the first.
pub fn first_of<'a>(headers: &'a [Header], kind: HeaderKind) -> Option<&'a Header> {
    headers.iter().find(|h| h.kind == kind)
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => {
            let cleaned: String = encoded_text
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            BASE64.decode(cleaned.as_bytes()).ok()?
        }
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    let text = decode_charset(charset, &bytes);

    Some(DecodedWord {
        text,
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("00"),
                    16,
                ) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Parse an email date string in the common formats seen in real mail.
///
/// Supports RFC 2822, ISO 8601, and broken variants without a day-of-week
/// or with a named timezone.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Replace named timezones with offsets and try again
    let replaced = replace_named_tz(&no_dow);
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
