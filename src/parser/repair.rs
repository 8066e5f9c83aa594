//! Byte-buffer repairs for commonly mis-encoded mail.
//!
//! Every function here is a pure `&[u8] -> Vec<u8>` transform with no
//! shared state. They run before or instead of strict decoding: mail in
//! the wild arrives with folded headers, dangling soft breaks, and
//! half-applied quoted-printable escaping from buggy senders, and a
//! strict decoder alone would mangle it further.

use crate::parser::lines::{line_content, segment};

/// Lookahead window for [`correct_mangled_utf8`]'s digit-run check,
/// in bytes. Tuned against real-world mail samples.
pub const DIGIT_RUN_LOOKAHEAD: usize = 8;

/// Unfold header continuation lines.
///
/// A line starting with space or tab continues the previous header; it is
/// spliced onto the prior line with the folding whitespace removed. All CR
/// bytes are stripped, so the output is LF-separated with no folded lines
/// left.
pub fn unfold_headers(buf: &[u8]) -> Vec<u8> {
    let mut logical: Vec<Vec<u8>> = Vec::new();

    for range in segment(buf) {
        let content = line_content(buf, &range);
        let is_continuation = matches!(content.first(), Some(b' ') | Some(b'\t'));

        if is_continuation {
            if let Some(last) = logical.last_mut() {
                let mut trimmed = content;
                while matches!(trimmed.first(), Some(b' ') | Some(b'\t')) {
                    trimmed = &trimmed[1..];
                }
                last.push(b' ');
                last.extend(trimmed.iter().filter(|&&b| b != b'\r'));
                continue;
            }
        }
        logical.push(content.iter().copied().filter(|&b| b != b'\r').collect());
    }

    let mut out = Vec::with_capacity(buf.len());
    for line in logical {
        out.extend_from_slice(&line);
        out.push(b'\n');
    }
    out
}

/// Normalize a legacy-client artifact around quoted-printable soft breaks.
///
/// One vendor's output puts a separator byte (tab, `;`, or `"`) right
/// before a soft break whose continuation line starts with `;`. The
/// separator is redundant there — the continuation carries its own — so it
/// is dropped. The soft break itself is left in place for the later
/// decoding stage.
pub fn unwrap_quoted_breaks(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;

    while i < buf.len() {
        let b = buf[i];
        if matches!(b, b'\t' | b';' | b'"')
            && i + 1 < buf.len()
            && buf[i + 1] == b'='
            && continuation_starts_with_semicolon(buf, i + 2)
        {
            // Drop the separator; everything after it is copied as usual.
            i += 1;
            continue;
        }
        out.push(b);
        i += 1;
    }

    out
}

/// True when `buf[pos..]` is a line terminator followed by optional
/// whitespace and then `;`.
fn continuation_starts_with_semicolon(buf: &[u8], pos: usize) -> bool {
    let mut i = pos;
    match buf.get(i) {
        Some(b'\r') => {
            i += 1;
            if buf.get(i) == Some(&b'\n') {
                i += 1;
            }
        }
        Some(b'\n') => i += 1,
        _ => return false,
    }
    while matches!(buf.get(i), Some(b' ') | Some(b'\t')) {
        i += 1;
    }
    buf.get(i) == Some(&b';')
}

/// Remove quoted-printable soft line breaks: a trailing `=` immediately
/// before a line terminator, together with the terminator itself.
///
/// A break is kept when either of the two preceding bytes is `=` or `?`,
/// so genuine escapes (`=3D`) and RFC 2047 delimiters (`?=`) survive.
pub fn unwrap_7bit_line_breaks(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;

    while i < buf.len() {
        if buf[i] == b'=' && is_terminator_at(buf, i + 1) {
            let protected = (i >= 1 && matches!(buf[i - 1], b'=' | b'?'))
                || (i >= 2 && matches!(buf[i - 2], b'=' | b'?'));
            if !protected {
                i += 1 + terminator_len(buf, i + 1);
                continue;
            }
        }
        out.push(buf[i]);
        i += 1;
    }

    out
}

fn is_terminator_at(buf: &[u8], pos: usize) -> bool {
    matches!(buf.get(pos), Some(b'\r') | Some(b'\n'))
}

/// Length of the terminator starting at `pos` (0 if none).
fn terminator_len(buf: &[u8], pos: usize) -> usize {
    match buf.get(pos) {
        Some(b'\r') => {
            if buf.get(pos + 1) == Some(&b'\n') {
                2
            } else {
                1
            }
        }
        Some(b'\n') => 1,
        _ => 0,
    }
}

/// Repair mangled UTF-8 escape sequences left by mis-encoding senders.
///
/// Uses the default lookahead window of [`DIGIT_RUN_LOOKAHEAD`] bytes.
/// See [`correct_mangled_utf8_with_lookahead`].
pub fn correct_mangled_utf8(buf: &[u8]) -> Vec<u8> {
    correct_mangled_utf8_with_lookahead(buf, DIGIT_RUN_LOOKAHEAD)
}

/// Repair mangled UTF-8 escape sequences, with an explicit lookahead window.
///
/// This is a heuristic, not a guaranteed-correct transformation. It decodes
/// three shapes:
///
/// - `=XX` hex escapes, but only when the `=` is not preceded by `?`
///   (RFC 2047 delimiter), not immediately followed by a line terminator
///   (soft break — handled elsewhere), and not followed by an
///   uninterrupted run of at least `lookahead` ASCII digits. The digit-run
///   rule keeps literal `=` in URLs and parameters intact:
///   `&ct=1507640404515657` must come out byte-identical. The window
///   trades false negatives (a genuine escape followed by many digits is
///   left alone) for never corrupting URLs.
/// - `\uXXXX` escapes, decoded to the corresponding UTF-8 bytes.
/// - `=3D`, which collapses to `=` through the ordinary hex path.
///
/// Never reads past the end of the buffer.
pub fn correct_mangled_utf8_with_lookahead(buf: &[u8], lookahead: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;

    while i < buf.len() {
        let b = buf[i];

        // \uXXXX escape
        if b == b'\\' && buf.get(i + 1) == Some(&b'u') {
            if let Some(decoded) = decode_unicode_escape(&buf[i + 2..]) {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(decoded.encode_utf8(&mut utf8).as_bytes());
                i += 6;
                continue;
            }
        }

        if b == b'=' {
            let preceded_by_question = i >= 1 && buf[i - 1] == b'?';
            let followed_by_terminator = is_terminator_at(buf, i + 1);

            if !preceded_by_question && !followed_by_terminator && !digit_run_follows(buf, i + 1, lookahead) {
                if let (Some(hi), Some(lo)) = (
                    buf.get(i + 1).copied().and_then(hex_val),
                    buf.get(i + 2).copied().and_then(hex_val),
                ) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
        }

        out.push(b);
        i += 1;
    }

    out
}

/// True when at least `window` bytes follow `pos` and every one of the
/// first `window` is an ASCII digit.
fn digit_run_follows(buf: &[u8], pos: usize, window: usize) -> bool {
    if window == 0 || pos + window > buf.len() {
        return false;
    }
    buf[pos..pos + window].iter().all(u8::is_ascii_digit)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode the `XXXX` of a `\uXXXX` escape (the slice starts after `\u`).
fn decode_unicode_escape(s: &[u8]) -> Option<char> {
    if s.len() < 4 {
        return None;
    }
    let mut value: u32 = 0;
    for &b in &s[..4] {
        value = (value << 4) | u32::from(hex_val(b)?);
    }
    char::from_u32(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfold_single_continuation() {
        let input = b"Subject: This is a long\n\tsubject line\nFrom: a@b.com\n";
        let out = unfold_headers(input);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Subject: This is a long subject line\nFrom: a@b.com\n");
    }

    #[test]
    fn test_unfold_strips_cr() {
        let input = b"Subject: Hi\r\nTo: x@y.com\r\n";
        let out = unfold_headers(input);
        assert_eq!(out, b"Subject: Hi\nTo: x@y.com\n");
    }

    #[test]
    fn test_unfold_multiple_continuations() {
        let input = b"Received: by host\n with protocol\n  id abc\n";
        let out = unfold_headers(input);
        assert_eq!(out, b"Received: by host with protocol id abc\n");
    }

    #[test]
    fn test_unfold_leading_continuation_kept() {
        // A continuation with nothing before it has nowhere to splice.
        let input = b" orphan\nSubject: Hi\n";
        let out = unfold_headers(input);
        assert_eq!(out, b" orphan\nSubject: Hi\n");
    }

    #[test]
    fn test_unwrap_quoted_breaks_drops_separator() {
        let input = b"name=\"a\";=\r\n\t;charset=utf-8";
        let out = unwrap_quoted_breaks(input);
        assert_eq!(out, b"name=\"a\"=\r\n\t;charset=utf-8");
    }

    #[test]
    fn test_unwrap_quoted_breaks_leaves_ordinary_breaks() {
        let input = b"plain text=\r\n continued";
        assert_eq!(unwrap_quoted_breaks(input), input.to_vec());
    }

    #[test]
    fn test_unwrap_7bit_removes_soft_break() {
        let input = b"first part=\nsecond part";
        assert_eq!(unwrap_7bit_line_breaks(input), b"first partsecond part");
    }

    #[test]
    fn test_unwrap_7bit_removes_crlf_break() {
        let input = b"first=\r\nsecond";
        assert_eq!(unwrap_7bit_line_breaks(input), b"firstsecond");
    }

    #[test]
    fn test_unwrap_7bit_protects_encoded_word_delimiter() {
        let input = b"=?UTF-8?B?abc?=\nnext";
        assert_eq!(unwrap_7bit_line_breaks(input), input.to_vec());
    }

    #[test]
    fn test_unwrap_7bit_protects_double_equals() {
        let input = b"padding==\nrest";
        assert_eq!(unwrap_7bit_line_breaks(input), input.to_vec());
    }

    #[test]
    fn test_corrector_decodes_hex_escape() {
        // =C3=A9 is the mangled form of 'é'
        let out = correct_mangled_utf8(b"caf=C3=A9");
        assert_eq!(out, "café".as_bytes());
    }

    #[test]
    fn test_corrector_leaves_url_digit_runs() {
        let input = b"&ct=1507640404515657";
        assert_eq!(correct_mangled_utf8(input), input.to_vec());
    }

    #[test]
    fn test_corrector_short_digit_tail_still_decodes() {
        // Only two digits follow: not a digit run, decode normally.
        let out = correct_mangled_utf8(b"x=41y");
        assert_eq!(out, b"xAy");
    }

    #[test]
    fn test_corrector_respects_question_mark_guard() {
        let input = b"=?UTF-8?Q?caf=C3=A9?=";
        let out = correct_mangled_utf8(input);
        // The leading =? stays; the inner escapes decode.
        assert!(out.starts_with(b"=?UTF-8?Q?caf"));
    }

    #[test]
    fn test_corrector_leaves_soft_breaks_alone() {
        let input = b"line=\ncontinues";
        assert_eq!(correct_mangled_utf8(input), input.to_vec());
    }

    #[test]
    fn test_corrector_collapses_3d() {
        assert_eq!(correct_mangled_utf8(b"a=3Db"), b"a=b");
    }

    #[test]
    fn test_corrector_decodes_unicode_escape() {
        let out = correct_mangled_utf8(b"snowman \\u2603!");
        assert_eq!(out, "snowman ☃!".as_bytes());
    }

    #[test]
    fn test_corrector_malformed_unicode_escape_is_literal() {
        let input = b"\\uZZZZ and \\u12";
        assert_eq!(correct_mangled_utf8(input), input.to_vec());
    }

    #[test]
    fn test_corrector_does_not_overrun_buffer_end() {
        assert_eq!(correct_mangled_utf8(b"tail="), b"tail=");
        assert_eq!(correct_mangled_utf8(b"tail=4"), b"tail=4");
        assert_eq!(correct_mangled_utf8(b"\\u"), b"\\u");
    }

    #[test]
    fn test_corrector_custom_lookahead() {
        // With a window of 2, "=15" is already a digit run and stays.
        let out = correct_mangled_utf8_with_lookahead(b"x=15y", 2);
        assert_eq!(out, b"x=15y");
        // With the default window it decodes (only two digits follow).
        assert_eq!(correct_mangled_utf8(b"x=15y"), b"x\x15y");
    }
}
