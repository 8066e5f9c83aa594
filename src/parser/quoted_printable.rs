//! Quoted-printable codec (RFC 2045 §6.7).
//!
//! Standalone: nothing here depends on message parsing, so the codec is
//! usable on its own (encoded header fragments, tests, tooling). The
//! decoder is an explicit per-byte state machine; the encoder keeps
//! output lines within the 76-column limit with soft breaks.

/// Maximum encoded line width before a soft break is inserted.
const MAX_LINE_WIDTH: usize = 76;

/// Decoder state. One byte is consumed per step.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DecodeState {
    /// Plain text; bytes pass through.
    Text,
    /// Saw `=`; deciding between escape, soft break, and literal.
    Equals,
    /// Saw `=` and one hex digit (kept for literal replay on malformed input).
    EqualsSecondDigit(u8),
}

/// Decode a quoted-printable string.
///
/// Malformed escapes are emitted as their literal bytes; decoding never
/// fails. The decoded bytes are interpreted as UTF-8, lossily.
pub fn decode(input: &str) -> String {
    String::from_utf8_lossy(&decode_bytes(input.as_bytes())).into_owned()
}

/// Decode quoted-printable bytes.
///
/// State transitions, one byte at a time:
/// - `Text`: `=` enters `Equals`; everything else is emitted verbatim.
/// - `Equals`: CR stays in `Equals` (the CR of a CRLF soft break), LF
///   completes a soft break emitting nothing, a hex digit advances to
///   `EqualsSecondDigit`, anything else emits the literal `=` plus the
///   byte.
/// - `EqualsSecondDigit`: a second hex digit combines both nibbles into
///   one decoded byte; anything else replays the whole sequence
///   literally.
pub fn decode_bytes(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut state = DecodeState::Text;

    for &b in input {
        state = match state {
            DecodeState::Text => {
                if b == b'=' {
                    DecodeState::Equals
                } else {
                    out.push(b);
                    DecodeState::Text
                }
            }
            DecodeState::Equals => match b {
                b'\r' => DecodeState::Equals,
                b'\n' => DecodeState::Text,
                _ if hex_val(b).is_some() => DecodeState::EqualsSecondDigit(b),
                _ => {
                    out.push(b'=');
                    out.push(b);
                    DecodeState::Text
                }
            },
            DecodeState::EqualsSecondDigit(first) => {
                match (hex_val(first), hex_val(b)) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => {
                        // Malformed escape: replay it literally.
                        out.push(b'=');
                        out.push(first);
                        out.push(b);
                    }
                }
                DecodeState::Text
            }
        };
    }

    // Input ended mid-escape: flush what was held back.
    match state {
        DecodeState::Text => {}
        DecodeState::Equals => out.push(b'='),
        DecodeState::EqualsSecondDigit(first) => {
            out.push(b'=');
            out.push(first);
        }
    }

    out
}

/// Encode a string as quoted-printable.
///
/// Printable ASCII 32–126 except `=` passes through. `\n` is preserved,
/// protected by a soft break when the previous output byte was trailing
/// whitespace; `\r` is dropped; every other byte becomes an uppercase
/// `=XX` escape. Lines longer than 76 columns are wrapped with soft
/// breaks.
pub fn encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut col = 0;

    for &b in input.as_bytes() {
        match b {
            b'\r' => {}
            b'\n' => {
                if out.ends_with(' ') || out.ends_with('\t') {
                    out.push_str("=\n");
                }
                out.push('\n');
                col = 0;
            }
            b' '..=b'~' if b != b'=' => {
                if col + 1 >= MAX_LINE_WIDTH {
                    out.push_str("=\n");
                    col = 0;
                }
                out.push(b as char);
                col += 1;
            }
            _ => {
                if col + 3 >= MAX_LINE_WIDTH {
                    out.push_str("=\n");
                    col = 0;
                }
                out.push_str(&format!("={:02X}", b));
                col += 3;
            }
        }
    }

    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_text() {
        assert_eq!(decode("Hello, world"), "Hello, world");
    }

    #[test]
    fn test_decode_hex_escape() {
        assert_eq!(decode("caf=C3=A9"), "café");
    }

    #[test]
    fn test_decode_soft_break_lf() {
        assert_eq!(decode("first =\nsecond"), "first second");
    }

    #[test]
    fn test_decode_soft_break_crlf() {
        assert_eq!(decode("first=\r\nsecond"), "firstsecond");
    }

    #[test]
    fn test_decode_malformed_escape_is_literal() {
        assert_eq!(decode("=G5 stays"), "=G5 stays");
        assert_eq!(decode("=4Z stays"), "=4Z stays");
    }

    #[test]
    fn test_decode_truncated_escape_at_end() {
        assert_eq!(decode("end="), "end=");
        assert_eq!(decode("end=4"), "end=4");
    }

    #[test]
    fn test_decode_equals_escape() {
        assert_eq!(decode("a=3Db"), "a=b");
    }

    #[test]
    fn test_encode_plain_passthrough() {
        assert_eq!(encode("Hello, world"), "Hello, world");
    }

    #[test]
    fn test_encode_escapes_equals_and_high_bytes() {
        assert_eq!(encode("a=b"), "a=3Db");
        assert_eq!(encode("café"), "caf=C3=A9");
    }

    #[test]
    fn test_encode_drops_cr_keeps_lf() {
        assert_eq!(encode("one\r\ntwo"), "one\ntwo");
    }

    #[test]
    fn test_encode_protects_trailing_whitespace() {
        let encoded = encode("word \nnext");
        assert_eq!(encoded, "word =\n\nnext");
        assert_eq!(decode(&encoded), "word \nnext");
    }

    #[test]
    fn test_encode_wraps_long_lines() {
        let long = "x".repeat(200);
        let encoded = encode(&long);
        for line in encoded.lines() {
            assert!(line.len() <= MAX_LINE_WIDTH);
        }
        assert_eq!(decode(&encoded), long);
    }

    #[test]
    fn test_round_trip_ascii() {
        let samples = [
            "plain text",
            "with = signs == everywhere =",
            "multi\nline\ncontent",
            "tabs\tand more tabs\t!",
            "punctuation!? #$%&'()*+,-./:;<>@[]^_`{|}~",
        ];
        for s in samples {
            assert_eq!(decode(&encode(s)), s, "round trip failed for {s:?}");
        }
    }

    #[test]
    fn test_round_trip_non_ascii() {
        let s = "héllo wörld — naïve";
        assert_eq!(decode(&encode(s)), s);
    }
}
