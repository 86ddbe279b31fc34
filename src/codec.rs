//! Text codec: escaping and the line-oriented `key = value` format.
//!
//! Format summary
//! - `#` or `!` as first non-blank character starts a comment line.
//! - The key runs up to the first unescaped `=`, `:` or blank. Blanks and
//!   at most one `=`/`:` after it are skipped; the rest is the value.
//! - An odd number of trailing `\` continues the logical line on the next
//!   physical line, whose leading blanks are dropped.
//! - A bare key decodes to an absent value; a separator followed by
//!   nothing decodes to the empty string.
//! - Escapes work on UTF-16 code units, so code points beyond the BMP
//!   travel as two `\uXXXX` surrogates.

use crate::error::{Error, EscapeError, Result};
use crate::text::is_blank;
use core::fmt::Write as _;

/// Characters that are always backslash-escaped.
const SPECIAL: &[u16] = &[
    b'=' as u16, b':' as u16, b'\t' as u16, b'\r' as u16, b'\n' as u16, 0x0C, b'#' as u16,
    b'!' as u16, b'\\' as u16,
];

/// Character encodings understood by load and store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per code point `0..=0xFF`.
    Latin1,
}

impl Encoding {
    /// Look up an encoding by label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = crate::text::trim_blank(label).to_ascii_lowercase();
        match l.as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "iso8859_1" | "8859_1" | "latin1" | "latin-1"
            | "us-ascii" | "ascii" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    /// Like [`from_label`](Self::from_label), falling back to ISO-8859-1
    /// for unknown labels and to UTF-8 for none.
    pub fn resolve(label: Option<&str>) -> Self {
        match label {
            None => Encoding::Utf8,
            Some(l) => Self::from_label(l).unwrap_or_else(|| {
                tracing::warn!(label = l, "unknown encoding, falling back to ISO-8859-1");
                Encoding::Latin1
            }),
        }
    }

    pub fn decode(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))),
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }

    /// Encode `text`; code points outside ISO-8859-1 become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Escape `text` for the property format.
///
/// With `surround_space`, a leading and a trailing space are escaped as
/// `\ ` so they survive re-parsing.
pub fn escape(text: &str, surround_space: bool) -> String {
    escape_impl(text, surround_space, false)
}

/// Escape a key: like [`escape`] but every space is escaped, since an
/// unescaped blank would end the key.
pub fn escape_key(key: &str) -> String {
    escape_impl(key, true, true)
}

fn escape_impl(text: &str, surround_space: bool, all_spaces: bool) -> String {
    let units: Vec<u16> = text.encode_utf16().collect();
    let last = units.len().saturating_sub(1);
    let mut out = String::with_capacity(units.len() + units.len() / 4 + 12);
    for (i, &u) in units.iter().enumerate() {
        if u == u16::from(b' ') {
            if all_spaces || (surround_space && (i == 0 || i == last)) {
                out.push('\\');
            }
            out.push(' ');
        } else if SPECIAL.contains(&u) {
            out.push('\\');
            out.push(match u {
                0x09 => 't',
                0x0A => 'n',
                0x0D => 'r',
                0x0C => 'f',
                _ => char::from(u as u8),
            });
        } else if u < 0x20 || u > 0xFE || (0x7F..=0xA0).contains(&u) {
            let _ = write!(out, "\\u{:04X}", u);
        } else {
            // 0x20..=0x7E or 0xA1..=0xFE: a Latin-1 code point.
            out.push(char::from(u as u8));
        }
    }
    out
}

/// Decode escapes: `\t \r \n \f`, `\uXXXX`, and `\c` for any other `c`.
/// A lone trailing backslash is dropped.
pub fn unescape(text: &str) -> core::result::Result<String, EscapeError> {
    let mut units: Vec<u16> = Vec::with_capacity(text.len());
    let mut buf = [0u16; 2];
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        let c = if c == '\\' {
            match chars.next() {
                None => break,
                Some('t') => '\t',
                Some('r') => '\r',
                Some('n') => '\n',
                Some('f') => '\u{0C}',
                Some('u') => {
                    let mut v: u16 = 0;
                    for _ in 0..4 {
                        let d = chars.next().ok_or(EscapeError::Truncated)?;
                        let digit = d.to_digit(16).ok_or(EscapeError::InvalidHex(d))?;
                        v = (v << 4) | digit as u16;
                    }
                    units.push(v);
                    continue;
                }
                Some(other) => other,
            }
        } else {
            c
        };
        units.extend_from_slice(c.encode_utf16(&mut buf));
    }
    char::decode_utf16(units.iter().copied())
        .collect::<core::result::Result<String, _>>()
        .map_err(|e| EscapeError::UnpairedSurrogate(e.unpaired_surrogate()))
}

/// Split on `\n`, `\r\n` or a lone `\r`.
fn physical_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    core::iter::from_fn(move || {
        let s = rest?;
        match s.find(['\n', '\r']) {
            Some(i) => {
                let skip = if s[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&s[i + skip..]);
                Some(&s[..i])
            }
            None => {
                rest = None;
                (!s.is_empty()).then_some(s)
            }
        }
    })
}

fn odd_trailing_backslashes(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// One decoded `key = value` pair. The key is raw: not yet trimmed or
/// validated.
pub type Pair = (String, Option<String>);

/// Iterator over the pairs of a property text.
///
/// Yields `Err(Error::Decode)` for a line with a malformed escape; callers
/// stop there.
pub struct Pairs<'a> {
    lines: core::iter::Enumerate<Box<dyn Iterator<Item = &'a str> + 'a>>,
}

/// Parse property text into `(key, value)` pairs.
pub fn pairs(text: &str) -> Pairs<'_> {
    let lines: Box<dyn Iterator<Item = &str> + '_> = Box::new(physical_lines(text));
    Pairs {
        lines: lines.enumerate(),
    }
}

impl<'a> Iterator for Pairs<'a> {
    type Item = Result<Pair>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, first) = self.lines.next()?;
            let Some(key_start) = first.find(|c: char| !is_blank(c)) else {
                continue;
            };
            if first[key_start..].starts_with(['#', '!']) {
                continue;
            }
            let mut logical = first[key_start..].to_owned();
            while odd_trailing_backslashes(&logical) {
                logical.pop();
                match self.lines.next() {
                    Some((_, more)) => logical.push_str(more.trim_start_matches(is_blank)),
                    None => break,
                }
            }
            return Some(split_pair(&logical).map_err(|source| Error::Decode {
                line: index + 1,
                source,
            }));
        }
    }
}

/// Split one logical line (leading blanks already removed) and decode it.
fn split_pair(line: &str) -> core::result::Result<Pair, EscapeError> {
    let (key_end, value_start, separated) = separator_span(line, true);
    let key = unescape(&line[..key_end])?;
    let value = if value_start < line.len() {
        Some(unescape(&line[value_start..])?)
    } else if separated {
        Some(String::new())
    } else {
        None
    };
    Ok((key, value))
}

/// Locate the key/value boundary of a line.
///
/// Returns the end of the key, the start of the value and whether an
/// explicit `=`/`:` separator was seen. With `escapes`, a backslash makes
/// the next character part of the key.
pub(crate) fn separator_span(line: &str, escapes: bool) -> (usize, usize, bool) {
    let b = line.as_bytes();
    let mut key_end = 0;
    while key_end < b.len() {
        let c = b[key_end];
        if escapes && c == b'\\' {
            key_end += 2;
            continue;
        }
        if c <= b' ' || c == b'=' || c == b':' {
            break;
        }
        key_end += 1;
    }
    let key_end = key_end.min(b.len());
    // A skipped escape may have landed inside a multi-byte char.
    let key_end = (key_end..=b.len())
        .find(|&i| line.is_char_boundary(i))
        .unwrap_or(b.len());

    let mut value_start = key_end;
    let mut separated = false;
    while value_start < b.len() {
        let c = b[value_start];
        if c > b' ' {
            if separated || (c != b'=' && c != b':') {
                break;
            }
            separated = true;
        }
        value_start += 1;
    }
    (key_end, value_start, separated)
}

/// Render pairs in the property format, one `key=value` line each; an
/// absent value is written as a bare key.
pub fn write_pairs<'a, I>(out: &mut String, pairs: I)
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    for (key, value) in pairs {
        out.push_str(&escape_key(key));
        if let Some(v) = value {
            out.push('=');
            out.push_str(&escape(v, true));
        }
        out.push('\n');
    }
}

/// Render comment lines, each prefixed with `# `.
pub fn write_comment(out: &mut String, comment: &str) {
    for line in physical_lines(comment) {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Pair> {
        pairs(text).collect::<Result<Vec<_>>>().unwrap()
    }

    fn p(k: &str, v: Option<&str>) -> Pair {
        (k.to_owned(), v.map(str::to_owned))
    }

    /// Invariant: control characters map to their letter escapes.
    #[test]
    fn escape_specials() {
        assert_eq!(escape("a=b:c", false), "a\\=b\\:c");
        assert_eq!(escape("\t\r\n\u{0C}", false), "\\t\\r\\n\\f");
        assert_eq!(escape("#!\\", false), "\\#\\!\\\\");
        assert_eq!(escape("", true), "");
    }

    /// Invariant: non-printable and non-Latin-1 code units become \uXXXX.
    #[test]
    fn escape_unicode() {
        assert_eq!(escape("\u{1}", false), "\\u0001");
        assert_eq!(escape("\u{7F}\u{A0}\u{A1}", false), "\\u007F\\u00A0\u{A1}");
        assert_eq!(escape("\u{FF}", false), "\\u00FF");
        assert_eq!(escape("€", false), "\\u20AC");
        assert_eq!(escape("\u{1F600}", false), "\\uD83D\\uDE00");
    }

    /// Invariant: only surrounding spaces are escaped, and only on request.
    #[test]
    fn escape_surrounding_space() {
        assert_eq!(escape(" a b ", true), "\\ a b\\ ");
        assert_eq!(escape(" a b ", false), " a b ");
        assert_eq!(escape(" ", true), "\\ ");
        assert_eq!(escape_key("a b"), "a\\ b");
    }

    /// Invariant: escapes decode; unknown escapes yield the character itself.
    #[test]
    fn unescape_basics() {
        assert_eq!(unescape("a\\tb").unwrap(), "a\tb");
        assert_eq!(unescape("\\r\\n\\f").unwrap(), "\r\n\u{0C}");
        assert_eq!(unescape("\\\\").unwrap(), "\\");
        assert_eq!(unescape("\\q\\=").unwrap(), "q=");
        assert_eq!(unescape("\\u00e4\\u00C4").unwrap(), "äÄ");
        assert_eq!(unescape("\\uD83D\\uDE00").unwrap(), "\u{1F600}");
        assert_eq!(unescape("end\\").unwrap(), "end");
    }

    /// Invariant: malformed \u escapes fail with a decode error.
    #[test]
    fn unescape_errors() {
        assert_eq!(unescape("\\u12"), Err(EscapeError::Truncated));
        assert_eq!(unescape("\\u12g4"), Err(EscapeError::InvalidHex('g')));
        assert_eq!(unescape("\\u 123"), Err(EscapeError::InvalidHex(' ')));
        assert_eq!(
            unescape("\\uD800x"),
            Err(EscapeError::UnpairedSurrogate(0xD800))
        );
    }

    /// Invariant: escape then unescape is the identity.
    #[test]
    fn round_trip_samples() {
        for s in [
            "", " ", "  x  ", "a=b", "ä€\u{1F600}", "\\u0041", "#!:=\t\r\n", "\u{0}\u{9F}",
        ] {
            assert_eq!(unescape(&escape(s, true)).unwrap(), s);
            assert_eq!(unescape(&escape_key(s)).unwrap(), s);
        }
    }

    /// Invariant: separators, comments and blank lines follow the format.
    #[test]
    fn parse_lines() {
        let text = "# comment\n  ! other comment\n\n   \na=1\nb : 2\nc 3\nd\ne=\nf =  \ng==x\n";
        assert_eq!(
            parse(text),
            vec![
                p("a", Some("1")),
                p("b", Some("2")),
                p("c", Some("3")),
                p("d", None),
                p("e", Some("")),
                p("f", Some("")),
                p("g", Some("=x")),
            ]
        );
    }

    /// Invariant: an escaped separator belongs to the key.
    #[test]
    fn parse_escaped_key() {
        assert_eq!(
            parse("a\\=b\\ c=d\nx\\:y:z"),
            vec![p("a=b c", Some("d")), p("x:y", Some("z"))]
        );
    }

    /// Invariant: odd trailing backslashes continue; even ones do not.
    #[test]
    fn parse_continuation() {
        let text = "list = a, \\\n     b, \\\n   c\npath = C:\\\\\nnext = 1\n";
        assert_eq!(
            parse(text),
            vec![
                p("list", Some("a, b, c")),
                p("path", Some("C:\\")),
                p("next", Some("1")),
            ]
        );
        // Continuation at end of input just ends the line.
        assert_eq!(parse("k = v\\"), vec![p("k", Some("v"))]);
    }

    /// Invariant: CR, LF and CRLF all end a line.
    #[test]
    fn parse_line_endings() {
        assert_eq!(
            parse("a=1\r\nb=2\rc=3\n"),
            vec![p("a", Some("1")), p("b", Some("2")), p("c", Some("3"))]
        );
    }

    /// Invariant: a decode error names the line it happened in and stops
    /// after the pairs before it.
    #[test]
    fn parse_error_reports_line() {
        let mut it = pairs("a=1\nb=\\u12\nc=3");
        assert_eq!(it.next().unwrap().unwrap(), p("a", Some("1")));
        match it.next() {
            Some(Err(Error::Decode { line, source })) => {
                assert_eq!(line, 2);
                assert_eq!(source, EscapeError::Truncated);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    /// Invariant: written pairs parse back to the same pairs.
    #[test]
    fn write_then_parse() {
        let mut out = String::new();
        write_pairs(
            &mut out,
            vec![
                ("plain", Some("v")),
                ("with space", Some(" padded ")),
                ("bare", None),
                ("empty", Some("")),
                ("uni", Some("€\u{1F600}")),
            ],
        );
        assert_eq!(
            parse(&out),
            vec![
                p("plain", Some("v")),
                p("with space", Some(" padded ")),
                p("bare", None),
                p("empty", Some("")),
                p("uni", Some("€\u{1F600}")),
            ]
        );
    }

    /// Invariant: multi-line comments are prefixed line by line.
    #[test]
    fn comments() {
        let mut out = String::new();
        write_comment(&mut out, "one\ntwo");
        assert_eq!(out, "# one\n# two\n");
        assert!(parse(&out).is_empty());
    }

    /// Invariant: encodings decode and encode per their byte mapping.
    #[test]
    fn encodings() {
        assert_eq!(Encoding::from_label(" UTF-8 "), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_label("ISO-8859-1"), Some(Encoding::Latin1));
        assert_eq!(Encoding::from_label("ebcdic"), None);
        assert_eq!(Encoding::resolve(Some("ebcdic")), Encoding::Latin1);
        assert_eq!(Encoding::resolve(None), Encoding::Utf8);

        assert_eq!(Encoding::Latin1.decode(vec![0x61, 0xE4]).unwrap(), "aä");
        assert_eq!(Encoding::Latin1.encode("aä€"), vec![0x61, 0xE4, b'?']);
        assert_eq!(Encoding::Utf8.decode("ä".as_bytes().to_vec()).unwrap(), "ä");
        match Encoding::Utf8.decode(vec![0xFF]) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
