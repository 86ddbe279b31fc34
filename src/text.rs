//! Blank trimming and typed interpretation of stored values.

use crate::error::{Error, Result};

/// Characters at or below the space, the notion of white space used by
/// the key rules and the text format.
#[inline]
pub(crate) fn is_blank(c: char) -> bool {
    c <= ' '
}

#[inline]
pub(crate) fn trim_blank(s: &str) -> &str {
    s.trim_matches(is_blank)
}

/// Trim `key` and reject it when nothing is left.
pub(crate) fn normalize_key(key: &str) -> Result<&str> {
    let k = trim_blank(key);
    if k.is_empty() {
        Err(Error::EmptyKey)
    } else {
        Ok(k)
    }
}

/// True when `key` could be stored as is: non-empty and not blank-bounded.
#[inline]
pub(crate) fn is_valid_key(key: &str) -> bool {
    match (key.chars().next(), key.chars().next_back()) {
        (Some(first), Some(last)) => !is_blank(first) && !is_blank(last),
        _ => false,
    }
}

/// Interpret a switch value. English and German spellings are accepted,
/// case-insensitively; anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    let v = trim_blank(value).to_ascii_lowercase();
    match v.as_str() {
        "true" | "yes" | "on" | "ja" | "wahr" | "an" => Some(true),
        "false" | "no" | "off" | "nein" | "falsch" | "aus" => Some(false),
        _ => None,
    }
}

/// Interpret an integer literal: optional sign, then `0x`/`0X`/`#` for
/// hex, a leading `0` for octal, decimal otherwise.
pub fn parse_long(value: &str) -> Option<i64> {
    let v = trim_blank(value);
    let (negative, body) = match v.as_bytes().first()? {
        b'-' => (true, &v[1..]),
        b'+' => (false, &v[1..]),
        _ => (false, v),
    };
    let (radix, digits) = if let Some(h) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .or_else(|| body.strip_prefix('#'))
    {
        (16, h)
    } else if body.len() > 1 && body.starts_with('0') {
        (8, &body[1..])
    } else {
        (10, body)
    };
    if digits.is_empty() || digits.starts_with(['-', '+']) {
        return None;
    }
    // Parse the magnitude as u64 so that i64::MIN survives the sign flip.
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Like [`parse_long`] but limited to the `i32` range.
pub fn parse_int(value: &str) -> Option<i32> {
    parse_long(value).and_then(|v| i32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: trimming strips control characters and spaces only.
    #[test]
    fn trimming() {
        assert_eq!(trim_blank("  \t key \r\n"), "key");
        assert_eq!(trim_blank("\u{a0}x\u{a0}"), "\u{a0}x\u{a0}");
        assert!(matches!(normalize_key(" \t "), Err(Error::EmptyKey)));
        assert!(matches!(normalize_key(""), Err(Error::EmptyKey)));
        assert_eq!(normalize_key(" a.b ").unwrap(), "a.b");
    }

    /// Invariant: only trimmed, non-empty keys are storable as is.
    #[test]
    fn key_validity() {
        assert!(is_valid_key("k"));
        assert!(is_valid_key("a b"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key(" k"));
        assert!(!is_valid_key("k\t"));
    }

    /// Invariant: switch parsing is case-insensitive and bilingual.
    #[test]
    fn booleans() {
        for t in ["true", "YES", "On", "ja", "Wahr", "an"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "No", "OFF", "nein", "Falsch", "aus"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    /// Invariant: integer literals follow decimal/hex/octal prefixes.
    #[test]
    fn integers() {
        assert_eq!(parse_long("42"), Some(42));
        assert_eq!(parse_long(" -42 "), Some(-42));
        assert_eq!(parse_long("+7"), Some(7));
        assert_eq!(parse_long("0x1F"), Some(31));
        assert_eq!(parse_long("#ff"), Some(255));
        assert_eq!(parse_long("-0X10"), Some(-16));
        assert_eq!(parse_long("017"), Some(15));
        assert_eq!(parse_long("0"), Some(0));
        assert_eq!(parse_long("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_long("9223372036854775808"), None);
        assert_eq!(parse_long("08"), None);
        assert_eq!(parse_long("0x"), None);
        assert_eq!(parse_long("--1"), None);
        assert_eq!(parse_long("12a"), None);
        assert_eq!(parse_int("2147483647"), Some(i32::MAX));
        assert_eq!(parse_int("2147483648"), None);
    }
}
