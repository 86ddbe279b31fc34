//! Language and region codes, and the fallback step of the cascade.

use crate::config::FallbackConfig;
use crate::text::trim_blank;

/// Normalize a language code to two lower-case ASCII letters.
pub fn check_language(code: &str) -> Option<String> {
    two_letters(code).map(|c| c.to_ascii_lowercase())
}

/// Normalize a region code to two upper-case ASCII letters.
pub fn check_region(code: &str) -> Option<String> {
    two_letters(code).map(|c| c.to_ascii_uppercase())
}

fn two_letters(code: &str) -> Option<&str> {
    let c = trim_blank(code);
    (c.len() == 2 && c.bytes().all(|b| b.is_ascii_alphabetic())).then_some(c)
}

/// Split `"de_AT"` into `("de", Some("AT"))`; anything else is returned
/// whole with no region.
pub fn split_locale(code: &str) -> (&str, Option<&str>) {
    let c = trim_blank(code);
    let b = c.as_bytes();
    if b.len() == 5 && b[2] == b'_' {
        (&c[..2], Some(&c[3..]))
    } else {
        (c, None)
    }
}

/// Last step of the language cascade.
///
/// After `{language}_{region}.key` and `{language}.key` missed, the map
/// asks the fallback for further candidate keys and takes the first one
/// present. Implementations only produce keys; they never see the map.
pub trait LanguageFallback: Send + Sync {
    /// Push candidate keys for `key`, best first.
    fn candidates(&self, key: &str, language: &str, region: &str, out: &mut Vec<String>);
}

/// The classic fallback: the bare key, then the primary language (plus
/// one region-qualified variant of it), then the secondary language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultFallback {
    primary: String,
    primary_region: String,
    secondary: String,
}

impl DefaultFallback {
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            primary: config.primary.clone(),
            primary_region: config.primary_region.clone(),
            secondary: config.secondary.clone(),
        }
    }
}

impl Default for DefaultFallback {
    fn default() -> Self {
        Self::new(&FallbackConfig::default())
    }
}

impl LanguageFallback for DefaultFallback {
    fn candidates(&self, key: &str, language: &str, region: &str, out: &mut Vec<String>) {
        out.push(key.to_owned());
        if language != self.primary {
            out.push(format!("{}.{}", self.primary, key));
            if region != self.primary_region {
                out.push(format!("{}_{}.{}", self.primary, self.primary_region, key));
            }
        }
        if language != self.secondary {
            out.push(format!("{}.{}", self.secondary, key));
        }
    }
}

/// No fallback at all; only the language-qualified keys are tried.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFallback;

impl LanguageFallback for NoFallback {
    fn candidates(&self, _key: &str, _language: &str, _region: &str, _out: &mut Vec<String>) {}
}
