use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Clean up the text of one extracted line.
///
/// Applies NFC normalization, ligature replacement, bullet standardization
/// and replacement character removal, then collapses whitespace runs.
/// Hyphens are left alone: joining hyphenated words is the document model's
/// job once the reader has decided which lines continue each other.
pub fn cleanup_text(text: &str) -> String {
    let mut result: String = text.nfc().collect();

    let ligatures = [
        ("\u{FB00}", "ff"),
        ("\u{FB01}", "fi"),
        ("\u{FB02}", "fl"),
        ("\u{FB03}", "ffi"),
        ("\u{FB04}", "ffl"),
        ("\u{FB05}", "st"),
        ("\u{FB06}", "st"),
    ];
    for (lig, replacement) in &ligatures {
        result = result.replace(lig, replacement);
    }

    for bullet in ['\u{25CF}', '\u{25CB}', '\u{25A0}'] {
        result = result.replace(bullet, "\u{2022}");
    }

    result = result.replace(['\u{FFFD}', '\0'], "");

    static RE_SPACES: OnceLock<Regex> = OnceLock::new();
    let re_spaces = RE_SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_spaces.replace_all(&result, " ").trim().to_string()
}
