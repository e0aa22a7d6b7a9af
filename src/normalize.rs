//! Playlist title normalization.
//! Used by the extractors and both cold-start aggregators, so a title
//! normalizes identically wherever it is compared.
//!
//! CRITICAL: Any change here changes the triplet titles and the cold-title
//! matching. Re-run the full pipeline after changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Punctuation replaced by a space: `. , / # ! $ % ^ * ; : { } = _ ` ~ ( ) @`
pub static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.,/#!$%\^*;:{}=_`~()@]").unwrap());

/// Regex to collapse whitespace runs into a single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "Чилл" → "chill"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Then transliterate any remaining non-ASCII (Cyrillic, CJK, emoji shortcodes, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Convert curly quotes and the acute accent to straight quotes, and a
/// standalone `&` to `and`. The backtick is left for `PUNCTUATION`.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{00B4}', "'")
        .replace(" & ", " and ")
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a playlist name for storage and exact-match comparison.
/// Folds case and diacritics, turns punctuation into spaces and collapses whitespace.
///
/// Non-Latin text and emoji are transliterated, so titles in different
/// scripts can normalize to the same key (`"Чилл"` and `"Chill"` both give
/// `"chill"`, `"🔥🔥"` gives `"fire fire"`) and then match each other in the
/// cold-start aggregators.
pub fn normalize_name(name: &str) -> String {
    let folded = fold_to_ascii(&normalize_punctuation(name));
    let spaced = PUNCTUATION.replace_all(&folded, " ");
    MULTI_SPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Normalize an optional name; challenge playlists may have none.
pub fn normalize_optional_name(name: Option<&str>) -> String {
    name.map(normalize_name).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_basic() {
        assert_eq!(normalize_name("Chill Vibes"), "chill vibes");
        assert_eq!(normalize_name("  WORKOUT!!!  "), "workout");
        assert_eq!(normalize_name("road.trip"), "road trip");
        assert_eq!(normalize_name("summer   (2017)"), "summer 2017");
    }

    #[test]
    fn test_normalize_name_keeps_commas_out() {
        assert_eq!(normalize_name("rock, pop, and more"), "rock pop and more");
    }

    #[test]
    fn test_fold_to_ascii() {
        assert_eq!(fold_to_ascii("Música"), "musica");
        assert_eq!(fold_to_ascii("Björk"), "bjork");
    }

    #[test]
    fn test_normalize_punctuation() {
        assert_eq!(normalize_punctuation("Rock & Roll"), "Rock and Roll");
        assert_eq!(normalize_punctuation("Don\u{2019}t Stop"), "Don't Stop");
    }

    #[test]
    fn test_normalize_name_idempotent() {
        for raw in ["Café del Mar", "90's R&B", "c h i l l", "#throwback", ""] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_backtick_is_punctuation() {
        assert_eq!(normalize_name("don`t stop"), "don t stop");
        assert_eq!(normalize_name("don\u{2019}t stop"), "don't stop");
    }

    #[test]
    fn test_transliteration_merges_scripts() {
        assert_eq!(normalize_name("Чилл"), normalize_name("Chill"));
        assert_eq!(normalize_name("\u{1F525}\u{1F525}"), "fire fire");
    }

    #[test]
    fn test_normalize_optional_name() {
        assert_eq!(normalize_optional_name(None), "");
        assert_eq!(normalize_optional_name(Some("Party")), "party");
    }
}
