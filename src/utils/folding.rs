//! Text folding shared by index building and querying.
//!
//! Every key stored in the B-tree is produced by [`apply`] (or by
//! [`apply_whitespace_only`] when `apply` folds the whole word away), and every
//! query goes through the same functions before a lookup. Any change here
//! changes the on-disk key order, so existing index files must be rebuilt.
//!
//! ```
//! use wordex::utils::folding;
//!
//! assert_eq!(folding::apply("Café au lait!"), "cafeaulait");
//! assert_eq!(folding::apply("..."), "");
//! assert_eq!(folding::fold_key("..."), "...");
//! ```

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Characters that carry wildcard meaning in search patterns
pub const WILDCARD_SYMBOLS: [char; 4] = ['*', '?', '[', ']'];

/// Escape character used inside wildcard patterns
pub const WILDCARD_ESCAPE: char = '\\';

/// Fold a word into its index key: lowercase, strip diacritics, drop
/// whitespace and punctuation.
///
/// Returns an empty string when the word consists solely of whitespace and
/// punctuation; see [`fold_key`] for the fallback used by the index.
pub fn apply(word: &str) -> String {
    fold(word, false)
}

/// Same as [`apply`], but `* ? [ ]` and `\` pass through untouched so the
/// result can still be interpreted as a wildcard pattern.
pub fn apply_with_wildcards(word: &str) -> String {
    fold(word, true)
}

/// Key used to store and look up a word: [`apply`], falling back to
/// [`apply_whitespace_only`] for words that fold to nothing.
pub fn fold_key(word: &str) -> String {
    let folded = apply(word);
    if folded.is_empty() {
        apply_whitespace_only(word)
    } else {
        folded
    }
}

fn fold(word: &str, allow_wildcards: bool) -> String {
    let mut out = String::with_capacity(word.len());

    // Lowercase first: some lowercase mappings introduce combining marks
    // (U+0130 -> "i\u{307}") which must be stripped too.
    for c in word.chars().flat_map(char::to_lowercase).nfd() {
        if allow_wildcards && is_wildcard_char(c) {
            out.push(c);
            continue;
        }

        if is_combining_mark(c) || is_whitespace(c) || is_punct(c) {
            continue;
        }

        out.push(c);
    }

    out
}

/// Remove whitespace only, keeping case, diacritics and punctuation
pub fn apply_whitespace_only(word: &str) -> String {
    word.chars().filter(|&c| !is_whitespace(c)).collect()
}

/// Strip diacritics only (canonical decomposition, combining marks removed)
pub fn apply_diacritics_only(word: &str) -> String {
    word.nfd().filter(|&c| !is_combining_mark(c)).collect()
}

/// One-to-one lowercase mapping. Characters whose lowercase form expands to
/// several characters are kept as they are.
pub fn apply_simple_case_only(word: &str) -> String {
    word.chars()
        .map(|c| {
            let mut lower = c.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(l), None) => l,
                _ => c,
            }
        })
        .collect()
}

/// Trim leading and trailing whitespace and punctuation
pub fn trim_whitespace_or_punct(word: &str) -> String {
    word.trim_matches(|c: char| is_whitespace(c) || is_punct(c))
        .to_string()
}

#[inline]
pub fn is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

/// Unicode punctuation (general category P*) for the scripts dictionaries
/// commonly use, plus every ASCII punctuation/symbol character.
pub fn is_punct(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }

    matches!(c,
        '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}' | '\u{00BF}'
        | '\u{037E}' | '\u{0387}'
        | '\u{055A}'..='\u{055F}' | '\u{0589}' | '\u{058A}'
        | '\u{05BE}' | '\u{05C0}' | '\u{05C3}' | '\u{05C6}' | '\u{05F3}' | '\u{05F4}'
        | '\u{060C}' | '\u{060D}' | '\u{061B}' | '\u{061E}' | '\u{061F}'
        | '\u{066A}'..='\u{066D}' | '\u{06D4}'
        | '\u{0964}' | '\u{0965}' | '\u{0970}'
        | '\u{0E4F}' | '\u{0E5A}' | '\u{0E5B}'
        | '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{2043}'
        | '\u{2045}'..='\u{2051}' | '\u{2053}'..='\u{205E}'
        | '\u{207D}' | '\u{207E}' | '\u{208D}' | '\u{208E}'
        | '\u{2308}'..='\u{230B}' | '\u{2329}' | '\u{232A}'
        | '\u{2E00}'..='\u{2E4F}'
        | '\u{3001}'..='\u{3003}' | '\u{3008}'..='\u{3011}' | '\u{3014}'..='\u{301F}'
        | '\u{3030}' | '\u{303D}' | '\u{30A0}' | '\u{30FB}'
        | '\u{FE10}'..='\u{FE19}' | '\u{FE30}'..='\u{FE52}' | '\u{FE54}'..='\u{FE61}'
        | '\u{FE63}' | '\u{FE68}' | '\u{FE6A}' | '\u{FE6B}'
        | '\u{FF01}'..='\u{FF03}' | '\u{FF05}'..='\u{FF0A}' | '\u{FF0C}'..='\u{FF0F}'
        | '\u{FF1A}' | '\u{FF1B}' | '\u{FF1F}' | '\u{FF20}'
        | '\u{FF3B}'..='\u{FF3D}' | '\u{FF3F}' | '\u{FF5B}' | '\u{FF5D}'
        | '\u{FF5F}'..='\u{FF65}'
    )
}

#[inline]
fn is_wildcard_char(c: char) -> bool {
    c == WILDCARD_ESCAPE || WILDCARD_SYMBOLS.contains(&c)
}

/// Prefix every wildcard symbol with a backslash so the word matches itself
/// literally when used as a pattern
pub fn escape_wildcard_symbols(word: &str) -> String {
    let mut out = String::with_capacity(word.len() + 4);
    for c in word.chars() {
        if WILDCARD_SYMBOLS.contains(&c) {
            out.push(WILDCARD_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape_wildcard_symbols`]
pub fn unescape_wildcard_symbols(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if c == WILDCARD_ESCAPE {
            if let Some(&next) = chars.peek() {
                if WILDCARD_SYMBOLS.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_apply_basic() {
        assert_eq!(apply("Hello"), "hello");
        assert_eq!(apply("Ice Cream"), "icecream");
        assert_eq!(apply("naïve"), "naive");
        assert_eq!(apply("Ñandú"), "nandu");
        assert_eq!(apply("rock'n'roll"), "rocknroll");
        assert_eq!(apply("«Straße»"), "straße");
    }

    #[test]
    fn test_apply_folds_away_punctuation_only_words() {
        assert_eq!(apply("..."), "");
        assert_eq!(apply("  - "), "");
        assert_eq!(fold_key("..."), "...");
        assert_eq!(fold_key(" ! ? "), "!?");
    }

    #[test]
    fn test_apply_with_wildcards() {
        assert_eq!(apply_with_wildcards("C?r*"), "c?r*");
        assert_eq!(apply_with_wildcards("[Ab]c"), "[ab]c");
        assert_eq!(apply_with_wildcards("a\\*b"), "a\\*b");
        assert_eq!(apply("C?r*"), "cr");
    }

    #[test]
    fn test_dotted_capital_i() {
        assert_eq!(apply("\u{130}stanbul"), "istanbul");
    }

    #[test]
    fn test_partial_foldings() {
        assert_eq!(apply_whitespace_only(" A b\tC "), "AbC");
        assert_eq!(apply_diacritics_only("Crème Brûlée"), "Creme Brulee");
        assert_eq!(apply_simple_case_only("ÀBC-d"), "àbc-d");
        // 'İ' lowercases to two characters, so it is kept
        assert_eq!(apply_simple_case_only("\u{130}"), "\u{130}");
        assert_eq!(trim_whitespace_or_punct(" ...word!? "), "word");
        assert_eq!(trim_whitespace_or_punct("a-b"), "a-b");
    }

    #[test]
    fn test_classifiers() {
        assert!(is_whitespace(' '));
        assert!(is_whitespace('\u{3000}'));
        assert!(!is_whitespace('a'));
        assert!(is_punct('.'));
        assert!(is_punct('\u{2014}'));
        assert!(is_punct('\u{3002}'));
        assert!(!is_punct('a'));
        assert!(!is_punct('é'));
    }

    #[test]
    fn test_escape_roundtrip() {
        let word = "what? [sic] a*b";
        let escaped = escape_wildcard_symbols(word);
        assert_eq!(escaped, "what\\? \\[sic\\] a\\*b");
        assert_eq!(unescape_wildcard_symbols(&escaped), word);
    }

    #[test]
    fn test_unescape_keeps_lone_backslash() {
        assert_eq!(unescape_wildcard_symbols("a\\b"), "a\\b");
        assert_eq!(unescape_wildcard_symbols("a\\"), "a\\");
    }

    proptest! {
        #[test]
        fn prop_apply_is_idempotent(word in "[a-zA-Z0-9 éÉçÇüÜßøÅ.,!?'-]{0,24}") {
            let once = apply(&word);
            prop_assert_eq!(apply(&once), once);
        }

        #[test]
        fn prop_fold_key_is_idempotent(word in "[a-zA-Zéü .!-]{0,16}") {
            let once = fold_key(&word);
            prop_assert_eq!(fold_key(&once), once);
        }

        #[test]
        fn prop_escape_inverse(word in "[a-z*?\\[\\] ]{0,24}") {
            prop_assert_eq!(unescape_wildcard_symbols(&escape_wildcard_symbols(&word)), word);
        }
    }
}
