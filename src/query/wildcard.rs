//! Shell-style wildcard patterns (`*`, `?`, `[...]`) for headword searches.

use crate::utils::folding::{self, WILDCARD_ESCAPE, WILDCARD_SYMBOLS};
use regex::{Regex, RegexBuilder};

/// Whether `query` uses any wildcard symbol
pub fn has_wildcards(query: &str) -> bool {
    query.contains(WILDCARD_SYMBOLS)
}

/// Translate a wildcard pattern into an anchored regular expression.
///
/// `*` matches any run of characters, `?` any single character, `[...]` a
/// character class (`[!...]` negated) and `\x` the literal `x`. Everything
/// else is literal. An unterminated `[` is literal as well.
pub fn wildcards_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 6);
    out.push_str("^(?:");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if c == WILDCARD_ESCAPE && i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut out, chars[i]);
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    push_class(&mut out, &chars[i + 1..end]);
                    i = end;
                }
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
        i += 1;
    }

    out.push_str(")$");
    out
}

/// Index of the `]` closing the class opened at `open`. A `]` right after
/// the opening bracket (or after `!`) belongs to the class.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut i = open + 1;
    if chars.get(i) == Some(&'!') {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    chars[i.min(chars.len())..]
        .iter()
        .position(|&c| c == ']')
        .map(|p| i + p)
}

fn push_class(out: &mut String, body: &[char]) {
    out.push('[');
    let mut body = body;
    if let Some((&'!', rest)) = body.split_first() {
        out.push('^');
        body = rest;
    }
    for &c in body {
        // Keep ranges, escape anything the regex class syntax would interpret
        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(']');
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Compile a wildcard pattern, case-insensitively. A pattern that does not
/// translate into a valid expression (a reversed range, say) is matched
/// literally instead.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&wildcards_to_regex(pattern))
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&format!("^(?:{})$", regex::escape(pattern)))
                .case_insensitive(true)
                .build()
        })
}

/// A wildcard query prepared for scanning the index
#[derive(Debug, Clone)]
pub struct WildcardQuery {
    regex: Regex,
    /// Characters any match needs at least: `*` counts for nothing, a class
    /// for one
    pub min_match_length: usize,
    /// Folded literal text before the first wildcard, used to position the
    /// scan
    pub folded_prefix: String,
}

impl WildcardQuery {
    pub fn new(query: &str) -> Result<Self, regex::Error> {
        let regex = compile(&folding::apply_diacritics_only(&folding::apply_simple_case_only(query)))?;

        // Queries made only of symbols keep their punctuation
        let no_letters = folding::apply(query).is_empty();
        let folded: Vec<char> = if no_letters {
            folding::apply_whitespace_only(query).chars().collect()
        } else {
            folding::apply_with_wildcards(query).chars().collect()
        };

        Ok(Self {
            regex,
            min_match_length: min_match_length(&folded),
            folded_prefix: literal_prefix(&folded, no_letters),
        })
    }

    /// Match a candidate headword that has been through
    /// [`folding::apply_diacritics_only`]
    pub fn matches(&self, candidate: &str) -> bool {
        candidate.chars().count() >= self.min_match_length && self.regex.is_match(candidate)
    }
}

fn min_match_length(folded: &[char]) -> usize {
    let mut length = 0;
    let mut inside_set = false;
    let mut escaped = false;

    for &c in folded {
        if c == WILDCARD_ESCAPE && !escaped {
            escaped = true;
            continue;
        }
        if c == ']' && !escaped {
            inside_set = false;
            continue;
        }
        if inside_set {
            escaped = false;
            continue;
        }
        if c == '[' && !escaped {
            length += 1;
            inside_set = true;
            continue;
        }
        if c == '*' && !escaped {
            continue;
        }
        escaped = false;
        length += 1;
    }

    length
}

fn literal_prefix(folded: &[char], no_letters: bool) -> String {
    let mut prefix = String::with_capacity(folded.len());
    let mut escaped = false;

    for &c in folded {
        if escaped {
            if no_letters || !WILDCARD_SYMBOLS.contains(&c) {
                prefix.push(c);
            }
            escaped = false;
            continue;
        }
        if c == WILDCARD_ESCAPE {
            if no_letters || prefix.is_empty() {
                escaped = true;
                continue;
            }
            break;
        }
        if WILDCARD_SYMBOLS.contains(&c) {
            break;
        }
        prefix.push(c);
    }

    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("c?r"));
        assert!(has_wildcards("[ab]"));
        assert!(has_wildcards("a*"));
        assert!(!has_wildcards("plain word"));
    }

    #[test]
    fn test_translation() {
        assert_eq!(wildcards_to_regex("c?r"), "^(?:c.r)$");
        assert_eq!(wildcards_to_regex("a*b"), "^(?:a.*b)$");
        assert_eq!(wildcards_to_regex("[!a-c]x"), "^(?:[^a-c]x)$");
        assert_eq!(wildcards_to_regex("a.b"), "^(?:a\\.b)$");
        assert_eq!(wildcards_to_regex("\\*"), "^(?:\\*)$");
        assert_eq!(wildcards_to_regex("a[b"), "^(?:a\\[b)$");
        assert_eq!(wildcards_to_regex("[]]"), "^(?:[\\]])$");
    }

    #[test]
    fn test_compile_matches_whole_word() {
        let re = compile("c?r").unwrap();
        assert!(re.is_match("car"));
        assert!(re.is_match("CUR"));
        assert!(!re.is_match("care"));
        assert!(!re.is_match("cat"));

        let re = compile("ca[rt]*").unwrap();
        assert!(re.is_match("cart"));
        assert!(re.is_match("cat"));
        assert!(!re.is_match("cab"));
    }

    #[test]
    fn test_invalid_range_falls_back_to_literal() {
        let re = compile("[z-a]").unwrap();
        assert!(re.is_match("[z-a]"));
        assert!(!re.is_match("b"));
    }

    #[test]
    fn test_query_prefix_and_length() {
        let q = WildcardQuery::new("Car*s").unwrap();
        assert_eq!(q.folded_prefix, "car");
        assert_eq!(q.min_match_length, 4);
        assert!(q.matches("cars"));
        assert!(q.matches("carrots"));
        assert!(!q.matches("car"));

        let q = WildcardQuery::new("?at").unwrap();
        assert_eq!(q.folded_prefix, "");
        assert_eq!(q.min_match_length, 3);

        let q = WildcardQuery::new("b[aeiou]t").unwrap();
        assert_eq!(q.folded_prefix, "b");
        assert_eq!(q.min_match_length, 3);
    }

    #[test]
    fn test_escaped_symbols() {
        // An escaped symbol is skipped in the scan prefix, since it folds
        // away in index keys as well
        let q = WildcardQuery::new("\\*star").unwrap();
        assert_eq!(q.folded_prefix, "star");
        assert_eq!(q.min_match_length, 5);
        assert!(q.matches("*star"));
        assert!(!q.matches("xstar"));

        let q = WildcardQuery::new("what\\?").unwrap();
        assert_eq!(q.folded_prefix, "what");
        assert!(q.matches("what?"));
        assert!(!q.matches("whats"));
    }

    #[test]
    fn test_symbol_only_query() {
        let q = WildcardQuery::new("!?").unwrap();
        assert_eq!(q.folded_prefix, "!");
        assert!(q.matches("!!"));
    }
}
