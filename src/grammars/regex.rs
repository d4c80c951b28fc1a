use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, OcraResult};

/// A grammar regex, validated when the grammar is loaded.
///
/// Matching itself happens in [`PatternSet`](crate::grammars::PatternSet)s built from the
/// pattern strings, so only the source and whether it has back-references are kept.
#[derive(Clone, PartialEq, Eq)]
pub struct Regex {
    pattern: String,
    has_backreferences: bool,
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl Regex {
    /// Compiles the pattern once to validate it.
    ///
    /// Patterns with back-references (`\1`...) only exist for `end` regexes and can only be
    /// compiled once instantiated with the `begin` captures, so they are validated with
    /// empty captures instead.
    pub fn new(pattern: &str) -> OcraResult<Self> {
        let pattern = escape_literal_braces(pattern).into_owned();
        let has_backreferences = has_backreferences(&pattern);

        let to_validate = if has_backreferences {
            Cow::Owned(resolve_backreferences(&pattern, "", &[]))
        } else {
            Cow::Borrowed(pattern.as_str())
        };
        onig::Regex::new(&to_validate).map_err(|e| Error::InvalidRegex {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern,
            has_backreferences,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn has_backreferences(&self) -> bool {
        self.has_backreferences
    }
}

/// A pattern that is only a brace is meant literally, Oniguruma would reject `{` or `}` alone
/// as a dangling quantifier.
pub(crate) fn escape_literal_braces(pattern: &str) -> Cow<'_, str> {
    match pattern {
        "{" => Cow::Borrowed("\\{"),
        "}" => Cow::Borrowed("\\}"),
        _ => Cow::Borrowed(pattern),
    }
}

/// Walks the pattern and calls `on_backref` for every `\1`..`\9`, skipping escaped backslashes.
fn scan_backreferences(pattern: &str, mut on_backref: impl FnMut(usize, usize)) {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let next = bytes[i + 1];
            if (b'1'..=b'9').contains(&next) {
                on_backref(i, (next - b'0') as usize);
            }
            i += 2;
        } else {
            i += 1;
        }
    }
}

pub(crate) fn has_backreferences(pattern: &str) -> bool {
    let mut found = false;
    scan_backreferences(pattern, |_, _| found = true);
    found
}

/// Replaces `\N` in an `end` pattern with the text captured by group N of the `begin` match.
/// The captured text is escaped so it matches literally. Groups that didn't participate are
/// replaced by nothing.
pub(crate) fn resolve_backreferences(
    pattern: &str,
    line: &str,
    captures: &[Option<(usize, usize)>],
) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut last = 0;
    scan_backreferences(pattern, |at, group| {
        out.push_str(&pattern[last..at]);
        if let Some(Some((start, end))) = captures.get(group)
            && let Some(text) = line.get(*start..*end)
        {
            out.push_str(&escape_regex(text));
        }
        last = at + 2;
    });
    out.push_str(&pattern[last..]);
    out
}

fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '|' | '-' | '{' | '}' | '*' | '+' | '?' | '^' | '$' | '.' | ',' | '[' | ']'
                | '(' | ')' | '#' | ' ' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_backreferences() {
        assert!(has_backreferences("\\1"));
        assert!(has_backreferences("^\\s*\\2\\b"));
        assert!(!has_backreferences("\\\\1"));
        assert!(!has_backreferences("\\d+"));
        assert!(!has_backreferences("\\0"));
    }

    #[test]
    fn resolves_backreferences_with_escaping() {
        let line = "<<*EOF*";
        let captures = vec![Some((0, 7)), Some((2, 7))];
        assert_eq!(
            resolve_backreferences("^\\1$", line, &captures),
            "^\\*EOF\\*$"
        );
        // missing group
        assert_eq!(resolve_backreferences("a\\2b", line, &[Some((0, 1))]), "ab");
        // escaped backslash is left alone
        assert_eq!(resolve_backreferences("\\\\1", line, &captures), "\\\\1");
    }

    #[test]
    fn escapes_lone_braces() {
        assert_eq!(Regex::new("{").unwrap().pattern(), "\\{");
        assert_eq!(Regex::new("}").unwrap().pattern(), "\\}");
        assert_eq!(Regex::new("a{2}").unwrap().pattern(), "a{2}");
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let err = Regex::new("(unclosed").unwrap_err();
        assert!(matches!(err, Error::InvalidRegex { .. }));
    }

    #[test]
    fn validates_backreference_patterns_without_captures() {
        let re = Regex::new("\\1").unwrap();
        assert!(re.has_backreferences());
    }
}
