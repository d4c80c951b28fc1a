use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::error::OcraResult;

/// Capture definitions keyed by the stringified capture group index
///
/// # Examples
/// ```json
/// {
///   "1": { "name": "storage.type.function" },
///   "2": { "name": "entity.name.function", "patterns": [] }
/// }
/// ```
pub type RawCaptures = BTreeMap<String, RawRule>;

/// Any object found in `patterns`, `repository` or as a capture.
///
/// Every field is optional: which kind of rule an object is gets decided by which fields are
/// present when compiling, see [`RawRule::kind`].
///
/// # Examples
/// ```json
/// {
///   "name": "comment.block",
///   "begin": "/\\*",
///   "end": "\\*/",
///   "captures": {
///     "0": { "name": "punctuation.definition.comment" }
///   }
/// }
/// ```
///
/// ```json
/// { "match": "\\b(if|else)\\b", "name": "keyword.control" }
/// ```
///
/// ```json
/// { "include": "#expression" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct RawRule {
    /// Scope(s) given to the whole match or region, space separated
    pub name: Option<String>,
    /// Scope(s) given to the text between `begin` and `end`
    pub content_name: Option<String>,
    #[serde(rename(deserialize = "match"))]
    pub match_: Option<String>,
    pub begin: Option<String>,
    /// Can reference the `begin` captures with `\1`, `\2`...
    pub end: Option<String>,
    /// Not supported: only kept to explain why a rule gets dropped
    #[serde(rename(deserialize = "while"))]
    pub while_: Option<String>,
    pub include: Option<String>,
    /// Used for `match` rules and as fallback for both begin and end of a region
    pub captures: Option<RawCaptures>,
    pub begin_captures: Option<RawCaptures>,
    pub end_captures: Option<RawCaptures>,
    pub patterns: Option<Vec<RawRule>>,
    /// Rules can have their own repository, it gets flattened in the grammar one
    #[serde(default)]
    pub repository: BTreeMap<String, RawRepositoryEntry>,
}

/// What kind of rule a raw object describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RawRuleKind {
    BeginEnd,
    Match,
    Include,
    /// Only `patterns` (and optionally `name`): a group of rules
    Group,
    /// Nothing we can match on
    Unknown,
}

impl RawRule {
    /// Classification goes by field presence, in this order:
    /// `begin` + `end`, then `match`, then `include`, then `patterns`.
    pub fn kind(&self) -> RawRuleKind {
        if self.begin.is_some() && self.end.is_some() {
            RawRuleKind::BeginEnd
        } else if self.match_.is_some() {
            RawRuleKind::Match
        } else if self.include.is_some() {
            RawRuleKind::Include
        } else if self.patterns.is_some() {
            RawRuleKind::Group
        } else {
            RawRuleKind::Unknown
        }
    }
}

/// Repository entries are usually a rule but some grammars use a bare array of rules.
///
/// # Examples
/// ```json
/// {
///   "keywords": [{ "match": "\\bif\\b", "name": "keyword" }],
///   "string": { "name": "string", "begin": "\"", "end": "\"" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawRepositoryEntry {
    /// *Must come first*: serde would happily read an array as a struct
    Patterns(Vec<RawRule>),
    Rule(RawRule),
}

impl RawRepositoryEntry {
    pub fn into_rule(self) -> RawRule {
        match self {
            RawRepositoryEntry::Patterns(patterns) => RawRule {
                patterns: Some(patterns),
                ..Default::default()
            },
            RawRepositoryEntry::Rule(rule) => rule,
        }
    }
}

/// Top-level structure of a TextMate grammar file
///
/// # Examples
/// ```json
/// {
///   "name": "Rust",
///   "scopeName": "source.rust",
///   "fileTypes": ["rs"],
///   "patterns": [{ "include": "#comments" }],
///   "repository": {
///     "comments": { "match": "//.*", "name": "comment.line" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct RawGrammar {
    /// Human-readable name of the language
    #[serde(default)]
    pub name: Option<String>,
    /// Extensions this grammar applies to, without the dot
    #[serde(default)]
    pub file_types: Vec<String>,
    /// Root scope of the grammar, eg "source.rust". Required.
    #[serde(default)]
    pub scope_name: Option<String>,
    #[serde(default)]
    pub repository: BTreeMap<String, RawRepositoryEntry>,
    #[serde(default)]
    pub patterns: Vec<RawRule>,
}

impl RawGrammar {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> OcraResult<Self> {
        let file = File::open(&path)?;
        let raw_grammar = serde_json::from_reader(&file)?;
        Ok(raw_grammar)
    }

    pub fn from_json(source: &str) -> OcraResult<Self> {
        Ok(serde_json::from_str(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(json: &str) -> RawRule {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn classifies_by_field_presence() {
        let cases = vec![
            (r#"{"begin": "a", "end": "b", "match": "c"}"#, RawRuleKind::BeginEnd),
            (r##"{"begin": "a", "end": "b", "include": "#x"}"##, RawRuleKind::BeginEnd),
            (r##"{"match": "c", "include": "#x"}"##, RawRuleKind::Match),
            (r##"{"include": "#x", "patterns": []}"##, RawRuleKind::Include),
            (r#"{"name": "meta", "patterns": []}"#, RawRuleKind::Group),
            (r#"{"begin": "a", "patterns": []}"#, RawRuleKind::Group),
            (r#"{"begin": "a", "while": "b"}"#, RawRuleKind::Unknown),
            (r#"{"name": "meta"}"#, RawRuleKind::Unknown),
        ];

        for (json, expected) in cases {
            assert_eq!(rule(json).kind(), expected, "{json}");
        }
    }

    #[test]
    fn repository_entries_can_be_arrays() {
        let raw = RawGrammar::from_json(
            r#"{
              "scopeName": "source.test",
              "repository": {
                "list": [{"match": "a"}],
                "single": {"match": "b"}
              }
            }"#,
        )
        .unwrap();
        let list = raw.repository["list"].clone().into_rule();
        assert_eq!(list.kind(), RawRuleKind::Group);
        let single = raw.repository["single"].clone().into_rule();
        assert_eq!(single.kind(), RawRuleKind::Match);
    }

    #[test]
    fn scope_name_is_optional_when_parsing() {
        let raw = RawGrammar::from_json(r#"{"patterns": []}"#).unwrap();
        assert!(raw.scope_name.is_none());
    }
}
