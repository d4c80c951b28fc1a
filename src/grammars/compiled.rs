use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Error, OcraResult};
use crate::grammars::raw::{RawCaptures, RawGrammar, RawRepositoryEntry, RawRule, RawRuleKind};
use crate::grammars::regex::Regex;
use crate::scope::Scope;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

impl RuleId {
    #[inline]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RegexId(pub u32);

impl RegexId {
    #[inline]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Allowed values for `include`:
///  * self, e.g. `$self`
///  * base, e.g. `$base`
///  * repository entry, e.g. `#expression` or `expression`
///  * another grammar, e.g. `source.js` or `source.js#expression`
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Reference {
    Self_,
    Base,
    Local(String),
    /// Cross-grammar references are kept around but never resolve to anything
    External(String),
}

impl From<&str> for Reference {
    fn from(value: &str) -> Self {
        match value {
            "$self" => Self::Self_,
            "$base" => Self::Base,
            s if s.starts_with('#') => Self::Local(s[1..].to_string()),
            s if s.contains('#') || s.contains('.') => Self::External(s.to_string()),
            s => Self::Local(s.to_string()),
        }
    }
}

/// Capture rules by capture group index, sorted by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(pub Vec<(usize, RuleId)>);

impl Captures {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, RuleId)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    pub name: Vec<Scope>,
    pub regex: RegexId,
    pub captures: Captures,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginEndRule {
    pub name: Vec<Scope>,
    pub content_name: Vec<Scope>,
    pub begin: RegexId,
    pub end: RegexId,
    pub begin_captures: Captures,
    pub end_captures: Captures,
    pub patterns: Vec<RuleId>,
}

/// A rule that only groups other rules, optionally giving them a scope.
/// Used both for capture definitions and for `{"patterns": [...]}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureRule {
    pub name: Vec<Scope>,
    pub patterns: Vec<RuleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Include(Reference),
    Match(MatchRule),
    BeginEnd(BeginEndRule),
    Capture(CaptureRule),
}

impl Rule {
    pub fn name_scopes(&self) -> &[Scope] {
        match self {
            Rule::Include(_) => &[],
            Rule::Match(r) => &r.name,
            Rule::BeginEnd(r) => &r.name,
            Rule::Capture(r) => &r.name,
        }
    }

    pub fn content_scopes(&self) -> &[Scope] {
        match self {
            Rule::BeginEnd(r) => &r.content_name,
            _ => &[],
        }
    }

    /// Whether this rule carries patterns to run over the text it covers
    pub fn has_patterns(&self) -> bool {
        match self {
            Rule::BeginEnd(r) => !r.patterns.is_empty(),
            Rule::Capture(r) => !r.patterns.is_empty(),
            Rule::Include(_) | Rule::Match(_) => false,
        }
    }
}

/// A compiled grammar. Immutable once built and meant to be shared with an `Arc`
/// between every document of that language.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: String,
    pub scope_name: String,
    pub scope: Scope,
    pub file_types: Vec<String>,
    pub regexes: Vec<Regex>,
    pub rules: Vec<Rule>,
    /// Top-level patterns
    pub patterns: Vec<RuleId>,
    /// Every repository of the grammar, nested ones included, flattened in a single namespace
    pub repository: HashMap<String, RuleId>,
}

impl Grammar {
    pub fn from_raw_grammar(raw: RawGrammar) -> OcraResult<Self> {
        let scope_name = raw
            .scope_name
            .filter(|s| !s.trim().is_empty())
            .ok_or(Error::MissingScopeName)?;

        let mut grammar = Self {
            name: raw.name.unwrap_or_else(|| scope_name.clone()),
            scope: Scope::new(&scope_name),
            scope_name,
            file_types: raw.file_types,
            regexes: Vec::new(),
            rules: Vec::new(),
            patterns: Vec::new(),
            repository: HashMap::new(),
        };

        grammar.compile_repository(raw.repository)?;
        grammar.patterns = grammar.compile_patterns(raw.patterns)?;

        Ok(grammar)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(source: &str) -> OcraResult<Self> {
        Self::from_raw_grammar(RawGrammar::from_json(source)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> OcraResult<Self> {
        Self::from_raw_grammar(RawGrammar::load_from_file(path)?)
    }

    /// A grammar without any patterns: everything is unscoped text.
    pub fn plain_text() -> Self {
        Self {
            name: "Plain Text".to_string(),
            scope_name: "text.plain".to_string(),
            scope: Scope::new("text.plain"),
            file_types: vec!["txt".to_string()],
            regexes: Vec::new(),
            rules: Vec::new(),
            patterns: Vec::new(),
            repository: HashMap::new(),
        }
    }

    #[inline]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.as_index()]
    }

    #[inline]
    pub fn regex(&self, id: RegexId) -> &Regex {
        &self.regexes[id.as_index()]
    }

    /// The regex that starts a match for this rule, if any.
    pub fn leading_regex(&self, id: RuleId) -> Option<&Regex> {
        match self.rule(id) {
            Rule::Match(r) => Some(self.regex(r.regex)),
            Rule::BeginEnd(r) => Some(self.regex(r.begin)),
            Rule::Include(_) | Rule::Capture(_) => None,
        }
    }

    fn push_rule(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(rule);
        id
    }

    fn compile_regex(&mut self, pattern: &str) -> OcraResult<RegexId> {
        let id = RegexId(self.regexes.len() as u32);
        self.regexes.push(Regex::new(pattern)?);
        Ok(id)
    }

    /// Repositories are flattened: entries are added in key order, each one followed by its own
    /// nested repository. Names colliding are overwritten by the last one added.
    fn compile_repository(
        &mut self,
        repository: BTreeMap<String, RawRepositoryEntry>,
    ) -> OcraResult<()> {
        for (name, entry) in repository {
            let mut rule = entry.into_rule();
            let nested = std::mem::take(&mut rule.repository);
            match self.compile_rule(rule)? {
                Some(id) => {
                    self.repository.insert(name, id);
                }
                None => log::warn!("Dropping repository entry `{name}`: not a valid rule"),
            }
            self.compile_repository(nested)?;
        }
        Ok(())
    }

    fn compile_patterns(&mut self, patterns: Vec<RawRule>) -> OcraResult<Vec<RuleId>> {
        let mut out = Vec::with_capacity(patterns.len());
        for raw in patterns {
            if let Some(id) = self.compile_rule(raw)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Returns `None` for objects that don't describe any kind of rule.
    fn compile_rule(&mut self, mut raw: RawRule) -> OcraResult<Option<RuleId>> {
        if !raw.repository.is_empty() {
            let nested = std::mem::take(&mut raw.repository);
            self.compile_repository(nested)?;
        }

        let name = raw.name.as_deref().map(Scope::parse_names).unwrap_or_default();

        let rule = match raw.kind() {
            RawRuleKind::BeginEnd => {
                let begin = self.compile_regex(raw.begin.as_deref().unwrap_or_default())?;
                let end = self.compile_regex(raw.end.as_deref().unwrap_or_default())?;
                let begin_captures = match raw.begin_captures {
                    Some(c) => self.compile_captures(c)?,
                    None => self.compile_captures(raw.captures.clone().unwrap_or_default())?,
                };
                let end_captures = match raw.end_captures {
                    Some(c) => self.compile_captures(c)?,
                    None => self.compile_captures(raw.captures.unwrap_or_default())?,
                };
                let patterns = self.compile_patterns(raw.patterns.unwrap_or_default())?;
                Rule::BeginEnd(BeginEndRule {
                    name,
                    content_name: raw
                        .content_name
                        .as_deref()
                        .map(Scope::parse_names)
                        .unwrap_or_default(),
                    begin,
                    end,
                    begin_captures,
                    end_captures,
                    patterns,
                })
            }
            RawRuleKind::Match => {
                let regex = self.compile_regex(raw.match_.as_deref().unwrap_or_default())?;
                let captures = self.compile_captures(raw.captures.unwrap_or_default())?;
                Rule::Match(MatchRule {
                    name,
                    regex,
                    captures,
                })
            }
            RawRuleKind::Include => {
                Rule::Include(Reference::from(raw.include.as_deref().unwrap_or_default()))
            }
            RawRuleKind::Group => {
                let patterns = self.compile_patterns(raw.patterns.unwrap_or_default())?;
                Rule::Capture(CaptureRule { name, patterns })
            }
            RawRuleKind::Unknown => {
                if raw.while_.is_some() {
                    log::warn!(
                        "Dropping begin/while rule {:?}: `while` is not supported",
                        raw.name
                    );
                } else {
                    log::warn!("Dropping pattern {:?}: not a rule", raw.name);
                }
                return Ok(None);
            }
        };

        Ok(Some(self.push_rule(rule)))
    }

    /// Capture objects are always groups: a name and/or patterns to apply to the captured text.
    fn compile_captures(&mut self, captures: RawCaptures) -> OcraResult<Captures> {
        let mut out = Vec::with_capacity(captures.len());
        for (key, raw) in captures {
            let Ok(index) = key.trim().parse::<usize>() else {
                log::warn!("Ignoring capture `{key}`: not a capture group index");
                continue;
            };
            let name = raw.name.as_deref().map(Scope::parse_names).unwrap_or_default();
            let patterns = self.compile_patterns(raw.patterns.unwrap_or_default())?;
            let id = self.push_rule(Rule::Capture(CaptureRule { name, patterns }));
            out.push((index, id));
        }
        // keys are strings, "10" sorts before "2"
        out.sort_by_key(|(index, _)| *index);
        Ok(Captures(out))
    }
}
