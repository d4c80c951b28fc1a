use std::collections::HashSet;
use std::sync::Arc;

use crate::grammars::compiled::{Grammar, Reference, Rule, RuleId};

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Unresolved,
    /// Being resolved: anything asking for it in the meantime gets nothing back
    InProgress,
    Resolved(Arc<[RuleId]>),
}

/// Expands the patterns of a rule into the flat list of rules that can actually match
/// (`match` and `begin`/`end` rules), following includes and groups.
///
/// Results are memoized per rule so a recursive repository is only walked once. The resolver
/// doesn't own the grammar: it is passed on every call.
#[derive(Debug, Default)]
pub struct RuleResolver {
    slots: Vec<Slot>,
    root: Slot,
}

impl RuleResolver {
    pub fn new(grammar: &Grammar) -> Self {
        Self {
            slots: vec![Slot::Unresolved; grammar.rules.len()],
            root: Slot::Unresolved,
        }
    }

    /// The rules to try at the top level of a document
    pub fn root(&mut self, grammar: &Grammar) -> Arc<[RuleId]> {
        match &self.root {
            Slot::Resolved(rules) => return rules.clone(),
            Slot::InProgress => return Arc::from([]),
            Slot::Unresolved => {}
        }
        self.root = Slot::InProgress;

        let mut walk = Walk::default();
        walk.visited_root = true;
        walk.expand_all(grammar, &grammar.patterns);

        let rules: Arc<[RuleId]> = Arc::from(walk.out);
        self.root = Slot::Resolved(rules.clone());
        rules
    }

    /// The rules to try inside a `begin`/`end` region or a capture with patterns
    pub fn resolve(&mut self, grammar: &Grammar, id: RuleId) -> Arc<[RuleId]> {
        if self.slots.len() < grammar.rules.len() {
            self.slots.resize(grammar.rules.len(), Slot::Unresolved);
        }
        match &self.slots[id.as_index()] {
            Slot::Resolved(rules) => return rules.clone(),
            Slot::InProgress => return Arc::from([]),
            Slot::Unresolved => {}
        }
        self.slots[id.as_index()] = Slot::InProgress;

        let patterns: &[RuleId] = match grammar.rule(id) {
            Rule::BeginEnd(r) => &r.patterns,
            Rule::Capture(r) => &r.patterns,
            Rule::Match(_) | Rule::Include(_) => &[],
        };
        let mut walk = Walk::default();
        walk.expand_all(grammar, patterns);

        let rules: Arc<[RuleId]> = Arc::from(walk.out);
        self.slots[id.as_index()] = Slot::Resolved(rules.clone());
        rules
    }
}

/// A single expansion: `visited` is what makes self-including rules terminate.
#[derive(Default)]
struct Walk {
    visited: HashSet<RuleId>,
    visited_root: bool,
    out: Vec<RuleId>,
}

impl Walk {
    fn expand_all(&mut self, grammar: &Grammar, ids: &[RuleId]) {
        for id in ids {
            self.expand(grammar, *id);
        }
    }

    fn expand(&mut self, grammar: &Grammar, id: RuleId) {
        if !self.visited.insert(id) {
            return;
        }

        match grammar.rule(id) {
            Rule::Match(_) | Rule::BeginEnd(_) => self.out.push(id),
            Rule::Capture(group) => self.expand_all(grammar, &group.patterns),
            Rule::Include(reference) => match reference {
                Reference::Self_ | Reference::Base => {
                    if !self.visited_root {
                        self.visited_root = true;
                        self.expand_all(grammar, &grammar.patterns);
                    }
                }
                Reference::Local(name) => match grammar.repository.get(name) {
                    Some(target) => self.expand(grammar, *target),
                    None => log::debug!("Include `#{name}` not found in repository"),
                },
                Reference::External(name) => {
                    log::debug!("Include `{name}` references another grammar, ignoring it");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_self_referencing_repository() {
        let grammar = Grammar::from_str(
            r##"{"scopeName":"t",
                "patterns":[{"include":"#expr"}],
                "repository": {
                    "expr": {"patterns": [
                        {"begin":"\\(","end":"\\)","name":"meta.parens","patterns":[{"include":"#expr"}]},
                        {"match":"\\d+","name":"constant.numeric"},
                        {"include":"#expr"}
                    ]}
                }
            }"##,
        )
        .unwrap();
        let mut resolver = RuleResolver::new(&grammar);
        let root = resolver.root(&grammar);
        assert_eq!(root.len(), 2);

        let Rule::BeginEnd(_) = grammar.rule(root[0]) else {
            panic!("expected the parens first");
        };
        let inside = resolver.resolve(&grammar, root[0]);
        assert_eq!(&*inside, &*root);
        // memoized
        assert!(Arc::ptr_eq(&inside, &resolver.resolve(&grammar, root[0])));
    }

    #[test]
    fn mutually_recursive_includes_terminate() {
        let grammar = Grammar::from_str(
            r##"{"scopeName":"t",
                "patterns":[{"include":"#a"}],
                "repository": {
                    "a": {"patterns": [{"include":"#b"}, {"match":"x"}]},
                    "b": {"patterns": [{"include":"#a"}, {"match":"y"}, {"include":"$self"}]}
                }
            }"##,
        )
        .unwrap();
        let mut resolver = RuleResolver::new(&grammar);
        let root = resolver.root(&grammar);
        let patterns: Vec<&str> = root
            .iter()
            .map(|id| grammar.leading_regex(*id).unwrap().pattern())
            .collect();
        assert_eq!(patterns, vec!["y", "x"]);
    }

    #[test]
    fn unknown_and_external_includes_resolve_to_nothing() {
        let grammar = Grammar::from_str(
            r##"{"scopeName":"t",
                "patterns":[{"include":"#missing"}, {"include":"source.other"}, {"match":"z"}]
            }"##,
        )
        .unwrap();
        let mut resolver = RuleResolver::new(&grammar);
        assert_eq!(resolver.root(&grammar).len(), 1);
    }

    #[test]
    fn self_include_in_region_gives_top_level_patterns() {
        let grammar = Grammar::from_str(
            r#"{"scopeName":"t",
                "patterns":[
                    {"begin":"\\{","end":"\\}","patterns":[{"include":"$self"}]},
                    {"match":"k"}
                ]
            }"#,
        )
        .unwrap();
        let mut resolver = RuleResolver::new(&grammar);
        let root = resolver.root(&grammar);
        let inside = resolver.resolve(&grammar, root[0]);
        assert_eq!(&*inside, &*root);
    }
}
