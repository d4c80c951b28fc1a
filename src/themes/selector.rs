use crate::scope::Scope;

/// Represents a parent scope requirement in a theme selector.
///
/// They are parsed but not used when resolving attributes: a selector applies to its target
/// scope whatever its parents are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    /// Parent scope that can appear anywhere up the scope stack
    /// `Anywhere(source.js)` from "source.js meta.function" - can have scopes between
    Anywhere(Scope),
    /// Parent scope that must be the immediate parent (child combinator `>`)
    /// `Direct(meta.function)` from "meta.function > string" - must be immediate parent
    Direct(Scope),
}

/// A parsed theme selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSelector {
    /// The target scope to match (rightmost in the selector string)
    pub target_scope: Scope,
    /// Required parent scopes from right to left of the selector
    pub parent_scopes: Vec<Parent>,
}

impl ScopeSelector {
    pub fn new(target_scope: Scope, parent_scopes: Vec<Parent>) -> Self {
        Self {
            target_scope,
            parent_scopes,
        }
    }

    /// A selector for a single scope, without parents
    pub fn scope(name: &str) -> Self {
        Self::new(Scope::new(name), Vec::new())
    }

    /// How specific the selector is: atoms of the target then number of parents
    pub fn specificity(&self) -> (u32, usize) {
        (self.target_scope.len(), self.parent_scopes.len())
    }
}

/// Parses a theme selector string into a structured ScopeSelector.
///
/// # Selector Format
/// - Scopes are separated by whitespace: `"source.js meta.function string"`
/// - Child combinator `>` creates direct parent requirement: `"parent > child"`
/// - Target scope is always the rightmost non-`>` token
/// - Parent scopes are processed left to right
///
/// Returns `None` if the selector string is invalid or empty
pub fn parse_selector(input: &str) -> Option<ScopeSelector> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let (last, rest) = parts.split_last()?;
    if *last == ">" {
        return None;
    }
    let target_scope = Scope::new(last);

    let mut parents = Vec::new();
    let mut is_direct = false;
    for part in rest.iter().rev() {
        if *part == ">" {
            is_direct = true;
            continue;
        }
        let parent_scope = Scope::new(part);
        parents.push(if is_direct {
            Parent::Direct(parent_scope)
        } else {
            Parent::Anywhere(parent_scope)
        });
        is_direct = false;
    }

    Some(ScopeSelector::new(target_scope, parents))
}
