use std::collections::HashMap;

use crate::scope::Scope;
use crate::themes::{Attribute, AttributeMap, ScopeSelector, Theme, ThemeSetting};

/// The attributes of a trie node, with the whole cascade from the root already applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAttributes {
    pub base: AttributeMap,
    pub in_selection: AttributeMap,
    pub out_selection: AttributeMap,
}

impl ResolvedAttributes {
    fn merge(&mut self, other: &ResolvedAttributes) {
        self.base.merge(&other.base);
        self.in_selection.merge(&other.in_selection);
        self.out_selection.merge(&other.out_selection);
    }

    fn merge_setting(&mut self, setting: &ThemeSetting) {
        self.base
            .merge(&AttributeMap::from_attributes(&setting.attributes));
        self.in_selection
            .merge(&AttributeMap::from_attributes(&setting.in_selection));
        self.out_selection
            .merge(&AttributeMap::from_attributes(&setting.out_selection));
    }

    /// `base` with the selection-dependent attributes on top
    pub fn for_selection(&self, in_selection: bool) -> Vec<Attribute> {
        let mut attributes = self.base.clone();
        attributes.merge(if in_selection {
            &self.in_selection
        } else {
            &self.out_selection
        });
        attributes.to_vec()
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    /// Everything from the root down to this node
    attributes: ResolvedAttributes,
    /// Same without the root settings, merged when the node is one link of a longer chain
    scoped: ResolvedAttributes,
    /// Keyed by scope atom
    children: HashMap<u16, usize>,
}

/// Prefix tree over scope atoms resolving a scope to its cascaded attributes in one descent.
///
/// Immutable once built so it can be shared between documents and threads.
#[derive(Debug, Clone)]
pub struct ThemeTrie {
    nodes: Vec<Node>,
}

impl ThemeTrie {
    const ROOT: usize = 0;

    /// Settings are applied from the least to the most specific selector so each new node
    /// starts from a parent that is already complete.
    pub fn new(settings: Vec<ThemeSetting>) -> Self {
        let mut trie = Self {
            nodes: vec![Node::default()],
        };

        let mut targeted: Vec<(&ScopeSelector, &ThemeSetting)> = Vec::new();
        for setting in &settings {
            if setting.selectors.is_empty() {
                trie.nodes[Self::ROOT].attributes.merge_setting(setting);
            }
            for selector in &setting.selectors {
                targeted.push((selector, setting));
            }
        }
        // Stable: equally specific settings keep the file order, later ones win
        targeted.sort_by_key(|(selector, _)| selector.specificity());

        for (selector, setting) in targeted {
            let index = trie.insert(selector.target_scope);
            let node = &mut trie.nodes[index];
            node.attributes.merge_setting(setting);
            node.scoped.merge_setting(setting);
        }

        trie
    }

    pub fn from_theme(theme: &Theme) -> Self {
        Self::new(theme.settings.clone())
    }

    /// Walks down to `scope`, creating missing nodes from their parent's attributes
    fn insert(&mut self, scope: Scope) -> usize {
        let mut current = Self::ROOT;
        for atom in scope.atoms() {
            current = match self.nodes[current].children.get(&atom) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    let parent = &self.nodes[current];
                    let node = Node {
                        attributes: parent.attributes.clone(),
                        scoped: parent.scoped.clone(),
                        children: HashMap::new(),
                    };
                    self.nodes.push(node);
                    self.nodes[current].children.insert(atom, child);
                    child
                }
            };
        }
        current
    }

    /// Longest prefix walk, returning the node index and how many atoms were matched
    fn walk(&self, atoms: impl Iterator<Item = Option<u16>>) -> (usize, usize) {
        let mut current = Self::ROOT;
        let mut depth = 0;
        for atom in atoms {
            let Some(&child) = atom.and_then(|a| self.nodes[current].children.get(&a)) else {
                break;
            };
            current = child;
            depth += 1;
        }
        (current, depth)
    }

    /// Attributes of a dotted scope path, eg "keyword.control.flow" uses "keyword.control"
    /// if there is no rule for the full path.
    ///
    /// The path can chain several scopes, outermost first: in "source.string.quoted" the
    /// walk matches "source" and then starts again from the root at "string", each matched
    /// node cascading into the next one.
    pub fn resolve(&self, scope_path: &str) -> ResolvedAttributes {
        let mut resolved = self.root().clone();
        let mut current = Self::ROOT;
        for atom in scope_path
            .split('.')
            .filter(|p| !p.is_empty())
            .map(Scope::find_atom)
        {
            let child =
                |node: usize| atom.and_then(|a| self.nodes[node].children.get(&a).copied());
            if let Some(next) = child(current) {
                current = next;
                continue;
            }
            if current != Self::ROOT {
                resolved.merge(&self.nodes[current].scoped);
            }
            // An atom nothing starts with is skipped
            current = child(Self::ROOT).unwrap_or(Self::ROOT);
        }
        if current != Self::ROOT {
            resolved.merge(&self.nodes[current].scoped);
        }
        resolved
    }

    /// Attributes of the deepest node matching a prefix of `scope`, without outer scopes
    pub fn resolve_scope(&self, scope: Scope) -> &ResolvedAttributes {
        let (node, _) = self.walk(scope.atoms().map(Some));
        &self.nodes[node].attributes
    }

    pub fn resolve_attributes(&self, scope_path: &str, in_selection: bool) -> Vec<Attribute> {
        self.resolve(scope_path).for_selection(in_selection)
    }

    /// Attributes for a token with the given scopes, outermost first.
    ///
    /// Starts from the root and each scope having a rule overrides what its outer scopes set,
    /// key by key.
    pub fn resolve_scopes(&self, scopes: &[Scope], in_selection: bool) -> Vec<Attribute> {
        let mut resolved = self.root().clone();
        for scope in scopes {
            let (node, depth) = self.walk(scope.atoms().map(Some));
            if depth > 0 {
                resolved.merge(&self.nodes[node].scoped);
            }
        }
        resolved.for_selection(in_selection)
    }

    /// The document-wide attributes
    pub fn root(&self) -> &ResolvedAttributes {
        &self.nodes[Self::ROOT].attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::{Color, FontStyle, parse_selector};

    const A: Color = Color::rgb(255, 0, 0);
    const B: Color = Color::rgb(0, 255, 0);
    const C: Color = Color::rgb(0, 0, 255);

    fn setting(selector: &str, attributes: Vec<Attribute>) -> ThemeSetting {
        let selectors = if selector.is_empty() {
            Vec::new()
        } else {
            vec![parse_selector(selector).unwrap()]
        };
        ThemeSetting::new(selectors, attributes)
    }

    fn foreground(trie: &ThemeTrie, path: &str) -> Option<Color> {
        trie.resolve(path).base.foreground
    }

    #[test]
    fn resolves_to_nearest_ancestor() {
        // Declared most specific first to check the sorting
        let trie = ThemeTrie::new(vec![
            setting("keyword.control", vec![Attribute::Foreground(B)]),
            setting("keyword", vec![Attribute::Foreground(A)]),
        ]);

        assert_eq!(foreground(&trie, "keyword.control.flow"), Some(B));
        assert_eq!(foreground(&trie, "keyword.other"), Some(A));
        assert_eq!(foreground(&trie, "keyword"), Some(A));
        assert_eq!(foreground(&trie, "string"), None);
        assert_eq!(foreground(&trie, "never.seen.before.atoms"), None);
    }

    #[test]
    fn children_inherit_key_by_key() {
        let trie = ThemeTrie::new(vec![
            setting("", vec![Attribute::Background(C)]),
            setting(
                "comment",
                vec![Attribute::Foreground(A), Attribute::FontStyle(FontStyle::ITALIC)],
            ),
            setting("comment.line", vec![Attribute::Foreground(B)]),
        ]);

        assert_eq!(
            trie.resolve_attributes("comment.line.double-slash", false),
            vec![
                Attribute::Foreground(B),
                Attribute::Background(C),
                Attribute::FontStyle(FontStyle::ITALIC)
            ]
        );
        assert_eq!(trie.root().base.background, Some(C));
    }

    #[test]
    fn selection_attributes_apply_on_request() {
        let mut string = setting("string", vec![Attribute::Foreground(A)]);
        string.in_selection = vec![Attribute::Foreground(C)];
        string.out_selection = vec![Attribute::Background(B)];
        let trie = ThemeTrie::new(vec![string]);

        assert_eq!(
            trie.resolve_attributes("string.quoted", true),
            vec![Attribute::Foreground(C)]
        );
        assert_eq!(
            trie.resolve_attributes("string.quoted", false),
            vec![Attribute::Foreground(A), Attribute::Background(B)]
        );
    }

    #[test]
    fn parents_are_not_enforced() {
        let trie = ThemeTrie::new(vec![
            setting("string", vec![Attribute::Foreground(A)]),
            setting("source.rust string", vec![Attribute::Foreground(B)]),
        ]);
        // The more specific selector wins even though nothing says we are in source.rust
        assert_eq!(foreground(&trie, "string"), Some(B));
    }

    #[test]
    fn outer_scopes_cascade_into_inner_ones() {
        let trie = ThemeTrie::new(vec![
            setting("", vec![Attribute::Foreground(C)]),
            setting("source", vec![Attribute::Font("monospace".to_string())]),
            setting("string", vec![Attribute::Foreground(A)]),
            setting(
                "constant.character",
                vec![Attribute::FontStyle(FontStyle::BOLD)],
            ),
        ]);
        let scopes = [
            Scope::new("source.test"),
            Scope::new("string.quoted.double"),
            Scope::new("constant.character.escape"),
        ];

        assert_eq!(
            trie.resolve_scopes(&scopes, false),
            vec![
                Attribute::Foreground(A),
                Attribute::FontStyle(FontStyle::BOLD),
                Attribute::Font("monospace".to_string()),
            ]
        );
    }

    #[test]
    fn resolves_chained_scope_paths() {
        let trie = ThemeTrie::new(vec![
            setting("", vec![Attribute::Foreground(C)]),
            setting("source", vec![Attribute::Font("monospace".to_string())]),
            setting("keyword", vec![Attribute::Foreground(A)]),
        ]);

        assert_eq!(
            trie.resolve_attributes("source.keyword.control", false),
            vec![
                Attribute::Foreground(A),
                Attribute::Font("monospace".to_string()),
            ]
        );
        // Unknown atoms in between are skipped
        assert_eq!(
            trie.resolve_attributes("source.whatever.keyword", false),
            vec![
                Attribute::Foreground(A),
                Attribute::Font("monospace".to_string()),
            ]
        );
        assert_eq!(
            trie.resolve_attributes("text.plain", false),
            vec![Attribute::Foreground(C)]
        );
    }

    #[test]
    fn innermost_styled_scope_wins() {
        let trie = ThemeTrie::new(vec![
            setting("", vec![Attribute::Foreground(C)]),
            setting("string", vec![Attribute::Foreground(A)]),
        ]);
        let scopes = [
            Scope::new("source.test"),
            Scope::new("string.quoted"),
            Scope::new("meta.unstyled"),
        ];

        assert_eq!(
            trie.resolve_scopes(&scopes, false),
            vec![Attribute::Foreground(A)]
        );
        assert_eq!(
            trie.resolve_scopes(&scopes[..1], false),
            vec![Attribute::Foreground(C)]
        );
    }

    #[test]
    fn round_trips_editor_colors() {
        let theme = Theme::from_str(
            r##"{"colors": {"editor.foreground": "#102030", "editor.background": "#F0E0D0"}}"##,
        )
        .unwrap();
        let trie = ThemeTrie::from_theme(&theme);

        assert_eq!(trie.root().base.foreground, Some(Color::rgb(0x10, 0x20, 0x30)));
        assert_eq!(trie.root().base.background, Some(Color::rgb(0xF0, 0xE0, 0xD0)));
        assert_eq!(
            trie.resolve("source.rust").base.font.as_deref(),
            Some("monospace")
        );
    }
}
