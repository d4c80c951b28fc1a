use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, OcraResult};
use crate::grammars::Grammar;
use crate::highlight::Highlighter;
use crate::themes::{Theme, ThemeTrie, ThemeType};

/// Holds the grammars, by file extension, and the themes, by name.
///
/// Grammars can be registered eagerly (compiled when added, errors returned to the caller) or
/// lazily by path, in which case they are compiled the first time a document needs them.
/// Grammars and themes are handed out as `Arc`s: they are never mutated once built so any
/// number of documents can share them.
#[derive(Debug)]
pub struct Registry {
    /// lowercase extension -> grammar file, not compiled yet
    grammar_paths: HashMap<String, PathBuf>,
    /// lowercase extension -> compiled grammar
    /// Lazily registered grammars are compiled behind `&self` so this one is concurrent.
    grammars: papaya::HashMap<String, Arc<Grammar>>,
    plain: Arc<Grammar>,
    themes: HashMap<String, Arc<ThemeTrie>>,
    default_theme: Arc<ThemeTrie>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry only knowing about plain text.
    pub fn new() -> Self {
        let mut registry = Self {
            grammar_paths: HashMap::new(),
            grammars: papaya::HashMap::new(),
            plain: Arc::new(Grammar::plain_text()),
            themes: HashMap::new(),
            default_theme: Arc::new(ThemeTrie::from_theme(&Theme::default_for(ThemeType::Dark))),
        };
        registry.add_grammar(Grammar::plain_text());
        registry
    }

    /// Registers the grammar under all the extensions of its `fileTypes`
    pub fn add_grammar(&mut self, grammar: Grammar) {
        let grammar = Arc::new(grammar);
        let grammars = self.grammars.pin();
        for extension in &grammar.file_types {
            let extension = extension.to_lowercase();
            self.grammar_paths.remove(&extension);
            grammars.insert(extension, Arc::clone(&grammar));
        }
    }

    /// Reads and compiles the grammar file right away.
    pub fn add_grammar_from_path(&mut self, path: impl AsRef<Path>) -> OcraResult<()> {
        let grammar = Grammar::load_from_file(path)?;
        self.add_grammar(grammar);
        Ok(())
    }

    pub fn add_grammar_from_str(&mut self, json: &str) -> OcraResult<()> {
        let grammar = Grammar::from_str(json)?;
        self.add_grammar(grammar);
        Ok(())
    }

    /// Registers a grammar file for the given extensions without reading it.
    ///
    /// The file is only loaded when one of those extensions is asked for. If it fails
    /// to load at that point, the extensions fall back to plain text.
    pub fn register_grammar_path(&mut self, path: impl Into<PathBuf>, extensions: &[&str]) {
        let path = path.into();
        let grammars = self.grammars.pin();
        for extension in extensions {
            let extension = extension.to_lowercase();
            grammars.remove(&extension);
            self.grammar_paths.insert(extension, path.clone());
        }
    }

    /// Checks whether a grammar, loaded or not, is registered for that extension
    pub fn contains_grammar(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.grammar_paths.contains_key(&extension)
            || self.grammars.pin().contains_key(&extension)
    }

    /// The grammar for an extension, loading it if it was registered lazily.
    ///
    /// Returns `Ok(None)` for unknown extensions and the load error for lazy grammars that
    /// can't be compiled.
    pub fn load_grammar(&self, extension: &str) -> OcraResult<Option<Arc<Grammar>>> {
        let extension = extension.to_lowercase();
        let grammars = self.grammars.pin();
        if let Some(grammar) = grammars.get(&extension) {
            return Ok(Some(Arc::clone(grammar)));
        }
        let Some(path) = self.grammar_paths.get(&extension) else {
            return Ok(None);
        };

        let grammar = Arc::new(Grammar::load_from_file(path)?);
        log::debug!("Loaded grammar {} for .{extension}", grammar.scope_name);
        // Two threads can race to load the same grammar, the first one to insert wins
        Ok(Some(Arc::clone(grammars.get_or_insert(extension, grammar))))
    }

    /// The grammar to use for a file extension, never failing.
    ///
    /// Unknown extensions and grammars that fail to load give the plain text grammar.
    pub fn grammar_for_extension(&self, extension: &str) -> Arc<Grammar> {
        match self.load_grammar(extension) {
            Ok(Some(grammar)) => grammar,
            Ok(None) => {
                log::debug!("No grammar for .{extension}, using plain text");
                Arc::clone(&self.plain)
            }
            Err(e) => {
                log::error!("Failed to load grammar for .{extension}: {e}");
                // Cached so the error is only reported once
                let plain = Arc::clone(&self.plain);
                self.grammars
                    .pin()
                    .insert(extension.to_lowercase(), Arc::clone(&plain));
                plain
            }
        }
    }

    /// Reads the file and adds it as a theme under its `name`, or the file stem if it has none.
    pub fn add_theme_from_path(&mut self, path: impl AsRef<Path>) -> OcraResult<()> {
        let path = path.as_ref();
        let theme = Theme::load_from_file(path)?;
        let name = if theme.name.is_empty() {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            theme.name.clone()
        };
        self.add_theme(name, &theme);
        Ok(())
    }

    pub fn add_theme_from_str(&mut self, name: &str, json: &str) -> OcraResult<()> {
        let theme = Theme::from_str(json)?;
        self.add_theme(name.to_string(), &theme);
        Ok(())
    }

    pub fn add_theme(&mut self, name: String, theme: &Theme) {
        self.themes
            .insert(name, Arc::new(ThemeTrie::from_theme(theme)));
    }

    /// Checks whether the given theme is available in the registry
    pub fn contains_theme(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    pub fn theme(&self, name: &str) -> OcraResult<Arc<ThemeTrie>> {
        self.themes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ThemeNotFound(name.to_string()))
    }

    /// Like [`Registry::theme`] but falls back to the built-in dark palette.
    pub fn theme_or_default(&self, name: &str) -> Arc<ThemeTrie> {
        self.theme(name).unwrap_or_else(|e| {
            log::warn!("{e}, using the default theme");
            self.default_theme()
        })
    }

    /// A theme without rules using the built-in dark palette
    pub fn default_theme(&self) -> Arc<ThemeTrie> {
        Arc::clone(&self.default_theme)
    }

    /// Forgets every grammar and theme apart from plain text.
    pub fn clear(&mut self) {
        self.grammar_paths.clear();
        self.grammars.pin().clear();
        self.themes.clear();
        self.add_grammar(Grammar::plain_text());
    }

    /// Starts highlighting a document with the grammar of its extension.
    pub fn highlighter_for(&self, extension: &str, text: impl Into<String>) -> Highlighter {
        Highlighter::new(self.grammar_for_extension(extension), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::themes::{Attribute, Color};

    const NUMBERS_GRAMMAR: &str = r#"{
        "name": "Numbers",
        "scopeName": "source.numbers",
        "fileTypes": ["num", "NUMS"],
        "patterns": [{"match": "\\d+", "name": "constant.numeric"}]
    }"#;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ocra-registry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn new_registry_only_has_plain_text() {
        let registry = Registry::new();
        assert!(registry.contains_grammar("txt"));
        assert!(registry.contains_grammar("TXT"));
        assert!(!registry.contains_grammar("num"));
        assert_eq!(registry.grammar_for_extension("rs").scope_name, "text.plain");
    }

    #[test]
    fn registers_grammars_by_lowercase_file_types() {
        let mut registry = Registry::new();
        registry.add_grammar_from_str(NUMBERS_GRAMMAR).unwrap();

        for extension in ["num", "NUM", "nums"] {
            assert_eq!(
                registry.grammar_for_extension(extension).scope_name,
                "source.numbers"
            );
        }
    }

    #[test]
    fn eager_load_errors_are_returned() {
        let mut registry = Registry::new();
        let err = registry
            .add_grammar_from_str(r#"{"patterns": [{"match": "(", "name": "x"}]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MissingScopeName | Error::InvalidRegex { .. }));
        assert!(matches!(
            registry.add_grammar_from_str(r#"{"scopeName": "a", "patterns": [{"match": "("}]}"#),
            Err(Error::InvalidRegex { .. })
        ));
        assert!(matches!(
            registry.add_grammar_from_path("/definitely/not/here.json"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn lazy_grammars_load_on_first_use() {
        let path = write_temp("numbers.json", NUMBERS_GRAMMAR);
        let mut registry = Registry::new();
        registry.register_grammar_path(&path, &["n"]);
        assert!(registry.contains_grammar("n"));

        let first = registry.grammar_for_extension("n");
        assert_eq!(first.scope_name, "source.numbers");
        // Compiled once then cached
        assert!(Arc::ptr_eq(&first, &registry.grammar_for_extension("N")));
    }

    #[test]
    fn broken_lazy_grammars_fall_back_to_plain() {
        let path = write_temp("broken.json", r#"{"scopeName": "broken", "patterns": [{"match": "("}]}"#);
        let mut registry = Registry::new();
        registry.register_grammar_path(&path, &["broken"]);
        registry.register_grammar_path("/definitely/not/here.json", &["missing"]);

        assert!(matches!(registry.load_grammar("broken"), Err(Error::InvalidRegex { .. })));
        assert_eq!(registry.grammar_for_extension("broken").scope_name, "text.plain");
        assert_eq!(registry.grammar_for_extension("missing").scope_name, "text.plain");
        assert!(registry.load_grammar("unknown").unwrap().is_none());
    }

    #[test]
    fn themes_by_name() {
        let mut registry = Registry::new();
        registry
            .add_theme_from_str(
                "mine",
                r##"{"tokenColors": [{"scope": "string", "settings": {"foreground": "#FF0000"}}]}"##,
            )
            .unwrap();

        let theme = registry.theme("mine").unwrap();
        assert_eq!(
            theme.resolve("string.quoted").base.foreground,
            Some(Color::rgb(255, 0, 0))
        );
        assert!(matches!(registry.theme("other"), Err(Error::ThemeNotFound(name)) if name == "other"));
        assert_eq!(
            registry.theme_or_default("other").root().base.background,
            Some(Color::rgb(0x1E, 0x1E, 0x1E))
        );
    }

    #[test]
    fn themes_from_path_use_their_name_or_file_stem() {
        let named = write_temp("named.json", r##"{"name": "Named", "colors": {}}"##);
        let unnamed = write_temp("unnamed.json", r##"{"colors": {}}"##);
        let mut registry = Registry::new();
        registry.add_theme_from_path(named).unwrap();
        registry.add_theme_from_path(unnamed).unwrap();

        assert!(registry.contains_theme("Named"));
        assert!(registry.contains_theme("unnamed"));
    }

    #[test]
    fn clear_keeps_plain_text() {
        let mut registry = Registry::new();
        registry.add_grammar_from_str(NUMBERS_GRAMMAR).unwrap();
        registry.add_theme_from_str("t", r#"{"colors": {}}"#).unwrap();
        registry.clear();

        assert!(!registry.contains_grammar("num"));
        assert!(!registry.contains_theme("t"));
        assert!(registry.contains_grammar("txt"));
    }

    #[test]
    fn highlights_with_registered_grammar() {
        let mut registry = Registry::new();
        registry.add_grammar_from_str(NUMBERS_GRAMMAR).unwrap();
        registry
            .add_theme_from_str(
                "t",
                r##"{"tokenColors": [{"scope": "constant", "settings": {"foreground": "#00FF00"}}]}"##,
            )
            .unwrap();

        let highlighter = registry.highlighter_for("num", "abc 123");
        let tokens = highlighter.line_tokens(0).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].span, 4..7);
        assert!(tokens[0].has_scope(Scope::new("constant.numeric")));

        let styled = highlighter.styled_line(0, &registry.theme("t").unwrap(), false);
        assert!(
            styled
                .iter()
                .any(|s| s.span == (4..7)
                    && s.attributes.contains(&Attribute::Foreground(Color::rgb(0, 255, 0))))
        );
    }

    #[test]
    fn styled_tokens_inherit_the_source_font() {
        let mut registry = Registry::new();
        registry
            .add_grammar_from_str(
                r#"{
                    "scopeName": "source.test",
                    "fileTypes": ["test"],
                    "patterns": [{"match": "\\bif\\b", "name": "keyword.control"}]
                }"#,
            )
            .unwrap();
        registry
            .add_theme_from_str(
                "t",
                r##"{"tokenColors": [{"scope": "keyword", "settings": {"foreground": "#FF0000"}}]}"##,
            )
            .unwrap();

        let highlighter = registry.highlighter_for("test", "if x");
        let styled = highlighter.styled_line(0, &registry.theme("t").unwrap(), false);
        assert_eq!(styled.len(), 1);
        assert_eq!(styled[0].span, 0..2);
        assert_eq!(
            styled[0].attributes,
            vec![
                Attribute::Foreground(Color::rgb(0xFF, 0, 0)),
                Attribute::Background(Color::rgb(0x1E, 0x1E, 0x1E)),
                Attribute::Font("monospace".to_string()),
            ]
        );
    }
}
