//! Loading themes from JSON.
//!
//! Three dialects are understood and all of them end up as a flat list of [`ThemeSetting`]:
//! - scope rule lists: a top-level array, or an object with `rules`, of
//!   `{scopes, attributes, inSelectionAttributes, outSelectionAttributes}`
//! - editor themes: `name`, `type`, `colors` and `tokenColors`/`settings`
//! - legacy flat themes: one `{color, fontStyle}` object per fixed key (`strings`, `comments`...)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, OcraResult};
use crate::scope::Scope;
use crate::themes::{Attribute, Color, FontStyle, ScopeSelector, parse_selector};

/// Font given to the synthesized `source` rule when a theme doesn't style it
pub const DEFAULT_FONT: &str = "monospace";

/// Legacy flat keys and the scope they style
const LEGACY_SCOPES: &[(&str, &str)] = &[
    ("strings", "string"),
    ("comments", "comment"),
    ("numbers", "constant.numeric"),
    ("keywords", "keyword"),
    ("types", "storage.type"),
    ("functions", "entity.name.function"),
    ("variables", "variable"),
    ("attributes", "entity.other.attribute-name"),
    ("characters", "constant.character"),
    ("preprocessor", "meta.preprocessor"),
    ("tags", "entity.name.tag"),
];

/// Legacy flat keys for editor colors rather than scopes
const LEGACY_EDITOR_KEYS: &[&str] = &["text", "background", "selection", "caret", "lineHighlight"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeType {
    Light,
    Dark,
}

impl ThemeType {
    /// Anything mentioning "light" is light ("light", "hcLight"), the rest is dark.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> ThemeType {
        if s.to_ascii_lowercase().contains("light") {
            ThemeType::Light
        } else {
            ThemeType::Dark
        }
    }

    /// Guess the type from the editor background
    pub fn from_background(background: Option<Color>) -> ThemeType {
        match background {
            Some(c) if c.luminance() > 128 => ThemeType::Light,
            _ => ThemeType::Dark,
        }
    }
}

/// The colors of the editor itself, as opposed to the colors of the tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorColors {
    pub foreground: Color,
    pub background: Color,
    pub caret: Color,
    pub selection: Color,
    pub line_highlight: Color,
}

impl EditorColors {
    /// Built-in palette used for every editor color a theme doesn't set
    pub fn default_for(theme_type: ThemeType) -> Self {
        match theme_type {
            ThemeType::Light => Self {
                foreground: Color::rgb(0x00, 0x00, 0x00),
                background: Color::rgb(0xFF, 0xFF, 0xFF),
                caret: Color::rgb(0x00, 0x00, 0x00),
                selection: Color::rgb(0xAD, 0xD6, 0xFF),
                line_highlight: Color::rgb(0xF5, 0xF5, 0xF5),
            },
            ThemeType::Dark => Self {
                foreground: Color::rgb(0xD4, 0xD4, 0xD4),
                background: Color::rgb(0x1E, 0x1E, 0x1E),
                caret: Color::rgb(0xAE, 0xAF, 0xAD),
                selection: Color::rgb(0x26, 0x4F, 0x78),
                line_highlight: Color::rgb(0x2A, 0x2D, 0x2E),
            },
        }
    }
}

/// Editor colors as found in the file, before the palette fills the gaps
#[derive(Debug, Default)]
struct PartialEditorColors {
    foreground: Option<Color>,
    background: Option<Color>,
    caret: Option<Color>,
    selection: Option<Color>,
    line_highlight: Option<Color>,
}

impl PartialEditorColors {
    fn complete(&self, theme_type: ThemeType) -> EditorColors {
        let palette = EditorColors::default_for(theme_type);
        EditorColors {
            foreground: self.foreground.unwrap_or(palette.foreground),
            background: self.background.unwrap_or(palette.background),
            caret: self.caret.unwrap_or(palette.caret),
            selection: self.selection.unwrap_or(palette.selection),
            line_highlight: self.line_highlight.unwrap_or(palette.line_highlight),
        }
    }
}

/// Attributes for the scopes matched by `selectors`.
///
/// An empty `selectors` list targets the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThemeSetting {
    pub selectors: Vec<ScopeSelector>,
    pub attributes: Vec<Attribute>,
    /// Applied on top of `attributes` for selected text
    pub in_selection: Vec<Attribute>,
    /// Applied on top of `attributes` for unselected text
    pub out_selection: Vec<Attribute>,
}

impl ThemeSetting {
    pub fn new(selectors: Vec<ScopeSelector>, attributes: Vec<Attribute>) -> Self {
        Self {
            selectors,
            attributes,
            ..Default::default()
        }
    }

    fn targets(&self, scope: Scope) -> bool {
        self.selectors.iter().any(|s| s.target_scope == scope)
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub theme_type: ThemeType,
    pub editor: EditorColors,
    pub settings: Vec<ThemeSetting>,
}

impl Theme {
    /// Parses any of the supported dialects.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &str) -> OcraResult<Self> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_json(value)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> OcraResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_json(value)
    }

    /// A theme without any rule, only the built-in palette
    pub fn default_for(theme_type: ThemeType) -> Self {
        finish_theme(
            String::new(),
            Some(theme_type),
            PartialEditorColors::default(),
            Vec::new(),
        )
    }

    fn from_json(value: Value) -> OcraResult<Self> {
        match Dialect::detect(&value).ok_or(Error::UnknownThemeFormat)? {
            Dialect::RuleArray => {
                let rules: Vec<RawScopeRule> = serde_json::from_value(value)?;
                Ok(RawRuleListTheme::from_rules(rules).into_theme())
            }
            Dialect::RuleList => {
                let raw: RawRuleListTheme = serde_json::from_value(value)?;
                Ok(raw.into_theme())
            }
            Dialect::Editor => {
                let raw: RawEditorTheme = serde_json::from_value(value)?;
                Ok(raw.into_theme())
            }
            Dialect::Legacy => Ok(legacy_theme(&value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    RuleArray,
    RuleList,
    Editor,
    Legacy,
}

impl Dialect {
    fn detect(value: &Value) -> Option<Dialect> {
        let map = match value {
            Value::Array(_) => return Some(Dialect::RuleArray),
            Value::Object(map) => map,
            _ => return None,
        };

        if map.contains_key("rules") {
            Some(Dialect::RuleList)
        } else if map.contains_key("tokenColors")
            || map.contains_key("colors")
            || map.get("settings").is_some_and(Value::is_array)
        {
            Some(Dialect::Editor)
        } else if LEGACY_SCOPES.iter().any(|(k, _)| map.contains_key(*k))
            || LEGACY_EDITOR_KEYS.iter().any(|k| map.contains_key(*k))
        {
            Some(Dialect::Legacy)
        } else {
            None
        }
    }
}

/// Parses a theme color, warning and ignoring invalid ones. `inherit` means unset.
fn parse_color(value: &str) -> Option<Color> {
    if value == "inherit" {
        return None;
    }
    match Color::from_hex(value) {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("Ignoring theme color: {e}");
            None
        }
    }
}

/// One selector per comma-separated entry, eg "string, comment" gives two
fn parse_selectors<S: AsRef<str>>(scopes: &[S]) -> Vec<ScopeSelector> {
    scopes
        .iter()
        .flat_map(|s| s.as_ref().split(','))
        .filter_map(parse_selector)
        .collect()
}

/// Shared by all dialects: adds the document-wide setting and makes sure `source` is styled.
fn finish_theme(
    name: String,
    theme_type: Option<ThemeType>,
    editor: PartialEditorColors,
    mut settings: Vec<ThemeSetting>,
) -> Theme {
    let theme_type = theme_type.unwrap_or_else(|| ThemeType::from_background(editor.background));
    let editor = editor.complete(theme_type);

    let root = ThemeSetting {
        selectors: Vec::new(),
        attributes: vec![
            Attribute::Foreground(editor.foreground),
            Attribute::Background(editor.background),
        ],
        in_selection: vec![Attribute::Background(editor.selection)],
        out_selection: Vec::new(),
    };
    settings.insert(0, root);

    let source = Scope::new("source");
    if !settings.iter().any(|s| s.targets(source)) {
        log::debug!("Theme {name} has no rule for `source`, synthesizing one");
        settings.push(ThemeSetting::new(
            vec![ScopeSelector::new(source, Vec::new())],
            vec![
                Attribute::Foreground(editor.foreground),
                Attribute::Font(DEFAULT_FONT.to_string()),
            ],
        ));
    }

    Theme {
        name,
        theme_type,
        editor,
        settings,
    }
}

/// Custom deserializer for scope fields that can be a string or an array
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrVec::deserialize(deserializer)? {
        StringOrVec::One(s) => vec![s],
        StringOrVec::Many(v) => v,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawAttributes {
    #[serde(alias = "color")]
    foreground: Option<String>,
    background: Option<String>,
    #[serde(rename = "fontStyle")]
    font_style: Option<String>,
    font: Option<String>,
}

impl RawAttributes {
    fn to_attributes(&self) -> Vec<Attribute> {
        let mut out = Vec::new();
        if let Some(c) = self.foreground.as_deref().and_then(parse_color) {
            out.push(Attribute::Foreground(c));
        }
        if let Some(c) = self.background.as_deref().and_then(parse_color) {
            out.push(Attribute::Background(c));
        }
        if let Some(s) = &self.font_style {
            out.push(Attribute::FontStyle(FontStyle::from_str(s)));
        }
        if let Some(f) = &self.font {
            out.push(Attribute::Font(f.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawScopeRule {
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    scopes: Vec<String>,
    #[serde(default)]
    attributes: RawAttributes,
    #[serde(default, rename = "inSelectionAttributes")]
    in_selection: RawAttributes,
    #[serde(default, rename = "outSelectionAttributes")]
    out_selection: RawAttributes,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRuleListTheme {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    theme_type: Option<String>,
    rules: Vec<RawScopeRule>,
}

impl RawRuleListTheme {
    fn from_rules(rules: Vec<RawScopeRule>) -> Self {
        Self {
            name: None,
            theme_type: None,
            rules,
        }
    }

    fn into_theme(self) -> Theme {
        let mut editor = PartialEditorColors::default();
        let mut settings = Vec::with_capacity(self.rules.len());

        for rule in self.rules {
            let selectors = parse_selectors(&rule.scopes);
            if selectors.is_empty() {
                if !rule.scopes.is_empty() {
                    log::warn!("Ignoring theme rule with invalid scopes {:?}", rule.scopes);
                    continue;
                }
                // Document-wide rule: its colors are the editor colors
                if let Some(c) = rule.attributes.foreground.as_deref().and_then(parse_color) {
                    editor.foreground = Some(c);
                }
                if let Some(c) = rule.attributes.background.as_deref().and_then(parse_color) {
                    editor.background = Some(c);
                }
                if let Some(c) = rule.in_selection.background.as_deref().and_then(parse_color) {
                    editor.selection = Some(c);
                }
            }
            settings.push(ThemeSetting {
                selectors,
                attributes: rule.attributes.to_attributes(),
                in_selection: rule.in_selection.to_attributes(),
                out_selection: rule.out_selection.to_attributes(),
            });
        }

        finish_theme(
            self.name.unwrap_or_default(),
            self.theme_type.as_deref().map(ThemeType::from_str),
            editor,
            settings,
        )
    }
}

/// Token color settings from editor theme JSON.
///
/// A scope-less entry can also carry the editor colors, as older themes do.
#[derive(Debug, Clone, Deserialize, Default)]
struct TokenColorSettings {
    foreground: Option<String>,
    background: Option<String>,
    #[serde(rename = "fontStyle")]
    font_style: Option<String>,
    caret: Option<String>,
    selection: Option<String>,
    #[serde(rename = "lineHighlight")]
    line_highlight: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTokenColor {
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    scope: Vec<String>,
    #[serde(default)]
    settings: TokenColorSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEditorTheme {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    theme_type: Option<String>,
    #[serde(default)]
    colors: BTreeMap<String, Option<String>>,
    #[serde(default, rename = "tokenColors")]
    token_colors: Vec<RawTokenColor>,
    #[serde(default)]
    settings: Vec<RawTokenColor>,
}

impl RawEditorTheme {
    fn color(&self, key: &str) -> Option<Color> {
        self.colors
            .get(key)
            .and_then(|c| c.as_deref())
            .and_then(parse_color)
    }

    fn into_theme(self) -> Theme {
        let mut editor = PartialEditorColors {
            foreground: self.color("editor.foreground"),
            background: self.color("editor.background"),
            caret: self.color("editorCursor.foreground"),
            selection: self.color("editor.selectionBackground"),
            line_highlight: self.color("editor.lineHighlightBackground"),
        };

        let mut settings = Vec::new();
        for token_color in self.token_colors.iter().chain(self.settings.iter()) {
            let raw = &token_color.settings;
            if token_color.scope.is_empty() {
                // Global colors only fill what `colors` left unset
                let parse = |c: &Option<String>| c.as_deref().and_then(parse_color);
                editor.foreground = editor.foreground.or_else(|| parse(&raw.foreground));
                editor.background = editor.background.or_else(|| parse(&raw.background));
                editor.caret = editor.caret.or_else(|| parse(&raw.caret));
                editor.selection = editor.selection.or_else(|| parse(&raw.selection));
                editor.line_highlight = editor.line_highlight.or_else(|| parse(&raw.line_highlight));
                continue;
            }

            let selectors = parse_selectors(&token_color.scope);
            if selectors.is_empty() {
                continue;
            }
            let attributes = RawAttributes {
                foreground: raw.foreground.clone(),
                background: raw.background.clone(),
                font_style: raw.font_style.clone(),
                font: None,
            }
            .to_attributes();
            if attributes.is_empty() {
                continue;
            }
            settings.push(ThemeSetting::new(selectors, attributes));
        }

        finish_theme(
            self.name.unwrap_or_default(),
            self.theme_type.as_deref().map(ThemeType::from_str),
            editor,
            settings,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawLegacyEntry {
    color: Option<String>,
    #[serde(rename = "fontStyle")]
    font_style: Option<String>,
}

fn legacy_entry(theme: &Value, key: &str) -> Option<RawLegacyEntry> {
    let value = theme.get(key)?;
    match RawLegacyEntry::deserialize(value) {
        Ok(entry) => Some(entry),
        Err(e) => {
            log::warn!("Ignoring theme key `{key}`: {e}");
            None
        }
    }
}

fn legacy_theme(theme: &Value) -> Theme {
    let color_of = |key: &str| {
        legacy_entry(theme, key)
            .and_then(|e| e.color)
            .and_then(|c| parse_color(&c))
    };
    let editor = PartialEditorColors {
        foreground: color_of("text"),
        background: color_of("background"),
        caret: color_of("caret"),
        selection: color_of("selection"),
        line_highlight: color_of("lineHighlight"),
    };

    let mut settings = Vec::new();
    for (key, scope) in LEGACY_SCOPES {
        let Some(entry) = legacy_entry(theme, key) else {
            continue;
        };
        let attributes = RawAttributes {
            foreground: entry.color,
            font_style: entry.font_style,
            ..Default::default()
        }
        .to_attributes();
        if !attributes.is_empty() {
            settings.push(ThemeSetting::new(vec![ScopeSelector::scope(scope)], attributes));
        }
    }

    let name = theme
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let theme_type = theme.get("type").and_then(Value::as_str).map(ThemeType::from_str);
    finish_theme(name, theme_type, editor, settings)
}
