mod attributes;
mod color;
mod font_style;
mod raw;
mod selector;
mod trie;

pub use attributes::{Attribute, AttributeMap};
pub use color::Color;
pub use font_style::FontStyle;
pub use raw::{DEFAULT_FONT, EditorColors, Theme, ThemeSetting, ThemeType};
pub use selector::{Parent, ScopeSelector, parse_selector};
pub use trie::{ResolvedAttributes, ThemeTrie};
