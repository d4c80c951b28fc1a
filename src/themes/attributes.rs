use crate::themes::{Color, FontStyle};

/// A visual attribute given to a span of text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    Foreground(Color),
    Background(Color),
    FontStyle(FontStyle),
    /// Font family
    Font(String),
}

/// Attributes by kind: setting one overrides the previous value of that kind only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub font_style: Option<FontStyle>,
    pub font: Option<String>,
}

impl AttributeMap {
    pub fn from_attributes<'a>(attributes: impl IntoIterator<Item = &'a Attribute>) -> Self {
        let mut map = Self::default();
        for attribute in attributes {
            map.set(attribute.clone());
        }
        map
    }

    pub fn set(&mut self, attribute: Attribute) {
        match attribute {
            Attribute::Foreground(c) => self.foreground = Some(c),
            Attribute::Background(c) => self.background = Some(c),
            Attribute::FontStyle(s) => self.font_style = Some(s),
            Attribute::Font(f) => self.font = Some(f),
        }
    }

    /// Overrides, key by key, what `other` sets
    pub fn merge(&mut self, other: &AttributeMap) {
        if let Some(c) = other.foreground {
            self.foreground = Some(c);
        }
        if let Some(c) = other.background {
            self.background = Some(c);
        }
        if let Some(s) = other.font_style {
            self.font_style = Some(s);
        }
        if let Some(f) = &other.font {
            self.font = Some(f.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == AttributeMap::default()
    }

    /// In a fixed order: foreground, background, font style, font
    pub fn to_vec(&self) -> Vec<Attribute> {
        let mut out = Vec::with_capacity(4);
        if let Some(c) = self.foreground {
            out.push(Attribute::Foreground(c));
        }
        if let Some(c) = self.background {
            out.push(Attribute::Background(c));
        }
        if let Some(s) = self.font_style {
            out.push(Attribute::FontStyle(s));
        }
        if let Some(f) = &self.font {
            out.push(Attribute::Font(f.clone()));
        }
        out
    }
}
