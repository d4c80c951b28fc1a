use std::fmt;
use std::io;

pub(crate) type OcraResult<T> = Result<T, Error>;

/// Errors that can occur while loading grammars and themes.
///
/// Tokenizing and re-highlighting never fail: once a grammar is loaded, every line can be
/// tokenized, at worst into plain unscoped text.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred when reading a grammar or theme file
    Io(io::Error),

    /// JSON parsing failed when loading a grammar or a theme.
    Json(serde_json::Error),

    /// A `match`, `begin` or `end` regex of a grammar does not compile.
    /// Grammars are static assets so this is a defect of the grammar file itself.
    #[allow(missing_docs)]
    InvalidRegex { pattern: String, reason: String },

    /// The grammar has no `scopeName`. Callers are expected to fall back to plain text.
    MissingScopeName,

    /// An invalid hex color was encountered.
    /// Can only happen when loading a theme.
    #[allow(missing_docs)]
    InvalidHexColor { value: String, reason: String },

    /// The theme JSON doesn't look like any of the supported theme dialects.
    UnknownThemeFormat,

    /// A theme was not found in the registry.
    ThemeNotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            Error::InvalidRegex { pattern, reason } => {
                write!(f, "invalid regex '{}': {}", pattern, reason)
            }
            Error::MissingScopeName => write!(f, "grammar has no scopeName"),
            Error::InvalidHexColor { value, reason } => {
                write!(f, "invalid hex color '{}': {}", value, reason)
            }
            Error::UnknownThemeFormat => write!(f, "unrecognized theme format"),
            Error::ThemeNotFound(name) => write!(f, "theme '{}' not found", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::InvalidRegex { .. }
            | Error::MissingScopeName
            | Error::InvalidHexColor { .. }
            | Error::UnknownThemeFormat
            | Error::ThemeNotFound(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
