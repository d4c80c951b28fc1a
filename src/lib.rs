mod error;
pub mod grammars;
mod registry;
mod scope;
pub mod themes;

mod highlight;
mod line_info;
mod tokenizer;

pub use error::Error;
pub use grammars::Grammar;
pub use highlight::{BracketDepth, Highlighter, StyledSpan, TokenSnapshot};
pub use line_info::{LineInfo, TokenKind};
pub use registry::Registry;
pub use scope::Scope;
pub use themes::{Attribute, Color, FontStyle, Theme, ThemeTrie};
pub use tokenizer::{Frame, ParseState, Token, Tokenizer};
