//! Structural summary of a tokenized line: bracket balance and comment nesting.
//!
//! Classification goes by the usual scope naming conventions of TextMate grammars, eg
//! `punctuation.section.parens.begin` or `punctuation.definition.comment.end`, and falls back
//! to the token text for punctuation that doesn't say which bracket it is.

use std::sync::LazyLock;

use crate::scope::Scope;
use crate::tokenizer::{ParseState, Token};

/// The structural role of a token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    RoundOpen,
    RoundClose,
    SquareOpen,
    SquareClose,
    CurlyOpen,
    CurlyClose,
    CommentOpen,
    CommentClose,
}

struct Atoms {
    punctuation: u16,
    comment: u16,
    begin: u16,
    end: u16,
    round: [u16; 3],
    square: [u16; 3],
    curly: [u16; 3],
}

static ATOMS: LazyLock<Atoms> = LazyLock::new(|| Atoms {
    punctuation: Scope::atom("punctuation"),
    comment: Scope::atom("comment"),
    begin: Scope::atom("begin"),
    end: Scope::atom("end"),
    round: [
        Scope::atom("parens"),
        Scope::atom("parenthesis"),
        Scope::atom("round"),
    ],
    square: [
        Scope::atom("brackets"),
        Scope::atom("bracket"),
        Scope::atom("square"),
    ],
    curly: [
        Scope::atom("braces"),
        Scope::atom("brace"),
        Scope::atom("curly"),
    ],
});

#[derive(Copy, Clone)]
enum Bracket {
    Round,
    Square,
    Curly,
}

impl TokenKind {
    /// Classifies a token, `text` being the text it covers.
    /// The innermost scope that looks like an opening or closing punctuation decides.
    pub fn classify(token: &Token, text: &str) -> Option<TokenKind> {
        token
            .scopes
            .iter()
            .rev()
            .find_map(|scope| Self::classify_scope(*scope, text))
    }

    fn classify_scope(scope: Scope, text: &str) -> Option<TokenKind> {
        let atoms = &*ATOMS;
        if scope.len() < 2 || scope.atom_at(0) != atoms.punctuation {
            return None;
        }
        // Usually followed by a language suffix, eg `punctuation.section.parens.begin.c`
        let opening = scope.atoms().skip(1).find_map(|a| match a {
            a if a == atoms.begin => Some(true),
            a if a == atoms.end => Some(false),
            _ => None,
        })?;

        let mut bracket = None;
        for atom in scope.atoms() {
            if atom == atoms.comment {
                return Some(if opening {
                    TokenKind::CommentOpen
                } else {
                    TokenKind::CommentClose
                });
            }
            if atoms.round.contains(&atom) {
                bracket = Some(Bracket::Round);
            } else if atoms.square.contains(&atom) {
                bracket = Some(Bracket::Square);
            } else if atoms.curly.contains(&atom) {
                bracket = Some(Bracket::Curly);
            }
        }

        let bracket = bracket.or(match text.trim() {
            "(" | ")" => Some(Bracket::Round),
            "[" | "]" => Some(Bracket::Square),
            "{" | "}" => Some(Bracket::Curly),
            _ => None,
        })?;

        Some(match (bracket, opening) {
            (Bracket::Round, true) => TokenKind::RoundOpen,
            (Bracket::Round, false) => TokenKind::RoundClose,
            (Bracket::Square, true) => TokenKind::SquareOpen,
            (Bracket::Square, false) => TokenKind::SquareClose,
            (Bracket::Curly, true) => TokenKind::CurlyOpen,
            (Bracket::Curly, false) => TokenKind::CurlyClose,
        })
    }
}

/// Per-line summary kept next to the tokens of the line.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    /// Comments open when the line starts
    pub comment_depth_start: usize,
    /// Comments open when the line ends
    pub comment_depth_end: usize,
    /// Opening minus closing round brackets
    pub round_bracket_diff: i32,
    pub square_bracket_diff: i32,
    pub curly_bracket_diff: i32,
}

impl LineInfo {
    pub fn from_tokens(
        tokens: &[Token],
        line: &str,
        start_state: &ParseState,
        end_state: &ParseState,
    ) -> Self {
        let mut info = LineInfo {
            comment_depth_start: start_state.comment_depth(),
            comment_depth_end: end_state.comment_depth(),
            ..Default::default()
        };

        for token in tokens {
            let text = line.get(token.span.clone()).unwrap_or_default();
            match TokenKind::classify(token, text) {
                Some(TokenKind::RoundOpen) => info.round_bracket_diff += 1,
                Some(TokenKind::RoundClose) => info.round_bracket_diff -= 1,
                Some(TokenKind::SquareOpen) => info.square_bracket_diff += 1,
                Some(TokenKind::SquareClose) => info.square_bracket_diff -= 1,
                Some(TokenKind::CurlyOpen) => info.curly_bracket_diff += 1,
                Some(TokenKind::CurlyClose) => info.curly_bracket_diff -= 1,
                Some(TokenKind::CommentOpen) | Some(TokenKind::CommentClose) | None => {}
            }
        }

        info
    }

    /// Whether the line leaves the bracket and comment nesting as it found it
    pub fn is_balanced(&self) -> bool {
        self.comment_depth_start == self.comment_depth_end
            && self.round_bracket_diff == 0
            && self.square_bracket_diff == 0
            && self.curly_bracket_diff == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::grammars::Grammar;
    use crate::tokenizer::Tokenizer;

    fn token(scopes: &str) -> Token {
        Token {
            span: 0..1,
            scopes: Scope::parse_names(scopes),
        }
    }

    #[test]
    fn classifies_by_scope_convention() {
        let cases = vec![
            ("source.c punctuation.section.parens.begin", "(", Some(TokenKind::RoundOpen)),
            ("source.c punctuation.section.parens.end", ")", Some(TokenKind::RoundClose)),
            ("source.c punctuation.section.brackets.begin", "[", Some(TokenKind::SquareOpen)),
            ("source.c punctuation.section.braces.end", "}", Some(TokenKind::CurlyClose)),
            ("source.c punctuation.definition.comment.begin", "/*", Some(TokenKind::CommentOpen)),
            ("source.c punctuation.definition.comment.end", "*/", Some(TokenKind::CommentClose)),
            // no bracket name: the text decides
            ("source.c punctuation.section.block.begin", "{", Some(TokenKind::CurlyOpen)),
            ("source.c punctuation.section.block.begin", "do", None),
            ("source.c punctuation.section.parens.begin.c", "(", Some(TokenKind::RoundOpen)),
            ("source.js punctuation.definition.comment.end.js", "*/", Some(TokenKind::CommentClose)),
            (
                "source.c punctuation.section.block.begin.bracket.curly.c",
                "{",
                Some(TokenKind::CurlyOpen),
            ),
            (
                "source.c punctuation.section.brackets.end.bracket.square.c",
                "]",
                Some(TokenKind::SquareClose),
            ),
            ("source.c punctuation.separator", ",", None),
            ("source.c keyword.control.begin", "(", None),
            ("source.c meta.parens", "(", None),
        ];

        for (scopes, text, expected) in cases {
            assert_eq!(TokenKind::classify(&token(scopes), text), expected, "{scopes}");
        }
    }

    #[test]
    fn innermost_punctuation_wins() {
        let t = token("source.c punctuation.section.parens.begin punctuation.definition.comment.end");
        assert_eq!(TokenKind::classify(&t, "x"), Some(TokenKind::CommentClose));
    }

    #[test]
    fn summarizes_a_line() {
        let grammar = Grammar::from_str(
            r#"{"scopeName":"source.test","patterns":[
                {"match":"\\(","name":"punctuation.section.parens.begin"},
                {"match":"\\)","name":"punctuation.section.parens.end"},
                {"match":"\\{","name":"punctuation.section.block.begin"},
                {"begin":"/\\*","end":"\\*/","name":"comment.block",
                 "captures":{"0":{"name":"punctuation.definition.comment"}}}
            ]}"#,
        )
        .unwrap();
        let mut tokenizer = Tokenizer::new(Arc::new(grammar));
        let line = "f(a)) { /* open";
        let start = tokenizer.initial_state();
        let (tokens, end) = tokenizer.tokenize_line(line, &start, true);

        let info = LineInfo::from_tokens(&tokens, line, &start, &end);
        assert_eq!(
            info,
            LineInfo {
                comment_depth_start: 0,
                comment_depth_end: 1,
                round_bracket_diff: -1,
                square_bracket_diff: 0,
                curly_bracket_diff: 1,
            }
        );
        assert!(!info.is_balanced());
    }

    #[test]
    fn counts_brackets_with_language_suffixes() {
        let grammar = Grammar::from_str(
            r#"{"scopeName":"source.c","patterns":[
                {"match":"\\(","name":"punctuation.section.parens.begin.c"},
                {"match":"\\{","name":"punctuation.section.block.begin.bracket.curly.c"}
            ]}"#,
        )
        .unwrap();
        let mut tokenizer = Tokenizer::new(Arc::new(grammar));
        let line = "f(( {";
        let start = tokenizer.initial_state();
        let (tokens, end) = tokenizer.tokenize_line(line, &start, true);
        assert_eq!(tokens.len(), 3);

        let info = LineInfo::from_tokens(&tokens, line, &start, &end);
        assert_eq!(info.round_bracket_diff, 2);
        assert_eq!(info.curly_bracket_diff, 1);
    }
}
