use std::ops::Range;
use std::sync::Arc;

use crate::grammars::Grammar;
use crate::line_info::LineInfo;
use crate::scope::Scope;
use crate::themes::{Attribute, ThemeTrie};
use crate::tokenizer::{ParseState, Token, Tokenizer};

/// Splits `text` on `\n`, giving the byte range of each line without its terminator,
/// offset by `base`. There is always at least one line.
fn split_lines(text: &str, base: usize) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            out.push(base + start..base + i);
            start = i + 1;
        }
    }
    out.push(base + start..base + text.len());
    out
}

/// A span of a line with the attributes the theme gives it
#[derive(Debug, Clone, PartialEq)]
pub struct StyledSpan {
    /// Byte span within the line
    pub span: Range<usize>,
    pub attributes: Vec<Attribute>,
}

/// Cumulated bracket balance at the end of a line
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BracketDepth {
    pub round: i32,
    pub square: i32,
    pub curly: i32,
}

/// The tokens of some lines at a given point in time, to be rendered later.
///
/// Check [`Highlighter::is_current`] before using it: any edit made since the snapshot was
/// taken makes it stale.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSnapshot {
    generation: u64,
    /// Lines covered by the snapshot
    pub lines: Range<usize>,
    /// Tokens for each line of `lines`
    pub tokens: Vec<Vec<Token>>,
}

/// Highlighting of a whole document, kept up to date as it is edited.
///
/// For every line we cache the parse state entering it, its tokens and its [`LineInfo`]. An
/// edit only re-tokenizes the lines it touched, and the following ones as long as the state
/// they start with is different from before the edit.
///
/// Edits take `&mut self`: a document has a single writer and nothing can observe the caches
/// while they are being updated. Distinct documents can be highlighted on different threads,
/// sharing the same [`Grammar`].
#[derive(Debug)]
pub struct Highlighter {
    tokenizer: Tokenizer,
    text: String,
    /// Byte range of each line in `text`, without the `\n`
    lines: Vec<Range<usize>>,
    /// `states[i]` is the state entering line `i`, there is one more state than lines
    states: Vec<Option<ParseState>>,
    tokens: Vec<Option<Vec<Token>>>,
    line_info: Vec<Option<LineInfo>>,
    /// Bumped on every edit
    generation: u64,
}

impl Highlighter {
    pub fn new(grammar: Arc<Grammar>, text: impl Into<String>) -> Self {
        let mut highlighter = Self {
            tokenizer: Tokenizer::new(grammar),
            text: String::new(),
            lines: Vec::new(),
            states: Vec::new(),
            tokens: Vec::new(),
            line_info: Vec::new(),
            generation: 0,
        };
        highlighter.set_text(text);
        highlighter
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        self.tokenizer.grammar()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Byte range of the line in the document, without its terminator
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        self.lines.get(line).cloned()
    }

    /// Text of the line without its terminator
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let range = self.lines.get(line)?;
        let text = &self.text[range.clone()];
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Replaces the whole document
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.lines = split_lines(&self.text, 0);
        self.retokenize_all();
    }

    /// Drops every cache and tokenizes the whole document again.
    /// Returns the range of lines processed, ie all of them.
    pub fn retokenize_all(&mut self) -> Range<usize> {
        let count = self.lines.len();
        self.states = vec![None; count + 1];
        self.states[0] = Some(self.tokenizer.initial_state());
        self.tokens = vec![None; count];
        self.line_info = vec![None; count];
        self.generation += 1;

        for line in 0..count {
            self.process_line(line);
        }
        0..count
    }

    /// Replaces the bytes in `range` with `replacement` and re-highlights what needs to be.
    ///
    /// Returns the range of lines that got re-tokenized, in the document after the edit:
    /// everything in there needs to be displayed again.
    ///
    /// # Panics
    /// If `range` is out of bounds or not on char boundaries.
    pub fn edit(&mut self, range: Range<usize>, replacement: &str) -> Range<usize> {
        assert!(
            range.start <= range.end
                && self.text.is_char_boundary(range.start)
                && self.text.is_char_boundary(range.end),
            "invalid edit range {range:?} for a document of {} bytes",
            self.text.len()
        );

        let first = self.line_of(range.start);
        let old_last = self.line_of(range.end);
        let old_line_count = self.lines.len();
        let removed = range.end - range.start;

        // Text of the lines touched, terminator of the last one included
        let region_start = self.lines[first].start;
        let region_is_last = old_last + 1 == old_line_count;
        let old_region_end = if region_is_last {
            self.text.len()
        } else {
            self.lines[old_last + 1].start
        };
        let new_region_end = old_region_end + replacement.len() - removed;

        self.text.replace_range(range, replacement);

        let mut new_lines = split_lines(&self.text[region_start..new_region_end], region_start);
        if !region_is_last {
            // the region ends with the `\n` of its last line
            new_lines.pop();
        }
        let new_count = new_lines.len();
        let new_last = first + new_count - 1;

        for line in &mut self.lines[old_last + 1..] {
            line.start = line.start + replacement.len() - removed;
            line.end = line.end + replacement.len() - removed;
        }
        self.lines.splice(first..=old_last, new_lines);

        // Cached values for the lines touched are gone. The state entering the first line is
        // still good, and the one after the last is what we compare against to know when to stop.
        self.tokens
            .splice(first..=old_last, std::iter::repeat_n(None, new_count));
        self.line_info
            .splice(first..=old_last, std::iter::repeat_n(None, new_count));
        self.states
            .splice(first + 1..=old_last, std::iter::repeat_n(None, new_count - 1));

        assert_eq!(self.tokens.len(), self.lines.len(), "token cache out of sync with lines");
        assert_eq!(self.line_info.len(), self.lines.len(), "line info cache out of sync with lines");
        assert_eq!(self.states.len(), self.lines.len() + 1, "state cache out of sync with lines");

        self.generation += 1;

        let mut line = first;
        loop {
            let previous = self.process_line(line);
            let converged = line >= new_last && previous.as_ref() == self.states[line + 1].as_ref();
            line += 1;
            if converged || line == self.lines.len() {
                break;
            }
        }

        log::debug!(
            "Edit touching lines {first}..={old_last} ({old_line_count} lines) re-tokenized lines {first}..{line}"
        );
        first..line
    }

    /// Tokenizes a line from the state cached for it, storing the state for the next line.
    /// Returns what was cached for the next line before.
    fn process_line(&mut self, line: usize) -> Option<ParseState> {
        let state = self.states[line]
            .as_ref()
            .expect("the state entering a line is computed before the line is processed");

        let range = self.lines[line].clone();
        let text = &self.text[range];
        let text = text.strip_suffix('\r').unwrap_or(text);

        let (tokens, end_state) = self.tokenizer.tokenize_line(text, state, line == 0);
        let info = LineInfo::from_tokens(&tokens, text, state, &end_state);

        self.tokens[line] = Some(tokens);
        self.line_info[line] = Some(info);
        self.states[line + 1].replace(end_state)
    }

    /// The line holding the byte at `offset`, a line terminator belonging to its line
    fn line_of(&self, offset: usize) -> usize {
        self.lines
            .partition_point(|l| l.start <= offset)
            .saturating_sub(1)
    }

    /// Tokens of a line, spans within the line
    pub fn line_tokens(&self, line: usize) -> Option<&[Token]> {
        self.tokens.get(line).map(|t| {
            t.as_deref()
                .expect("every line is tokenized after an edit")
        })
    }

    pub fn line_info(&self, line: usize) -> Option<LineInfo> {
        self.line_info.get(line).map(|i| i.expect("every line is tokenized after an edit"))
    }

    /// The parse state entering `line`. `line_count()` gives the state at the end of the document.
    pub fn state_at(&self, line: usize) -> Option<&ParseState> {
        self.states.get(line).and_then(|s| s.as_ref())
    }

    /// Bracket balance at the end of `line`, from the start of the document
    pub fn bracket_depth(&self, line: usize) -> BracketDepth {
        let last = line.min(self.lines.len().saturating_sub(1));
        let mut depth = BracketDepth::default();
        for info in self.line_info[..=last].iter().flatten() {
            depth.round += info.round_bracket_diff;
            depth.square += info.square_bracket_diff;
            depth.curly += info.curly_bracket_diff;
        }
        depth
    }

    /// All the text covered by `scope` (or a child of it), with its byte range in the document.
    ///
    /// Touching tokens of a line are merged: a string made of punctuation and content tokens is
    /// returned as a single span.
    pub fn tokens_in_scope(&self, scope: &str) -> Vec<(String, Range<usize>)> {
        let Some(scope) = Scope::find(scope) else {
            return Vec::new();
        };
        let mut out: Vec<(String, Range<usize>)> = Vec::new();

        for (line, range) in self.lines.iter().enumerate() {
            let Some(Some(tokens)) = self.tokens.get(line) else {
                continue;
            };
            let mut current: Option<Range<usize>> = None;
            for token in tokens.iter().filter(|t| t.has_scope(scope)) {
                let span = range.start + token.span.start..range.start + token.span.end;
                current = match current {
                    Some(c) if c.end == span.start => Some(c.start..span.end),
                    Some(c) => {
                        out.push((self.text[c.clone()].to_string(), c));
                        Some(span)
                    }
                    None => Some(span),
                };
            }
            if let Some(c) = current {
                out.push((self.text[c.clone()].to_string(), c));
            }
        }

        out
    }

    /// Copies the tokens of `lines`, clamped to the document
    pub fn snapshot(&self, lines: Range<usize>) -> TokenSnapshot {
        let end = lines.end.min(self.lines.len());
        let start = lines.start.min(end);
        let tokens = self.tokens[start..end]
            .iter()
            .map(|t| t.clone().unwrap_or_default())
            .collect();

        TokenSnapshot {
            generation: self.generation,
            lines: start..end,
            tokens,
        }
    }

    /// Whether no edit happened since the snapshot was taken
    pub fn is_current(&self, snapshot: &TokenSnapshot) -> bool {
        snapshot.generation == self.generation
    }

    /// Attributes for each token of a line: tokens without any theme rule get the
    /// document-wide defaults.
    pub fn styled_line(
        &self,
        line: usize,
        theme: &ThemeTrie,
        in_selection: bool,
    ) -> Vec<StyledSpan> {
        self.line_tokens(line)
            .unwrap_or_default()
            .iter()
            .map(|token| StyledSpan {
                span: token.span.clone(),
                attributes: theme.resolve_scopes(&token.scopes, in_selection),
            })
            .collect()
    }
}
