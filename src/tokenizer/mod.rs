//! This file follows the logic of <https://github.com/microsoft/vscode-textmate>

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::grammars::{
    Candidate, Captures, Grammar, PatternSet, Rule, RuleId, RuleResolver, resolve_backreferences,
};
use crate::scope::Scope;
use crate::tokenizer::anchors::AnchorActive;

mod anchors;
mod stack;

pub use stack::{Frame, ParseState};
pub(crate) use stack::is_comment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte span within the line (start inclusive, end exclusive, 0-based)
    pub span: Range<usize>,
    /// Hierarchical scope names, ordered from outermost to innermost
    /// (e.g., source.js -> string.quoted.double -> punctuation.definition.string).
    pub scopes: Vec<Scope>,
}

impl Token {
    /// The innermost scope
    pub fn scope(&self) -> Scope {
        self.scopes.last().copied().unwrap_or_default()
    }

    /// Whether one of the scopes is `scope` or a child of it
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.iter().any(|s| scope.is_prefix_of(*s))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.span.start, self.span.end)?;
        for scope in &self.scopes {
            write!(f, " {scope}")?;
        }
        Ok(())
    }
}

/// Small wrapper so we make we only produce valid tokens.
/// Called in the tokenizer a few times and easier to use a struct than pass
/// mutable vec and usize everywhere
#[derive(Debug, Clone, Default)]
struct TokenAccumulator {
    tokens: Vec<Token>,
    /// Position up to which tokens have been generated
    /// (start of next token to be produced)
    last_end_pos: usize,
}

impl TokenAccumulator {
    fn starting_at(pos: usize) -> Self {
        Self {
            tokens: Vec::new(),
            last_end_pos: pos,
        }
    }

    fn produce(&mut self, end_pos: usize, scopes: &[Scope]) {
        // Skip empty tokens (can happen with zero-width matches)
        if self.last_end_pos >= end_pos {
            return;
        }

        #[cfg(feature = "debug")]
        log::trace!(
            "[produce]: [{}..{end_pos}] {}",
            self.last_end_pos,
            scopes
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        self.tokens.push(Token {
            span: self.last_end_pos..end_pos,
            scopes: scopes.to_vec(),
        });

        self.last_end_pos = end_pos;
    }

    /// Removes the newline we added to the line and the spans that only carry
    /// the grammar scope.
    fn finalize(mut self, line_len: usize, base_scopes: &[Scope]) -> Vec<Token> {
        // Pop the token for the added newline if there is one
        if let Some(tok) = self.tokens.last()
            && tok.span.start == line_len - 1
        {
            self.tokens.pop();
        }

        // If we have a token that includes the trailing newline,
        // decrement the end to not include it
        if let Some(t) = self.tokens.last_mut()
            && t.span.end == line_len
        {
            t.span.end -= 1;
        }

        self.tokens.retain(|t| t.scopes.as_slice() != base_scopes);
        self.tokens
    }
}

/// Which pattern set to use: it depends on the rule we are in, the instantiated end pattern
/// and which anchors can match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PatternSetKey {
    /// `None` at the top level of the grammar
    rule: Option<RuleId>,
    /// Only set for end patterns with back-references
    end_pattern: Option<String>,
    anchors: AnchorActive,
}

/// Tokenizes lines of text with a given grammar.
///
/// A tokenizer is cheap to create but keeps the compiled pattern sets around, so it should
/// be kept for the lifetime of a document.
#[derive(Debug)]
pub struct Tokenizer {
    grammar: Arc<Grammar>,
    resolver: RuleResolver,
    pattern_cache: HashMap<PatternSetKey, PatternSet>,
}

impl Tokenizer {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self {
            resolver: RuleResolver::new(&grammar),
            grammar,
            pattern_cache: HashMap::new(),
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// The state of the first line of a document
    pub fn initial_state(&self) -> ParseState {
        ParseState::new(self.grammar.scope)
    }

    /// Tokenizes a single line, without its line terminator, starting from `state`.
    ///
    /// Returns the tokens of the line, spans not matched by any rule excluded, and the state
    /// for the next line. The same line and state always give the same result.
    pub fn tokenize_line(
        &mut self,
        line: &str,
        state: &ParseState,
        is_first_line: bool,
    ) -> (Vec<Token>, ParseState) {
        // Always add a new line, some regex expect it
        let line = format!("{line}\n");
        let anchor_position = match state.top() {
            Some(frame) if frame.begin_captured_eol => Some(0),
            _ => None,
        };

        let (acc, mut end_state) =
            self.scan(state.clone(), &line, 0, is_first_line, anchor_position);
        end_state.reset();

        let base_scopes = [self.grammar.scope];
        (acc.finalize(line.len(), &base_scopes), end_state)
    }

    /// Tokenizes a whole text, returning the tokens of each line
    pub fn tokenize_string(&mut self, text: &str) -> Vec<Vec<Token>> {
        let mut state = self.initial_state();
        let mut lines_tokens = Vec::new();

        for (i, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let (tokens, next) = self.tokenize_line(line, &state, i == 0);
            lines_tokens.push(tokens);
            state = next;
        }

        lines_tokens
    }

    fn pattern_set(&mut self, state: &ParseState, anchors: AnchorActive) -> &PatternSet {
        let top = state.top();
        let key = PatternSetKey {
            rule: top.map(|f| f.rule),
            end_pattern: top.and_then(|f| f.end_pattern.clone()),
            anchors,
        };

        if !self.pattern_cache.contains_key(&key) {
            let grammar = &*self.grammar;
            let rules = match key.rule {
                Some(rule) => self.resolver.resolve(grammar, rule),
                None => self.resolver.root(grammar),
            };

            let mut patterns = Vec::with_capacity(rules.len() + 1);
            // The end pattern goes first: it wins over the region patterns on ties
            if let Some(rule) = key.rule
                && let Rule::BeginEnd(b) = grammar.rule(rule)
            {
                let end = key
                    .end_pattern
                    .as_deref()
                    .unwrap_or_else(|| grammar.regex(b.end).pattern());
                patterns.push((Candidate::End, anchors.replace_anchors(end).into_owned()));
            }
            for id in rules.iter() {
                if let Some(re) = grammar.leading_regex(*id) {
                    patterns.push((
                        Candidate::Rule(*id),
                        anchors.replace_anchors(re.pattern()).into_owned(),
                    ));
                }
            }

            #[cfg(feature = "debug")]
            log::trace!(
                "[pattern_set] Compiling {} patterns for {:?} ({anchors:?})",
                patterns.len(),
                key.rule
            );

            let set = PatternSet::new(patterns).unwrap_or_else(|e| {
                log::error!("Failed to compile pattern set, ignoring its rules: {e}");
                PatternSet::empty()
            });
            self.pattern_cache.insert(key.clone(), set);
        }

        &self.pattern_cache[&key]
    }

    fn resolve_captures(
        &mut self,
        state: &ParseState,
        line: &str,
        rule_captures: &Captures,
        captures: &[Option<(usize, usize)>],
        accumulator: &mut TokenAccumulator,
        is_first_line: bool,
    ) {
        if rule_captures.is_empty() {
            return;
        }
        let grammar = self.grammar.clone();

        // (scopes, end_pos)[]
        let mut local_stack: Vec<(Vec<Scope>, usize)> = Vec::with_capacity(2);

        for &(index, capture_rule) in rule_captures.iter() {
            let Some(&Some((cap_start, cap_end))) = captures.get(index) else {
                continue;
            };
            // Nothing captured
            if cap_start == cap_end {
                continue;
            }

            // pop captures while needed
            while let Some((scopes, end_pos)) = local_stack.last()
                && *end_pos <= cap_start
            {
                accumulator.produce(*end_pos, scopes);
                local_stack.pop();
            }

            let base = match local_stack.last() {
                Some((scopes, _)) => scopes.clone(),
                None => state.content_scopes().to_vec(),
            };
            accumulator.produce(cap_start, &base);

            let rule = grammar.rule(capture_rule);
            let mut scopes = base;
            scopes.extend_from_slice(rule.name_scopes());

            // Captures with patterns re-tokenize the captured text with them
            if rule.has_patterns() {
                let mut sub_state = state.clone();
                sub_state.push(capture_rule, None, false, Some(cap_start), scopes, false);

                #[cfg(feature = "debug")]
                log::trace!(
                    "[resolve_captures] Retokenizing capture {index} at [{cap_start}..{cap_end}]: {:?}",
                    &line[cap_start..cap_end]
                );
                let (retokenized, _) = self.scan(
                    sub_state,
                    &line[..cap_end],
                    cap_start,
                    is_first_line && cap_start == 0,
                    None,
                );

                for token in retokenized.tokens {
                    accumulator.produce(token.span.end, &token.scopes);
                }
                continue;
            }

            if !rule.name_scopes().is_empty() {
                local_stack.push((scopes, cap_end));
            }
        }

        while let Some((scopes, end_pos)) = local_stack.pop() {
            accumulator.produce(end_pos, &scopes);
        }
    }

    fn scan(
        &mut self,
        mut state: ParseState,
        line: &str,
        line_pos: usize,
        is_first_line: bool,
        anchor_position: Option<usize>,
    ) -> (TokenAccumulator, ParseState) {
        let grammar = self.grammar.clone();
        let mut accumulator = TokenAccumulator::starting_at(line_pos);
        let mut pos = line_pos;
        let mut anchor_position = anchor_position;
        let mut is_first_line = is_first_line;

        loop {
            #[cfg(feature = "debug")]
            log::trace!("[scan] Scanning {pos}: |{:?}|", &line[pos..]);

            let anchors = AnchorActive::new(is_first_line, anchor_position, pos);
            let Some(m) = self.pattern_set(&state, anchors).find_at(line, pos) else {
                #[cfg(feature = "debug")]
                log::trace!("[scan] no more matches");
                accumulator.produce(line.len(), state.content_scopes());
                break;
            };

            // Track whether this match has advanced the position
            let has_advanced = m.end > pos;

            match m.candidate {
                Candidate::End => {
                    let Some(top) = state.top() else {
                        break;
                    };
                    let Rule::BeginEnd(rule) = grammar.rule(top.rule) else {
                        break;
                    };
                    let popped_enter_position = top.enter_position;
                    let popped_anchor_position = top.anchor_position;

                    #[cfg(feature = "debug")]
                    log::trace!("[scan] End matched at {}..{}, popping {:?}", m.start, m.end, top.rule);

                    accumulator.produce(m.start, state.content_scopes());
                    state.set_content_scopes(state.name_scopes().to_vec());
                    self.resolve_captures(
                        &state,
                        line,
                        &rule.end_captures,
                        &m.capture_pos,
                        &mut accumulator,
                        is_first_line,
                    );
                    accumulator.produce(m.end, state.content_scopes());

                    let popped = state.pop();
                    anchor_position = popped_anchor_position;

                    // Grammar pushed & popped a rule without advancing: the region stays open
                    // and takes the rest of the line.
                    // See https://github.com/Microsoft/vscode-textmate/issues/12
                    if !has_advanced && popped_enter_position == Some(pos) {
                        if let Some(frame) = popped {
                            state.push_frame(frame);
                        }
                        accumulator.produce(line.len(), state.content_scopes());
                        break;
                    }
                }
                Candidate::Rule(id) => {
                    let rule = grammar.rule(id);
                    accumulator.produce(m.start, state.content_scopes());
                    let mut scopes = state.content_scopes().to_vec();
                    scopes.extend_from_slice(rule.name_scopes());

                    match rule {
                        Rule::BeginEnd(r) => {
                            if !has_advanced && state.has_entered_at(id, pos) {
                                log::debug!(
                                    "Rule {id:?} entered twice at {pos} without advancing, stopping"
                                );
                                accumulator.produce(line.len(), state.content_scopes());
                                break;
                            }

                            #[cfg(feature = "debug")]
                            log::trace!("[scan] Pushing begin rule {id:?} at {}..{}", m.start, m.end);

                            state.push(
                                id,
                                anchor_position,
                                m.end == line.len(),
                                Some(pos),
                                scopes,
                                is_comment(&r.name),
                            );
                            self.resolve_captures(
                                &state,
                                line,
                                &r.begin_captures,
                                &m.capture_pos,
                                &mut accumulator,
                                is_first_line,
                            );
                            accumulator.produce(m.end, state.content_scopes());
                            anchor_position = Some(m.end);

                            let mut content_scopes = state.name_scopes().to_vec();
                            content_scopes.extend_from_slice(&r.content_name);
                            state.set_content_scopes(content_scopes);

                            let end = grammar.regex(r.end);
                            if end.has_backreferences() {
                                state.set_end_pattern(resolve_backreferences(
                                    end.pattern(),
                                    line,
                                    &m.capture_pos,
                                ));
                            }
                        }
                        Rule::Match(r) => {
                            state.push(id, anchor_position, false, Some(pos), scopes, false);
                            self.resolve_captures(
                                &state,
                                line,
                                &r.captures,
                                &m.capture_pos,
                                &mut accumulator,
                                is_first_line,
                            );
                            accumulator.produce(m.end, state.content_scopes());
                            // pop rule immediately since it is a MatchRule
                            state.pop();

                            // An empty match consumes nothing: skip a character so we
                            // always make progress
                            if !has_advanced {
                                let Some(c) = line[pos..].chars().next() else {
                                    accumulator.produce(line.len(), state.content_scopes());
                                    break;
                                };
                                pos += c.len_utf8();
                                is_first_line = false;
                                continue;
                            }
                        }
                        Rule::Include(_) | Rule::Capture(_) => {
                            unreachable!("only match and begin/end rules are matched")
                        }
                    }
                }
            }

            if has_advanced {
                pos = m.end;
                is_first_line = false;
            }
        }

        (accumulator, state)
    }
}
