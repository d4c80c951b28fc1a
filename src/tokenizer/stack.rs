use std::fmt;
use std::sync::LazyLock;

use crate::grammars::RuleId;
use crate::scope::Scope;

static COMMENT: LazyLock<Scope> = LazyLock::new(|| Scope::new("comment"));

/// Whether a rule with those name scopes opens a comment
pub(crate) fn is_comment(name_scopes: &[Scope]) -> bool {
    name_scopes.iter().any(|s| COMMENT.is_prefix_of(*s))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// The rule that pushed this frame: a begin/end rule, or a capture with patterns
    pub rule: RuleId,
    /// "name" scopes - applied to begin/end delimiters
    pub name_scopes: Vec<Scope>,
    /// "contentName" scopes - applied to content between delimiters
    pub content_scopes: Vec<Scope>,
    /// `end` pattern with its back-references replaced by the `begin` captures.
    /// Only set when the end pattern has back-references.
    pub end_pattern: Option<String>,
    /// The `begin` match consumed the end of line.
    /// This means that the next line should start with an anchor_position of 0.
    pub begin_captured_eol: bool,
    /// Where \G can match while this frame is on top, only within the current line
    pub anchor_position: Option<usize>,
    /// The position where this rule was entered during current line (for infinite loop detection)
    /// None at beginning of a line
    pub enter_position: Option<usize>,
    /// The rule is a comment and counts for the comment depth
    pub comment: bool,
}

/// What is still open at the end of a line: the stack of regions we are in.
///
/// Two states are equal if they have the same regions, with the same instantiated `end`
/// patterns, open. This is how re-highlighting after an edit knows it can stop.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseState {
    /// Scopes of the grammar itself, applied to everything
    base_scopes: Vec<Scope>,
    frames: Vec<Frame>,
    comment_depth: usize,
}

impl ParseState {
    pub fn new(grammar_scope: Scope) -> Self {
        Self {
            base_scopes: vec![grammar_scope],
            frames: Vec::new(),
            comment_depth: 0,
        }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of open regions
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of open comment regions
    pub fn comment_depth(&self) -> usize {
        self.comment_depth
    }

    pub fn is_top_level(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn name_scopes(&self) -> &[Scope] {
        self.top().map_or(&self.base_scopes, |f| &f.name_scopes)
    }

    pub fn content_scopes(&self) -> &[Scope] {
        self.top().map_or(&self.base_scopes, |f| &f.content_scopes)
    }

    pub(crate) fn push(
        &mut self,
        rule: RuleId,
        anchor_position: Option<usize>,
        begin_captured_eol: bool,
        enter_position: Option<usize>,
        scopes: Vec<Scope>,
        comment: bool,
    ) {
        self.push_frame(Frame {
            rule,
            name_scopes: scopes.clone(),
            content_scopes: scopes,
            end_pattern: None,
            begin_captured_eol,
            anchor_position,
            enter_position,
            comment,
        });
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        if frame.comment {
            self.comment_depth += 1;
        }
        self.frames.push(frame);
    }

    /// Exits the current region, getting back to the parent.
    pub(crate) fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        if frame.comment {
            self.comment_depth -= 1;
        }
        Some(frame)
    }

    pub(crate) fn set_content_scopes(&mut self, content_scopes: Vec<Scope>) {
        if let Some(top) = self.frames.last_mut() {
            top.content_scopes = content_scopes;
        }
    }

    pub(crate) fn set_end_pattern(&mut self, end_pattern: String) {
        if let Some(top) = self.frames.last_mut() {
            top.end_pattern = Some(end_pattern);
        }
    }

    /// Whether `rule` was already entered at `pos` without anything consumed since.
    /// Pushing it again would loop forever.
    pub(crate) fn has_entered_at(&self, rule: RuleId, pos: usize) -> bool {
        self.frames
            .iter()
            .rev()
            .take_while(|f| f.enter_position == Some(pos))
            .any(|f| f.rule == rule)
    }

    /// Positions only make sense within a line: resets them for all frames
    pub(crate) fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.enter_position = None;
            frame.anchor_position = None;
        }
    }
}

impl fmt::Debug for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ParseState (comment_depth={}):", self.comment_depth)?;

        for (depth, frame) in self.frames.iter().enumerate() {
            let indent = "  ".repeat(depth);
            write!(f, "{indent}rule={}", frame.rule.0)?;

            if !frame.name_scopes.is_empty() {
                let names: Vec<String> = frame.name_scopes.iter().map(|s| s.build_string()).collect();
                write!(f, " name=[{}]", names.join(", "))?;
            }

            if !frame.content_scopes.is_empty() {
                let names: Vec<String> =
                    frame.content_scopes.iter().map(|s| s.build_string()).collect();
                write!(f, ", content=[{}]", names.join(", "))?;
            }

            if let Some(pattern) = &frame.end_pattern {
                write!(f, ", end_pattern=\"{}\"", pattern)?;
            }

            write!(f, ", anchor_pos={:?}", frame.anchor_position)?;

            if let Some(enter_pos) = frame.enter_position
                && frame.anchor_position != Some(enter_pos)
            {
                write!(f, ", enter_pos={}", enter_pos)?;
            }

            writeln!(f, ", begin_captured_eol={}", frame.begin_captured_eol)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(names: &str) -> Vec<Scope> {
        Scope::parse_names(names)
    }

    #[test]
    fn push_and_pop_track_comment_depth() {
        let mut state = ParseState::new(Scope::new("source.test"));
        assert!(state.is_top_level());
        state.push(RuleId(1), None, false, Some(0), scopes("source.test comment.block"), true);
        state.push(RuleId(1), None, false, Some(2), scopes("source.test comment.block"), true);
        state.push(RuleId(2), None, false, Some(4), scopes("source.test string"), false);
        assert_eq!(state.comment_depth(), 2);
        assert_eq!(state.depth(), 3);

        state.pop();
        state.pop();
        assert_eq!(state.comment_depth(), 1);
        state.pop();
        assert_eq!(state.comment_depth(), 0);
        assert!(state.pop().is_none());
        assert_eq!(state.content_scopes(), &[Scope::new("source.test")]);
    }

    #[test]
    fn equality_ignores_positions_after_reset() {
        let mut a = ParseState::new(Scope::new("source.test"));
        let mut b = a.clone();
        a.push(RuleId(1), Some(3), false, Some(3), scopes("source.test string"), false);
        b.push(RuleId(1), Some(7), false, Some(5), scopes("source.test string"), false);
        assert_ne!(a, b);
        a.reset();
        b.reset();
        assert_eq!(a, b);

        b.set_end_pattern("EOF".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn detects_reentering_at_same_position() {
        let mut state = ParseState::new(Scope::new("source.test"));
        state.push(RuleId(1), None, false, Some(0), Vec::new(), false);
        state.push(RuleId(2), None, false, Some(4), Vec::new(), false);
        assert!(state.has_entered_at(RuleId(2), 4));
        // only frames entered at that position count
        assert!(!state.has_entered_at(RuleId(1), 4));
    }

    #[test]
    fn recognizes_comment_scopes() {
        assert!(is_comment(&scopes("comment.block.c")));
        assert!(is_comment(&scopes("meta.embedded comment.line")));
        assert!(!is_comment(&scopes("commentary string")));
    }
}
