use std::fmt::{Debug, Formatter};

use onig::{RegSet, RegexOptions, SearchOptions};

use crate::error::{Error, OcraResult};
use crate::grammars::RuleId;

/// What a pattern of the set stands for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// The `end` pattern of the region we are in
    End,
    Rule(RuleId),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PatternSetMatch {
    pub candidate: Candidate,
    pub start: usize,
    pub end: usize,
    pub capture_pos: Vec<Option<(usize, usize)>>,
}

impl PatternSetMatch {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Every candidate pattern at a given point compiled in a single onig RegSet.
///
/// The search returns the leftmost match and, for matches starting at the same position, the
/// pattern coming first in the set. The order of the set is therefore the priority order.
pub struct PatternSet {
    candidates: Vec<Candidate>,
    regset: Option<RegSet>,
}

impl PatternSet {
    pub fn new(items: Vec<(Candidate, String)>) -> OcraResult<Self> {
        if items.is_empty() {
            return Ok(Self::empty());
        }

        let (candidates, patterns): (Vec<_>, Vec<_>) = items.into_iter().unzip();
        let pattern_strs: Vec<&str> = patterns.iter().map(|s| s.as_str()).collect();

        let regset = RegSet::with_options(&pattern_strs, RegexOptions::REGEX_OPTION_CAPTURE_GROUP)
            .map_err(|e| Error::InvalidRegex {
                pattern: pattern_strs.join(" | "),
                reason: e.to_string(),
            })?;

        Ok(Self {
            candidates,
            regset: Some(regset),
        })
    }

    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            regset: None,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub(crate) fn find_at(&self, text: &str, pos: usize) -> Option<PatternSetMatch> {
        let regset = self.regset.as_ref()?;

        // The whole text is given rather than a slice so look-behinds see what's before `pos`
        let (pattern_index, captures) = regset.captures_with_options(
            text,
            pos,
            text.len(),
            onig::RegSetLead::Position,
            SearchOptions::SEARCH_OPTION_NONE,
        )?;
        let (start, end) = captures.pos(0)?;
        let capture_pos = (0..captures.len()).map(|i| captures.pos(i)).collect();

        Some(PatternSetMatch {
            candidate: self.candidates[pattern_index],
            start,
            end,
            capture_pos,
        })
    }
}

impl Debug for PatternSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PatternSet({} rules)", self.candidates.len())
    }
}
