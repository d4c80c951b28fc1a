mod compiled;
mod pattern_set;
mod raw;
mod regex;
mod resolver;

pub use compiled::*;
pub use pattern_set::{Candidate, PatternSet, PatternSetMatch};
pub use raw::{RawGrammar, RawRule, RawRuleKind};
pub use regex::Regex;
pub(crate) use regex::resolve_backreferences;
pub use resolver::RuleResolver;
