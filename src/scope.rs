//! Interned scope names packed into a single u128
//!
//! A scope like "keyword.control.flow" is split into atoms ("keyword", "control", "flow"),
//! each atom is interned once and the scope keeps their 16 bit ids:
//! [atom0][atom1][atom2][atom3][atom4][atom5][atom6][atom7]
//! An atom slot holds `repository_index + 1`, 0 meaning unused.

use std::collections::HashMap;
use std::fmt;
use std::sync::{LazyLock, Mutex, MutexGuard};

pub const MAX_ATOMS: usize = 8;
pub const MAX_REPOSITORY_SIZE: usize = 65534; // 2^16 - 2, leaving room for 0 and max

/// A dot-separated scope name such as "string.quoted.double".
///
/// Copy, hashable and comparing two scopes is a single integer comparison. Scopes deeper than
/// 8 atoms are truncated.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Default, Hash)]
pub struct Scope {
    /// Packed atoms in MSB-first order for lexicographic comparison
    atoms: u128,
}

impl Scope {
    /// Create a new scope from a dot-separated string, truncating to 8 atoms if longer
    pub fn new(s: &str) -> Scope {
        let mut repo = lock_global_scope_repo();
        repo.build(s.trim())
    }

    /// A rule `name` can hold several space-separated scopes, eg
    /// "meta.tag string.quoted". This returns one scope per name.
    pub fn parse_names(names: &str) -> Vec<Scope> {
        let mut repo = lock_global_scope_repo();
        names
            .split_whitespace()
            .map(|name| repo.build(name))
            .filter(|scope| !scope.is_empty())
            .collect()
    }

    /// The atom id of a single scope component, eg `Scope::atom("keyword")`.
    ///
    /// Useful to compare against [`Scope::atom_at`] without building strings.
    pub fn atom(component: &str) -> u16 {
        let mut repo = lock_global_scope_repo();
        (repo.atom_to_index(component) + 1) as u16
    }

    /// Like [`Scope::atom`] but doesn't intern unknown components
    pub fn find_atom(component: &str) -> Option<u16> {
        let repo = lock_global_scope_repo();
        repo.atom_index_map
            .get(component)
            .map(|&index| (index + 1) as u16)
    }

    /// Like [`Scope::new`] but `None` if a component was never interned: no scope seen so far
    /// can have it as a prefix.
    pub fn find(s: &str) -> Option<Scope> {
        let repo = lock_global_scope_repo();
        repo.lookup(s.trim())
    }

    /// Extract a single atom at the given index (0-7)
    /// Returns 0 for unused slots, or repository_index + 1 for valid atoms
    #[inline]
    pub fn atom_at(self, index: usize) -> u16 {
        debug_assert!(index < MAX_ATOMS);
        // MSB-first layout: index 0 is in bits [127:112], index 1 in [111:96], etc.
        let shift = (MAX_ATOMS - 1 - index) * 16;
        ((self.atoms >> shift) & 0xFFFF) as u16
    }

    /// Iterates over the atom ids of this scope, outermost first
    pub fn atoms(self) -> impl Iterator<Item = u16> {
        (0..self.len() as usize).map(move |i| self.atom_at(i))
    }

    /// The innermost atom id, 0 for the empty scope
    #[inline]
    pub fn last_atom(self) -> u16 {
        match self.len() {
            0 => 0,
            n => self.atom_at(n as usize - 1),
        }
    }

    /// Number of atoms in this scope
    #[inline]
    pub fn len(self) -> u32 {
        MAX_ATOMS as u32 - self.missing_atoms()
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.atoms == 0
    }

    /// Unused slots are on the LSB side so they show up as trailing zeros
    #[inline]
    fn missing_atoms(self) -> u32 {
        self.atoms.trailing_zeros() / 16
    }

    /// Whether `self` is an atom-wise prefix of `other`: "string" is a prefix of
    /// "string.quoted" but not of "strings".
    #[inline]
    pub fn is_prefix_of(self, other: Scope) -> bool {
        let missing = self.missing_atoms();

        if missing == MAX_ATOMS as u32 {
            return true;
        }

        let mask_shift = missing * 16;
        let mask = if mask_shift >= 128 {
            0u128
        } else {
            u128::MAX << mask_shift
        };

        (self.atoms ^ other.atoms) & mask == 0
    }

    /// Convert back to string form. Takes the global lock, keep it out of hot loops.
    pub fn build_string(self) -> String {
        let repo = lock_global_scope_repo();
        repo.to_string(self)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope(\"{}\")", self.build_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build_string())
    }
}

/// Maps atom strings to indices
struct ScopeRepository {
    atoms: Vec<String>,
    atom_index_map: HashMap<String, usize>,
}

impl ScopeRepository {
    fn new() -> Self {
        Self {
            atoms: Vec::new(),
            atom_index_map: HashMap::new(),
        }
    }

    fn atom_to_index(&mut self, atom: &str) -> usize {
        if let Some(&index) = self.atom_index_map.get(atom) {
            return index;
        }

        if self.atoms.len() >= MAX_REPOSITORY_SIZE {
            panic!(
                "Too many atoms in repository: exceeded MAX_REPOSITORY_SIZE of {}",
                MAX_REPOSITORY_SIZE
            );
        }

        let index = self.atoms.len();
        self.atoms.push(atom.to_owned());
        self.atom_index_map.insert(atom.to_owned(), index);
        index
    }

    fn atom_str(&self, atom_number: u16) -> &str {
        debug_assert!(atom_number > 0);
        &self.atoms[(atom_number - 1) as usize]
    }

    fn build(&mut self, s: &str) -> Scope {
        let mut atoms = 0u128;
        // Empty parts from "a..b" are skipped without leaving a hole
        let parts = s.split('.').filter(|p| !p.is_empty()).take(MAX_ATOMS);

        for (i, atom_str) in parts.enumerate() {
            let atom_value = (self.atom_to_index(atom_str) + 1) as u128;
            let shift = (MAX_ATOMS - 1 - i) * 16;
            atoms |= atom_value << shift;
        }

        Scope { atoms }
    }

    fn lookup(&self, s: &str) -> Option<Scope> {
        let mut atoms = 0u128;
        let parts = s.split('.').filter(|p| !p.is_empty()).take(MAX_ATOMS);
        for (i, atom_str) in parts.enumerate() {
            let atom_value = (*self.atom_index_map.get(atom_str)? + 1) as u128;
            atoms |= atom_value << ((MAX_ATOMS - 1 - i) * 16);
        }
        Some(Scope { atoms })
    }

    fn to_string(&self, scope: Scope) -> String {
        scope
            .atoms()
            .map(|atom| self.atom_str(atom))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Interning is process-wide: scopes are plain values that can cross grammars, themes and
/// threads. It only grows while grammars and themes are loaded.
static SCOPE_REPO: LazyLock<Mutex<ScopeRepository>> =
    LazyLock::new(|| Mutex::new(ScopeRepository::new()));

fn lock_global_scope_repo() -> MutexGuard<'static, ScopeRepository> {
    SCOPE_REPO.lock().expect("Failed to lock scope repository")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_build_and_print_scope() {
        let scope = Scope::new("keyword.control.flow");
        assert_eq!(scope.len(), 3);
        assert_eq!(scope.build_string(), "keyword.control.flow");
        assert_eq!(scope.to_string(), "keyword.control.flow");
    }

    #[test]
    fn empty_scope_has_no_atoms() {
        let scope = Scope::new("  ");
        assert!(scope.is_empty());
        assert_eq!(scope.len(), 0);
        assert_eq!(scope.last_atom(), 0);
        assert_eq!(scope.build_string(), "");
    }

    #[test]
    fn prefix_is_atom_wise() {
        let string = Scope::new("string");
        assert!(string.is_prefix_of(Scope::new("string.quoted.double")));
        assert!(string.is_prefix_of(string));
        assert!(!string.is_prefix_of(Scope::new("strings.quoted")));
        assert!(!Scope::new("string.quoted").is_prefix_of(string));
        assert!(Scope::default().is_prefix_of(string));
    }

    #[test]
    fn long_scopes_are_truncated() {
        let scope = Scope::new("a.b.c.d.e.f.g.h.i.j");
        assert_eq!(scope.len(), 8);
        assert_eq!(scope.build_string(), "a.b.c.d.e.f.g.h");
    }

    #[test]
    fn skips_empty_components() {
        assert_eq!(Scope::new("a..b"), Scope::new("a.b"));
    }

    #[test]
    fn finds_scopes_without_interning() {
        let scope = Scope::new("string.quoted.find");
        assert_eq!(Scope::find(" string.quoted.find "), Some(scope));
        assert_eq!(Scope::find("string.never-interned-atom"), None);
        assert_eq!(Scope::find_atom("never-interned-atom"), None);
    }

    #[test]
    fn can_parse_space_separated_names() {
        let scopes = Scope::parse_names("meta.tag  string.quoted ");
        assert_eq!(scopes, vec![Scope::new("meta.tag"), Scope::new("string.quoted")]);
        assert!(Scope::parse_names("").is_empty());
    }

    #[test]
    fn atoms_match_components() {
        let scope = Scope::new("punctuation.section.parens.begin");
        let atoms: Vec<u16> = scope.atoms().collect();
        assert_eq!(
            atoms,
            vec![
                Scope::atom("punctuation"),
                Scope::atom("section"),
                Scope::atom("parens"),
                Scope::atom("begin"),
            ]
        );
        assert_eq!(scope.last_atom(), Scope::atom("begin"));
        assert_eq!(Scope::find_atom("section"), Some(Scope::atom("section")));
        assert_eq!(Scope::find_atom("never-interned-anywhere"), None);
    }
}
