//! Two-dimensional precedence relation tables.
//!
//! A `Prec2Table` records, for a pair of operator tokens `(x, y)` that can
//! appear around a common operand, how the two bind: `x` looser than `y`,
//! both part of the same construct, or `x` tighter than `y`. Tables are
//! built either from declarative precedence groups ([`precs_table`]) or
//! from a restricted BNF ([`crate::bnf::bnf_table`]), and are the input to
//! the level solver in [`crate::levels`].

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// The relation between two operator tokens around a shared operand.
///
/// In a string `a X b Y c`, the cell `(X, Y)` reads: `Lt` means `X` binds
/// looser than `Y`, `Eq` means both belong to the same construct (like
/// `if`/`then`), `Gt` means `X` binds tighter. A missing cell means no
/// direct relation was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Prec {
    Lt,
    Eq,
    Gt,
}

impl fmt::Display for Prec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lt => write!(f, "<"),
            Self::Eq => write!(f, "="),
            Self::Gt => write!(f, ">"),
        }
    }
}

/// A disagreement between two writes to the same table cell.
///
/// Conflicts are collected rather than aborting the build: a sloppy grammar
/// still produces a usable table, and the caller can inspect what was
/// papered over. When an override table decided the winner, `resolved` is
/// true and `kept` is the override value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub left: String,
    pub right: String,
    pub kept: Prec,
    pub rejected: Prec,
    pub resolved: bool,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting precedence for ({:?}, {:?}): kept {}, rejected {}{}",
            self.left,
            self.right,
            self.kept,
            self.rejected,
            if self.resolved { " (by override)" } else { "" }
        )
    }
}

/// A two-argument precedence relation table with conflict tracking.
///
/// Writes are monotonic: once a cell holds a value, a differing later write
/// loses and is recorded as a [`Conflict`]. An override table (built from
/// explicit precedence declarations) can flip that outcome per cell, but
/// the disagreement is still recorded.
#[derive(Debug, Clone, Default)]
pub struct Prec2Table {
    cells: FxHashMap<(String, String), Prec>,
    conflicts: Vec<Conflict>,
    /// Tokens that open a construct (first literal of an alternative).
    /// The solver blanks their left level so they scan like delimiters.
    openers: FxHashSet<String>,
    /// Tokens that close a construct (last literal of an alternative).
    closers: FxHashSet<String>,
}

impl Prec2Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the relation between two tokens.
    pub fn get(&self, left: &str, right: &str) -> Option<Prec> {
        self.cells.get(&(left.to_owned(), right.to_owned())).copied()
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Conflicts recorded while building this table.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Record that a token opens a construct.
    pub fn mark_opener(&mut self, token: &str) {
        self.openers.insert(token.to_owned());
    }

    /// Record that a token closes a construct.
    pub fn mark_closer(&mut self, token: &str) {
        self.closers.insert(token.to_owned());
    }

    pub fn is_opener(&self, token: &str) -> bool {
        self.openers.contains(token)
    }

    pub fn is_closer(&self, token: &str) -> bool {
        self.closers.contains(token)
    }

    /// Iterate over all `((left, right), prec)` cells.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), Prec)> {
        self.cells.iter().map(|(k, v)| (k, *v))
    }

    /// Every token mentioned on either side of a cell.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.cells
            .keys()
            .flat_map(|(l, r)| [l.as_str(), r.as_str()])
    }

    /// Set a cell, keeping the existing value on disagreement.
    ///
    /// Returns whether the write took effect. A losing write is recorded
    /// as a [`Conflict`].
    pub fn insert(&mut self, left: &str, right: &str, prec: Prec) -> bool {
        let key = (left.to_owned(), right.to_owned());
        match self.cells.get(&key) {
            None => {
                self.cells.insert(key, prec);
                true
            }
            Some(&old) if old == prec => true,
            Some(&old) => {
                self.conflicts.push(Conflict {
                    left: left.to_owned(),
                    right: right.to_owned(),
                    kept: old,
                    rejected: prec,
                    resolved: false,
                });
                false
            }
        }
    }

    /// Set a cell, letting `overrides` arbitrate disagreements.
    ///
    /// When the cell already holds a different value and the override table
    /// has an opinion on this pair, the override value wins the cell. The
    /// disagreement is recorded either way.
    pub fn insert_resolved(
        &mut self,
        left: &str,
        right: &str,
        prec: Prec,
        overrides: &Prec2Table,
    ) -> bool {
        let key = (left.to_owned(), right.to_owned());
        match self.cells.get(&key) {
            None => {
                self.cells.insert(key, prec);
                true
            }
            Some(&old) if old == prec => true,
            Some(&old) => match overrides.get(left, right) {
                Some(winner) => {
                    self.conflicts.push(Conflict {
                        left: left.to_owned(),
                        right: right.to_owned(),
                        kept: winner,
                        rejected: if winner == old { prec } else { old },
                        resolved: true,
                    });
                    self.cells.insert(key, winner);
                    true
                }
                None => {
                    self.conflicts.push(Conflict {
                        left: left.to_owned(),
                        right: right.to_owned(),
                        kept: old,
                        rejected: prec,
                        resolved: false,
                    });
                    false
                }
            },
        }
    }
}

// ── Precedence groups ───────────────────────────────────────────────────

/// Associativity of one precedence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Assoc {
    /// `a + b + c` parses as `(a + b) + c`.
    Left,
    /// `a -> b -> c` parses as `a -> (b -> c)`.
    Right,
    /// No relation among the group's own tokens.
    NonAssoc,
    /// Tokens of the group chain as siblings of one construct (`;`).
    Assoc,
}

/// One group of equal-precedence operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecGroup {
    pub assoc: Assoc,
    pub ops: Vec<String>,
}

impl PrecGroup {
    pub fn new(assoc: Assoc, ops: &[&str]) -> Self {
        Self {
            assoc,
            ops: ops.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    pub fn left(ops: &[&str]) -> Self {
        Self::new(Assoc::Left, ops)
    }

    pub fn right(ops: &[&str]) -> Self {
        Self::new(Assoc::Right, ops)
    }

    pub fn assoc(ops: &[&str]) -> Self {
        Self::new(Assoc::Assoc, ops)
    }

    pub fn nonassoc(ops: &[&str]) -> Self {
        Self::new(Assoc::NonAssoc, ops)
    }
}

/// Build a relation table from precedence groups, loosest group first.
///
/// Within a group every ordered pair of tokens (a token paired with itself
/// included) gets the relation implied by the associativity tag. Across
/// groups, each token of a looser group binds `Lt` against each token of
/// every tighter group, with the mirror cell set to `Gt`.
pub fn precs_table(groups: &[PrecGroup]) -> Prec2Table {
    let mut table = Prec2Table::new();
    for (i, group) in groups.iter().enumerate() {
        let intra = match group.assoc {
            Assoc::Left => Some(Prec::Gt),
            Assoc::Right => Some(Prec::Lt),
            Assoc::Assoc => Some(Prec::Eq),
            Assoc::NonAssoc => None,
        };
        if let Some(prec) = intra {
            for a in &group.ops {
                for b in &group.ops {
                    table.insert(a, b, prec);
                }
            }
        }
        for tighter in &groups[i + 1..] {
            for a in &group.ops {
                for b in &tighter.ops {
                    table.insert(a, b, Prec::Lt);
                    table.insert(b, a, Prec::Gt);
                }
            }
        }
    }
    table
}

/// Union several tables into one, first writer wins.
///
/// Cross-table disagreements are recorded as conflicts on the result, and
/// conflicts already recorded on the inputs are carried over.
pub fn merge_tables(tables: &[Prec2Table]) -> Prec2Table {
    let mut merged = Prec2Table::new();
    for table in tables {
        merged.conflicts.extend(table.conflicts.iter().cloned());
        merged.openers.extend(table.openers.iter().cloned());
        merged.closers.extend(table.closers.iter().cloned());
        for ((left, right), prec) in table.iter() {
            merged.insert(left, right, prec);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_value() {
        let mut table = Prec2Table::new();
        assert!(table.insert("+", "*", Prec::Lt));
        assert!(!table.insert("+", "*", Prec::Gt));
        assert_eq!(table.get("+", "*"), Some(Prec::Lt));
        assert_eq!(table.conflicts().len(), 1);
        let conflict = &table.conflicts()[0];
        assert_eq!(conflict.kept, Prec::Lt);
        assert_eq!(conflict.rejected, Prec::Gt);
        assert!(!conflict.resolved);
    }

    #[test]
    fn insert_same_value_is_not_a_conflict() {
        let mut table = Prec2Table::new();
        table.insert("a", "b", Prec::Eq);
        assert!(table.insert("a", "b", Prec::Eq));
        assert!(table.conflicts().is_empty());
    }

    #[test]
    fn override_wins_cell_but_records_disagreement() {
        let mut overrides = Prec2Table::new();
        overrides.insert("+", "*", Prec::Lt);

        let mut table = Prec2Table::new();
        table.insert("+", "*", Prec::Gt);
        table.insert_resolved("+", "*", Prec::Eq, &overrides);

        assert_eq!(table.get("+", "*"), Some(Prec::Lt));
        assert_eq!(table.conflicts().len(), 1);
        assert!(table.conflicts()[0].resolved);
    }

    #[test]
    fn left_group_is_self_tighter() {
        let table = precs_table(&[PrecGroup::left(&["+", "-"])]);
        assert_eq!(table.get("+", "+"), Some(Prec::Gt));
        assert_eq!(table.get("+", "-"), Some(Prec::Gt));
        assert_eq!(table.get("-", "+"), Some(Prec::Gt));
    }

    #[test]
    fn right_group_is_self_looser() {
        let table = precs_table(&[PrecGroup::right(&["->"])]);
        assert_eq!(table.get("->", "->"), Some(Prec::Lt));
    }

    #[test]
    fn assoc_group_is_self_equal() {
        let table = precs_table(&[PrecGroup::assoc(&[";"])]);
        assert_eq!(table.get(";", ";"), Some(Prec::Eq));
    }

    #[test]
    fn nonassoc_group_has_no_intra_cells() {
        let table = precs_table(&[PrecGroup::nonassoc(&["=="])]);
        assert_eq!(table.get("==", "=="), None);
    }

    #[test]
    fn looser_group_vs_tighter_group() {
        let table = precs_table(&[
            PrecGroup::left(&["+"]),
            PrecGroup::left(&["*"]),
        ]);
        assert_eq!(table.get("+", "*"), Some(Prec::Lt));
        assert_eq!(table.get("*", "+"), Some(Prec::Gt));
    }

    #[test]
    fn merge_is_first_writer_wins() {
        let mut a = Prec2Table::new();
        a.insert("x", "y", Prec::Lt);
        let mut b = Prec2Table::new();
        b.insert("x", "y", Prec::Gt);
        b.insert("y", "z", Prec::Eq);

        let merged = merge_tables(&[a, b]);
        assert_eq!(merged.get("x", "y"), Some(Prec::Lt));
        assert_eq!(merged.get("y", "z"), Some(Prec::Eq));
        assert_eq!(merged.conflicts().len(), 1);
    }
}
