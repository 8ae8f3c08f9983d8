//! Solving a precedence relation table into integer levels.
//!
//! Every token owns two cells, a left and a right level. An `Eq` relation
//! aliases the right cell of one token with the left cell of the next;
//! `Lt`/`Gt` impose a strict order between them. Aliasing is handled with
//! `ena`'s union-find table, ordering with an iterative topological
//! assignment over the merged representatives.
//!
//! A cell that no relation ever mentions stays unassigned: a token with no
//! left level behaves like an open delimiter, one with no right level like
//! a close delimiter. The scanner leans on exactly that encoding.

use std::fmt;

use ena::unify::InPlaceUnificationTable;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::prec2::{Prec, Prec2Table};

/// A level cell, identified by an index into the unification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellVar(u32);

/// The integer a cell resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellVal(u32);

impl ena::unify::UnifyKey for CellVar {
    type Value = Option<CellVal>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        CellVar(u)
    }

    fn tag() -> &'static str {
        "CellVar"
    }
}

impl ena::unify::EqUnifyValue for CellVal {}

/// The solved left/right levels of one token.
///
/// `None` on the left marks an opener, `None` on the right a closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Levels {
    pub left: Option<u32>,
    pub right: Option<u32>,
}

/// The solved level table, mapping each token to its [`Levels`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelTable {
    entries: FxHashMap<String, Levels>,
}

impl LevelTable {
    pub fn get(&self, token: &str) -> Option<Levels> {
        self.entries.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Levels)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Insert or replace a token's levels directly.
    ///
    /// Lets a language patch individual entries after solving, or build a
    /// small table entirely by hand in tests.
    pub fn set(&mut self, token: &str, left: Option<u32>, right: Option<u32>) {
        self.entries
            .insert(token.to_owned(), Levels { left, right });
    }
}

/// Failure to resolve a precedence table into levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The ordering constraints form a cycle; no level assignment exists.
    Cycle { remaining: usize },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { remaining } => write!(
                f,
                "cannot resolve precedence table to levels: \
                 {remaining} ordering constraints form a cycle"
            ),
        }
    }
}

impl std::error::Error for SolveError {}

/// Solve a precedence table into per-token integer levels.
pub fn solve(prec2: &Prec2Table) -> Result<LevelTable, SolveError> {
    let mut table: InPlaceUnificationTable<CellVar> = InPlaceUnificationTable::new();
    let mut cells: FxHashMap<&str, (CellVar, CellVar)> = FxHashMap::default();
    let mut order: Vec<&str> = Vec::new();

    let mut equalities: Vec<(CellVar, CellVar)> = Vec::new();
    let mut inequalities: Vec<(CellVar, CellVar)> = Vec::new();
    let mut mentioned: Vec<CellVar> = Vec::new();
    for ((x, y), prec) in prec2.iter() {
        let (_, right_x) = cells_of(&mut table, &mut cells, &mut order, x);
        let (left_y, _) = cells_of(&mut table, &mut cells, &mut order, y);
        mentioned.push(right_x);
        mentioned.push(left_y);
        match prec {
            // a X b Y c with X = Y: both sides of b close together.
            Prec::Eq => equalities.push((right_x, left_y)),
            // X binds looser: its right side opens below Y's left.
            Prec::Lt => inequalities.push((right_x, left_y)),
            // X binds tighter: Y's left side sits below X's right.
            Prec::Gt => inequalities.push((left_y, right_x)),
        }
    }

    // Phase 1: alias equality-constrained cells.
    for (a, b) in equalities {
        table
            .unify_var_var(a, b)
            .expect("fresh cells carry no values yet");
    }

    // Rewrite everything onto representatives and drop duplicates.
    let mut pending: Vec<(CellVar, CellVar)> = inequalities
        .iter()
        .map(|&(a, b)| (table.find(a), table.find(b)))
        .collect();
    pending.sort_unstable_by_key(|&(a, b)| (a.0, b.0));
    pending.dedup();
    let mut mentioned: Vec<CellVar> = mentioned
        .iter()
        .map(|&c| table.find(c))
        .collect();
    mentioned.sort_unstable_by_key(|c| c.0);
    mentioned.dedup();

    // Phase 2: iteratively hand out integers to representatives with no
    // smaller side still pending.
    let mut level = 0u32;
    while !pending.is_empty() {
        let blocked: FxHashSet<CellVar> = pending.iter().map(|&(_, b)| b).collect();
        let mut ready: Vec<CellVar> = Vec::new();
        for &(a, _) in &pending {
            if !blocked.contains(&a) && table.probe_value(a).is_none() {
                ready.push(a);
            }
        }
        if ready.is_empty() {
            return Err(SolveError::Cycle {
                remaining: pending.len(),
            });
        }
        ready.sort_unstable_by_key(|c| c.0);
        ready.dedup();
        // Vars freed in the same pass are mutually unconstrained. Each
        // still gets its own integer: sharing one would turn "no
        // constraint" into an accidental equality, and equal levels mean
        // something to the scanner (associative siblings).
        for var in ready {
            table
                .unify_var_value(var, Some(CellVal(level)))
                .expect("each representative is assigned exactly once");
            level += 1;
        }
        let mut still_pending = Vec::with_capacity(pending.len());
        for (a, b) in pending {
            if table.probe_value(a).is_none() {
                still_pending.push((a, b));
            }
        }
        pending = still_pending;
    }

    // Greater sides of the last constraints, and equality-only groups,
    // have no value yet; they all sit above everything assigned so far,
    // again each with its own integer.
    for var in mentioned {
        if table.probe_value(var).is_none() {
            table
                .unify_var_value(var, Some(CellVal(level)))
                .expect("unassigned representative");
            level += 1;
        }
    }

    // Phase 3: read merged values back out per token. Declared openers
    // and closers lose their outward side here: their cells took part in
    // the ordering, but the scanner must see them as delimiters.
    let mut result = LevelTable::default();
    for token in order {
        let (l, r) = cells[token];
        let left = if prec2.is_opener(token) {
            None
        } else {
            table.probe_value(l).map(|v| v.0)
        };
        let right = if prec2.is_closer(token) {
            None
        } else {
            table.probe_value(r).map(|v| v.0)
        };
        result.set(token, left, right);
    }
    Ok(result)
}

/// The (left, right) cells of a token, created on first sight.
fn cells_of<'p>(
    table: &mut InPlaceUnificationTable<CellVar>,
    cells: &mut FxHashMap<&'p str, (CellVar, CellVar)>,
    order: &mut Vec<&'p str>,
    token: &'p str,
) -> (CellVar, CellVar) {
    if let Some(&pair) = cells.get(token) {
        return pair;
    }
    let pair = (table.new_key(None), table.new_key(None));
    cells.insert(token, pair);
    order.push(token);
    pair
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bnf::{bnf_table, Production};
    use crate::prec2::{precs_table, PrecGroup};

    fn arith_levels() -> LevelTable {
        let table = precs_table(&[
            PrecGroup::assoc(&[";"]),
            PrecGroup::left(&["+"]),
            PrecGroup::left(&["*"]),
        ]);
        solve(&table).expect("acyclic")
    }

    #[test]
    fn looser_operator_sits_below_tighter() {
        let levels = arith_levels();
        let plus = levels.get("+").unwrap();
        let star = levels.get("*").unwrap();
        assert!(plus.right.unwrap() < star.left.unwrap());
        assert!(plus.left.unwrap() > levels.get(";").unwrap().right.unwrap());
    }

    #[test]
    fn left_assoc_operator_has_left_below_right() {
        // (+, +) = Gt constrains left(+) < right(+): scanning backward, an
        // earlier + binds the operand between two + tokens.
        let levels = arith_levels();
        let plus = levels.get("+").unwrap();
        assert!(plus.left.unwrap() < plus.right.unwrap());
    }

    #[test]
    fn right_assoc_operator_has_left_above_right() {
        let table = precs_table(&[PrecGroup::right(&["->"])]);
        let levels = solve(&table).unwrap();
        let arrow = levels.get("->").unwrap();
        assert!(arrow.left.unwrap() > arrow.right.unwrap());
    }

    #[test]
    fn assoc_operator_is_self_equal() {
        let levels = arith_levels();
        let semi = levels.get(";").unwrap();
        assert_eq!(semi.left, semi.right);
        assert!(semi.left.is_some());
    }

    #[test]
    fn openers_and_closers_keep_an_absent_side() {
        let grammar = vec![Production::new(
            "E",
            &[&["begin", "E", "end"], &["id"]],
        )];
        let levels = solve(&bnf_table(&grammar, &[])).unwrap();
        let begin = levels.get("begin").unwrap();
        let end = levels.get("end").unwrap();
        assert_eq!(begin.left, None);
        assert!(begin.right.is_some());
        assert!(end.left.is_some());
        assert_eq!(end.right, None);
        // The bracket equality (begin, end) aliases the inner pair.
        assert_eq!(begin.right, end.left);
    }

    #[test]
    fn every_relation_is_honored_after_solving() {
        let grammar = vec![Production::new(
            "E",
            &[
                &["if", "E", "then", "E", "else", "E", "end"],
                &["E", "+", "E"],
                &["id"],
            ],
        )];
        let resolver = precs_table(&[PrecGroup::left(&["+"])]);
        let prec2 = bnf_table(&grammar, &[resolver]);
        let levels = solve(&prec2).unwrap();
        for ((x, y), prec) in prec2.iter() {
            // Sides blanked by opener/closer marking carry no obligation.
            let (Some(rx), Some(ly)) =
                (levels.get(x).unwrap().right, levels.get(y).unwrap().left)
            else {
                continue;
            };
            match prec {
                Prec::Eq => assert_eq!(rx, ly, "({x}, {y}) should share a level"),
                Prec::Lt => assert!(rx < ly, "({x}, {y})"),
                Prec::Gt => assert!(ly < rx, "({x}, {y})"),
            }
        }
    }

    #[test]
    fn contradictory_order_reports_a_cycle() {
        let mut prec2 = Prec2Table::new();
        prec2.insert("a", "b", Prec::Lt);
        prec2.insert("b", "a", Prec::Lt);
        // Tie each token's sides together so the loop closes.
        prec2.insert("a", "a", Prec::Eq);
        prec2.insert("b", "b", Prec::Eq);
        let err = solve(&prec2).unwrap_err();
        assert!(matches!(err, SolveError::Cycle { .. }));
        assert!(err.to_string().contains("cannot resolve"));
    }

    #[test]
    fn unmentioned_tokens_are_absent_entirely() {
        let levels = arith_levels();
        assert_eq!(levels.get("unheard-of"), None);
    }
}
