//! Compiling a restricted BNF into a precedence relation table.
//!
//! The grammar is assumed to be an operator grammar: no alternative puts
//! two non-terminals side by side. Under that assumption, the operators
//! that can open or close a derivation of each non-terminal (`FIRST-OPS` /
//! `LAST-OPS`) are enough to relate every pair of operators that can meet
//! around an operand, which is all the level solver needs.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::prec2::{merge_tables, Prec, Prec2Table};

/// One production: a non-terminal and its alternatives.
///
/// Each alternative is a non-empty sequence of symbols. A symbol is a
/// non-terminal iff it is the `lhs` of some production in the grammar;
/// every other symbol is a literal operator token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: String,
    pub alts: Vec<Vec<String>>,
}

impl Production {
    pub fn new(lhs: &str, alts: &[&[&str]]) -> Self {
        Self {
            lhs: lhs.to_owned(),
            alts: alts
                .iter()
                .map(|alt| alt.iter().map(|s| (*s).to_owned()).collect())
                .collect(),
        }
    }
}

/// Build a precedence table from a BNF grammar.
///
/// `resolvers` are precedence tables (typically from
/// [`crate::prec2::precs_table`]) merged into a single override table that
/// arbitrates conflicting writes; see [`Prec2Table::insert_resolved`].
///
/// Sloppy input never aborts: adjacent non-terminals violate the operator
/// grammar assumption and are skipped.
pub fn bnf_table(grammar: &[Production], resolvers: &[Prec2Table]) -> Prec2Table {
    let overrides = merge_tables(resolvers);
    let nonterminals: FxHashSet<&str> =
        grammar.iter().map(|p| p.lhs.as_str()).collect();
    let is_op = |sym: &str| !nonterminals.contains(sym);

    let first_ops = derived_ops(grammar, &nonterminals, Edge::First);
    let last_ops = derived_ops(grammar, &nonterminals, Edge::Last);

    let mut table = Prec2Table::new();
    for prod in grammar {
        for alt in &prod.alts {
            // The literals flanking an alternative behave like delimiters:
            // the solver blanks their outward level.
            if let Some(first) = alt.first() {
                if is_op(first) {
                    table.mark_opener(first);
                }
            }
            if let Some(last) = alt.last() {
                if is_op(last) {
                    table.mark_closer(last);
                }
            }
            for (i, window) in alt.windows(2).enumerate() {
                let (a, b) = (window[0].as_str(), window[1].as_str());
                match (is_op(a), is_op(b)) {
                    (true, true) => {
                        table.insert_resolved(a, b, Prec::Eq, &overrides);
                    }
                    (false, true) => {
                        if let Some(lasts) = last_ops.get(a) {
                            for last in lasts {
                                table.insert_resolved(last, b, Prec::Gt, &overrides);
                            }
                        }
                    }
                    (true, false) => {
                        if let Some(firsts) = first_ops.get(b) {
                            for first in firsts {
                                table.insert_resolved(a, first, Prec::Lt, &overrides);
                            }
                        }
                        // Bracket equality: the operators on both sides of
                        // an operand belong to one construct (if .. then).
                        if let Some(c) = alt.get(i + 2) {
                            if is_op(c) {
                                table.insert_resolved(a, c, Prec::Eq, &overrides);
                            }
                        }
                    }
                    (false, false) => {
                        // Operator-grammar violation; skip the pair.
                    }
                }
            }
        }
    }
    table
}

// ── FIRST-OPS / LAST-OPS ────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Edge {
    First,
    Last,
}

/// The operators that can start (`Edge::First`) or end (`Edge::Last`) a
/// derivation of each non-terminal.
///
/// Seeded per alternative from its leading (trailing) symbol — or the one
/// next to it when the edge symbol is itself a non-terminal — then closed
/// under a worklist fixed point propagating along edge-position
/// non-terminal references.
fn derived_ops<'g>(
    grammar: &'g [Production],
    nonterminals: &FxHashSet<&str>,
    edge: Edge,
) -> FxHashMap<&'g str, FxHashSet<&'g str>> {
    let is_op = |sym: &str| !nonterminals.contains(sym);

    let mut ops: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
    // deps[m] = the non-terminals whose sets include ops(m).
    let mut deps: FxHashMap<&str, FxHashSet<&str>> = FxHashMap::default();
    for prod in grammar {
        ops.entry(prod.lhs.as_str()).or_default();
        for alt in &prod.alts {
            let (edge_sym, next_sym) = match edge {
                Edge::First => (alt.first(), alt.get(1)),
                Edge::Last => (alt.last(), alt.len().checked_sub(2).and_then(|i| alt.get(i))),
            };
            let Some(edge_sym) = edge_sym else { continue };
            if is_op(edge_sym) {
                ops.entry(prod.lhs.as_str())
                    .or_default()
                    .insert(edge_sym.as_str());
            } else {
                if let Some(next) = next_sym {
                    if is_op(next) {
                        ops.entry(prod.lhs.as_str())
                            .or_default()
                            .insert(next.as_str());
                    }
                }
                deps.entry(edge_sym.as_str())
                    .or_default()
                    .insert(prod.lhs.as_str());
            }
        }
    }

    let mut worklist: Vec<&str> = ops.keys().copied().collect();
    while let Some(m) = worklist.pop() {
        let Some(source) = ops.get(m).cloned() else { continue };
        let Some(targets) = deps.get(m).cloned() else { continue };
        for n in targets {
            let set = ops.entry(n).or_default();
            let before = set.len();
            set.extend(source.iter().copied());
            if set.len() > before {
                worklist.push(n);
            }
        }
    }
    ops
}
