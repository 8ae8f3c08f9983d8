//! Grammar compiler for the opal indentation engine.
//!
//! A language describes its operators either as a restricted BNF
//! ([`bnf::bnf_table`]) or as ordered precedence groups
//! ([`prec2::precs_table`]), or both. Either road produces a
//! [`prec2::Prec2Table`] relating pairs of operator tokens, which
//! [`levels::solve`] compresses into one pair of integer levels per token.
//! The level table is what the engine crate navigates with at runtime.
//!
//! Compilation is forgiving by design: conflicting relations are recorded
//! and the first writer kept, malformed productions are skipped. The only
//! hard failure is a precedence cycle, which no level assignment can
//! satisfy.

pub mod bnf;
pub mod levels;
pub mod prec2;

pub use bnf::{bnf_table, Production};
pub use levels::{solve, LevelTable, Levels, SolveError};
pub use prec2::{merge_tables, precs_table, Assoc, Conflict, Prec, Prec2Table, PrecGroup};
