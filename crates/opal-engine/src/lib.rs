//! Runtime of the opal indentation engine.
//!
//! `opal-grammar` turns a language's operator declarations into a table of
//! integer precedence levels; this crate navigates source text with that
//! table and computes indentation columns. The pieces:
//!
//! 1. [`cursor::Cursor`] supplies the buffer capabilities (line geometry,
//!    trivia skipping, balanced delimiters) a host editor would provide.
//! 2. [`tokens::Tokenizer`] is the pluggable tokenizer seam, with
//!    [`tokens::WordTokenizer`] as the default.
//! 3. [`scanner`] skips one sub-expression at a time in either direction.
//! 4. [`indent::Engine`] runs the rule cascade that turns scans into the
//!    column a line should start at.
//!
//! Everything downstream of the grammar is advisory: malformed input gets
//! a plausible column, never an error.
//!
//! # Example
//!
//! ```
//! use opal_engine::{reindent, Lang, Rules};
//! use opal_grammar::{precs_table, solve, PrecGroup};
//!
//! let levels = solve(&precs_table(&[PrecGroup::assoc(&[";"])])).unwrap();
//! let lang = Lang::new(levels, Rules::new().basic(2));
//! let text = reindent(&lang, "f(a,\nb)");
//! assert_eq!(text, "f(a,\n  b)");
//! ```

pub mod cursor;
pub mod indent;
pub mod rules;
pub mod scanner;
pub mod tokens;

pub use cursor::{CommentSyntax, Cursor, DelimError};
pub use indent::{reindent, reindent_line, Engine, Virtual};
pub use rules::{Lang, Rules};
pub use scanner::Scanned;
pub use tokens::{Tokenizer, WordTokenizer};
