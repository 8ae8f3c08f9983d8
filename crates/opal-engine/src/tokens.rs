//! The pluggable tokenizer seam.
//!
//! The scanner never looks at characters itself; it asks a [`Tokenizer`]
//! for the token before or after the cursor. A host editor with a real
//! lexer supplies its own implementation; [`WordTokenizer`] is the
//! fallback that treats a run of word characters or a run of symbol
//! characters as one token.

use crate::cursor::{is_close_delim, is_open_delim, Cursor};

/// Host-provided token hooks.
///
/// Contract for both directions: skip trivia, consume exactly one token,
/// leave the cursor at the token's far end, and return its text. Return
/// the empty string without consuming anything when the cursor is pinned
/// by a non-token character: a delimiter, a string quote, or the buffer
/// edge. The scanner falls back to balanced-delimiter skipping then.
pub trait Tokenizer {
    fn forward_token(&self, cur: &mut Cursor<'_>) -> String;
    fn backward_token(&self, cur: &mut Cursor<'_>) -> String;
}

/// Default tokenization: word runs and symbol runs.
///
/// A token is either a maximal run of alphanumerics and `_`, or a maximal
/// run of symbol characters (anything else that is not whitespace, not a
/// delimiter, not a quote). `a+=b` therefore splits into `a`, `+=`, `b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_symbol(c: char) -> bool {
    !is_word(c)
        && !c.is_whitespace()
        && !is_open_delim(c)
        && !is_close_delim(c)
        && c != '"'
}

impl Tokenizer for WordTokenizer {
    fn forward_token(&self, cur: &mut Cursor<'_>) -> String {
        cur.skip_trivia_forward();
        let start = cur.pos();
        let class = match cur.peek() {
            Some(c) if is_word(c) => is_word,
            Some(c) if is_symbol(c) => is_symbol,
            _ => return String::new(),
        };
        while cur.peek().is_some_and(class) {
            cur.advance();
        }
        cur.slice(start, cur.pos()).to_owned()
    }

    fn backward_token(&self, cur: &mut Cursor<'_>) -> String {
        cur.skip_trivia_backward();
        let end = cur.pos();
        let class = match cur.peek_back() {
            Some(c) if is_word(c) => is_word,
            Some(c) if is_symbol(c) => is_symbol,
            _ => return String::new(),
        };
        while cur.peek_back().is_some_and(class) {
            cur.retreat();
        }
        cur.slice(cur.pos(), end).to_owned()
    }
}
