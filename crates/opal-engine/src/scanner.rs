//! Bidirectional navigation over one sub-expression.
//!
//! One algorithm serves both directions; only which side of a token's
//! levels faces the scan changes. Scanning backward, a token is met on its
//! *right* side first (the `near` side) and leaves its *left* side (`far`)
//! pending; forward scanning mirrors the roles.
//!
//! The scan keeps a stack of pending far levels. A token whose near side
//! is absent behaves like a close delimiter seen from this direction and
//! pushes its far level; a token whose near side binds looser than
//! everything pending stops the scan. Instead of non-local exits, every
//! outcome is a [`Scanned`] value.

use serde::Serialize;

use opal_grammar::LevelTable;

use crate::cursor::Cursor;
use crate::tokens::Tokenizer;

/// Outcome of skipping one sub-expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Scanned {
    /// Crossed an atom or one balanced delimited span.
    Plain,
    /// Stopped in front of a token binding looser than everything pending.
    /// `level` is the token's far-side level, `pos` its start; the cursor
    /// is rewound to before the token.
    Operator {
        level: u32,
        pos: u32,
        token: String,
    },
    /// Hit an enclosing opener, an unmatched delimiter, or the buffer
    /// edge (empty token).
    Opener { pos: u32, token: String },
    /// Crossed a matched construct and stopped on its far token, cursor
    /// left on that token's outer side.
    Pair { pos: u32, token: String },
}

impl Scanned {
    /// Whether the scan crossed something rather than stopping short.
    pub fn crossed(&self) -> bool {
        matches!(self, Self::Plain | Self::Pair { .. })
    }
}

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dir {
    Forward,
    Backward,
}

/// How the level stack starts out.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Start {
    /// Empty stack; `true` lets the scan start on an operator and consume
    /// its operand (the half-sexp mode, cleared after the first token).
    Plain(bool),
    /// Pretend a construct at this level is already pending. Used by the
    /// keyword rule to walk from a continuation token to its construct's
    /// start.
    Seeded(u32),
}

/// Skip one sub-expression in the given direction.
pub(crate) fn scan(
    levels: &LevelTable,
    tokenizer: &dyn Tokenizer,
    cur: &mut Cursor<'_>,
    dir: Dir,
    start: Start,
) -> Scanned {
    let mut stack: Vec<u32> = match start {
        Start::Seeded(level) => vec![level],
        Start::Plain(_) => Vec::new(),
    };
    let mut half = matches!(start, Start::Plain(true));

    loop {
        let pos = cur.pos();
        let token = match dir {
            Dir::Backward => tokenizer.backward_token(cur),
            Dir::Forward => tokenizer.forward_token(cur),
        };
        let tok_start = match dir {
            Dir::Backward => cur.pos(),
            Dir::Forward => cur.pos() - token.len() as u32,
        };

        match levels.get(&token) {
            None if token.is_empty() => {
                cur.goto(pos);
                let skipped = match dir {
                    Dir::Backward => cur.backward_delimited(),
                    Dir::Forward => cur.forward_delimited(),
                };
                if let Err(err) = skipped {
                    cur.goto(pos);
                    return Scanned::Opener {
                        pos: err.pos,
                        token: err.delim,
                    };
                }
            }
            // An unknown token is an atom.
            None => {}
            Some(lv) => {
                let (near, far) = match dir {
                    Dir::Backward => (lv.right, lv.left),
                    Dir::Forward => (lv.left, lv.right),
                };
                match near {
                    // Met on its closing side: its far level is now pending.
                    // Both sides absent is an atom-like entry.
                    None => {
                        if let Some(f) = far {
                            stack.push(f);
                        }
                    }
                    Some(near) => {
                        while stack.last().is_some_and(|&top| top > near) {
                            stack.pop();
                        }
                        if stack.is_empty() {
                            match far {
                                Some(f) if half => stack.push(f),
                                Some(f) => {
                                    cur.goto(pos);
                                    return Scanned::Operator {
                                        level: f,
                                        pos: tok_start,
                                        token,
                                    };
                                }
                                None => {
                                    cur.goto(pos);
                                    return Scanned::Opener {
                                        pos: tok_start,
                                        token,
                                    };
                                }
                            }
                        } else {
                            if stack.last() == Some(&near) {
                                stack.pop();
                                if stack.is_empty() {
                                    // This token closed the outermost
                                    // pending construct.
                                    match far {
                                        None => {
                                            return Scanned::Pair {
                                                pos: tok_start,
                                                token,
                                            };
                                        }
                                        Some(f) if f == near => {
                                            // Associative sibling.
                                            cur.goto(pos);
                                            return Scanned::Operator {
                                                level: f,
                                                pos: tok_start,
                                                token,
                                            };
                                        }
                                        Some(f) => {
                                            // Inner keyword of a larger
                                            // construct (else between
                                            // then and end): keep going.
                                            stack.push(f);
                                        }
                                    }
                                }
                            } else if let Some(f) = far {
                                stack.push(f);
                            }
                        }
                    }
                }
            }
        }

        half = false;
        if stack.is_empty() {
            return Scanned::Plain;
        }
    }
}
