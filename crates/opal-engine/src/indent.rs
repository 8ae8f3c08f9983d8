//! The indentation calculator.
//!
//! [`Engine`] binds a language context to one buffer and computes the
//! column a line should start at. The calculator is a cascade of rules
//! tried in order; the first rule with an opinion wins, and anything it
//! cannot make sense of falls back to column zero. Indentation is
//! advisory: nothing in here returns an error.
//!
//! Several rules recurse through [`Engine::indent_virtual`]: the column a
//! token *would* be indented to, which is its current column when the
//! trust mode allows it and a fresh calculation otherwise.

use crate::cursor::{is_close_delim, is_open_delim, Cursor};
use crate::rules::Lang;
use crate::scanner::{scan, Dir, Scanned, Start};
use crate::tokens::{Tokenizer, WordTokenizer};

/// How far the existing indentation is trusted when computing a virtual
/// column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Virtual {
    /// Trust nothing; always calculate.
    None,
    /// Trust the current column when the cursor starts its line.
    Bolp,
    /// Trust the current column unless the following token hangs at the
    /// end of its line.
    Hanging,
}

/// Bound on rule recursion; trips fall back to column zero.
const MAX_DEPTH: u32 = 64;

/// The per-command indentation engine over one buffer.
pub struct Engine<'s, T: Tokenizer = WordTokenizer> {
    lang: &'s Lang,
    cursor: Cursor<'s>,
    tokenizer: T,
    depth: u32,
}

impl<'s> Engine<'s, WordTokenizer> {
    pub fn new(lang: &'s Lang, source: &'s str) -> Self {
        Self::with_tokenizer(lang, source, WordTokenizer)
    }
}

impl<'s, T: Tokenizer> Engine<'s, T> {
    pub fn with_tokenizer(lang: &'s Lang, source: &'s str, tokenizer: T) -> Self {
        Self {
            lang,
            cursor: Cursor::new(source, &lang.comments),
            tokenizer,
            depth: 0,
        }
    }

    pub fn pos(&self) -> u32 {
        self.cursor.pos()
    }

    pub fn goto(&mut self, pos: u32) {
        self.cursor.goto(pos);
    }

    // ── Scanning ───────────────────────────────────────────────────────

    /// Skip one sub-expression backward; `halfsexp` lets the scan start on
    /// an operator and consume its left operand.
    pub fn backward_sexp(&mut self, halfsexp: bool) -> Scanned {
        scan(
            &self.lang.levels,
            &self.tokenizer,
            &mut self.cursor,
            Dir::Backward,
            Start::Plain(halfsexp),
        )
    }

    /// Skip one sub-expression forward.
    pub fn forward_sexp(&mut self, halfsexp: bool) -> Scanned {
        scan(
            &self.lang.levels,
            &self.tokenizer,
            &mut self.cursor,
            Dir::Forward,
            Start::Plain(halfsexp),
        )
    }

    fn scan_back_seeded(&mut self, level: u32) -> Scanned {
        scan(
            &self.lang.levels,
            &self.tokenizer,
            &mut self.cursor,
            Dir::Backward,
            Start::Seeded(level),
        )
    }

    // ── Entry points ───────────────────────────────────────────────────

    /// Column for the line containing the cursor.
    pub fn indent_line(&mut self) -> u32 {
        let target = self.cursor.first_nonblank(self.cursor.pos());
        self.cursor.goto(target);
        self.depth = 0;
        self.calculate().unwrap_or(0).max(0) as u32
    }

    /// Virtual column at the cursor under the given trust mode.
    pub fn indent_calculate(&mut self, virt: Virtual) -> u32 {
        self.depth = 0;
        let col = match virt {
            Virtual::None => self.calculate(),
            mode => self.indent_virtual(mode),
        };
        col.unwrap_or(0).max(0) as u32
    }

    // ── The cascade ────────────────────────────────────────────────────

    fn indent_virtual(&mut self, virt: Virtual) -> Option<i32> {
        let here = self.cursor.pos();
        match virt {
            Virtual::Bolp if self.cursor.at_indentation() => {
                Some(self.cursor.column(here) as i32)
            }
            Virtual::Hanging if !self.next_token_hangs() => {
                Some(self.cursor.column(here) as i32)
            }
            _ => self.calculate(),
        }
    }

    fn calculate(&mut self) -> Option<i32> {
        if self.depth >= MAX_DEPTH {
            return Some(0);
        }
        self.depth += 1;
        let rules: [fn(&mut Self) -> Option<i32>; 5] = [
            Self::indent_close,
            Self::indent_comment_continuation,
            Self::indent_keyword,
            Self::indent_after_keyword,
            Self::indent_exprs,
        ];
        let mut result = None;
        for rule in rules {
            let saved = self.cursor.pos();
            result = rule(self);
            self.cursor.goto(saved);
            if result.is_some() {
                break;
            }
        }
        self.depth -= 1;
        result
    }

    /// A close delimiter lines up under its opener's virtual column.
    fn indent_close(&mut self) -> Option<i32> {
        let c = self.cursor.peek()?;
        if !is_close_delim(c) {
            return None;
        }
        let open = self.cursor.matching_open(self.cursor.pos())?;
        self.cursor.goto(open);
        self.indent_virtual(Virtual::Hanging)
    }

    /// Inside a block comment, a leading `*` lines up with the previous
    /// line's `*`, or one past the comment opener.
    fn indent_comment_continuation(&mut self) -> Option<i32> {
        let here = self.cursor.pos();
        let (start, _) = self.cursor.enclosing_comment(here)?;
        if self.cursor.peek() != Some('*') {
            return None;
        }
        let line_start = self.cursor.line_start(here);
        if line_start > start {
            let prev = self.cursor.first_nonblank(line_start - 1);
            let prev_char = self.cursor.source()[prev as usize..].chars().next();
            if prev > start && prev_char == Some('*') {
                return Some(self.cursor.column(prev) as i32);
            }
        }
        Some(self.cursor.column(start) as i32 + 1)
    }

    /// A token with a left level continues some construct: find the
    /// construct's start and indent relative to it.
    fn indent_keyword(&mut self) -> Option<i32> {
        let token = self.peek_forward_token();
        if token.is_empty() {
            return None;
        }
        let left = self.lang.levels.get(&token)?.left?;
        match self.scan_back_seeded(left) {
            // The delimiter and edge cases belong to other rules.
            Scanned::Opener { .. } | Scanned::Plain => None,
            Scanned::Operator { level, pos, .. } if level == left => {
                // A sibling in the same construct: chain to the earliest.
                self.cursor.goto(pos);
                self.indent_virtual(Virtual::Bolp)
            }
            Scanned::Operator {
                pos, token: parent, ..
            }
            | Scanned::Pair { pos, token: parent } => {
                let offset = self
                    .lang
                    .rules
                    .child_offset(&parent, &token)
                    .unwrap_or(0);
                self.cursor.goto(pos);
                Some(offset + self.indent_virtual(Virtual::Bolp)?)
            }
        }
    }

    /// Right after a block-opening keyword (or any token with an `after`
    /// rule), indent by its offset from the keyword's base column.
    fn indent_after_keyword(&mut self) -> Option<i32> {
        let token = self.tokenizer.backward_token(&mut self.cursor);
        if token.is_empty() {
            return None;
        }
        let tok_start = self.cursor.pos();
        let tok_end = tok_start + token.len() as u32;
        let levels = self.lang.levels.get(&token);
        let opener_like = levels.is_some_and(|lv| lv.left.is_none() && lv.right.is_some());
        if !opener_like && !self.lang.rules.has_after(&token) {
            return None;
        }
        let hanging = self.cursor.hanging(tok_start, tok_end);
        let offset = self
            .lang
            .rules
            .after_offset(&token, hanging)
            .unwrap_or(self.lang.rules.basic_step() as i32);
        let base = if hanging {
            self.indent_virtual(Virtual::Bolp)?
        } else {
            self.cursor.column(tok_start) as i32
        };
        Some(base + offset)
    }

    /// The main expression walk: align with siblings collected scanning
    /// backward, or with the function they are arguments of.
    fn indent_exprs(&mut self) -> Option<i32> {
        enum Arrival {
            LineStart,
            Op(String),
            Open { pos: u32, delim: String },
        }

        let origin = self.cursor.pos();
        let mut positions: Vec<u32> = Vec::new();
        let arrival = loop {
            match self.backward_sexp(false) {
                res @ (Scanned::Plain | Scanned::Pair { .. }) => {
                    let at = match res {
                        Scanned::Pair { pos, .. } => pos,
                        _ => self.cursor.pos(),
                    };
                    positions.push(at);
                    if at == self.cursor.first_nonblank(at) {
                        break Arrival::LineStart;
                    }
                }
                Scanned::Operator { token, .. } => break Arrival::Op(token),
                Scanned::Opener { pos, token } => break Arrival::Open { pos, delim: token },
            }
        };

        if positions.is_empty() {
            return match arrival {
                Arrival::Op(_) => {
                    self.cursor.goto(origin);
                    self.indent_after_infix()
                }
                // The first thing inside an open delimiter sits one past it.
                Arrival::Open { pos, delim }
                    if delim.chars().next().is_some_and(is_open_delim) =>
                {
                    Some(self.cursor.column(pos) as i32 + 1)
                }
                _ => None,
            };
        }

        let leftmost = *positions.last().unwrap();
        match arrival {
            // Stopped because an operator or list introduction precedes
            // the siblings: they are sequence elements, align with the
            // first one.
            Arrival::Op(_) => Some(self.cursor.column(leftmost) as i32),
            // The siblings are the first expressions inside a delimiter.
            Arrival::Open { .. } => Some(self.cursor.column(leftmost) as i32),
            Arrival::LineStart => {
                // Is the line-starting sibling a function, or just one
                // more element of a sequence?
                self.cursor.goto(leftmost);
                let element = match self.backward_sexp(false) {
                    Scanned::Plain | Scanned::Pair { .. } => true,
                    Scanned::Operator { token, .. } => self.lang.rules.is_list_intro(&token),
                    Scanned::Opener { .. } => false,
                };
                if element {
                    Some(self.cursor.column(leftmost) as i32)
                } else if positions.len() == 1 {
                    // We are the function's first argument.
                    Some(self.cursor.column(leftmost) as i32 + self.lang.rules.args_offset())
                } else {
                    // Align with its first argument.
                    let first_arg = positions[positions.len() - 2];
                    Some(self.cursor.column(first_arg) as i32)
                }
            }
        }
    }

    /// Right after an infix operator with no sibling collected: back over
    /// the operator's left operands and align with where they start.
    fn indent_after_infix(&mut self) -> Option<i32> {
        let token = self.tokenizer.backward_token(&mut self.cursor);
        let levels = self.lang.levels.get(&token)?;
        // Only true infix tokens qualify; openers and closers are handled
        // by the keyword rules.
        let (left, _right) = (levels.left?, levels.right?);
        loop {
            match self.scan_back_seeded(left) {
                Scanned::Operator { level, pos, .. } if level == left => {
                    // An earlier sibling operator: keep walking left.
                    self.cursor.goto(pos);
                }
                Scanned::Operator { .. } => {
                    // Crossed to the operand start of a looser construct.
                    return Some(self.cursor.column(self.cursor.pos()) as i32);
                }
                Scanned::Plain | Scanned::Pair { .. } | Scanned::Opener { .. } => {
                    return self.indent_virtual(Virtual::Hanging);
                }
            }
        }
    }

    // ── Probes ─────────────────────────────────────────────────────────

    /// Read the token after the cursor without moving.
    fn peek_forward_token(&mut self) -> String {
        let saved = self.cursor.pos();
        let token = self.tokenizer.forward_token(&mut self.cursor);
        self.cursor.goto(saved);
        token
    }

    /// Whether the token following the cursor hangs at the end of its
    /// line. Delimiters and quotes count as one-character tokens.
    fn next_token_hangs(&mut self) -> bool {
        let saved = self.cursor.pos();
        let token = self.tokenizer.forward_token(&mut self.cursor);
        let span = if token.is_empty() {
            self.cursor.skip_trivia_forward();
            match self.cursor.peek() {
                Some(c) if is_open_delim(c) || is_close_delim(c) || c == '"' => {
                    (self.cursor.pos(), self.cursor.pos() + c.len_utf8() as u32)
                }
                _ => {
                    self.cursor.goto(saved);
                    return false;
                }
            }
        } else {
            (self.cursor.pos() - token.len() as u32, self.cursor.pos())
        };
        self.cursor.goto(saved);
        self.cursor.hanging(span.0, span.1)
    }
}

// ── Applying computed columns ───────────────────────────────────────────

/// Recompute the indentation of one line and return the rewritten buffer.
pub fn reindent_line(lang: &Lang, source: &str, line: usize) -> String {
    let mut engine = Engine::new(lang, source);
    let Some(start) = engine.cursor.start_of_line(line) else {
        return source.to_owned();
    };
    if engine.cursor.first_nonblank(start) == engine.cursor.line_end(start) {
        return source.to_owned();
    }
    engine.goto(start);
    let col = engine.indent_line();
    replace_indent(source, start as usize, col)
}

/// Reindent every line, top to bottom.
///
/// Each line is recomputed against the text as rewritten so far, so
/// columns shift consistently through nested constructs.
pub fn reindent(lang: &Lang, source: &str) -> String {
    let lines = source.lines().count().max(1);
    let mut text = source.to_owned();
    for line in 0..lines {
        text = reindent_line(lang, &text, line);
    }
    text
}

fn replace_indent(source: &str, line_start: usize, col: u32) -> String {
    let rest = &source[line_start..];
    let ws = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let mut out = String::with_capacity(source.len() + col as usize);
    out.push_str(&source[..line_start]);
    out.extend(std::iter::repeat(' ').take(col as usize));
    out.push_str(&source[line_start + ws..]);
    out
}
