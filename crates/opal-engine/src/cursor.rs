//! Byte-level navigation over the host buffer.
//!
//! The cursor wraps a source string and a byte position, and provides the
//! capabilities the scanner and the indentation calculator expect from the
//! host editor: line geometry, trivia (whitespace and comment) skipping,
//! and balanced-delimiter skipping at the character level. Positions are
//! byte offsets into the UTF-8 source; columns are counted in characters.
//!
//! Comment and string spans are computed once per cursor with a single
//! forward scan, so the lookups the calculator does per rule stay cheap.

use std::fmt;

use serde::Serialize;

/// Comment markers of the language being indented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSyntax {
    /// Line comment marker, to end of line.
    pub line: Option<String>,
    /// Block comment open/close markers.
    pub block: Option<(String, String)>,
}

impl Default for CommentSyntax {
    fn default() -> Self {
        Self {
            line: Some("//".to_owned()),
            block: Some(("/*".to_owned(), "*/".to_owned())),
        }
    }
}

impl CommentSyntax {
    /// A language without comments.
    pub fn none() -> Self {
        Self {
            line: None,
            block: None,
        }
    }
}

/// A balanced-delimiter skip that could not complete.
///
/// `delim` is the character the skip ran into, empty at a buffer edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelimError {
    pub pos: u32,
    pub delim: String,
}

impl fmt::Display for DelimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delim.is_empty() {
            write!(f, "no balanced span at offset {}", self.pos)
        } else {
            write!(f, "unmatched {:?} at offset {}", self.delim, self.pos)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Comment,
    Str,
}

/// A span of source the token rules must not look inside.
#[derive(Debug, Clone, Copy)]
struct Region {
    start: u32,
    end: u32,
    kind: RegionKind,
}

/// Cursor over the buffer being indented.
pub struct Cursor<'s> {
    source: &'s str,
    pos: u32,
    /// Byte offset of the start of each line; the first entry is 0.
    line_starts: Vec<u32>,
    /// Comment and string spans, sorted and non-overlapping.
    regions: Vec<Region>,
}

impl<'s> Cursor<'s> {
    pub fn new(source: &'s str, comments: &CommentSyntax) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            source,
            pos: 0,
            line_starts,
            regions: scan_regions(source, comments),
        }
    }

    // ── Position ───────────────────────────────────────────────────────

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn goto(&mut self, pos: u32) {
        debug_assert!(self.source.is_char_boundary(pos as usize));
        self.pos = pos;
    }

    pub fn at_start(&self) -> bool {
        self.pos == 0
    }

    pub fn at_end(&self) -> bool {
        self.pos as usize == self.source.len()
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn slice(&self, start: u32, end: u32) -> &'s str {
        &self.source[start as usize..end as usize]
    }

    /// Character at the cursor, without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.source[self.pos as usize..].chars().next()
    }

    /// Character just before the cursor.
    pub fn peek_back(&self) -> Option<char> {
        self.source[..self.pos as usize].chars().next_back()
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8() as u32;
        Some(c)
    }

    pub fn retreat(&mut self) -> Option<char> {
        let c = self.peek_back()?;
        self.pos -= c.len_utf8() as u32;
        Some(c)
    }

    // ── Line geometry ──────────────────────────────────────────────────

    /// Index of the line containing `pos` (0-based).
    pub fn line_of(&self, pos: u32) -> usize {
        self.line_starts.partition_point(|&start| start <= pos) - 1
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset where line `line` starts, if it exists.
    pub fn start_of_line(&self, line: usize) -> Option<u32> {
        self.line_starts.get(line).copied()
    }

    /// Byte offset of the start of the line containing `pos`.
    pub fn line_start(&self, pos: u32) -> u32 {
        self.line_starts[self.line_of(pos)]
    }

    /// Byte offset of the end of the line containing `pos` (before the
    /// newline, or the end of the buffer).
    pub fn line_end(&self, pos: u32) -> u32 {
        let line = self.line_of(pos);
        match self.line_starts.get(line + 1) {
            Some(&next) => next - 1,
            None => self.source.len() as u32,
        }
    }

    /// Position of the first non-blank character of `pos`'s line (the line
    /// end when the line is all blank).
    pub fn first_nonblank(&self, pos: u32) -> u32 {
        let mut p = self.line_start(pos);
        let end = self.line_end(pos);
        for c in self.source[p as usize..end as usize].chars() {
            if c != ' ' && c != '\t' {
                break;
            }
            p += c.len_utf8() as u32;
        }
        p
    }

    /// Column of `pos`, counted in characters from its line start.
    pub fn column(&self, pos: u32) -> u32 {
        let start = self.line_start(pos) as usize;
        self.source[start..pos as usize].chars().count() as u32
    }

    /// Whether the cursor sits at its line's first non-blank character.
    pub fn at_indentation(&self) -> bool {
        self.pos == self.first_nonblank(self.pos)
    }

    /// Whether the span `start..end` (a token) hangs: last non-blank of
    /// its line, but not the first.
    pub fn hanging(&self, start: u32, end: u32) -> bool {
        if start == self.first_nonblank(start) {
            return false;
        }
        let line_end = self.line_end(end);
        let mut p = end;
        while p < line_end {
            // A trailing comment still counts as blank for hanging.
            if let Some(r) = self.region_at(p) {
                if r.kind == RegionKind::Comment {
                    p = r.end.min(line_end);
                    continue;
                }
            }
            let c = self.source[p as usize..].chars().next().unwrap();
            if c != ' ' && c != '\t' {
                return false;
            }
            p += c.len_utf8() as u32;
        }
        true
    }

    // ── Trivia ─────────────────────────────────────────────────────────

    fn region_at(&self, pos: u32) -> Option<Region> {
        let i = self.regions.partition_point(|r| r.end <= pos);
        let r = self.regions.get(i)?;
        (r.start <= pos).then_some(*r)
    }

    /// Span of the block or line comment containing `pos`, if any.
    pub fn enclosing_comment(&self, pos: u32) -> Option<(u32, u32)> {
        let r = self.region_at(pos)?;
        (r.kind == RegionKind::Comment && r.start < pos).then_some((r.start, r.end))
    }

    /// Skip whitespace and comments forward.
    pub fn skip_trivia_forward(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(_) => match self.region_at(self.pos) {
                    Some(r) if r.kind == RegionKind::Comment && r.start == self.pos => {
                        self.pos = r.end;
                    }
                    _ => break,
                },
                None => break,
            }
        }
    }

    /// Skip whitespace and comments backward.
    pub fn skip_trivia_backward(&mut self) {
        loop {
            match self.peek_back() {
                Some(c) if c.is_whitespace() => {
                    self.retreat();
                }
                Some(_) => {
                    let before = self.pos - 1;
                    match self.region_at(before) {
                        Some(r) if r.kind == RegionKind::Comment => {
                            self.pos = r.start;
                        }
                        _ => break,
                    }
                }
                None => break,
            }
        }
    }

    // ── Balanced delimiters ────────────────────────────────────────────

    /// Position of the opener matching the close delimiter at `close_pos`.
    pub fn matching_open(&self, close_pos: u32) -> Option<u32> {
        let close = self.source[close_pos as usize..].chars().next()?;
        let mut stack: Vec<(char, u32)> = Vec::new();
        let mut p = 0u32;
        while (p as usize) < self.source.len() {
            if let Some(r) = self.region_at(p) {
                p = r.end;
                continue;
            }
            let c = self.source[p as usize..].chars().next().unwrap();
            if is_open_delim(c) {
                stack.push((c, p));
            } else if is_close_delim(c) {
                let top = stack.pop();
                if p == close_pos {
                    return top.filter(|&(o, _)| pairs_with(o, close)).map(|(_, at)| at);
                }
            }
            p += c.len_utf8() as u32;
        }
        None
    }

    /// Position just past the closer matching the open delimiter at
    /// `open_pos`.
    pub fn matching_close(&self, open_pos: u32) -> Option<u32> {
        let open = self.source[open_pos as usize..].chars().next()?;
        let mut depth = 0u32;
        let mut p = open_pos;
        while (p as usize) < self.source.len() {
            if p > open_pos {
                if let Some(r) = self.region_at(p) {
                    p = r.end;
                    continue;
                }
            }
            let c = self.source[p as usize..].chars().next().unwrap();
            if is_open_delim(c) {
                depth += 1;
            } else if is_close_delim(c) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return pairs_with(open, c).then_some(p + c.len_utf8() as u32);
                }
            }
            p += c.len_utf8() as u32;
        }
        None
    }

    /// Skip one balanced span backward: a parenthesized group or a string.
    ///
    /// Leaves the cursor before the span on success. Fails at an open
    /// delimiter (the enclosing construct) or the buffer start.
    pub fn backward_delimited(&mut self) -> Result<(), DelimError> {
        self.skip_trivia_backward();
        let Some(c) = self.peek_back() else {
            return Err(DelimError {
                pos: self.pos,
                delim: String::new(),
            });
        };
        let before = self.pos - c.len_utf8() as u32;
        if is_close_delim(c) {
            match self.matching_open(before) {
                Some(open) => {
                    self.pos = open;
                    Ok(())
                }
                None => Err(DelimError {
                    pos: before,
                    delim: c.to_string(),
                }),
            }
        } else if c == '"' {
            match self.region_at(before) {
                Some(r) if r.kind == RegionKind::Str && r.end == self.pos => {
                    self.pos = r.start;
                    Ok(())
                }
                _ => Err(DelimError {
                    pos: before,
                    delim: c.to_string(),
                }),
            }
        } else {
            Err(DelimError {
                pos: before,
                delim: c.to_string(),
            })
        }
    }

    /// Skip one balanced span forward; mirror of [`Self::backward_delimited`].
    pub fn forward_delimited(&mut self) -> Result<(), DelimError> {
        self.skip_trivia_forward();
        let Some(c) = self.peek() else {
            return Err(DelimError {
                pos: self.pos,
                delim: String::new(),
            });
        };
        if is_open_delim(c) {
            match self.matching_close(self.pos) {
                Some(after) => {
                    self.pos = after;
                    Ok(())
                }
                None => Err(DelimError {
                    pos: self.pos,
                    delim: c.to_string(),
                }),
            }
        } else if c == '"' {
            match self.region_at(self.pos) {
                Some(r) if r.kind == RegionKind::Str && r.start == self.pos => {
                    self.pos = r.end;
                    Ok(())
                }
                _ => Err(DelimError {
                    pos: self.pos,
                    delim: c.to_string(),
                }),
            }
        } else {
            Err(DelimError {
                pos: self.pos,
                delim: c.to_string(),
            })
        }
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("pos", &self.pos)
            .field("len", &self.source.len())
            .finish()
    }
}

pub(crate) fn is_open_delim(c: char) -> bool {
    matches!(c, '(' | '[' | '{')
}

pub(crate) fn is_close_delim(c: char) -> bool {
    matches!(c, ')' | ']' | '}')
}

fn pairs_with(open: char, close: char) -> bool {
    matches!((open, close), ('(', ')') | ('[', ']') | ('{', '}'))
}

/// One forward scan collecting comment and string spans.
fn scan_regions(source: &str, comments: &CommentSyntax) -> Vec<Region> {
    let mut regions = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(line) = &comments.line {
            if source[i..].starts_with(line.as_str()) {
                let end = source[i..]
                    .find('\n')
                    .map(|n| i + n)
                    .unwrap_or(source.len());
                regions.push(Region {
                    start: i as u32,
                    end: end as u32,
                    kind: RegionKind::Comment,
                });
                i = end;
                continue;
            }
        }
        if let Some((open, close)) = &comments.block {
            if source[i..].starts_with(open.as_str()) {
                let end = source[i + open.len()..]
                    .find(close.as_str())
                    .map(|n| i + open.len() + n + close.len())
                    .unwrap_or(source.len());
                regions.push(Region {
                    start: i as u32,
                    end: end as u32,
                    kind: RegionKind::Comment,
                });
                i = end;
                continue;
            }
        }
        if bytes[i] == b'"' {
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' => j += 2,
                    b'"' => {
                        j += 1;
                        break;
                    }
                    _ => j += 1,
                }
            }
            let end = j.min(bytes.len());
            regions.push(Region {
                start: i as u32,
                end: end as u32,
                kind: RegionKind::Str,
            });
            i = end;
            continue;
        }
        i += 1;
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(source: &str) -> Cursor<'_> {
        Cursor::new(source, &CommentSyntax::default())
    }

    #[test]
    fn line_geometry() {
        let cur = cursor("ab\ncd\n  ef");
        assert_eq!(cur.line_of(0), 0);
        assert_eq!(cur.line_of(3), 1);
        assert_eq!(cur.line_start(4), 3);
        assert_eq!(cur.line_end(4), 5);
        assert_eq!(cur.first_nonblank(7), 8);
        assert_eq!(cur.column(8), 2);
    }

    #[test]
    fn at_indentation_requires_first_nonblank() {
        let mut cur = cursor("  ab");
        cur.goto(2);
        assert!(cur.at_indentation());
        cur.goto(3);
        assert!(!cur.at_indentation());
        cur.goto(0);
        assert!(!cur.at_indentation());
    }

    #[test]
    fn skip_trivia_forward_over_comment() {
        let mut cur = cursor("  // note\n  x");
        cur.skip_trivia_forward();
        assert_eq!(cur.peek(), Some('x'));
    }

    #[test]
    fn skip_trivia_backward_over_comment() {
        let mut cur = cursor("x // note\ny");
        cur.goto(10);
        cur.skip_trivia_backward();
        assert_eq!(cur.peek_back(), Some('x'));
    }

    #[test]
    fn skip_trivia_backward_over_block_comment() {
        let mut cur = cursor("a /* b\nc */ d");
        cur.goto(12);
        cur.skip_trivia_backward();
        assert_eq!(cur.pos(), 1);
    }

    #[test]
    fn hanging_token_ends_its_line() {
        //            0123456789
        let cur = cursor("a do\n  b");
        assert!(cur.hanging(2, 4), "do is last but not first");
        assert!(!cur.hanging(0, 1), "a starts the line");
        let cur = cursor("do\n  b");
        assert!(!cur.hanging(0, 2), "do starts its line");
    }

    #[test]
    fn hanging_ignores_a_trailing_comment() {
        let cur = cursor("a do // open\n  b");
        assert!(cur.hanging(2, 4));
    }

    #[test]
    fn enclosing_comment_finds_block_span() {
        let src = "x /* hello\n * there */ y";
        let cur = cursor(src);
        let open = src.find("/*").unwrap() as u32;
        let end = (src.find("*/").unwrap() + 2) as u32;
        assert_eq!(cur.enclosing_comment(open + 4), Some((open, end)));
        assert_eq!(cur.enclosing_comment(0), None);
    }

    #[test]
    fn matching_open_skips_nested_pairs() {
        let src = "f(a, (b), c)";
        let cur = cursor(src);
        assert_eq!(cur.matching_open(11), Some(1));
        assert_eq!(cur.matching_open(7), Some(5));
    }

    #[test]
    fn matching_ignores_delims_in_strings() {
        let src = r#"f(")")"#;
        let cur = cursor(src);
        assert_eq!(cur.matching_open(5), Some(1));
    }

    #[test]
    fn backward_delimited_crosses_a_group() {
        let mut cur = cursor("x (a b) ");
        cur.goto(8);
        assert!(cur.backward_delimited().is_ok());
        assert_eq!(cur.pos(), 2);
    }

    #[test]
    fn backward_delimited_stops_at_open_paren() {
        let mut cur = cursor("(a ");
        cur.goto(3);
        // `a` is not a delimiter; the skip refuses.
        assert!(cur.backward_delimited().is_err());
        cur.goto(1);
        let err = cur.backward_delimited().unwrap_err();
        assert_eq!(err.delim, "(");
    }

    #[test]
    fn backward_delimited_at_buffer_start() {
        let mut cur = cursor("  x");
        cur.goto(0);
        let err = cur.backward_delimited().unwrap_err();
        assert!(err.delim.is_empty());
    }

    #[test]
    fn forward_delimited_crosses_group_and_string() {
        let mut cur = cursor(r#"(a) "s" x"#);
        assert!(cur.forward_delimited().is_ok());
        assert_eq!(cur.pos(), 3);
        assert!(cur.forward_delimited().is_ok());
        assert_eq!(cur.pos(), 7);
        assert!(cur.forward_delimited().is_err());
    }

    #[test]
    fn multibyte_columns_count_characters() {
        let src = "é = 1";
        let cur = cursor(src);
        // `=` starts at byte 3 but column 2.
        assert_eq!(cur.column(3), 2);
    }
}
