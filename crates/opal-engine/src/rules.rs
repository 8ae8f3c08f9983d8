//! Per-language indentation rules and the language context.
//!
//! The rule table keeps each recognized key shape in its own typed map
//! instead of dispatching on heterogeneous keys. All offsets are columns
//! relative to some anchor the calculator picks; the `basic` step is the
//! fallback for offsets nothing else specifies.

use rustc_hash::{FxHashMap, FxHashSet};

use opal_grammar::LevelTable;

use crate::cursor::CommentSyntax;

/// The indentation rule table of one language.
#[derive(Debug, Clone)]
pub struct Rules {
    /// Offset for lines following the token; the second value replaces the
    /// first when the token hangs at the end of its line.
    after: FxHashMap<String, (i32, Option<i32>)>,
    /// Offset of a child token relative to a specific enclosing parent.
    parent_child: FxHashMap<(String, String), i32>,
    /// Offset of a child token relative to any parent.
    any_child: FxHashMap<String, i32>,
    /// Tokens followed by a sequence of expressions rather than a call's
    /// argument list.
    list_intro: FxHashSet<String>,
    /// Offset of a call's first argument from the function column.
    args: i32,
    /// The basic indentation step.
    basic: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            after: FxHashMap::default(),
            parent_child: FxHashMap::default(),
            any_child: FxHashMap::default(),
            list_intro: FxHashSet::default(),
            args: 0,
            basic: 4,
        }
    }
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Builder ────────────────────────────────────────────────────────

    /// Indent lines after `token` by `offset`.
    pub fn after(mut self, token: &str, offset: i32) -> Self {
        self.after.insert(token.to_owned(), (offset, None));
        self
    }

    /// Like [`Rules::after`], with a distinct offset when `token` hangs.
    pub fn after_hanging(mut self, token: &str, offset: i32, hanging: i32) -> Self {
        self.after
            .insert(token.to_owned(), (offset, Some(hanging)));
        self
    }

    /// Offset `child` by `offset` relative to its enclosing `parent`.
    pub fn parent_child(mut self, parent: &str, child: &str, offset: i32) -> Self {
        self.parent_child
            .insert((parent.to_owned(), child.to_owned()), offset);
        self
    }

    /// Offset `child` relative to whatever its parent turns out to be.
    pub fn any_child(mut self, child: &str, offset: i32) -> Self {
        self.any_child.insert(child.to_owned(), offset);
        self
    }

    /// Declare tokens that introduce expression sequences.
    pub fn list_intro(mut self, tokens: &[&str]) -> Self {
        self.list_intro
            .extend(tokens.iter().map(|t| (*t).to_owned()));
        self
    }

    /// Offset of a call's first argument from the function column.
    pub fn args(mut self, offset: i32) -> Self {
        self.args = offset;
        self
    }

    /// The basic indentation step.
    pub fn basic(mut self, step: u32) -> Self {
        self.basic = step;
        self
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    pub fn after_offset(&self, token: &str, hanging: bool) -> Option<i32> {
        self.after
            .get(token)
            .map(|&(normal, hung)| if hanging { hung.unwrap_or(normal) } else { normal })
    }

    pub fn has_after(&self, token: &str) -> bool {
        self.after.contains_key(token)
    }

    /// Child offset under a parent: the specific pair wins over the
    /// any-parent entry.
    pub fn child_offset(&self, parent: &str, child: &str) -> Option<i32> {
        self.parent_child
            .get(&(parent.to_owned(), child.to_owned()))
            .or_else(|| self.any_child.get(child))
            .copied()
    }

    pub fn is_list_intro(&self, token: &str) -> bool {
        self.list_intro.contains(token)
    }

    pub fn args_offset(&self) -> i32 {
        self.args
    }

    pub fn basic_step(&self) -> u32 {
        self.basic
    }
}

/// Everything the engine needs to know about one language.
///
/// Built once at language-mode setup, immutable afterwards; engines borrow
/// it per command.
#[derive(Debug, Clone)]
pub struct Lang {
    pub levels: LevelTable,
    pub rules: Rules,
    pub comments: CommentSyntax,
}

impl Lang {
    pub fn new(levels: LevelTable, rules: Rules) -> Self {
        Self {
            levels,
            rules,
            comments: CommentSyntax::default(),
        }
    }

    pub fn with_comments(mut self, comments: CommentSyntax) -> Self {
        self.comments = comments;
        self
    }
}
