use opal_engine::{reindent, Engine, Lang, Rules, Scanned, Virtual};
use opal_grammar::{bnf_table, precs_table, solve, PrecGroup, Production};

/// Arithmetic: `;` separates statements, `+` binds looser than `*`.
fn arith_lang() -> Lang {
    let table = precs_table(&[
        PrecGroup::assoc(&[";"]),
        PrecGroup::left(&["+"]),
        PrecGroup::left(&["*"]),
    ]);
    Lang::new(solve(&table).unwrap(), Rules::new())
}

/// A block language: `if .. then .. else .. end`, `begin .. end`,
/// `;`-separated statements, arithmetic inside.
fn block_lang() -> Lang {
    let grammar = vec![
        Production::new(
            "inst",
            &[
                &["if", "exp", "then", "inst", "else", "inst", "end"],
                &["begin", "insts", "end"],
            ],
        ),
        Production::new("insts", &[&["insts", ";", "insts"], &["inst"]]),
        Production::new("exp", &[&["exp", "+", "exp"], &["exp", "*", "exp"], &["id"]]),
    ];
    let resolvers = vec![precs_table(&[
        PrecGroup::assoc(&[";"]),
        PrecGroup::left(&["+"]),
        PrecGroup::left(&["*"]),
    ])];
    let levels = solve(&bnf_table(&grammar, &resolvers)).unwrap();
    let rules = Rules::new().basic(2).after("then", 2).after("else", 2);
    Lang::new(levels, rules)
}

fn line_start(src: &str, line: usize) -> u32 {
    src.split_inclusive('\n')
        .take(line)
        .map(str::len)
        .sum::<usize>() as u32
}

fn indent_of(lang: &Lang, src: &str, line: usize) -> u32 {
    let mut engine = Engine::new(lang, src);
    engine.goto(line_start(src, line));
    engine.indent_line()
}

// ── Scanning through the engine ─────────────────────────────────────────

#[test]
fn backward_walk_over_an_expression() {
    let lang = arith_lang();
    let src = "a + b * c";
    let mut engine = Engine::new(&lang, src);
    engine.goto(src.len() as u32);

    assert_eq!(engine.backward_sexp(true), Scanned::Plain);
    assert_eq!(engine.pos(), 8);

    match engine.backward_sexp(true) {
        Scanned::Operator { token, pos, .. } => {
            assert_eq!(token, "+");
            assert_eq!(pos, 2);
        }
        other => panic!("expected to stop at +, got {other:?}"),
    }
    assert_eq!(engine.pos(), 4, "crossed the * operand");

    assert_eq!(
        engine.backward_sexp(true),
        Scanned::Opener {
            pos: 0,
            token: String::new()
        }
    );
    assert_eq!(engine.pos(), 0);
}

#[test]
fn forward_and_backward_mirror_each_other() {
    let lang = block_lang();
    let src = "if a then x else y end";
    let mut engine = Engine::new(&lang, src);

    match engine.forward_sexp(false) {
        Scanned::Pair { token, .. } => assert_eq!(token, "end"),
        other => panic!("expected to cross the construct, got {other:?}"),
    }
    assert_eq!(engine.pos(), src.len() as u32);

    match engine.backward_sexp(false) {
        Scanned::Pair { token, .. } => assert_eq!(token, "if"),
        other => panic!("expected to cross back, got {other:?}"),
    }
    assert_eq!(engine.pos(), 0);
}

// ── Keyword alignment ───────────────────────────────────────────────────

#[test]
fn else_aligns_with_its_if() {
    let lang = block_lang();
    let src = "if a then\n  x\nelse\n  y\nend";
    assert_eq!(indent_of(&lang, src, 2), 0);
    assert_eq!(indent_of(&lang, src, 4), 0);
}

#[test]
fn inner_construct_keywords_align_with_the_inner_opener() {
    let lang = block_lang();
    let src = "if a then\n  if b then\n    x\n  else\n    y\n  end\nelse\n  z\nend";
    assert_eq!(indent_of(&lang, src, 3), 2, "inner else");
    assert_eq!(indent_of(&lang, src, 5), 2, "inner end");
    assert_eq!(indent_of(&lang, src, 6), 0, "outer else");
    assert_eq!(indent_of(&lang, src, 8), 0, "outer end");
}

#[test]
fn body_after_hanging_then_indents_from_the_if_line() {
    let lang = block_lang();
    let src = "if a then\nx\nelse\ny\nend";
    assert_eq!(indent_of(&lang, src, 1), 2);
    assert_eq!(indent_of(&lang, src, 3), 2);
}

#[test]
fn statement_after_separator_aligns_with_the_previous_statement() {
    let lang = block_lang();
    let src = "begin\n  x ;\ny\nend";
    assert_eq!(indent_of(&lang, src, 2), 2);
}

#[test]
fn opener_without_a_rule_indents_by_the_basic_step() {
    // `begin` has no `after` entry; it qualifies by having no left level.
    let lang = block_lang();
    let src = "begin\nx ;\ny\nend";
    assert_eq!(indent_of(&lang, src, 1), 2);

    // Hanging at the end of its line, the opener indents from the line
    // that carries it, not from its own column.
    let src = "f begin\nx\nend";
    assert_eq!(indent_of(&lang, src, 1), 2);
}

// ── Right-associative chains ────────────────────────────────────────────

#[test]
fn arrow_chain_aligns_with_the_earliest_operand() {
    let levels = solve(&precs_table(&[PrecGroup::right(&["->"])])).unwrap();
    let lang = Lang::new(levels, Rules::new().any_child("->", 0));
    let src = "a ->\n  b ->\n  c";
    // The last line belongs to the whole chain, which starts at `a`.
    assert_eq!(indent_of(&lang, src, 2), 0);
}

// ── Call arguments ──────────────────────────────────────────────────────

#[test]
fn later_arguments_align_with_the_first() {
    let lang = arith_lang();
    let src = "foo(1,\n2)";
    assert_eq!(indent_of(&lang, src, 1), 4);
}

#[test]
fn first_expression_inside_a_paren_sits_past_it() {
    let lang = arith_lang();
    let src = "foo(\nx)";
    assert_eq!(indent_of(&lang, src, 1), 4);
}

#[test]
fn list_intro_tokens_make_sequences_not_calls() {
    let levels = solve(&precs_table(&[PrecGroup::right(&["=>"])])).unwrap();
    let src = "p =>\nf\ng";

    // Without the declaration, `f` reads as a function and `g` as its
    // argument, offset from the function column.
    let call = Lang::new(levels.clone(), Rules::new().args(4));
    assert_eq!(indent_of(&call, src, 2), 4);

    // Declared as a list introduction, `f` and `g` are siblings.
    let seq = Lang::new(levels, Rules::new().args(4).list_intro(&["=>"]));
    assert_eq!(indent_of(&seq, src, 2), 0);
}

// ── Trust modes ─────────────────────────────────────────────────────────

#[test]
fn bolp_trusts_a_line_starting_token() {
    let lang = arith_lang();
    let src = "  x + y";
    let mut engine = Engine::new(&lang, src);
    engine.goto(2);
    assert_eq!(engine.indent_calculate(Virtual::Bolp), 2);
}

#[test]
fn hanging_mode_trusts_a_non_hanging_token() {
    let lang = arith_lang();
    let src = "x y z";
    let mut engine = Engine::new(&lang, src);
    engine.goto(2);
    assert_eq!(engine.indent_calculate(Virtual::Hanging), 2);
}

// ── Whole-buffer reindentation ──────────────────────────────────────────

#[test]
fn nested_blocks_reindent() {
    let lang = block_lang();
    let src = "if a then\nif b then\nx\nelse\ny\nend\nelse\nz\nend\n";
    insta::assert_snapshot!(reindent(&lang, src));
}

#[test]
fn reindenting_is_idempotent() {
    let lang = block_lang();
    let src = "begin\nx ;\ny\nend\n";
    let once = reindent(&lang, src);
    let twice = reindent(&lang, &once);
    assert_eq!(once, twice);
}

#[test]
fn reindenting_preserves_everything_but_leading_whitespace() {
    let lang = block_lang();
    let src = "if a   then\n   x // trailing\nelse\ny\nend\n";
    let out = reindent(&lang, src);
    let strip = |s: &str| {
        s.lines()
            .map(str::trim_start)
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip(&out), strip(src));
}

#[test]
fn malformed_input_gets_a_stable_column() {
    let lang = arith_lang();
    let src = "a + + b\nc + *\n";
    let once = reindent(&lang, src);
    let twice = reindent(&lang, &once);
    assert_eq!(once, twice);
    // Content intact, some indentation chosen.
    assert!(once.contains("a + + b"));
}
