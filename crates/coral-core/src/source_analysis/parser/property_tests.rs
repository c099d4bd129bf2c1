// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the Coral parser.
//!
//! Invariants verified over generated inputs:
//!
//! 1. **Parser never panics** - arbitrary bytes always produce a tree
//! 2. **Root is always present** - even for garbage input
//! 3. **Location invariant** - parent spans enclose child spans, except
//!    deferred-body (heredoc) string nodes
//! 4. **Parser is deterministic** - same input, same tree and diagnostics
//! 5. **Valid programs parse cleanly** - no diagnostics for known-good code

use proptest::prelude::*;

use crate::ast::{Expression, Program};
use crate::source_analysis::{parse_tokens, Lexer};

/// Known-good programs that must parse without diagnostics.
const VALID_PROGRAMS: &[&str] = &[
    "",
    "x = 1",
    "x = 1\ny = x + 2",
    "puts \"hello\"",
    "def add(a, b)\n  a + b\nend",
    "if ready\n  go\nelse\n  wait\nend",
    "list = [1, 2, 3]\nlist[0]",
    "h = {a: 1, \"k\" => 2}",
    "x = 1 if enabled",
    "work while busy",
    "total = 0\ntotal = total + 1 while total < 10",
    "s = <<~DOC\n  body text\nDOC\ns",
    "m = /a#{x}b/i",
    "v = 0.5ri",
    "names = %w(ada lovelace)",
];

fn valid_program() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_PROGRAMS).prop_map(std::string::ToString::to_string)
}

fn parse_bytes(source: &[u8]) -> (Program, usize) {
    let lexed = Lexer::new(source).finish();
    let (program, diagnostics) = parse_tokens(&lexed);
    (program, diagnostics.len())
}

/// Walks the tree checking the location invariant by hand (the parser's own
/// debug assertion is compiled out in release property runs).
fn check_locations(program: &Program) -> Result<(), String> {
    let mut queue: Vec<&Expression> = program.statements.iter().collect();
    while let Some(node) = queue.pop() {
        let exempt = node.has_deferred_location();
        for child in node.children() {
            if !exempt && !node.span().contains(child.span()) {
                return Err(format!(
                    "node span {:?} does not enclose child span {:?}",
                    node.span(),
                    child.span()
                ));
            }
            queue.push(child);
        }
    }
    Ok(())
}

fn proptest_config() -> ProptestConfig {
    let default = ProptestConfig::default();
    ProptestConfig {
        cases: default.cases.max(256),
        ..default
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Property 1: the parser never panics, even on arbitrary bytes.
    #[test]
    fn parser_never_panics(input in prop::collection::vec(any::<u8>(), 0..400)) {
        let _result = parse_bytes(&input);
    }

    /// Property 1b: printable text never panics either.
    #[test]
    fn parser_never_panics_on_text(input in "\\PC{0,400}") {
        let _result = parse_bytes(input.as_bytes());
    }

    /// Property 2: a root node always comes back, malformed input included.
    #[test]
    fn root_always_present(input in "\\PC{0,300}") {
        let (program, _count) = parse_bytes(input.as_bytes());
        // The span is well-formed even for empty input.
        prop_assert!(program.span.start() <= program.span.end());
    }

    /// Property 3: parent spans enclose child spans (heredocs exempt).
    #[test]
    fn location_invariant_holds(input in "\\PC{0,300}") {
        let (program, _count) = parse_bytes(input.as_bytes());
        if let Err(message) = check_locations(&program) {
            prop_assert!(false, "{} for input {:?}", message, input);
        }
    }

    /// Property 4: parsing is deterministic.
    #[test]
    fn parser_deterministic(input in "\\PC{0,200}") {
        let lexed_a = Lexer::new(input.as_bytes()).finish();
        let lexed_b = Lexer::new(input.as_bytes()).finish();
        let (program_a, diagnostics_a) = parse_tokens(&lexed_a);
        let (program_b, diagnostics_b) = parse_tokens(&lexed_b);
        prop_assert_eq!(&program_a, &program_b);
        prop_assert_eq!(diagnostics_a, diagnostics_b);
    }

    /// Property 5: known-good programs produce no diagnostics.
    #[test]
    fn valid_programs_parse_cleanly(input in valid_program()) {
        let lexed = Lexer::new(input.as_bytes()).finish();
        let (_program, diagnostics) = parse_tokens(&lexed);
        prop_assert!(
            diagnostics.is_empty(),
            "valid program {:?} produced diagnostics {:?}",
            input,
            diagnostics,
        );
    }
}
