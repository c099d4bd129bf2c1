// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Parser unit tests: structure, precedence, disambiguation, and recovery.

use crate::ast::{Expression, IntValue, Numeric, Program, StringPart};
use crate::source_analysis::{parse_tokens, Diagnostic, DiagnosticKind, Lexer};

fn parse_source(source: &str) -> (Program, Vec<Diagnostic>) {
    let lexed = Lexer::new(source.as_bytes()).finish();
    parse_tokens(&lexed)
}

fn parse_ok(source: &str) -> Program {
    let (program, diagnostics) = parse_source(source);
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics for {source:?}: {diagnostics:?}"
    );
    program
}

fn first_statement(source: &str) -> Expression {
    let mut program = parse_ok(source);
    assert_eq!(
        program.statements.len(),
        1,
        "expected one statement for {source:?}"
    );
    program.statements.pop().unwrap()
}

#[test]
fn empty_input_parses_to_empty_program() {
    let (program, diagnostics) = parse_source("");
    assert!(program.statements.is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn whitespace_and_comments_only() {
    let (program, diagnostics) = parse_source("# just a comment\n\n");
    assert!(program.statements.is_empty());
    assert!(diagnostics.is_empty());
}

#[test]
fn statements_split_on_newlines_and_semicolons() {
    let program = parse_ok("a\nb; c\n");
    assert_eq!(program.statements.len(), 3);
}

#[test]
fn assignment_declares_local() {
    let program = parse_ok("x = 1\nx");
    assert!(matches!(program.statements[0], Expression::Assign { .. }));
    // Second statement reads the declared local, not a call.
    assert!(matches!(program.statements[1], Expression::LocalRead(_)));
}

#[test]
fn bare_unknown_identifier_is_a_call() {
    let statement = first_statement("foo");
    match statement {
        Expression::Call {
            receiver,
            name,
            arguments,
            parenthesized,
            ..
        } => {
            assert!(receiver.is_none());
            assert_eq!(name.text, "foo");
            assert!(arguments.is_empty());
            assert!(!parenthesized);
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn local_is_visible_in_its_own_rhs() {
    // `x` on the right-hand side reads the local being assigned.
    let program = parse_ok("x = x");
    match &program.statements[0] {
        Expression::Assign { value, .. } => {
            assert!(matches!(**value, Expression::LocalRead(_)));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn command_call_without_parens() {
    let statement = first_statement("puts 1, 2");
    match statement {
        Expression::Call {
            name,
            arguments,
            parenthesized,
            ..
        } => {
            assert_eq!(name.text, "puts");
            assert_eq!(arguments.len(), 2);
            assert!(!parenthesized);
        }
        other => panic!("expected command call, got {other:?}"),
    }
}

#[test]
fn known_local_followed_by_literal_is_not_a_command() {
    // `x 1` after `x = 0` cannot be a call; the stray literal is reported.
    let (_, diagnostics) = parse_source("x = 0\nx 1");
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnexpectedToken));
}

#[test]
fn command_calls_do_not_start_in_operand_position() {
    // In `(foo 1)` the inner context is argument-less.
    let (_, diagnostics) = parse_source("(foo 1)");
    assert!(!diagnostics.is_empty());
}

#[test]
fn binary_precedence_multiplication_binds_tighter() {
    let statement = first_statement("1 + 2 * 3");
    match statement {
        Expression::Binary { op, right, .. } => {
            assert_eq!(op, "+");
            assert!(matches!(*right, Expression::Binary { ref op, .. } if op == "*"));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn power_is_right_associative() {
    let statement = first_statement("2 ** 3 ** 2");
    match statement {
        Expression::Binary { op, left, right, .. } => {
            assert_eq!(op, "**");
            assert!(matches!(*left, Expression::Number(..)));
            assert!(matches!(*right, Expression::Binary { ref op, .. } if op == "**"));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn unary_minus_wraps_power() {
    // `-2 ** 2` parses as `-(2 ** 2)`.
    let statement = first_statement("-2 ** 2");
    match statement {
        Expression::Unary { op, operand, .. } => {
            assert_eq!(op, "-");
            assert!(matches!(*operand, Expression::Binary { ref op, .. } if op == "**"));
        }
        other => panic!("expected unary, got {other:?}"),
    }
}

#[test]
fn keyword_operators_bind_loosest() {
    let statement = first_statement("a == 1 and b == 2");
    match statement {
        Expression::Binary { op, .. } => assert_eq!(op, "and"),
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn range_operator() {
    let statement = first_statement("1..10");
    assert!(matches!(statement, Expression::Binary { ref op, .. } if op == ".."));
}

#[test]
fn method_call_chain() {
    let statement = first_statement("a.b.c(1)");
    match statement {
        Expression::Call {
            receiver: Some(receiver),
            name,
            parenthesized,
            ..
        } => {
            assert_eq!(name.text, "c");
            assert!(parenthesized);
            assert!(matches!(*receiver, Expression::Call { .. }));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn leading_dot_continuation() {
    let program = parse_ok("foo\n  .bar");
    assert_eq!(program.statements.len(), 1);
    assert!(matches!(
        program.statements[0],
        Expression::Call { receiver: Some(_), .. }
    ));
}

#[test]
fn indexing() {
    let statement = first_statement("a[1, 2]");
    match statement {
        Expression::Index { arguments, .. } => assert_eq!(arguments.len(), 2),
        other => panic!("expected index, got {other:?}"),
    }
}

#[test]
fn index_assignment_target() {
    let statement = first_statement("a[0] = 1");
    match statement {
        Expression::Assign { target, .. } => {
            assert!(matches!(*target, Expression::Index { .. }));
        }
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn invalid_assignment_target_recovers() {
    let (program, diagnostics) = parse_source("1 = 2");
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::InvalidAssignmentTarget));
    // Still a complete tree with a placeholder target.
    assert_eq!(program.statements.len(), 1);
    assert!(matches!(
        &program.statements[0],
        Expression::Assign { target, .. } if target.is_error()
    ));
}

#[test]
fn array_and_hash_literals() {
    let statement = first_statement("[1, :two, \"three\"]");
    assert!(matches!(
        statement,
        Expression::Array { ref elements, .. } if elements.len() == 3
    ));

    let statement = first_statement("{a: 1, \"k\" => 2}");
    match statement {
        Expression::Hash { pairs, .. } => {
            assert_eq!(pairs.len(), 2);
            assert!(matches!(pairs[0].key, Expression::Sym { .. }));
            assert!(matches!(pairs[1].key, Expression::Str { .. }));
        }
        other => panic!("expected hash, got {other:?}"),
    }
}

#[test]
fn if_expression_with_elsif_and_else() {
    let statement = first_statement("if a\n 1\nelsif b\n 2\nelse\n 3\nend");
    match statement {
        Expression::If {
            then_body,
            else_body,
            ..
        } => {
            assert_eq!(then_body.len(), 1);
            let else_body = else_body.expect("expected else body");
            assert_eq!(else_body.len(), 1);
            // The elsif chain nests as a single if.
            match &else_body[0] {
                Expression::If { else_body, .. } => {
                    assert!(else_body.is_some());
                }
                other => panic!("expected nested if, got {other:?}"),
            }
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn unless_and_loops() {
    assert!(matches!(
        first_statement("unless a\n 1\nend"),
        Expression::Unless { .. }
    ));
    assert!(matches!(
        first_statement("while a\n 1\nend"),
        Expression::While { .. }
    ));
    assert!(matches!(
        first_statement("until a do 1 end"),
        Expression::Until { .. }
    ));
}

#[test]
fn conditional_modifiers() {
    let statement = first_statement("x = 1 if ready");
    match statement {
        Expression::If {
            condition,
            then_body,
            else_body,
            ..
        } => {
            assert!(matches!(*condition, Expression::Call { .. }));
            assert!(matches!(then_body[0], Expression::Assign { .. }));
            assert!(else_body.is_none());
        }
        other => panic!("expected modifier if, got {other:?}"),
    }

    assert!(matches!(
        first_statement("work until done"),
        Expression::Until { .. }
    ));
}

#[test]
fn method_definition_scopes_parameters() {
    let program = parse_ok("def add(a, b)\n  a + b\nend\na");
    match &program.statements[0] {
        Expression::MethodDef {
            name,
            parameters,
            body,
            ..
        } => {
            assert_eq!(name.text, "add");
            assert_eq!(parameters.len(), 2);
            // Inside the body, `a` is a declared local.
            assert!(matches!(
                &body[0],
                Expression::Binary { left, .. } if matches!(**left, Expression::LocalRead(_))
            ));
        }
        other => panic!("expected method def, got {other:?}"),
    }
    // Outside the body the scope is popped: `a` is a call again.
    assert!(matches!(program.statements[1], Expression::Call { .. }));
}

#[test]
fn operator_method_definition() {
    let statement = first_statement("def +(other)\n  other\nend");
    assert!(matches!(
        statement,
        Expression::MethodDef { ref name, .. } if name.text == "+"
    ));
}

#[test]
fn return_break_next() {
    assert!(matches!(
        first_statement("return 1"),
        Expression::Return { value: Some(_), .. }
    ));
    assert!(matches!(
        first_statement("break"),
        Expression::Break { value: None, .. }
    ));
    // `return if done` keeps the modifier: no value.
    let statement = first_statement("return if done");
    assert!(matches!(
        statement,
        Expression::If { ref then_body, .. }
            if matches!(then_body[0], Expression::Return { value: None, .. })
    ));
}

#[test]
fn interpolated_string_parts() {
    let statement = first_statement("\"a#{1 + 2}b\"");
    match statement {
        Expression::InterpolatedStr { parts, heredoc, .. } => {
            assert!(!heredoc);
            assert_eq!(parts.len(), 3);
            assert!(matches!(&parts[0], StringPart::Literal { value, .. } if value == "a"));
            assert!(
                matches!(&parts[1], StringPart::Interpolation { expression, .. }
                    if matches!(**expression, Expression::Binary { .. }))
            );
            assert!(matches!(&parts[2], StringPart::Literal { value, .. } if value == "b"));
        }
        other => panic!("expected interpolated string, got {other:?}"),
    }
}

#[test]
fn heredoc_node_takes_opener_span() {
    let program = parse_ok("x = <<~DOC\n  text\nDOC\n");
    match &program.statements[0] {
        Expression::Assign { value, .. } => match &**value {
            Expression::Str { value, heredoc, span } => {
                assert_eq!(value, "text\n");
                assert!(heredoc);
                // `<<~DOC` occupies bytes 4..10.
                assert_eq!(span.start(), 4);
                assert_eq!(span.end(), 10);
            }
            other => panic!("expected heredoc string, got {other:?}"),
        },
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn interpolated_heredoc_keeps_opener_span() {
    let program = parse_ok("x = <<~DOC\n  a#{1}b\nDOC\n");
    match &program.statements[0] {
        Expression::Assign { value, .. } => match &**value {
            Expression::InterpolatedStr { heredoc, span, parts } => {
                assert!(heredoc);
                assert_eq!(span.start(), 4);
                assert_eq!(span.end(), 10);
                assert_eq!(parts.len(), 3);
            }
            other => panic!("expected interpolated heredoc, got {other:?}"),
        },
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn pattern_literals() {
    let statement = first_statement("x = /ab+/i");
    match statement {
        Expression::Assign { value, .. } => match *value {
            Expression::Pattern { parts, flags, .. } => {
                assert_eq!(parts.len(), 1);
                assert_eq!(flags, "i");
            }
            other => panic!("expected pattern, got {other:?}"),
        },
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn word_lists_become_arrays() {
    let statement = first_statement("%w(a b)");
    match statement {
        Expression::Array { elements, .. } => {
            assert_eq!(elements.len(), 2);
            assert!(matches!(elements[0], Expression::Str { .. }));
        }
        other => panic!("expected array, got {other:?}"),
    }

    let statement = first_statement("%i(x y)");
    match statement {
        Expression::Array { elements, .. } => {
            assert!(matches!(elements[0], Expression::Sym { .. }));
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn numeric_literal_values() {
    match first_statement("42i") {
        Expression::Number(Numeric::Imaginary(inner), _) => {
            assert_eq!(*inner, Numeric::Integer(IntValue::Small(42)));
        }
        other => panic!("expected imaginary, got {other:?}"),
    }
    match first_statement("42r") {
        Expression::Number(Numeric::Rational { numerator, denominator }, _) => {
            assert_eq!(numerator, IntValue::Small(42));
            assert_eq!(denominator, IntValue::Small(1));
        }
        other => panic!("expected rational, got {other:?}"),
    }
}

#[test]
fn unexpected_token_produces_placeholder_and_diagnostic() {
    let (program, diagnostics) = parse_source("x = )\ny = 2");
    assert!(!diagnostics.is_empty());
    // Both statements survive; the bad one holds an error node.
    assert_eq!(program.statements.len(), 2);
    assert!(matches!(program.statements[1], Expression::Assign { .. }));
}

#[test]
fn missing_end_is_reported_but_tree_survives() {
    let (program, diagnostics) = parse_source("if a\n 1\n");
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::MissingTerminator));
    assert_eq!(program.statements.len(), 1);
    assert!(matches!(program.statements[0], Expression::If { .. }));
}

#[test]
fn unterminated_string_still_yields_root() {
    let (program, diagnostics) = parse_source("\"abc");
    assert!(!diagnostics.is_empty());
    assert_eq!(program.statements.len(), 1);
    assert!(matches!(program.statements[0], Expression::Str { .. }));
}

#[test]
fn deep_nesting_is_bounded() {
    let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
    let (program, diagnostics) = parse_source(&source);
    assert!(diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::NestingTooDeep));
    assert!(!program.statements.is_empty());
}

#[test]
fn diagnostics_are_ordered_by_position() {
    let (_, diagnostics) = parse_source("x = )\ny = )\n");
    let positions: Vec<_> = diagnostics.iter().map(|d| d.span.start()).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn parenthesized_expression() {
    let statement = first_statement("(1 + 2) * 3");
    match statement {
        Expression::Binary { op, left, .. } => {
            assert_eq!(op, "*");
            assert!(matches!(*left, Expression::Parenthesized { .. }));
        }
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn labeled_arguments_collect_into_hash() {
    let statement = first_statement("connect(\"db\", timeout: 5, retries: 3)");
    match statement {
        Expression::Call { arguments, .. } => {
            assert_eq!(arguments.len(), 2);
            assert!(matches!(
                &arguments[1],
                Expression::Hash { pairs, .. } if pairs.len() == 2
            ));
        }
        other => panic!("expected call, got {other:?}"),
    }
}
