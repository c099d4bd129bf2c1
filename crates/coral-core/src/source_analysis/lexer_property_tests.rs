// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the Coral lexer.
//!
//! These tests use `proptest` to verify lexer invariants over generated
//! inputs:
//!
//! 1. **Lexer never panics** - arbitrary bytes always produce tokens
//! 2. **Token spans within input** - every span satisfies `end <= len`
//! 3. **Token spans are ordered** - main-scan tokens never overlap
//! 4. **EOF is always last** - `finish` always ends with EOF
//! 5. **Lexer is deterministic** - same input, same tokens
//! 6. **Valid fragments produce no errors** - known-valid inputs lex cleanly
//! 7. **Newline table is correct** - matches a naive scan of the bytes

use proptest::prelude::*;

use super::lexer::{lex, lex_with_eof, Lexer};
use super::token::TokenKind;

// ============================================================================
// Generators
// ============================================================================

/// Known-valid single-token fragments that should lex without errors.
const VALID_SINGLE_TOKENS: &[&str] = &[
    "42",
    "3.14",
    "1e10",
    "42r",
    "42i",
    "0.5ri",
    "0xff",
    "\"hello\"",
    "'raw'",
    ":symbol",
    ":+",
    "%w(a b)",
    "%q(text)",
    "foo",
    "valid?",
    "save!",
    "Const",
    "@ivar",
    "nil",
    "true",
    "false",
    "self",
    "+",
    "<=>",
    "(",
    ")",
    "[",
    "]",
];

/// Multi-token valid expressions that should lex cleanly.
const VALID_EXPRESSIONS: &[&str] = &[
    "x + 1",
    "x = 42",
    "a.b(1, 2)",
    "puts \"hi\"",
    "[1, 2, 3]",
    "{a: 1}",
    "x = /ab+/i",
    "\"a#{x}b\"",
    "1..10",
    "a && b || c",
    "return 1 if done",
    "def f(a)\n  a\nend",
    "<<~DOC\n  text\nDOC",
];

fn valid_single_token() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_SINGLE_TOKENS).prop_map(std::string::ToString::to_string)
}

fn valid_expression() -> impl Strategy<Value = String> {
    prop::sample::select(VALID_EXPRESSIONS).prop_map(std::string::ToString::to_string)
}

// ============================================================================
// Property tests
// ============================================================================

/// Default is 512 cases; override via `PROPTEST_CASES` env var.
fn proptest_config() -> ProptestConfig {
    let default = ProptestConfig::default();
    ProptestConfig {
        cases: default.cases.max(512),
        ..default
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Property 1: the lexer never panics on arbitrary bytes, including
    /// invalid UTF-8.
    #[test]
    fn lexer_never_panics(input in prop::collection::vec(any::<u8>(), 0..500)) {
        let _lexed = Lexer::new(&input).finish();
    }

    /// Property 1b: arbitrary printable text never panics either.
    #[test]
    fn lexer_never_panics_on_text(input in "\\PC{0,500}") {
        let _tokens = lex(input.as_bytes());
    }

    /// Property 2: all token spans are within input bounds.
    #[test]
    fn token_spans_within_input(input in "\\PC{0,500}") {
        let tokens = lex_with_eof(input.as_bytes());
        let input_len = u32::try_from(input.len()).unwrap_or(u32::MAX);
        for token in &tokens {
            let span = token.span();
            prop_assert!(
                span.end() <= input_len,
                "token {:?} span end {} exceeds input length {} for input {:?}",
                token.kind(),
                span.end(),
                input_len,
                input,
            );
            prop_assert!(
                span.start() <= span.end(),
                "token {:?} span start {} > end {} for input {:?}",
                token.kind(),
                span.start(),
                span.end(),
                input,
            );
        }
    }

    /// Property 3: token start offsets never decrease for simple input with
    /// no deferred bodies or interpolation (those splice body tokens whose
    /// spans legitimately sit elsewhere).
    #[test]
    fn token_spans_ordered(input in "[a-z0-9 +*().,\n]{0,200}") {
        let tokens = lex(input.as_bytes());
        for window in tokens.windows(2) {
            prop_assert!(
                window[1].span().start() >= window[0].span().end(),
                "overlapping spans: {:?} at {:?} then {:?} at {:?} for input {:?}",
                window[0].kind(),
                window[0].span(),
                window[1].kind(),
                window[1].span(),
                input,
            );
        }
    }

    /// Property 4: the finished token stream always ends with EOF.
    #[test]
    fn eof_always_last(input in "\\PC{0,500}") {
        let tokens = lex_with_eof(input.as_bytes());
        prop_assert!(!tokens.is_empty());
        prop_assert!(
            tokens.last().unwrap().kind().is_eof(),
            "last token should be EOF, got {:?} for input {:?}",
            tokens.last().unwrap().kind(),
            input,
        );
    }

    /// Property 5: the lexer is deterministic.
    #[test]
    fn lexer_deterministic(input in "\\PC{0,200}") {
        let first = lex_with_eof(input.as_bytes());
        let second = lex_with_eof(input.as_bytes());
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(a.kind(), b.kind());
            prop_assert_eq!(a.span(), b.span());
        }
    }

    /// Property 6: known-valid single tokens produce no error tokens.
    #[test]
    fn valid_tokens_no_errors(input in valid_single_token()) {
        let lexed = Lexer::new(input.as_bytes()).finish();
        for token in &lexed.tokens {
            prop_assert!(
                !token.kind().is_error(),
                "valid input {:?} produced error token {:?}",
                input,
                token.kind(),
            );
        }
        prop_assert!(
            lexed.diagnostics.is_empty(),
            "valid input {:?} produced diagnostics {:?}",
            input,
            lexed.diagnostics,
        );
    }

    /// Property 7: known-valid expressions lex without errors.
    #[test]
    fn valid_expressions_no_errors(input in valid_expression()) {
        let lexed = Lexer::new(input.as_bytes()).finish();
        for token in &lexed.tokens {
            prop_assert!(
                !token.kind().is_error(),
                "valid expression {:?} produced error token {:?}",
                input,
                token.kind(),
            );
        }
    }

    /// Property 8: the newline table matches a naive scan: offset 0, plus
    /// the offset after every newline byte the lexer walked.
    #[test]
    fn newline_table_matches_naive_scan(input in "[a-z \n]{0,200}") {
        let lexed = Lexer::new(input.as_bytes()).finish();
        let mut expected = vec![0u32];
        for (i, b) in input.bytes().enumerate() {
            if b == b'\n' {
                expected.push(u32::try_from(i).unwrap() + 1);
            }
        }
        prop_assert_eq!(lexed.newline_offsets, expected);
    }

    /// Property 9: interpolation token triples are well-formed; a
    /// StringStart is always eventually followed by a StringEnd.
    #[test]
    fn string_interpolation_well_formed(input in "\"[a-z ]{0,10}#\\{[a-z0-9]{1,5}\\}[a-z ]{0,10}\"") {
        let tokens = lex_with_eof(input.as_bytes());
        let mut depth = 0i32;
        for token in &tokens {
            match token.kind() {
                TokenKind::StringStart(_) => depth += 1,
                TokenKind::StringEnd(_) => {
                    prop_assert!(depth > 0, "StringEnd without StringStart in {input:?}");
                    depth -= 1;
                }
                _ => {}
            }
        }
        prop_assert_eq!(depth, 0, "unbalanced interpolation tokens in {:?}", input);
    }
}
