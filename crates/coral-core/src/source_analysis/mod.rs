// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Parsing infrastructure for Coral source code.
//!
//! This module contains the lexer, parser, spans, and diagnostics.
//!
//! # Lexical Analysis
//!
//! The [`Lexer`] converts source bytes into a stream of [`Token`]s. Each
//! token carries its source location via [`Span`] and its surrounding trivia
//! (whitespace and comments). Lexical errors become [`TokenKind::Error`]
//! tokens plus [`Diagnostic`] records; the lexer never stops early.
//!
//! ```
//! use coral_core::source_analysis::{Lexer, TokenKind};
//!
//! let tokens: Vec<_> = Lexer::new(b"x + 1").collect();
//! assert_eq!(tokens.len(), 3); // x, +, 1
//! ```
//!
//! # Parsing
//!
//! The [`parse_tokens`] function turns a lexed buffer into a
//! [`Program`](crate::ast::Program) using recursive descent with a Pratt
//! binding-power table for operators. Error recovery is mandatory: every
//! input produces a tree, malformed regions become placeholder nodes, and
//! all problems surface as ordered diagnostics.

mod diagnostics;
mod encoding;
mod lexer;
mod parser;
mod span;
mod token;

#[cfg(test)]
mod lexer_property_tests;

pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use encoding::Encoding;
pub use lexer::{lex, lex_with_eof, LexedSource, Lexer};
pub use parser::parse_tokens;
pub use span::Span;
pub use token::{Keyword, PatternEnd, PatternLit, StringLit, Token, TokenKind, Trivia, TriviaKind};
