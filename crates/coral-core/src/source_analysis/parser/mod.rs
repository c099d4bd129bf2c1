// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for Coral source code.
//!
//! The parser builds an AST from a token stream, tracking statement versus
//! expression context so that constructs like paren-free command calls are
//! only recognized where the grammar allows them.
//!
//! # Design Philosophy
//!
//! - **Error recovery is mandatory** - the parser MUST always produce a tree
//! - **Multiple errors** - report all of them, don't stop at the first
//! - **Precise spans** - every diagnostic points at an exact byte range
//! - **Synchronization points** - recover at statement boundaries
//!
//! # Operator Precedence (Pratt Parsing)
//!
//! Binary operator precedence uses a declarative binding-power table; see
//! [`binary_binding_power`]. `**` is right-associative, everything else is
//! left-associative, and the keyword operators `and` / `or` bind loosest.
//!
//! # Local Variable Disambiguation
//!
//! A bare identifier resolves against a per-scope table of declared locals:
//! known locals read the variable, anything else is a method call. Scopes
//! nest with method definitions and pop when the body closes.
//!
//! # Usage
//!
//! ```
//! use coral_core::source_analysis::{parse_tokens, Lexer};
//!
//! let lexed = Lexer::new(b"x = 3 + 4").finish();
//! let (program, diagnostics) = parse_tokens(&lexed);
//! assert!(diagnostics.is_empty());
//! assert_eq!(program.statements.len(), 1);
//! ```

use std::collections::HashSet;

use ecow::EcoString;

use crate::ast::{Expression, Name, Parameter, Program};

use super::{
    Diagnostic, DiagnosticKind, Keyword, LexedSource, Span, Token, TokenKind,
};

mod expressions;

#[cfg(test)]
mod property_tests;
#[cfg(test)]
mod tests;

// ============================================================================
// Pratt Parsing for Binary Operator Precedence
// ============================================================================

/// Binding power for binary operators (Pratt parsing).
///
/// Higher values bind tighter. Left and right binding powers differ for
/// associativity:
/// - Left-associative: `left == right - 1` (e.g. `+`, `-`)
/// - Right-associative: `left == right + 1` (e.g. `**`)
#[derive(Debug, Clone, Copy)]
pub(super) struct BindingPower {
    /// How tightly this operator binds to its left operand.
    pub(super) left: u8,
    /// How tightly this operator binds to its right operand.
    pub(super) right: u8,
}

impl BindingPower {
    /// Creates a left-associative binding power.
    const fn left_assoc(precedence: u8) -> Self {
        Self {
            left: precedence,
            right: precedence + 1,
        }
    }

    /// Creates a right-associative binding power.
    const fn right_assoc(precedence: u8) -> Self {
        Self {
            left: precedence + 1,
            right: precedence,
        }
    }
}

/// The binding power passed to the operand of unary `-` / `+`, chosen so
/// `-a ** b` parses as `-(a ** b)` while `-a * b` parses as `(-a) * b`.
pub(super) const UNARY_SIGN_OPERAND_BP: u8 = 26;

/// The binding power passed to the operand of keyword `not`: looser than
/// every operator except `and` / `or`.
pub(super) const NOT_OPERAND_BP: u8 = 4;

/// Gets the binding power for a binary operator.
///
/// Returns `None` for tokens that are not binary operators, which ends
/// expression parsing (useful for error recovery).
///
/// # Precedence Levels (from loosest to tightest)
///
/// | Level | Operators | Associativity |
/// |-------|-----------|---------------|
/// | 2  | `and` `or`            | Left |
/// | 4  | `..` `...`            | Left |
/// | 6  | `\|\|`                | Left |
/// | 8  | `&&`                  | Left |
/// | 10 | `==` `!=` `<=>`       | Left |
/// | 12 | `<` `<=` `>` `>=`     | Left |
/// | 14 | `\|` `^`              | Left |
/// | 16 | `&`                   | Left |
/// | 18 | `<<` `>>`             | Left |
/// | 20 | `+` `-`               | Left |
/// | 22 | `*` `/` `%`           | Left |
/// | 26 | `**`                  | Right |
///
/// To add an operator, add an entry here.
pub(super) fn binary_binding_power(op: &str) -> Option<BindingPower> {
    match op {
        "and" | "or" => Some(BindingPower::left_assoc(2)),
        ".." | "..." => Some(BindingPower::left_assoc(4)),
        "||" => Some(BindingPower::left_assoc(6)),
        "&&" => Some(BindingPower::left_assoc(8)),
        "==" | "!=" | "<=>" => Some(BindingPower::left_assoc(10)),
        "<" | "<=" | ">" | ">=" => Some(BindingPower::left_assoc(12)),
        "|" | "^" => Some(BindingPower::left_assoc(14)),
        "&" => Some(BindingPower::left_assoc(16)),
        "<<" | ">>" => Some(BindingPower::left_assoc(18)),
        "+" | "-" => Some(BindingPower::left_assoc(20)),
        "*" | "/" | "%" => Some(BindingPower::left_assoc(22)),
        "**" => Some(BindingPower::right_assoc(26)),
        _ => None,
    }
}

/// Where an expression appears; governs paren-free command calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ExprContext {
    /// Statement position: commands allowed.
    Statement,
    /// Condition or command-value position: commands allowed.
    Condition,
    /// Operand, collection element, or parenthesized argument: commands not
    /// allowed.
    Inner,
}

impl ExprContext {
    /// Returns `true` if a paren-free command call may start here.
    pub(super) const fn allows_command(self) -> bool {
        matches!(self, Self::Statement | Self::Condition)
    }
}

/// Maximum expression nesting depth before the parser bails out.
///
/// Prevents stack overflow on deeply nested input like `((((((...))))))`.
/// Each level uses several stack frames through the recursive descent chain,
/// so the limit stays small; real programs never approach it.
const MAX_NESTING_DEPTH: usize = 64;

/// Parses a lexed buffer into a program plus combined diagnostics.
///
/// This is the main entry point for parsing. It always returns a
/// [`Program`], even when the input is malformed; inspect the diagnostics
/// to find out what went wrong. Diagnostics are ordered by position and
/// include everything the lexer reported.
#[must_use]
pub fn parse_tokens(lexed: &LexedSource) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser::new(&lexed.tokens);
    let program = parser.parse_program();

    let mut diagnostics = lexed.diagnostics.clone();
    diagnostics.append(&mut parser.diagnostics);
    diagnostics.sort_by_key(|d| d.span.start());

    debug_check_locations(&program);

    (program, diagnostics)
}

/// Debug-mode location invariant: every parent's span encloses its
/// children's spans, except nodes built from a deferred heredoc body, whose
/// span is the opener's.
fn debug_check_locations(program: &Program) {
    if cfg!(debug_assertions) {
        let mut queue: Vec<&Expression> = program.statements.iter().collect();
        while let Some(node) = queue.pop() {
            let check = !node.has_deferred_location();
            for child in node.children() {
                debug_assert!(
                    !check || node.span().contains(child.span()),
                    "node span {:?} does not enclose child span {:?}",
                    node.span(),
                    child.span(),
                );
                queue.push(child);
            }
        }
    }
}

/// The parser state.
pub(super) struct Parser<'t> {
    /// The tokens being parsed; always ends with EOF.
    pub(super) tokens: &'t [Token],
    /// Current token index.
    pub(super) current: usize,
    /// Accumulated diagnostics.
    pub(super) diagnostics: Vec<Diagnostic>,
    /// Nested scopes of declared local variables, innermost last.
    pub(super) scopes: Vec<HashSet<EcoString>>,
    /// Current expression nesting depth (guards against stack overflow).
    nesting_depth: usize,
}

impl<'t> Parser<'t> {
    /// Creates a new parser for the given tokens.
    fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            current: 0,
            diagnostics: Vec::new(),
            scopes: vec![HashSet::new()],
            nesting_depth: 0,
        }
    }

    // ========================================================================
    // Token Management
    // ========================================================================

    /// Returns the current token.
    pub(super) fn current_token(&self) -> &Token {
        if self.current < self.tokens.len() {
            &self.tokens[self.current]
        } else {
            // Past the end: fall back to the final EOF token rather than
            // panicking.
            self.tokens
                .last()
                .expect("parser requires at least an EOF token")
        }
    }

    /// Returns the current token kind.
    pub(super) fn current_kind(&self) -> &TokenKind {
        self.current_token().kind()
    }

    /// Checks if we're at the end of input.
    pub(super) fn is_at_end(&self) -> bool {
        self.current_kind().is_eof()
    }

    /// Advances to the next token and returns the consumed one.
    pub(super) fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current.saturating_sub(1)].clone()
    }

    /// Checks if the current token matches the given kind, comparing
    /// payload-carrying kinds by variant only.
    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    /// Consumes the current token if it matches the given kind.
    pub(super) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns `true` if the current token is the given keyword.
    pub(super) fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current_kind(), TokenKind::Keyword(kw) if *kw == keyword)
    }

    /// Consumes the current token if it is the given keyword.
    pub(super) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects the given keyword, reporting a missing-terminator diagnostic
    /// when it is absent.
    pub(super) fn expect_keyword(&mut self, keyword: Keyword, message: &str) -> Option<Token> {
        if self.at_keyword(keyword) {
            Some(self.advance())
        } else {
            let span = self.current_token().span();
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::MissingTerminator,
                message,
                span,
            ));
            None
        }
    }

    /// Expects the current token to match the given kind, advancing if it
    /// does and reporting an unexpected-token diagnostic otherwise.
    pub(super) fn expect(&mut self, kind: &TokenKind, message: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let span = self.current_token().span();
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::UnexpectedToken,
                message,
                span,
            ));
            None
        }
    }

    /// Returns the span of the most recently consumed token.
    pub(super) fn previous_span(&self) -> Span {
        if self.current == 0 {
            self.current_token().span()
        } else {
            self.tokens[self.current - 1].span()
        }
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Declares a local variable in the innermost scope.
    pub(super) fn declare_local(&mut self, name: &EcoString) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.clone());
        }
    }

    /// Returns `true` if `name` is a declared local in any enclosing scope.
    pub(super) fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    /// Pushes a fresh scope for a method body.
    pub(super) fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    /// Pops the innermost scope when a body closes.
    pub(super) fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the top-level scope");
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    // ========================================================================
    // Error Handling & Recovery
    // ========================================================================

    /// Reports an error at the current token.
    pub(super) fn error(&mut self, kind: DiagnosticKind, message: impl Into<EcoString>) {
        let span = self.current_token().span();
        self.diagnostics.push(Diagnostic::error(kind, message, span));
    }

    /// Increments the nesting depth, producing an error placeholder when the
    /// input nests too deeply. Pair with [`leave_nesting`] on success.
    pub(super) fn enter_nesting(&mut self, span: Span) -> Result<(), Expression> {
        self.nesting_depth += 1;
        if self.nesting_depth > MAX_NESTING_DEPTH {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticKind::NestingTooDeep,
                format!("expression nesting is too deep (maximum {MAX_NESTING_DEPTH} levels)"),
                span,
            ));
            self.nesting_depth -= 1;
            return Err(Expression::Error {
                message: "expression nesting too deep".into(),
                span,
            });
        }
        Ok(())
    }

    /// Decrements the nesting depth (pair with [`enter_nesting`]).
    pub(super) fn leave_nesting(&mut self) {
        debug_assert!(self.nesting_depth > 0, "leave_nesting without enter_nesting");
        self.nesting_depth = self.nesting_depth.saturating_sub(1);
    }

    /// Synchronizes the parser to a statement boundary after an error.
    ///
    /// Advances until the next token starts a line, or until a separator,
    /// closing delimiter, or EOF.
    pub(super) fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.at_recovery_point() {
                return;
            }
            self.advance();
        }
    }

    /// Returns `true` if the current token is a safe recovery point.
    fn at_recovery_point(&self) -> bool {
        if self.current_token().has_leading_newline() {
            return true;
        }
        matches!(
            self.current_kind(),
            TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
        ) || matches!(
            self.current_kind(),
            TokenKind::Keyword(Keyword::End | Keyword::Else | Keyword::Elsif)
        )
    }

    // ========================================================================
    // Program & Statements
    // ========================================================================

    /// Parses a complete program (top level).
    fn parse_program(&mut self) -> Program {
        let statements = self.parse_statements_until(&[]);
        let end = self.current_token().span().end();
        Program::new(statements, Span::new(0, end))
    }

    /// Parses statements until EOF or one of the given stop keywords.
    ///
    /// Statements are separated by newlines or semicolons. After a statement
    /// that is not followed by a separator, the parser reports the stray
    /// token and synchronizes, so one bad statement never poisons the rest
    /// of the buffer.
    pub(super) fn parse_statements_until(&mut self, stops: &[Keyword]) -> Vec<Expression> {
        let mut statements = Vec::new();

        loop {
            while self.match_token(&TokenKind::Semicolon) {}
            if self.is_at_end() || self.at_any_keyword(stops) {
                break;
            }

            let before = self.current;
            let statement = self.parse_statement();
            statements.push(statement);

            if self.current == before {
                // The current token could not begin a statement and was not
                // consumed; skip it so the loop always makes progress.
                self.advance();
            }

            if self.is_at_end() || self.at_any_keyword(stops) {
                break;
            }
            if self.current_token().has_leading_newline()
                || self.check(&TokenKind::Semicolon)
            {
                continue;
            }

            self.error(
                DiagnosticKind::UnexpectedToken,
                format!(
                    "expected a newline or `;` between statements, found `{}`",
                    self.current_kind()
                ),
            );
            self.synchronize();
        }

        statements
    }

    /// Returns `true` if the current token is one of the given keywords.
    fn at_any_keyword(&self, keywords: &[Keyword]) -> bool {
        keywords.iter().any(|&kw| self.at_keyword(kw))
    }

    /// Parses one statement: an expression plus any trailing modifiers.
    pub(super) fn parse_statement(&mut self) -> Expression {
        let expression = self.parse_expression(ExprContext::Statement);
        self.parse_modifiers(expression)
    }

    /// Parses conditional and loop modifiers: `expr if cond`, `expr while
    /// cond`, and friends. Modifiers chain left to right.
    fn parse_modifiers(&mut self, mut expression: Expression) -> Expression {
        loop {
            let keyword = match self.current_kind() {
                TokenKind::Keyword(kw @ (Keyword::If | Keyword::Unless | Keyword::While | Keyword::Until)) => *kw,
                _ => break,
            };
            // A keyword on a fresh line starts a new statement instead.
            if self.current_token().has_leading_newline() {
                break;
            }
            self.advance();
            let condition = Box::new(self.parse_expression(ExprContext::Condition));
            let span = expression.span().merge(condition.span());
            expression = match keyword {
                Keyword::If => Expression::If {
                    condition,
                    then_body: vec![expression],
                    else_body: None,
                    span,
                },
                Keyword::Unless => Expression::Unless {
                    condition,
                    then_body: vec![expression],
                    else_body: None,
                    span,
                },
                Keyword::While => Expression::While {
                    condition,
                    body: vec![expression],
                    span,
                },
                _ => Expression::Until {
                    condition,
                    body: vec![expression],
                    span,
                },
            };
        }
        expression
    }

    // ========================================================================
    // Control Constructs
    // ========================================================================

    /// Parses `if` / `unless` in expression position. The `elsif` chain
    /// nests as a single-element else body.
    pub(super) fn parse_conditional(&mut self, negated: bool) -> Expression {
        let start = self.advance().span(); // if / unless / elsif
        let condition = Box::new(self.parse_expression(ExprContext::Condition));
        self.match_keyword(Keyword::Then);

        let stops = if negated {
            &[Keyword::Else, Keyword::End][..]
        } else {
            &[Keyword::Elsif, Keyword::Else, Keyword::End][..]
        };
        let then_body = self.parse_statements_until(stops);

        let else_body = if !negated && self.at_keyword(Keyword::Elsif) {
            // Recurse without consuming `end`; the outermost `if` owns it.
            let nested = self.parse_conditional_tail();
            Some(vec![nested])
        } else if self.match_keyword(Keyword::Else) {
            Some(self.parse_statements_until(&[Keyword::End]))
        } else {
            None
        };

        let end_span = if self.at_keyword(Keyword::End) {
            self.advance().span()
        } else {
            self.expect_keyword(
                Keyword::End,
                if negated {
                    "`unless` is missing its `end`"
                } else {
                    "`if` is missing its `end`"
                },
            );
            self.previous_span()
        };

        let span = start.merge(end_span);
        if negated {
            Expression::Unless {
                condition,
                then_body,
                else_body,
                span,
            }
        } else {
            Expression::If {
                condition,
                then_body,
                else_body,
                span,
            }
        }
    }

    /// Parses the `elsif` tail of a conditional, leaving `end` unconsumed.
    fn parse_conditional_tail(&mut self) -> Expression {
        let start = self.advance().span(); // elsif
        let condition = Box::new(self.parse_expression(ExprContext::Condition));
        self.match_keyword(Keyword::Then);

        let then_body =
            self.parse_statements_until(&[Keyword::Elsif, Keyword::Else, Keyword::End]);

        let else_body = if self.at_keyword(Keyword::Elsif) {
            Some(vec![self.parse_conditional_tail()])
        } else if self.match_keyword(Keyword::Else) {
            Some(self.parse_statements_until(&[Keyword::End]))
        } else {
            None
        };

        let span = start.merge(self.previous_span());
        Expression::If {
            condition,
            then_body,
            else_body,
            span,
        }
    }

    /// Parses `while` / `until` in expression position.
    pub(super) fn parse_loop(&mut self, negated: bool) -> Expression {
        let start = self.advance().span(); // while / until
        let condition = Box::new(self.parse_expression(ExprContext::Condition));
        self.match_keyword(Keyword::Do);

        let body = self.parse_statements_until(&[Keyword::End]);
        let end_span = if self.at_keyword(Keyword::End) {
            self.advance().span()
        } else {
            self.expect_keyword(
                Keyword::End,
                if negated {
                    "`until` is missing its `end`"
                } else {
                    "`while` is missing its `end`"
                },
            );
            self.previous_span()
        };

        let span = start.merge(end_span);
        if negated {
            Expression::Until {
                condition,
                body,
                span,
            }
        } else {
            Expression::While {
                condition,
                body,
                span,
            }
        }
    }

    /// Parses a method definition: `def name(params) ... end`.
    ///
    /// The parameter list and body introduce a fresh local scope, popped
    /// when the body closes.
    pub(super) fn parse_method_def(&mut self) -> Expression {
        let start = self.advance().span(); // def

        let name = match self.current_kind().clone() {
            TokenKind::Identifier(text) => {
                let token = self.advance();
                Name::new(text, token.span())
            }
            TokenKind::Operator(text) => {
                // Operator methods: `def +(other)`
                let token = self.advance();
                Name::new(text, token.span())
            }
            _ => {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    "expected a method name after `def`",
                );
                Name::new("", self.current_token().span())
            }
        };

        self.push_scope();

        let mut parameters = Vec::new();
        if self.match_token(&TokenKind::LeftParen) {
            loop {
                match self.current_kind().clone() {
                    TokenKind::Identifier(text) => {
                        let token = self.advance();
                        self.declare_local(&text);
                        parameters.push(Parameter::new(text, token.span()));
                    }
                    TokenKind::RightParen => break,
                    _ => {
                        self.error(
                            DiagnosticKind::UnexpectedToken,
                            "expected a parameter name",
                        );
                        self.synchronize();
                        break;
                    }
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(
                &TokenKind::RightParen,
                "parameter list is missing its closing `)`",
            );
        }

        let body = self.parse_statements_until(&[Keyword::End]);
        let end_span = if self.at_keyword(Keyword::End) {
            self.advance().span()
        } else {
            self.expect_keyword(Keyword::End, "`def` is missing its `end`");
            self.previous_span()
        };

        self.pop_scope();

        Expression::MethodDef {
            name,
            parameters,
            body,
            span: start.merge(end_span),
        }
    }
}
