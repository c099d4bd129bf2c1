// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Expression parsing for Coral.
//!
//! This module contains the expression methods extracted from the main
//! `Parser` implementation:
//!
//! - Assignment and assignment-target validation
//! - The Pratt loop for binary operators
//! - Unary operators (`-`, `+`, `!`, `~`, `not`)
//! - Method calls, command calls, and indexing
//! - Literals, including interpolated strings, heredoc parts, patterns,
//!   word lists, and exact numeric values

use ecow::EcoString;

use crate::ast::{Expression, HashPair, IntValue, Name, Numeric, StringPart};
use crate::source_analysis::{Diagnostic, DiagnosticKind, Keyword, StringLit, TokenKind};

use super::{
    binary_binding_power, ExprContext, Parser, NOT_OPERAND_BP, UNARY_SIGN_OPERAND_BP,
};

impl Parser<'_> {
    // ========================================================================
    // Expression Entry
    // ========================================================================

    /// Parses any expression in the given context.
    pub(super) fn parse_expression(&mut self, context: ExprContext) -> Expression {
        // Guard against stack overflow from deeply nested input.
        if let Err(error) = self.enter_nesting(self.current_token().span()) {
            return error;
        }
        let result = self.parse_assignment(context);
        self.leave_nesting();
        result
    }

    /// Parses an assignment or a plain operator expression.
    ///
    /// Assignment is right-associative. The target must be a local,
    /// constant, instance variable, or index expression; a bare call with
    /// no receiver and no arguments re-reads as a local target, which is
    /// also the moment the local becomes declared for the disambiguation
    /// rule.
    fn parse_assignment(&mut self, context: ExprContext) -> Expression {
        let expr = self.parse_operators(context, 0);

        if !self.check(&TokenKind::Assign) || self.current_token().has_leading_newline() {
            return expr;
        }
        self.advance(); // =

        let target = match self.into_assignment_target(expr) {
            Ok(target) => target,
            Err(expr) => {
                let span = expr.span();
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::InvalidAssignmentTarget,
                    "this expression cannot be assigned to",
                    span,
                ));
                Expression::Error {
                    message: "invalid assignment target".into(),
                    span,
                }
            }
        };

        // The local is visible inside its own right-hand side.
        if let Expression::LocalRead(name) = &target {
            self.declare_local(&name.text);
        }

        let value = Box::new(self.parse_assignment(context));
        let span = target.span().merge(value.span());
        Expression::Assign {
            target: Box::new(target),
            value,
            span,
        }
    }

    /// Re-reads an expression as an assignment target.
    fn into_assignment_target(&self, expr: Expression) -> Result<Expression, Expression> {
        match expr {
            // A receiver-less, argument-less call is really a local write.
            Expression::Call {
                receiver: None,
                name,
                arguments,
                parenthesized: false,
                ..
            } if arguments.is_empty() => Ok(Expression::LocalRead(name)),
            Expression::LocalRead(_)
            | Expression::ConstantRead(_)
            | Expression::InstanceVariableRead(_)
            | Expression::Index { .. } => Ok(expr),
            other => Err(other),
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Pratt parsing for binary operators.
    ///
    /// `min_bp` is the minimum binding power required to continue; recursion
    /// with each operator's right binding power yields correct precedence
    /// and associativity.
    fn parse_operators(&mut self, context: ExprContext, min_bp: u8) -> Expression {
        let mut left = self.parse_unary(context);

        loop {
            let op: EcoString = match self.current_kind() {
                TokenKind::Operator(op) => op.clone(),
                TokenKind::Keyword(Keyword::And) => "and".into(),
                TokenKind::Keyword(Keyword::Or) => "or".into(),
                _ => break,
            };

            // An operator on a fresh line starts a new statement.
            if self.current_token().has_leading_newline() {
                break;
            }
            let Some(bp) = binary_binding_power(&op) else {
                break;
            };
            if bp.left < min_bp {
                break;
            }

            self.advance();
            let right = self.parse_operators(ExprContext::Inner, bp.right);
            let span = left.span().merge(right.span());
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        left
    }

    /// Parses unary operators.
    ///
    /// `-`/`+` bind looser than `**` so `-a ** b` reads as `-(a ** b)`;
    /// `!`/`~` bind tightest; keyword `not` binds looser than every
    /// operator except `and` / `or`.
    fn parse_unary(&mut self, context: ExprContext) -> Expression {
        let op: Option<EcoString> = match self.current_kind() {
            TokenKind::Operator(op) if op == "-" || op == "+" || op == "!" || op == "~" => {
                Some(op.clone())
            }
            TokenKind::Keyword(Keyword::Not) => Some("not".into()),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix(context);
        };

        let token = self.advance();
        if let Err(error) = self.enter_nesting(token.span()) {
            return error;
        }
        let operand = match op.as_str() {
            "-" | "+" => self.parse_operators(ExprContext::Inner, UNARY_SIGN_OPERAND_BP),
            "not" => self.parse_operators(ExprContext::Inner, NOT_OPERAND_BP),
            _ => self.parse_unary(ExprContext::Inner),
        };
        self.leave_nesting();

        let span = token.span().merge(operand.span());
        Expression::Unary {
            op,
            operand: Box::new(operand),
            span,
        }
    }

    // ========================================================================
    // Calls and Indexing
    // ========================================================================

    /// Parses postfix chains: `.name`, `.name(args)`, `recv[index]`.
    ///
    /// A leading-dot continuation line (`expr\n.method`) is allowed; an
    /// opening bracket on a fresh line is not, so `x\n[1]` stays two
    /// statements.
    fn parse_postfix(&mut self, context: ExprContext) -> Expression {
        let mut expr = self.parse_primary(context);

        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                expr = self.parse_method_call(expr, context);
            } else if self.check(&TokenKind::LeftBracket)
                && !self.current_token().has_leading_newline()
            {
                self.advance();
                let arguments = self.parse_argument_list(&TokenKind::RightBracket);
                let end = self
                    .expect(
                        &TokenKind::RightBracket,
                        "index is missing its closing `]`",
                    )
                    .map_or_else(|| self.previous_span(), |t| t.span());
                let span = expr.span().merge(end);
                expr = Expression::Index {
                    receiver: Box::new(expr),
                    arguments,
                    span,
                };
            } else {
                break;
            }
        }

        expr
    }

    /// Parses the selector and arguments after a `.`.
    fn parse_method_call(&mut self, receiver: Expression, context: ExprContext) -> Expression {
        let name = match self.current_kind().clone() {
            TokenKind::Identifier(text) | TokenKind::Constant(text) => {
                let token = self.advance();
                Name::new(text, token.span())
            }
            _ => {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    "expected a method name after `.`",
                );
                let span = receiver.span();
                return Expression::Error {
                    message: "missing method name".into(),
                    span,
                };
            }
        };

        if self.check(&TokenKind::LeftParen) && !self.current_token().has_leading_newline() {
            self.advance();
            let arguments = self.parse_argument_list(&TokenKind::RightParen);
            let end = self
                .expect(
                    &TokenKind::RightParen,
                    "argument list is missing its closing `)`",
                )
                .map_or_else(|| self.previous_span(), |t| t.span());
            let span = receiver.span().merge(end);
            return Expression::Call {
                receiver: Some(Box::new(receiver)),
                name,
                arguments,
                parenthesized: true,
                span,
            };
        }

        if context.allows_command()
            && !self.current_token().has_leading_newline()
            && self.starts_command_argument()
        {
            let arguments = self.parse_command_arguments();
            let end = arguments.last().map_or(name.span, Expression::span);
            let span = receiver.span().merge(end);
            return Expression::Call {
                receiver: Some(Box::new(receiver)),
                name,
                arguments,
                parenthesized: false,
                span,
            };
        }

        let span = receiver.span().merge(name.span);
        Expression::Call {
            receiver: Some(Box::new(receiver)),
            name,
            arguments: Vec::new(),
            parenthesized: false,
            span,
        }
    }

    /// Parses a bare identifier: local read, paren call, command call, or
    /// receiver-less no-argument call, per the scope-table rule.
    fn identifier_expression(&mut self, text: EcoString, context: ExprContext) -> Expression {
        let token = self.advance();
        let name = Name::new(text, token.span());

        if self.check(&TokenKind::LeftParen) && !self.current_token().has_leading_newline() {
            self.advance();
            let arguments = self.parse_argument_list(&TokenKind::RightParen);
            let end = self
                .expect(
                    &TokenKind::RightParen,
                    "argument list is missing its closing `)`",
                )
                .map_or_else(|| self.previous_span(), |t| t.span());
            let span = name.span.merge(end);
            return Expression::Call {
                receiver: None,
                name,
                arguments,
                parenthesized: true,
                span,
            };
        }

        if self.is_local(&name.text) {
            return Expression::LocalRead(name);
        }

        if context.allows_command()
            && !self.current_token().has_leading_newline()
            && self.starts_command_argument()
        {
            let arguments = self.parse_command_arguments();
            let end = arguments.last().map_or(name.span, Expression::span);
            let span = name.span.merge(end);
            return Expression::Call {
                receiver: None,
                name,
                arguments,
                parenthesized: false,
                span,
            };
        }

        let span = name.span;
        Expression::Call {
            receiver: None,
            name,
            arguments: Vec::new(),
            parenthesized: false,
            span,
        }
    }

    /// Returns `true` if the current token can begin a paren-free command
    /// argument.
    ///
    /// Operators are deliberately excluded: `foo -1` stays a binary
    /// subtraction, one of the documented compatibility divergences.
    fn starts_command_argument(&self) -> bool {
        match self.current_kind() {
            TokenKind::Identifier(_)
            | TokenKind::Constant(_)
            | TokenKind::InstanceVariable(_)
            | TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::StringStart(_)
            | TokenKind::Symbol(_)
            | TokenKind::Pattern(_)
            | TokenKind::PatternStart(_)
            | TokenKind::WordsOpen { .. }
            | TokenKind::Label(_) => true,
            TokenKind::Keyword(kw) => kw.is_value() || *kw == Keyword::Not,
            _ => false,
        }
    }

    /// Parses comma-separated command-call arguments. Labeled arguments
    /// collect into a trailing hash.
    fn parse_command_arguments(&mut self) -> Vec<Expression> {
        let mut arguments = Vec::new();
        loop {
            if matches!(self.current_kind(), TokenKind::Label(_)) {
                arguments.push(self.parse_labeled_hash());
                break;
            }
            arguments.push(self.parse_expression(ExprContext::Inner));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        arguments
    }

    /// Parses a comma-separated argument list up to (not including) the
    /// given closing token. Tolerates a trailing comma.
    fn parse_argument_list(&mut self, close: &TokenKind) -> Vec<Expression> {
        let mut arguments = Vec::new();
        if self.check(close) {
            return arguments;
        }
        loop {
            if matches!(self.current_kind(), TokenKind::Label(_)) {
                arguments.push(self.parse_labeled_hash());
            } else {
                arguments.push(self.parse_expression(ExprContext::Inner));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
            if self.check(close) {
                break;
            }
            if self.is_at_end() {
                break;
            }
        }
        arguments
    }

    /// Parses consecutive `name: value` pairs into a hash node.
    fn parse_labeled_hash(&mut self) -> Expression {
        let start = self.current_token().span();
        let mut pairs = Vec::new();

        while let TokenKind::Label(label) = self.current_kind().clone() {
            let token = self.advance();
            let key = Expression::Sym {
                name: label,
                span: token.span(),
            };
            let value = self.parse_expression(ExprContext::Inner);
            let span = key.span().merge(value.span());
            pairs.push(HashPair { key, value, span });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
            if !matches!(self.current_kind(), TokenKind::Label(_)) {
                self.error(
                    DiagnosticKind::UnexpectedToken,
                    "labeled arguments must come last",
                );
                break;
            }
        }

        let span = start.merge(self.previous_span());
        Expression::Hash { pairs, span }
    }

    // ========================================================================
    // Primary Expressions
    // ========================================================================

    /// Parses a primary expression. Always either consumes at least one
    /// token or returns an error placeholder at EOF.
    fn parse_primary(&mut self, context: ExprContext) -> Expression {
        match self.current_kind().clone() {
            TokenKind::Keyword(Keyword::Nil) => Expression::Nil(self.advance().span()),
            TokenKind::Keyword(Keyword::True) => Expression::True(self.advance().span()),
            TokenKind::Keyword(Keyword::False) => Expression::False(self.advance().span()),
            TokenKind::Keyword(Keyword::SelfKw) => Expression::SelfRef(self.advance().span()),

            TokenKind::Number(text) => {
                let token = self.advance();
                Expression::Number(parse_number(&text), token.span())
            }

            TokenKind::String(lit) => {
                let token = self.advance();
                Expression::Str {
                    value: lit.value,
                    heredoc: lit.heredoc,
                    span: token.span(),
                }
            }
            TokenKind::StringStart(lit) => self.parse_interpolated_string(&lit),

            TokenKind::Symbol(name) => {
                let token = self.advance();
                Expression::Sym {
                    name,
                    span: token.span(),
                }
            }

            TokenKind::Pattern(lit) => {
                let token = self.advance();
                let parts = vec![StringPart::Literal {
                    value: lit.value,
                    span: token.span(),
                }];
                Expression::Pattern {
                    parts,
                    flags: lit.flags,
                    span: token.span(),
                }
            }
            TokenKind::PatternStart(text) => self.parse_interpolated_pattern(&text),

            TokenKind::WordsOpen { symbols } => self.parse_word_list(symbols),

            TokenKind::Identifier(text) => self.identifier_expression(text, context),
            TokenKind::Constant(text) => {
                let token = self.advance();
                Expression::ConstantRead(Name::new(text, token.span()))
            }
            TokenKind::InstanceVariable(text) => {
                let token = self.advance();
                Expression::InstanceVariableRead(Name::new(text, token.span()))
            }

            TokenKind::Keyword(Keyword::If) => self.parse_conditional(false),
            TokenKind::Keyword(Keyword::Unless) => self.parse_conditional(true),
            TokenKind::Keyword(Keyword::While) => self.parse_loop(false),
            TokenKind::Keyword(Keyword::Until) => self.parse_loop(true),
            TokenKind::Keyword(Keyword::Def) => self.parse_method_def(),
            TokenKind::Keyword(kw @ (Keyword::Return | Keyword::Break | Keyword::Next)) => {
                self.parse_jump(kw)
            }

            TokenKind::LeftParen => {
                let open = self.advance();
                let inner = self.parse_expression(ExprContext::Inner);
                let end = self
                    .expect(
                        &TokenKind::RightParen,
                        "parenthesized expression is missing its `)`",
                    )
                    .map_or_else(|| self.previous_span(), |t| t.span());
                Expression::Parenthesized {
                    expression: Box::new(inner),
                    span: open.span().merge(end),
                }
            }

            TokenKind::LeftBracket => {
                let open = self.advance();
                let elements = self.parse_argument_list(&TokenKind::RightBracket);
                let end = self
                    .expect(
                        &TokenKind::RightBracket,
                        "array literal is missing its closing `]`",
                    )
                    .map_or_else(|| self.previous_span(), |t| t.span());
                Expression::Array {
                    elements,
                    span: open.span().merge(end),
                }
            }

            TokenKind::LeftBrace => self.parse_hash(),

            TokenKind::Error(_) => {
                // The lexer already diagnosed this token; build the
                // placeholder without doubling the report.
                let token = self.advance();
                Expression::Error {
                    message: "invalid token".into(),
                    span: token.span(),
                }
            }

            TokenKind::Eof => {
                let span = self.current_token().span();
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::MissingExpression,
                    "expected an expression, found end of input",
                    span,
                ));
                Expression::Error {
                    message: "missing expression".into(),
                    span,
                }
            }

            other => {
                let token = self.advance();
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::UnexpectedToken,
                    format!("expected an expression, found `{other}`"),
                    token.span(),
                ));
                Expression::Error {
                    message: "unexpected token".into(),
                    span: token.span(),
                }
            }
        }
    }

    /// Parses `return` / `break` / `next` with an optional value.
    fn parse_jump(&mut self, keyword: Keyword) -> Expression {
        let token = self.advance();
        let value = if !self.current_token().has_leading_newline() && self.starts_jump_value() {
            Some(Box::new(self.parse_expression(ExprContext::Condition)))
        } else {
            None
        };
        let span = value
            .as_ref()
            .map_or(token.span(), |v| token.span().merge(v.span()));
        match keyword {
            Keyword::Return => Expression::Return { value, span },
            Keyword::Break => Expression::Break { value, span },
            _ => Expression::Next { value, span },
        }
    }

    /// Returns `true` if the current token can begin a jump value.
    /// Modifier keywords stay modifiers: `return if done` has no value.
    fn starts_jump_value(&self) -> bool {
        self.starts_command_argument()
            || matches!(
                self.current_kind(),
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace
            )
            || matches!(self.current_kind(), TokenKind::Operator(op) if op == "-" || op == "+" || op == "!" || op == "~")
    }

    /// Parses a `{...}` hash literal with `key => value` and `name: value`
    /// entries.
    fn parse_hash(&mut self) -> Expression {
        let open = self.advance();
        let mut pairs = Vec::new();

        if !self.check(&TokenKind::RightBrace) {
            loop {
                if let TokenKind::Label(label) = self.current_kind().clone() {
                    let token = self.advance();
                    let key = Expression::Sym {
                        name: label,
                        span: token.span(),
                    };
                    let value = self.parse_expression(ExprContext::Inner);
                    let span = key.span().merge(value.span());
                    pairs.push(HashPair { key, value, span });
                } else {
                    let key = self.parse_expression(ExprContext::Inner);
                    self.expect(&TokenKind::HashRocket, "expected `=>` in hash entry");
                    let value = self.parse_expression(ExprContext::Inner);
                    let span = key.span().merge(value.span());
                    pairs.push(HashPair { key, value, span });
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RightBrace) || self.is_at_end() {
                    break;
                }
            }
        }

        let end = self
            .expect(
                &TokenKind::RightBrace,
                "hash literal is missing its closing `}`",
            )
            .map_or_else(|| self.previous_span(), |t| t.span());
        Expression::Hash {
            pairs,
            span: open.span().merge(end),
        }
    }

    /// Parses a `%w` / `%i` word list into an array literal.
    fn parse_word_list(&mut self, _symbols: bool) -> Expression {
        let open = self.advance();
        let mut elements = Vec::new();
        let end;

        loop {
            match self.current_kind().clone() {
                TokenKind::String(lit) => {
                    let token = self.advance();
                    elements.push(Expression::Str {
                        value: lit.value,
                        heredoc: false,
                        span: token.span(),
                    });
                }
                TokenKind::Symbol(name) => {
                    let token = self.advance();
                    elements.push(Expression::Sym {
                        name,
                        span: token.span(),
                    });
                }
                TokenKind::WordsClose => {
                    end = self.advance().span();
                    break;
                }
                _ => {
                    // The lexer always closes a word list; anything else
                    // means we lost the stream, so stop here.
                    end = self.previous_span();
                    break;
                }
            }
        }

        Expression::Array {
            elements,
            span: open.span().merge(end),
        }
    }

    /// Parses the token triple of an interpolated string into a node.
    ///
    /// Heredoc-origin strings take the opener's span, the documented
    /// location-invariant exception.
    fn parse_interpolated_string(&mut self, lit: &StringLit) -> Expression {
        let start = self.advance();
        let mut parts = vec![StringPart::Literal {
            value: lit.value.clone(),
            span: start.span(),
        }];
        let mut end_span = start.span();

        loop {
            match self.current_kind().clone() {
                TokenKind::StringSegment(value) => {
                    let token = self.advance();
                    parts.push(StringPart::Literal {
                        value,
                        span: token.span(),
                    });
                }
                TokenKind::StringEnd(value) => {
                    let token = self.advance();
                    parts.push(StringPart::Literal {
                        value,
                        span: token.span(),
                    });
                    end_span = token.span();
                    break;
                }
                TokenKind::Eof => {
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "interpolated string never closed",
                    );
                    break;
                }
                _ => {
                    let expression = self.parse_expression(ExprContext::Inner);
                    parts.push(StringPart::Interpolation {
                        span: expression.span(),
                        expression: Box::new(expression),
                    });
                }
            }
        }

        let span = if lit.heredoc {
            start.span()
        } else {
            start.span().merge(end_span)
        };
        Expression::InterpolatedStr {
            parts,
            heredoc: lit.heredoc,
            span,
        }
    }

    /// Parses the token triple of an interpolated pattern into a node.
    fn parse_interpolated_pattern(&mut self, first: &EcoString) -> Expression {
        let start = self.advance();
        let mut parts = vec![StringPart::Literal {
            value: first.clone(),
            span: start.span(),
        }];
        let mut end_span = start.span();
        let mut flags = EcoString::new();

        loop {
            match self.current_kind().clone() {
                TokenKind::StringSegment(value) => {
                    let token = self.advance();
                    parts.push(StringPart::Literal {
                        value,
                        span: token.span(),
                    });
                }
                TokenKind::PatternEnd(end) => {
                    let token = self.advance();
                    parts.push(StringPart::Literal {
                        value: end.text,
                        span: token.span(),
                    });
                    flags = end.flags;
                    end_span = token.span();
                    break;
                }
                TokenKind::Eof => {
                    self.error(
                        DiagnosticKind::UnterminatedPattern,
                        "interpolated pattern never closed",
                    );
                    break;
                }
                _ => {
                    let expression = self.parse_expression(ExprContext::Inner);
                    parts.push(StringPart::Interpolation {
                        span: expression.span(),
                        expression: Box::new(expression),
                    });
                }
            }
        }

        Expression::Pattern {
            parts,
            flags,
            span: start.span().merge(end_span),
        }
    }
}

// ============================================================================
// Numeric Literals
// ============================================================================

/// Converts a numeric literal's source text into its exact typed value.
///
/// Suffix composition: `r` builds a rational from the base literal (kept
/// exact, never through a float), `i` wraps the result as an imaginary
/// magnitude. Integers wider than a machine word keep canonical decimal
/// digits.
#[must_use]
pub(super) fn parse_number(text: &str) -> Numeric {
    let (base, rational, imaginary) = split_suffix(text);
    let cleaned: String = base.chars().filter(|&c| c != '_').collect();

    let value = if rational {
        rational_value(&cleaned)
    } else {
        base_value(&cleaned)
    };

    if imaginary {
        Numeric::Imaginary(Box::new(value))
    } else {
        value
    }
}

/// Splits the `r` / `i` / `ri` suffix off a numeric literal.
fn split_suffix(text: &str) -> (&str, bool, bool) {
    if let Some(base) = text.strip_suffix("ri") {
        (base, true, true)
    } else if let Some(base) = text.strip_suffix('r') {
        (base, true, false)
    } else if let Some(base) = text.strip_suffix('i') {
        (base, false, true)
    } else {
        (text, false, false)
    }
}

/// Parses the unsuffixed base literal.
fn base_value(text: &str) -> Numeric {
    if let Some(digits) = radix_digits(text) {
        return Numeric::Integer(digits);
    }
    if text.contains(['.', 'e', 'E']) {
        return Numeric::Float(text.parse().unwrap_or(0.0));
    }
    Numeric::Integer(decimal_int(text))
}

/// Builds an exact rational from the base literal.
///
/// `42r` is 42/1; `0.5r` uses the decimal digits directly, numerator 5 over
/// denominator 10, reduced to 1/2. An exponent float cannot be represented
/// exactly, so (after the lexer's diagnostic) it falls back to a float.
fn rational_value(text: &str) -> Numeric {
    if let Some(digits) = radix_digits(text) {
        return Numeric::Rational {
            numerator: digits,
            denominator: IntValue::Small(1),
        };
    }
    if text.contains(['e', 'E']) {
        return Numeric::Float(text.parse().unwrap_or(0.0));
    }
    let Some((int_part, frac_part)) = text.split_once('.') else {
        return Numeric::Rational {
            numerator: decimal_int(text),
            denominator: IntValue::Small(1),
        };
    };

    let digits = format!("{int_part}{frac_part}");
    let numerator = decimal_int(&digits);
    let denominator = power_of_ten(frac_part.len());
    reduce_rational(numerator, denominator)
}

/// Reduces a rational when both sides fit the machine-word fast path.
fn reduce_rational(numerator: IntValue, denominator: IntValue) -> Numeric {
    if let (IntValue::Small(n), IntValue::Small(d)) = (&numerator, &denominator) {
        let g = gcd(n.unsigned_abs(), d.unsigned_abs()).max(1);
        #[expect(
            clippy::cast_possible_wrap,
            reason = "dividing by the gcd never exceeds the original magnitude"
        )]
        return Numeric::Rational {
            numerator: IntValue::Small((n.unsigned_abs() / g) as i64),
            denominator: IntValue::Small((d.unsigned_abs() / g) as i64),
        };
    }
    Numeric::Rational {
        numerator,
        denominator,
    }
}

/// Greatest common divisor (Euclid).
fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Returns `10^exponent` as an exact integer.
fn power_of_ten(exponent: usize) -> IntValue {
    if exponent < 19 {
        IntValue::Small(10i64.pow(exponent as u32))
    } else {
        let mut digits = String::with_capacity(exponent + 1);
        digits.push('1');
        digits.extend(std::iter::repeat('0').take(exponent));
        IntValue::Big(digits.into())
    }
}

/// Parses a radix-prefixed integer (`0x`, `0o`, `0b`), or returns `None`
/// for other shapes.
fn radix_digits(text: &str) -> Option<IntValue> {
    let (digits, radix) = match text.get(..2) {
        Some("0x" | "0X") => (&text[2..], 16),
        Some("0o" | "0O") => (&text[2..], 8),
        Some("0b" | "0B") => (&text[2..], 2),
        _ => return None,
    };
    match i64::from_str_radix(digits, radix) {
        Ok(value) => Some(IntValue::Small(value)),
        Err(_) => Some(IntValue::Big(radix_to_decimal(digits, radix))),
    }
}

/// Parses a decimal integer, exactly, at any width.
fn decimal_int(text: &str) -> IntValue {
    match text.parse::<i64>() {
        Ok(value) => IntValue::Small(value),
        Err(_) => {
            let trimmed = text.trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            // Re-check: stripping leading zeros may bring it into range.
            match digits.parse::<i64>() {
                Ok(value) => IntValue::Small(value),
                Err(_) => IntValue::Big(digits.into()),
            }
        }
    }
}

/// Converts radix digits to a canonical decimal digit string, exactly,
/// using schoolbook multiply-and-add over decimal digit vectors.
fn radix_to_decimal(digits: &str, radix: u32) -> EcoString {
    let mut decimal: Vec<u8> = vec![0]; // little-endian decimal digits

    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { continue };
        // decimal = decimal * radix + d
        let mut carry = d;
        for slot in &mut decimal {
            let value = u32::from(*slot) * radix + carry;
            *slot = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            decimal.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    let mut out = String::with_capacity(decimal.len());
    for &d in decimal.iter().rev() {
        out.push(char::from(b'0' + d));
    }
    let trimmed = out.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".into()
    } else {
        trimmed.into()
    }
}

#[cfg(test)]
mod number_tests {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_number("42"), Numeric::Integer(IntValue::Small(42)));
        assert_eq!(
            parse_number("1_000"),
            Numeric::Integer(IntValue::Small(1000))
        );
        assert_eq!(parse_number("0xff"), Numeric::Integer(IntValue::Small(255)));
        assert_eq!(parse_number("0b1010"), Numeric::Integer(IntValue::Small(10)));
        assert_eq!(parse_number("0o755"), Numeric::Integer(IntValue::Small(493)));
    }

    #[test]
    fn big_integers_stay_exact() {
        assert_eq!(
            parse_number("123456789012345678901234567890"),
            Numeric::Integer(IntValue::Big("123456789012345678901234567890".into()))
        );
        // 2^64 = 18446744073709551616
        assert_eq!(
            parse_number("0x10000000000000000"),
            Numeric::Integer(IntValue::Big("18446744073709551616".into()))
        );
    }

    #[test]
    fn floats() {
        assert_eq!(parse_number("3.14"), Numeric::Float(3.14));
        assert_eq!(parse_number("1e10"), Numeric::Float(1e10));
        assert_eq!(parse_number("2.5e-3"), Numeric::Float(2.5e-3));
    }

    #[test]
    fn rationals_are_exact() {
        assert_eq!(
            parse_number("42r"),
            Numeric::Rational {
                numerator: IntValue::Small(42),
                denominator: IntValue::Small(1),
            }
        );
        assert_eq!(
            parse_number("0.5r"),
            Numeric::Rational {
                numerator: IntValue::Small(1),
                denominator: IntValue::Small(2),
            }
        );
        assert_eq!(
            parse_number("0.25r"),
            Numeric::Rational {
                numerator: IntValue::Small(1),
                denominator: IntValue::Small(4),
            }
        );
    }

    #[test]
    fn imaginary_values() {
        assert_eq!(
            parse_number("42i"),
            Numeric::Imaginary(Box::new(Numeric::Integer(IntValue::Small(42))))
        );
        assert_eq!(
            parse_number("3.14i"),
            Numeric::Imaginary(Box::new(Numeric::Float(3.14)))
        );
    }

    #[test]
    fn rational_imaginary_composes() {
        assert_eq!(
            parse_number("0.5ri"),
            Numeric::Imaginary(Box::new(Numeric::Rational {
                numerator: IntValue::Small(1),
                denominator: IntValue::Small(2),
            }))
        );
        assert_eq!(
            parse_number("42ri"),
            Numeric::Imaginary(Box::new(Numeric::Rational {
                numerator: IntValue::Small(42),
                denominator: IntValue::Small(1),
            }))
        );
    }

    #[test]
    fn radix_to_decimal_conversion() {
        assert_eq!(radix_to_decimal("ff", 16), "255");
        assert_eq!(radix_to_decimal("0", 16), "0");
        assert_eq!(radix_to_decimal("10000000000000000", 16), "18446744073709551616");
    }
}
