// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Structured, non-fatal parse diagnostics.
//!
//! Lexical, syntactic, and encoding problems are collected as [`Diagnostic`]
//! records inside a normally returned parse result. They are never raised
//! across the API boundary; parsing always runs to completion. Each
//! diagnostic carries a machine-readable [`DiagnosticKind`] (stable, for
//! tooling to branch on) separate from the human-readable message.

use ecow::EcoString;

use super::Span;

/// The machine-readable category of a diagnostic.
///
/// Variants are grouped by the component that emits them. The discriminant
/// values are part of the serialized format and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DiagnosticKind {
    // === Lexical ===
    /// A string literal was not terminated.
    UnterminatedString = 0,
    /// A heredoc body never reached its terminator line.
    UnterminatedHeredoc = 1,
    /// A pattern literal was not terminated.
    UnterminatedPattern = 2,
    /// An `=begin` block without a matching `=end`.
    UnterminatedEmbeddedDoc = 3,
    /// A malformed numeric literal.
    InvalidNumber = 4,
    /// An escape sequence that names no character.
    InvalidEscape = 5,
    /// A character that starts no token.
    UnexpectedCharacter = 6,

    // === Encoding ===
    /// A byte sequence invalid under the resolved encoding.
    InvalidByteSequence = 7,
    /// An `# encoding:` directive naming an unknown encoding.
    UnknownEncodingName = 8,
    /// A magic directive appearing after the first token.
    DirectiveAfterCode = 9,

    // === Syntactic ===
    /// The parser found a token other than the one required.
    UnexpectedToken = 10,
    /// An expression was required and missing; a placeholder node was built.
    MissingExpression = 11,
    /// A construct was missing its closing `end` or delimiter.
    MissingTerminator = 12,
    /// The left side of an assignment cannot be assigned to.
    InvalidAssignmentTarget = 13,
    /// Expression nesting exceeded the parser's depth limit.
    NestingTooDeep = 14,
}

impl DiagnosticKind {
    /// Returns a stable identifier for tooling.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnterminatedString => "unterminated_string",
            Self::UnterminatedHeredoc => "unterminated_heredoc",
            Self::UnterminatedPattern => "unterminated_pattern",
            Self::UnterminatedEmbeddedDoc => "unterminated_embedded_doc",
            Self::InvalidNumber => "invalid_number",
            Self::InvalidEscape => "invalid_escape",
            Self::UnexpectedCharacter => "unexpected_character",
            Self::InvalidByteSequence => "invalid_byte_sequence",
            Self::UnknownEncodingName => "unknown_encoding_name",
            Self::DirectiveAfterCode => "directive_after_code",
            Self::UnexpectedToken => "unexpected_token",
            Self::MissingExpression => "missing_expression",
            Self::MissingTerminator => "missing_terminator",
            Self::InvalidAssignmentTarget => "invalid_assignment_target",
            Self::NestingTooDeep => "nesting_too_deep",
        }
    }

    /// Returns the serialized tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Looks up a kind from its serialized tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::UnterminatedString,
            1 => Self::UnterminatedHeredoc,
            2 => Self::UnterminatedPattern,
            3 => Self::UnterminatedEmbeddedDoc,
            4 => Self::InvalidNumber,
            5 => Self::InvalidEscape,
            6 => Self::UnexpectedCharacter,
            7 => Self::InvalidByteSequence,
            8 => Self::UnknownEncodingName,
            9 => Self::DirectiveAfterCode,
            10 => Self::UnexpectedToken,
            11 => Self::MissingExpression,
            12 => Self::MissingTerminator,
            13 => Self::InvalidAssignmentTarget,
            14 => Self::NestingTooDeep,
            _ => return None,
        })
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Severity {
    /// The construct is malformed; the tree contains a recovery node.
    Error = 0,
    /// Suspicious but parseable input.
    Warning = 1,
}

impl Severity {
    /// Returns the serialized tag for this severity.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Looks up a severity from its serialized tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Error,
            1 => Self::Warning,
            _ => return None,
        })
    }
}

/// A structured record of a lexing or parsing problem.
///
/// # Examples
///
/// ```
/// use coral_core::source_analysis::{Diagnostic, DiagnosticKind, Severity, Span};
///
/// let diagnostic = Diagnostic::error(
///     DiagnosticKind::UnterminatedString,
///     "unterminated string literal",
///     Span::new(0, 4),
/// );
/// assert_eq!(diagnostic.severity, Severity::Error);
/// assert_eq!(diagnostic.kind.code(), "unterminated_string");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The machine-readable category.
    pub kind: DiagnosticKind,
    /// The severity of the diagnostic.
    pub severity: Severity,
    /// The human-readable message.
    pub message: EcoString,
    /// The source location.
    pub span: Span,
}

impl Diagnostic {
    /// Creates a new error diagnostic.
    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<EcoString>, span: Span) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    /// Creates a new warning diagnostic.
    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<EcoString>, span: Span) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    /// Returns `true` if this diagnostic is an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}
