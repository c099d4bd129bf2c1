// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Token types for Coral lexical analysis.
//!
//! Each token carries a [`TokenKind`], a byte-range [`Span`], and leading /
//! trailing [`Trivia`] (whitespace and comments). String-like literals carry
//! flags (`has_escapes`, `unterminated`, `heredoc`) that downstream consumers
//! use without re-scanning the source.
//!
//! # Interpolation
//!
//! Interpolated literals are split into a start / segment / end triple with
//! the expression tokens inlined between them:
//!
//! ```text
//! "a#{x}b"  →  StringStart("a"), Identifier("x"), StringEnd("b")
//! ```
//!
//! The same shape is used for heredoc bodies and `/.../` patterns, so the
//! parser has exactly one way of consuming interpolated content.

use ecow::EcoString;

use super::Span;

/// A reserved word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Nil,
    True,
    False,
    SelfKw,
    If,
    Elsif,
    Else,
    Unless,
    While,
    Until,
    Def,
    End,
    Then,
    Do,
    Return,
    Break,
    Next,
    And,
    Or,
    Not,
}

impl Keyword {
    /// Looks up a keyword from its source text.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "nil" => Self::Nil,
            "true" => Self::True,
            "false" => Self::False,
            "self" => Self::SelfKw,
            "if" => Self::If,
            "elsif" => Self::Elsif,
            "else" => Self::Else,
            "unless" => Self::Unless,
            "while" => Self::While,
            "until" => Self::Until,
            "def" => Self::Def,
            "end" => Self::End,
            "then" => Self::Then,
            "do" => Self::Do,
            "return" => Self::Return,
            "break" => Self::Break,
            "next" => Self::Next,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            _ => return None,
        })
    }

    /// Returns the source text of this keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::True => "true",
            Self::False => "false",
            Self::SelfKw => "self",
            Self::If => "if",
            Self::Elsif => "elsif",
            Self::Else => "else",
            Self::Unless => "unless",
            Self::While => "while",
            Self::Until => "until",
            Self::Def => "def",
            Self::End => "end",
            Self::Then => "then",
            Self::Do => "do",
            Self::Return => "return",
            Self::Break => "break",
            Self::Next => "next",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
        }
    }

    /// Returns `true` if this keyword is a literal value (`nil`, `true`,
    /// `false`, `self`).
    #[must_use]
    pub const fn is_value(self) -> bool {
        matches!(self, Self::Nil | Self::True | Self::False | Self::SelfKw)
    }
}

/// A scanned string-like literal and its flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringLit {
    /// The cooked value (escapes resolved).
    pub value: EcoString,
    /// Whether the source contained escape sequences.
    pub has_escapes: bool,
    /// Whether the closing delimiter (or heredoc terminator) was missing.
    pub unterminated: bool,
    /// Whether this literal came from a heredoc body. Heredoc string nodes
    /// take the opener's span, so the parser needs to know the origin.
    pub heredoc: bool,
}

impl StringLit {
    /// Creates a plain, terminated string literal with no escapes.
    #[must_use]
    pub fn plain(value: impl Into<EcoString>) -> Self {
        Self {
            value: value.into(),
            has_escapes: false,
            unterminated: false,
            heredoc: false,
        }
    }
}

/// The closing token of an interpolated pattern, carrying the trailing flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternEnd {
    /// Literal text between the last interpolation and the closing delimiter.
    pub text: EcoString,
    /// Pattern flags (`i`, `m`, `x`), in source order.
    pub flags: EcoString,
}

/// The kind of token, not including source location or trivia.
///
/// String payloads use [`EcoString`] so tokens are cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Names ===
    /// A local variable or method name: `foo`, `any_value?`, `save!`
    Identifier(EcoString),

    /// A constant name: `Foo`, `HTTP_OK`
    Constant(EcoString),

    /// An instance variable, including the sigil: `@name`
    InstanceVariable(EcoString),

    /// A reserved word.
    Keyword(Keyword),

    /// A hash/argument label: `name:` (text excludes the colon)
    Label(EcoString),

    // === Literals ===
    /// A numeric literal, stored as its source text including any radix
    /// prefix and `r`/`i` suffixes: `42`, `0xff`, `1_000`, `0.5ri`
    Number(EcoString),

    /// A fully scanned string with no interpolation.
    String(StringLit),

    /// Start of an interpolated string: the literal text up to the first
    /// `#{`. For heredocs the token's span is the opener's span.
    StringStart(StringLit),

    /// Literal text between two interpolations.
    StringSegment(EcoString),

    /// Literal text from the last interpolation to the closing delimiter.
    StringEnd(EcoString),

    /// A symbol literal: `:foo`, `:"quoted"`, `:+` (text excludes the colon)
    Symbol(EcoString),

    /// A pattern literal with no interpolation: `/ab+c/i`
    Pattern(PatternLit),

    /// Start of an interpolated pattern.
    PatternStart(EcoString),

    /// End of an interpolated pattern, with trailing flags.
    PatternEnd(PatternEnd),

    /// Opens a word or symbol list: `%w(`, `%i[`
    WordsOpen {
        /// `true` for `%i` (symbol list), `false` for `%w` (word list).
        symbols: bool,
    },

    /// Closes a word or symbol list.
    WordsClose,

    // === Operators ===
    /// A unary or binary operator: `+`, `**`, `<=>`, `..`, `!`
    Operator(EcoString),

    /// Assignment: `=`
    Assign,

    /// Hash rocket: `=>`
    HashRocket,

    // === Delimiters ===
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,

    // === Punctuation ===
    /// Statement separator: `;`
    Semicolon,
    /// Method call dot: `.`
    Dot,
    /// Argument separator: `,`
    Comma,

    // === Special ===
    /// End of input.
    Eof,

    /// Invalid input (unknown character, malformed literal, invalid byte
    /// sequence). Preserves the offending text for error recovery.
    Error(EcoString),
}

/// A fully scanned pattern literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternLit {
    /// The pattern body, escapes left as written.
    pub value: EcoString,
    /// Pattern flags (`i`, `m`, `x`), in source order.
    pub flags: EcoString,
    /// Whether the closing delimiter was missing.
    pub unterminated: bool,
}

impl TokenKind {
    /// Returns `true` if this token is a literal value.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::Number(_)
                | Self::String(_)
                | Self::StringStart(_)
                | Self::Symbol(_)
                | Self::Pattern(_)
                | Self::PatternStart(_)
                | Self::WordsOpen { .. }
        )
    }

    /// Returns `true` if this is the end-of-input marker.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Returns `true` if this is an error token.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns `true` if this token can end an expression. The lexer uses
    /// this to decide whether `/` and `%` start a literal or act as a binary
    /// operator.
    #[must_use]
    pub fn ends_expression(&self) -> bool {
        match self {
            Self::Identifier(_)
            | Self::Constant(_)
            | Self::InstanceVariable(_)
            | Self::Number(_)
            | Self::String(_)
            | Self::StringEnd(_)
            | Self::Symbol(_)
            | Self::Pattern(_)
            | Self::PatternEnd(_)
            | Self::WordsClose
            | Self::RightParen
            | Self::RightBracket
            | Self::RightBrace => true,
            Self::Keyword(kw) => matches!(
                kw,
                Keyword::Nil | Keyword::True | Keyword::False | Keyword::SelfKw | Keyword::End
            ),
            _ => false,
        }
    }

    /// Returns the string content if this token carries one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Identifier(s)
            | Self::Constant(s)
            | Self::InstanceVariable(s)
            | Self::Label(s)
            | Self::Number(s)
            | Self::StringSegment(s)
            | Self::StringEnd(s)
            | Self::Symbol(s)
            | Self::PatternStart(s)
            | Self::Operator(s)
            | Self::Error(s) => Some(s),
            Self::String(lit) | Self::StringStart(lit) => Some(&lit.value),
            Self::Pattern(lit) => Some(&lit.value),
            Self::PatternEnd(end) => Some(&end.text),
            Self::Keyword(kw) => Some(kw.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identifier(s)
            | Self::Constant(s)
            | Self::InstanceVariable(s)
            | Self::Number(s)
            | Self::Operator(s) => write!(f, "{s}"),
            Self::Keyword(kw) => write!(f, "{}", kw.as_str()),
            Self::Label(s) => write!(f, "{s}:"),
            Self::String(lit) => write!(f, "\"{}\"", lit.value),
            Self::StringStart(lit) => write!(f, "\"{}#{{", lit.value),
            Self::StringSegment(s) => write!(f, "}}{s}#{{"),
            Self::StringEnd(s) => write!(f, "}}{s}\""),
            Self::Symbol(s) => write!(f, ":{s}"),
            Self::Pattern(lit) => write!(f, "/{}/{}", lit.value, lit.flags),
            Self::PatternStart(s) => write!(f, "/{s}#{{"),
            Self::PatternEnd(end) => write!(f, "}}{}/{}", end.text, end.flags),
            Self::WordsOpen { symbols: true } => write!(f, "%i("),
            Self::WordsOpen { symbols: false } => write!(f, "%w("),
            Self::WordsClose => write!(f, ")"),
            Self::Assign => write!(f, "="),
            Self::HashRocket => write!(f, "=>"),
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
            Self::LeftBracket => write!(f, "["),
            Self::RightBracket => write!(f, "]"),
            Self::LeftBrace => write!(f, "{{"),
            Self::RightBrace => write!(f, "}}"),
            Self::Semicolon => write!(f, ";"),
            Self::Dot => write!(f, "."),
            Self::Comma => write!(f, ","),
            Self::Eof => write!(f, "<eof>"),
            Self::Error(s) => write!(f, "<error: {s}>"),
        }
    }
}

/// The kind of a trivia piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    /// Spaces, tabs, newlines, and `\` line continuations.
    Whitespace,
    /// A `# ...` line comment.
    LineComment,
    /// A `=begin` / `=end` embedded documentation block.
    EmbeddedDoc,
}

/// Non-semantic content attached to tokens: whitespace and comments.
///
/// Trivia carries its span so comments can be reported by position without
/// re-scanning the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trivia {
    /// What kind of trivia this is.
    pub kind: TriviaKind,
    /// The raw text, including comment markers.
    pub text: EcoString,
    /// Where the trivia appears in the source.
    pub span: Span,
}

impl Trivia {
    /// Creates a new trivia piece.
    #[must_use]
    pub fn new(kind: TriviaKind, text: impl Into<EcoString>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// Returns `true` if this is whitespace.
    #[must_use]
    pub const fn is_whitespace(&self) -> bool {
        matches!(self.kind, TriviaKind::Whitespace)
    }

    /// Returns `true` if this is a comment of any kind.
    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self.kind, TriviaKind::LineComment | TriviaKind::EmbeddedDoc)
    }

    /// Returns `true` if this trivia contains a newline.
    #[must_use]
    pub fn contains_newline(&self) -> bool {
        self.text.contains('\n')
    }
}

/// A token with its source location and surrounding trivia.
///
/// # Examples
///
/// ```
/// use coral_core::source_analysis::{Span, Token, TokenKind};
///
/// let token = Token::new(TokenKind::Identifier("foo".into()), Span::new(0, 3));
/// assert!(matches!(token.kind(), TokenKind::Identifier(_)));
/// assert_eq!(token.span().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    span: Span,
    leading_trivia: Vec<Trivia>,
    trailing_trivia: Vec<Trivia>,
}

impl Token {
    /// Creates a new token with no trivia.
    #[must_use]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            leading_trivia: Vec::new(),
            trailing_trivia: Vec::new(),
        }
    }

    /// Creates a new token with trivia.
    #[must_use]
    pub fn with_trivia(
        kind: TokenKind,
        span: Span,
        leading_trivia: Vec<Trivia>,
        trailing_trivia: Vec<Trivia>,
    ) -> Self {
        Self {
            kind,
            span,
            leading_trivia,
            trailing_trivia,
        }
    }

    /// Returns the kind of this token.
    #[must_use]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    /// Consumes the token and returns its kind.
    #[must_use]
    pub fn into_kind(self) -> TokenKind {
        self.kind
    }

    /// Returns the source span of this token (excluding trivia).
    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    /// Returns the trivia that precedes this token.
    #[must_use]
    pub fn leading_trivia(&self) -> &[Trivia] {
        &self.leading_trivia
    }

    /// Returns the trivia that follows this token on the same line.
    #[must_use]
    pub fn trailing_trivia(&self) -> &[Trivia] {
        &self.trailing_trivia
    }

    /// Returns `true` if there is a newline in the leading trivia.
    ///
    /// Newlines separate statements, so the parser consults this constantly.
    #[must_use]
    pub fn has_leading_newline(&self) -> bool {
        self.leading_trivia.iter().any(Trivia::contains_newline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_round_trip() {
        for text in [
            "nil", "true", "false", "self", "if", "elsif", "else", "unless", "while", "until",
            "def", "end", "then", "do", "return", "break", "next", "and", "or", "not",
        ] {
            let kw = Keyword::from_text(text).unwrap();
            assert_eq!(kw.as_str(), text);
        }
        assert_eq!(Keyword::from_text("class"), None);
    }

    #[test]
    fn token_kind_display() {
        assert_eq!(TokenKind::Identifier("foo".into()).to_string(), "foo");
        assert_eq!(TokenKind::Number("42".into()).to_string(), "42");
        assert_eq!(
            TokenKind::String(StringLit::plain("hi")).to_string(),
            "\"hi\""
        );
        assert_eq!(TokenKind::Symbol("sym".into()).to_string(), ":sym");
        assert_eq!(TokenKind::Label("name".into()).to_string(), "name:");
        assert_eq!(TokenKind::Operator("<=>".into()).to_string(), "<=>");
        assert_eq!(TokenKind::HashRocket.to_string(), "=>");
        assert_eq!(TokenKind::Eof.to_string(), "<eof>");
    }

    #[test]
    fn token_kind_predicates() {
        assert!(TokenKind::Number("1".into()).is_literal());
        assert!(TokenKind::String(StringLit::plain("x")).is_literal());
        assert!(!TokenKind::Identifier("x".into()).is_literal());
        assert!(TokenKind::Eof.is_eof());
        assert!(TokenKind::Error("bad".into()).is_error());
    }

    #[test]
    fn ends_expression_contexts() {
        assert!(TokenKind::Identifier("x".into()).ends_expression());
        assert!(TokenKind::Number("1".into()).ends_expression());
        assert!(TokenKind::RightParen.ends_expression());
        assert!(TokenKind::Keyword(Keyword::Nil).ends_expression());
        assert!(!TokenKind::Operator("+".into()).ends_expression());
        assert!(!TokenKind::Comma.ends_expression());
        assert!(!TokenKind::Keyword(Keyword::If).ends_expression());
    }

    #[test]
    fn trivia_predicates() {
        let ws = Trivia::new(TriviaKind::Whitespace, "  \n", Span::new(0, 3));
        assert!(ws.is_whitespace());
        assert!(!ws.is_comment());
        assert!(ws.contains_newline());

        let comment = Trivia::new(TriviaKind::LineComment, "# note", Span::new(3, 9));
        assert!(comment.is_comment());
        assert!(!comment.contains_newline());
    }

    #[test]
    fn token_leading_newline_detection() {
        let token = Token::with_trivia(
            TokenKind::Identifier("x".into()),
            Span::new(3, 4),
            vec![Trivia::new(TriviaKind::Whitespace, "\n  ", Span::new(0, 3))],
            vec![],
        );
        assert!(token.has_leading_newline());

        let token = Token::new(TokenKind::Identifier("x".into()), Span::new(0, 1));
        assert!(!token.has_leading_newline());
    }
}
