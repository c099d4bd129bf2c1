// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Lexical analysis for Coral source code.
//!
//! This module converts a byte buffer plus an encoding into a stream of
//! [`Token`]s. The lexer is hand-written for maximum control over error
//! recovery and the language's context-sensitive surface.
//!
//! # Design Principles
//!
//! - **Error recovery**: never panic and never stop; malformed input becomes
//!   [`TokenKind::Error`] tokens plus diagnostics
//! - **Bytes, not chars**: input is raw bytes under a declared encoding, so
//!   invalid sequences pass through with a diagnostic instead of failing
//!   up front
//! - **Precise spans**: every token carries its exact byte range
//! - **Newline table**: every line-start offset is recorded while scanning,
//!   so consumers translate offsets to lines without rescanning
//!
//! # Lexical modes
//!
//! Interpolated literals, heredoc bodies, and word lists are scanned in full
//! when their opener is reached; the resulting tokens are buffered in a
//! pending queue and drained before the main scan continues. Heredoc bodies
//! are read from the line after the opener (in declaration order when one
//! line opens several) and the scanned region is skipped when the main
//! cursor reaches it.
//!
//! # Example
//!
//! ```
//! use coral_core::source_analysis::{Lexer, TokenKind};
//!
//! let tokens: Vec<_> = Lexer::new(b"x + 1").collect();
//! assert_eq!(tokens.len(), 3); // x, +, 1 (EOF excluded from iterator)
//! ```

use std::collections::VecDeque;

use ecow::EcoString;

use crate::ast::{Comment, CommentKind, MagicDirective};

use super::{
    Diagnostic, DiagnosticKind, Encoding, PatternEnd, PatternLit, Span, StringLit, Token,
    TokenKind, Trivia, TriviaKind,
};

/// Magic-directive keys the lexer recognizes in leading comments.
const DIRECTIVE_KEYS: &[&str] = &["encoding", "coding", "frozen_string_literal", "warn_indent"];

/// Everything the lexer learned about a buffer, beyond the tokens.
///
/// Produced by [`Lexer::finish`] and consumed by the parser, which folds it
/// into the final parse result.
#[derive(Debug)]
pub struct LexedSource {
    /// The tokens, ending with an EOF token.
    pub tokens: Vec<Token>,
    /// Lexical and encoding diagnostics, ordered by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Comment records, ordered by position.
    pub comments: Vec<Comment>,
    /// Recognized magic directives, in source order.
    pub magic_directives: Vec<MagicDirective>,
    /// Byte offsets where each line begins; offset 0 is always present.
    pub newline_offsets: Vec<u32>,
    /// The resolved source encoding.
    pub encoding: Encoding,
}

/// A lexer that tokenizes Coral source bytes.
///
/// Implements [`Iterator`] for easy consumption; the iterator yields every
/// token except the final EOF marker.
pub struct Lexer<'src> {
    /// The full source buffer.
    source: &'src [u8],
    /// Current byte position.
    position: usize,
    /// Exclusive scan limit (the buffer length, or an interpolation range
    /// end for sub-lexers).
    limit: usize,
    /// The resolved encoding; may change once on an `# encoding:` directive.
    encoding: Encoding,
    /// Pending trivia to attach to the next token.
    pending_trivia: Vec<Trivia>,
    /// Buffered tokens from interpolation, heredocs, and word lists.
    pending_tokens: VecDeque<Token>,
    /// Scanned-ahead heredoc body regions the main cursor must skip.
    pending_skips: VecDeque<(usize, usize)>,
    /// Where the next heredoc body on the current line begins.
    heredoc_next_start: Option<usize>,
    /// Line-start offsets recorded so far.
    newline_offsets: Vec<u32>,
    /// Accumulated diagnostics.
    diagnostics: Vec<Diagnostic>,
    /// Accumulated comment records.
    comments: Vec<Comment>,
    /// Recognized magic directives.
    magic_directives: Vec<MagicDirective>,
    /// Whether any non-trivia token has been produced yet.
    seen_token: bool,
    /// Whether the previous token can end an expression.
    last_ends_expr: bool,
    /// Whether trivia preceded the token currently being lexed.
    space_before_current: bool,
    /// Span override for the current token (heredoc openers).
    override_span: Option<Span>,
    /// Set once the EOF token has been emitted.
    finished: bool,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source bytes with the default
    /// encoding (UTF-8, unless a magic directive says otherwise).
    #[must_use]
    pub fn new(source: &'src [u8]) -> Self {
        Self::with_encoding(source, Encoding::default())
    }

    /// Creates a new lexer with an explicitly declared encoding.
    #[must_use]
    pub fn with_encoding(source: &'src [u8], encoding: Encoding) -> Self {
        Self {
            source,
            position: 0,
            limit: source.len(),
            encoding,
            pending_trivia: Vec::new(),
            pending_tokens: VecDeque::new(),
            pending_skips: VecDeque::new(),
            heredoc_next_start: None,
            newline_offsets: vec![0],
            diagnostics: Vec::new(),
            comments: Vec::new(),
            magic_directives: Vec::new(),
            seen_token: false,
            last_ends_expr: false,
            space_before_current: false,
            override_span: None,
            finished: false,
        }
    }

    /// Creates a sub-lexer over an interpolation range. The sub-lexer shares
    /// the source buffer so spans stay absolute; its newline records are
    /// discarded by the caller (the enclosing scan already walked the bytes).
    fn sub_lexer(&self, start: usize, end: usize) -> Self {
        let mut sub = Self::with_encoding(self.source, self.encoding);
        sub.position = start;
        sub.limit = end;
        sub.seen_token = true;
        sub
    }

    /// Runs the lexer to completion and returns tokens plus side tables.
    ///
    /// The token list always ends with an EOF token, and diagnostics and
    /// comments come back ordered by position.
    #[must_use]
    pub fn finish(mut self) -> LexedSource {
        let mut tokens = Vec::new();
        loop {
            let token = self.lex_token();
            let eof = token.kind().is_eof();
            tokens.push(token);
            if eof {
                break;
            }
        }

        self.newline_offsets.sort_unstable();
        self.newline_offsets.dedup();
        self.diagnostics.sort_by_key(|d| d.span.start());
        self.comments.sort_by_key(|c| c.span.start());

        LexedSource {
            tokens,
            diagnostics: self.diagnostics,
            comments: self.comments,
            magic_directives: self.magic_directives,
            newline_offsets: self.newline_offsets,
            encoding: self.encoding,
        }
    }

    // ========================================================================
    // Cursor primitives
    // ========================================================================

    /// Peeks at the byte at the current position.
    fn peek_byte(&self) -> Option<u8> {
        (self.position < self.limit).then(|| self.source[self.position])
    }

    /// Peeks `n` bytes ahead (`n == 0` is the current byte).
    fn peek_byte_n(&self, n: usize) -> Option<u8> {
        let index = self.position + n;
        (index < self.limit).then(|| self.source[index])
    }

    /// Consumes `width` bytes, recording line starts for any newlines.
    ///
    /// All forward movement of the scan goes through here so the newline
    /// table stays complete; the only exception is jumping over a heredoc
    /// body region that was already scanned ahead.
    fn bump(&mut self, width: usize) {
        let end = (self.position + width).min(self.limit);
        while self.position < end {
            if self.source[self.position] == b'\n' {
                self.record_line_start(self.position + 1);
            }
            self.position += 1;
        }
    }

    /// Records a line-start offset.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "source buffers over 4GB are not supported"
    )]
    fn record_line_start(&mut self, offset: usize) {
        self.newline_offsets.push(offset as u32);
    }

    /// Consumes bytes while the predicate holds for the current byte.
    fn bump_while(&mut self, predicate: impl Fn(u8) -> bool) {
        while self.peek_byte().is_some_and(&predicate) {
            self.bump(1);
        }
    }

    /// Returns the current position as a span offset.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "source buffers over 4GB are not supported"
    )]
    fn offset(&self) -> u32 {
        self.position as u32
    }

    /// Creates a span from `start` to the current position.
    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.offset())
    }

    /// Extracts source text for a span, lossily for non-UTF-8 bytes.
    fn text_for(&self, span: Span) -> EcoString {
        EcoString::from(String::from_utf8_lossy(&self.source[span.as_range()]).as_ref())
    }

    /// Returns `true` if the current position is at the start of a line.
    fn at_line_start(&self) -> bool {
        self.position == 0 || self.source[self.position - 1] == b'\n'
    }

    /// Reports an error diagnostic.
    fn error(&mut self, kind: DiagnosticKind, message: impl Into<EcoString>, span: Span) {
        self.diagnostics.push(Diagnostic::error(kind, message, span));
    }

    // ========================================================================
    // Trivia
    // ========================================================================

    /// Skips whitespace and comments, collecting them as trivia, and jumps
    /// over heredoc body regions that were already scanned ahead.
    fn skip_trivia(&mut self) {
        loop {
            self.consume_pending_skips();
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c' | b'\n') => {
                    let start = self.offset();
                    let mut jumped = false;
                    loop {
                        match self.peek_byte() {
                            Some(b' ' | b'\t' | b'\r' | b'\x0b' | b'\x0c') => self.bump(1),
                            Some(b'\n') => {
                                self.bump(1);
                                // A scanned heredoc body begins here; close
                                // this trivia piece so its span never covers
                                // the body bytes.
                                if self.at_pending_skip() {
                                    jumped = true;
                                    break;
                                }
                            }
                            _ => break,
                        }
                    }
                    let span = self.span_from(start);
                    self.pending_trivia.push(Trivia::new(
                        TriviaKind::Whitespace,
                        self.text_for(span),
                        span,
                    ));
                    if jumped {
                        self.consume_pending_skips();
                    }
                }
                // `\` at end of line continues the line; treated as whitespace.
                Some(b'\\') if self.peek_byte_n(1) == Some(b'\n') => {
                    let start = self.offset();
                    self.bump(2);
                    let span = self.span_from(start);
                    self.pending_trivia.push(Trivia::new(
                        TriviaKind::Whitespace,
                        self.text_for(span),
                        span,
                    ));
                    self.consume_pending_skips();
                }
                Some(b'#') => self.lex_line_comment(),
                Some(b'=') if self.at_embedded_doc() => self.lex_embedded_doc(),
                _ => break,
            }
        }
    }

    /// Returns `true` if a scanned heredoc body region starts at the cursor.
    fn at_pending_skip(&self) -> bool {
        self.pending_skips
            .front()
            .is_some_and(|&(start, _)| start == self.position)
    }

    /// Jumps the cursor over already-scanned heredoc bodies.
    fn consume_pending_skips(&mut self) {
        while let Some(&(start, end)) = self.pending_skips.front() {
            if start == self.position {
                // The body was scanned (and its newlines recorded) when the
                // opener was lexed, so this is a plain jump, not a bump.
                self.position = end;
                self.pending_skips.pop_front();
                self.heredoc_next_start = None;
            } else {
                break;
            }
        }
    }

    /// Lexes a `# ...` line comment, recording magic directives.
    fn lex_line_comment(&mut self) {
        let start = self.offset();
        self.bump_while(|b| b != b'\n');
        let span = self.span_from(start);
        let text = self.text_for(span);

        self.comments.push(Comment::new(CommentKind::Line, span));
        self.scan_magic_directive(&text, span);

        self.pending_trivia
            .push(Trivia::new(TriviaKind::LineComment, text, span));
    }

    /// Recognizes `# key: value` magic directives inside a comment.
    ///
    /// An `encoding` (or `coding`) directive before the first token switches
    /// the lexer's encoding; after the first token it is recorded with a
    /// warning instead.
    fn scan_magic_directive(&mut self, text: &str, span: Span) {
        let body = text.trim_start_matches('#').trim();
        let Some((raw_key, raw_value)) = body.split_once(':') else {
            return;
        };
        let key = raw_key.trim().to_ascii_lowercase().replace('-', "_");
        if !DIRECTIVE_KEYS.contains(&key.as_str()) {
            return;
        }
        let value = raw_value.trim();
        if value.is_empty() {
            return;
        }

        if self.seen_token {
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::DirectiveAfterCode,
                format!("`{key}` directive appears after the first token and has no effect"),
                span,
            ));
        } else if key == "encoding" || key == "coding" {
            match Encoding::from_name(value) {
                Some(encoding) => self.encoding = encoding,
                None => self.error(
                    DiagnosticKind::UnknownEncodingName,
                    format!("unknown source encoding `{value}`"),
                    span,
                ),
            }
        }

        self.magic_directives.push(MagicDirective {
            key: key.into(),
            value: value.into(),
            span,
        });
    }

    /// Returns `true` if the cursor sits on a column-0 `=begin` line.
    fn at_embedded_doc(&self) -> bool {
        if !self.at_line_start() {
            return false;
        }
        let rest = &self.source[self.position..self.limit];
        rest.starts_with(b"=begin") && matches!(rest.get(6), None | Some(b' ' | b'\t' | b'\n' | b'\r'))
    }

    /// Lexes an `=begin` / `=end` embedded documentation block.
    fn lex_embedded_doc(&mut self) {
        let start = self.offset();
        // Consume the =begin line.
        self.bump_while(|b| b != b'\n');

        let mut terminated = false;
        while self.peek_byte().is_some() {
            self.bump(1); // the newline
            if self.at_line_start()
                && self.source[self.position..self.limit].starts_with(b"=end")
            {
                self.bump_while(|b| b != b'\n');
                terminated = true;
                break;
            }
            self.bump_while(|b| b != b'\n');
        }

        let span = self.span_from(start);
        if !terminated {
            self.error(
                DiagnosticKind::UnterminatedEmbeddedDoc,
                "embedded documentation is missing its `=end` terminator",
                span,
            );
        }
        self.comments
            .push(Comment::new(CommentKind::EmbeddedDoc, span));
        self.pending_trivia
            .push(Trivia::new(TriviaKind::EmbeddedDoc, self.text_for(span), span));
    }

    /// Collects trailing trivia: same-line whitespace and a line comment.
    fn collect_trailing_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r') => {
                    let start = self.offset();
                    self.bump_while(|b| matches!(b, b' ' | b'\t' | b'\r'));
                    let span = self.span_from(start);
                    self.pending_trivia.push(Trivia::new(
                        TriviaKind::Whitespace,
                        self.text_for(span),
                        span,
                    ));
                }
                Some(b'#') => {
                    self.lex_line_comment();
                    break;
                }
                _ => break,
            }
        }
    }

    // ========================================================================
    // Token dispatch
    // ========================================================================

    /// Lexes the next token.
    pub fn lex_token(&mut self) -> Token {
        // Drain buffered tokens from interpolation and heredocs first.
        if let Some(token) = self.pending_tokens.pop_front() {
            self.last_ends_expr = token.kind().ends_expression();
            return token;
        }

        self.skip_trivia();
        self.space_before_current = !self.pending_trivia.is_empty() || self.position == 0;
        let leading_trivia = std::mem::take(&mut self.pending_trivia);

        // `__END__` at column 0 ends the parsed source.
        if self.at_end_marker() {
            let start = self.offset();
            let span = Span::new(start, start + 7);
            self.comments.push(Comment::new(CommentKind::EndMarker, span));
            self.position = self.limit;
            self.finished = true;
            return Token::with_trivia(TokenKind::Eof, Span::empty(start), leading_trivia, vec![]);
        }

        let start = self.offset();
        let kind = match self.peek_byte() {
            None => {
                self.finished = true;
                TokenKind::Eof
            }
            Some(byte) => self.lex_token_kind(byte, start),
        };

        if !matches!(kind, TokenKind::Eof) {
            self.seen_token = true;
        }

        let span = self.override_span.take().unwrap_or_else(|| self.span_from(start));

        self.collect_trailing_trivia();
        let trailing_trivia = std::mem::take(&mut self.pending_trivia);

        self.last_ends_expr = kind.ends_expression();
        Token::with_trivia(kind, span, leading_trivia, trailing_trivia)
    }

    /// Returns `true` if the cursor sits on a column-0 `__END__` line.
    fn at_end_marker(&self) -> bool {
        if !self.at_line_start() {
            return false;
        }
        let rest = &self.source[self.position..self.limit];
        rest.starts_with(b"__END__") && matches!(rest.get(7), None | Some(b'\n' | b'\r'))
    }

    /// Lexes a token kind based on the first byte.
    fn lex_token_kind(&mut self, byte: u8, start: u32) -> TokenKind {
        match byte {
            b'a'..=b'z' | b'_' => self.lex_identifier(start, false),
            b'A'..=b'Z' => self.lex_identifier(start, true),
            b'0'..=b'9' => self.lex_number(start),
            b'@' => self.lex_instance_variable(start),
            b'"' => self.lex_string_literal(start, b'"', b'"', true, false),
            b'\'' => self.lex_single_quoted(start),
            b':' => self.lex_symbol(start),
            b'#' => unreachable!("comments are consumed as trivia"),

            b'<' if self.heredoc_ahead() => self.lex_heredoc(start),
            b'/' if self.pattern_ahead() => {
                self.bump(1); // the opening slash
                self.lex_pattern(start, b'/', b'/')
            }
            b'%' if self.percent_ahead() => self.lex_percent(start),

            b'(' => {
                self.bump(1);
                TokenKind::LeftParen
            }
            b')' => {
                self.bump(1);
                TokenKind::RightParen
            }
            b'[' => {
                self.bump(1);
                TokenKind::LeftBracket
            }
            b']' => {
                self.bump(1);
                TokenKind::RightBracket
            }
            b'{' => {
                self.bump(1);
                TokenKind::LeftBrace
            }
            b'}' => {
                self.bump(1);
                TokenKind::RightBrace
            }
            b';' => {
                self.bump(1);
                TokenKind::Semicolon
            }
            b',' => {
                self.bump(1);
                TokenKind::Comma
            }
            b'.' => {
                if self.peek_byte_n(1) == Some(b'.') {
                    if self.peek_byte_n(2) == Some(b'.') {
                        self.bump(3);
                        TokenKind::Operator("...".into())
                    } else {
                        self.bump(2);
                        TokenKind::Operator("..".into())
                    }
                } else {
                    self.bump(1);
                    TokenKind::Dot
                }
            }
            b'=' => match (self.peek_byte_n(1), self.peek_byte_n(2)) {
                (Some(b'='), _) => {
                    self.bump(2);
                    TokenKind::Operator("==".into())
                }
                (Some(b'>'), _) => {
                    self.bump(2);
                    TokenKind::HashRocket
                }
                _ => {
                    self.bump(1);
                    TokenKind::Assign
                }
            },
            b'<' | b'>' | b'!' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^' | b'~' => {
                self.lex_operator()
            }
            _ => self.lex_unknown(start),
        }
    }

    /// Lexes a multi-byte-aware identifier or keyword, with label detection.
    fn lex_identifier(&mut self, start: u32, constant: bool) -> TokenKind {
        self.bump_identifier_bytes();
        // Method names may end with `?` or `!`.
        if !constant && matches!(self.peek_byte(), Some(b'?' | b'!')) {
            self.bump(1);
        }
        let text = self.text_for(self.span_from(start));

        if let Some(keyword) = super::Keyword::from_text(&text) {
            return TokenKind::Keyword(keyword);
        }

        // `name:` is a label unless the colon starts a `::` or spacing says
        // otherwise. Constants never become labels.
        if !constant
            && self.peek_byte() == Some(b':')
            && self.peek_byte_n(1) != Some(b':')
        {
            self.bump(1);
            return TokenKind::Label(text);
        }

        if constant {
            TokenKind::Constant(text)
        } else {
            TokenKind::Identifier(text)
        }
    }

    /// Consumes identifier bytes: ASCII alphanumerics, underscores, and any
    /// valid multi-byte character under the resolved encoding.
    fn bump_identifier_bytes(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => self.bump(1),
                Some(b) if b >= 0x80 => {
                    match self.encoding.char_width(&self.source[self.position..self.limit]) {
                        Some(width) => self.bump(width),
                        // Leave the invalid byte for the main dispatch, which
                        // reports it once.
                        None => break,
                    }
                }
                _ => break,
            }
        }
    }

    /// Lexes `@name`.
    fn lex_instance_variable(&mut self, start: u32) -> TokenKind {
        self.bump(1); // @
        if !matches!(self.peek_byte(), Some(b) if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80)
        {
            let span = self.span_from(start);
            self.error(
                DiagnosticKind::UnexpectedCharacter,
                "`@` must be followed by an instance variable name",
                span,
            );
            return TokenKind::Error(self.text_for(span));
        }
        self.bump_identifier_bytes();
        TokenKind::InstanceVariable(self.text_for(self.span_from(start)))
    }

    /// Lexes an unknown or invalid byte with recovery.
    fn lex_unknown(&mut self, start: u32) -> TokenKind {
        let byte = self.source[self.position];
        if byte >= 0x80 {
            match self.encoding.char_width(&self.source[self.position..self.limit]) {
                Some(width) => {
                    // A valid multi-byte character can begin an identifier.
                    self.bump(width);
                    self.bump_identifier_bytes();
                    return TokenKind::Identifier(self.text_for(self.span_from(start)));
                }
                None => {
                    self.bump(1);
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::InvalidByteSequence,
                        format!(
                            "byte 0x{byte:02x} is not valid under the {} encoding",
                            self.encoding
                        ),
                        span,
                    );
                    return TokenKind::Error(self.text_for(span));
                }
            }
        }

        self.bump(1);
        let span = self.span_from(start);
        let text = self.text_for(span);
        self.error(
            DiagnosticKind::UnexpectedCharacter,
            format!("unexpected character `{text}`"),
            span,
        );
        TokenKind::Error(text)
    }

    // ========================================================================
    // Numbers
    // ========================================================================

    /// Lexes a numeric literal, including radix prefixes, underscores, float
    /// parts, and the `r` / `i` / `ri` suffixes.
    ///
    /// The token stores the raw text; the parser converts it into an exact
    /// typed value.
    fn lex_number(&mut self, start: u32) -> TokenKind {
        let mut has_exponent = false;

        if self.peek_byte() == Some(b'0')
            && matches!(
                self.peek_byte_n(1),
                Some(b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
            )
        {
            let radix = self.peek_byte_n(1).unwrap().to_ascii_lowercase();
            self.bump(2);
            let digits_start = self.position;
            let valid = move |b: u8| match radix {
                b'x' => b.is_ascii_hexdigit() || b == b'_',
                b'o' => (b'0'..=b'7').contains(&b) || b == b'_',
                _ => matches!(b, b'0' | b'1' | b'_'),
            };
            self.bump_while(valid);
            if self.position == digits_start {
                let span = self.span_from(start);
                self.error(
                    DiagnosticKind::InvalidNumber,
                    "radix literal is missing digits",
                    span,
                );
                return TokenKind::Error(self.text_for(span));
            }
        } else {
            self.bump_while(|b| b.is_ascii_digit() || b == b'_');

            // A fraction requires a digit after the dot, so `1..2` stays a
            // range expression.
            if self.peek_byte() == Some(b'.')
                && self.peek_byte_n(1).is_some_and(|b| b.is_ascii_digit())
            {
                self.bump(1);
                self.bump_while(|b| b.is_ascii_digit() || b == b'_');
            }

            if matches!(self.peek_byte(), Some(b'e' | b'E')) {
                if let Some(width) = self.exponent_width() {
                    has_exponent = true;
                    self.bump(width);
                }
            }
        }

        if self.source[self.position - 1] == b'_' {
            let span = self.span_from(start);
            self.error(
                DiagnosticKind::InvalidNumber,
                "number cannot end with an underscore",
                span,
            );
        }

        // Suffixes: `r`, `i`, or `ri` - only when not followed by another
        // identifier character, so `1if` lexes as `1` then the keyword.
        let mut has_rational = false;
        if self.peek_byte() == Some(b'r') {
            let after = self.peek_byte_n(1);
            if after == Some(b'i') && !Self::is_identifier_byte(self.peek_byte_n(2)) {
                self.bump(2);
                has_rational = true;
            } else if !Self::is_identifier_byte(after) {
                self.bump(1);
                has_rational = true;
            }
        } else if self.peek_byte() == Some(b'i') && !Self::is_identifier_byte(self.peek_byte_n(1)) {
            self.bump(1);
        }

        let span = self.span_from(start);
        if has_rational && has_exponent {
            self.error(
                DiagnosticKind::InvalidNumber,
                "an exponent float cannot take a rational suffix",
                span,
            );
        }

        TokenKind::Number(self.text_for(span))
    }

    /// Returns the byte width of a well-formed exponent at the cursor, or
    /// `None` when `e`/`E` does not begin one (`1egg` is `1` then `egg`).
    fn exponent_width(&self) -> Option<usize> {
        let mut width = 1;
        if matches!(self.peek_byte_n(width), Some(b'+' | b'-')) {
            width += 1;
        }
        let digits_start = width;
        while self.peek_byte_n(width).is_some_and(|b| b.is_ascii_digit()) {
            width += 1;
        }
        (width > digits_start).then_some(width)
    }

    /// Returns `true` for bytes that can continue an identifier.
    fn is_identifier_byte(byte: Option<u8>) -> bool {
        matches!(byte, Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80)
    }

    // ========================================================================
    // Strings and interpolation
    // ========================================================================

    /// Lexes a single-quoted (raw) string. Escapes: `\'` and `\\` only.
    fn lex_single_quoted(&mut self, start: u32) -> TokenKind {
        self.bump(1); // opening quote
        let mut value = String::new();
        let mut has_escapes = false;

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated string literal",
                        span,
                    );
                    return TokenKind::String(StringLit {
                        value: value.into(),
                        has_escapes,
                        unterminated: true,
                        heredoc: false,
                    });
                }
                Some(b'\'') => {
                    self.bump(1);
                    break;
                }
                Some(b'\\') if matches!(self.peek_byte_n(1), Some(b'\'' | b'\\')) => {
                    has_escapes = true;
                    value.push(self.peek_byte_n(1).unwrap() as char);
                    self.bump(2);
                }
                Some(_) => self.consume_content_byte(&mut value),
            }
        }

        TokenKind::String(StringLit {
            value: value.into(),
            has_escapes,
            unterminated: false,
            heredoc: false,
        })
    }

    /// Consumes one character of literal content, validating multi-byte
    /// sequences under the resolved encoding.
    fn consume_content_byte(&mut self, value: &mut String) {
        let byte = self.source[self.position];
        if byte < 0x80 {
            value.push(byte as char);
            self.bump(1);
            return;
        }
        match self.encoding.char_width(&self.source[self.position..self.limit]) {
            Some(width) => {
                let bytes = &self.source[self.position..self.position + width];
                value.push_str(&String::from_utf8_lossy(bytes));
                self.bump(width);
            }
            None => {
                let span = Span::new(self.offset(), self.offset() + 1);
                self.error(
                    DiagnosticKind::InvalidByteSequence,
                    format!(
                        "byte 0x{byte:02x} is not valid under the {} encoding",
                        self.encoding
                    ),
                    span,
                );
                value.push(char::REPLACEMENT_CHARACTER);
                self.bump(1);
            }
        }
    }

    /// Lexes a double-quoted or `%Q`-style string with escapes and `#{}`
    /// interpolation. `open`/`close` differ for percent literals with paired
    /// delimiters, which nest.
    fn lex_string_literal(
        &mut self,
        start: u32,
        open: u8,
        close: u8,
        escapes: bool,
        skip_open: bool,
    ) -> TokenKind {
        if !skip_open {
            self.bump(1); // opening delimiter
        }
        let paired = open != close;
        let mut depth = 1u32;

        let mut value = String::new();
        let mut has_escapes = false;
        let mut seg_start = self.offset();
        let mut segments: Vec<(EcoString, Span)> = Vec::new();
        let mut interp_ranges: Vec<(usize, usize)> = Vec::new();

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated string literal",
                        span,
                    );
                    segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                    return self.finish_interpolated_string(
                        segments,
                        interp_ranges,
                        has_escapes,
                        true,
                        start,
                    );
                }
                Some(b) if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                        self.bump(1); // closing delimiter
                        break;
                    }
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b) if paired && b == open => {
                    depth += 1;
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b'\\') if escapes => {
                    has_escapes = true;
                    self.consume_escape(&mut value);
                }
                Some(b'#') if self.peek_byte_n(1) == Some(b'{') => {
                    segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                    value.clear();
                    self.bump(2); // #{
                    match self.scan_interpolation_body(start) {
                        Some(range) => {
                            interp_ranges.push(range);
                            seg_start = self.offset();
                        }
                        None => {
                            // Unterminated interpolation: everything was
                            // consumed; close the literal where it stands.
                            segments.push((EcoString::new(), Span::empty(self.offset())));
                            return self.finish_interpolated_string(
                                segments,
                                interp_ranges,
                                has_escapes,
                                true,
                                start,
                            );
                        }
                    }
                }
                Some(_) => self.consume_content_byte(&mut value),
            }
        }

        if interp_ranges.is_empty() {
            let (value, _) = segments.pop().unwrap();
            return TokenKind::String(StringLit {
                value,
                has_escapes,
                unterminated: false,
                heredoc: false,
            });
        }
        self.finish_interpolated_string(segments, interp_ranges, has_escapes, false, start)
    }

    /// Scans one `#{ ... }` interpolation body, tracking brace depth and
    /// skipping nested strings and comments. Returns the byte range of the
    /// embedded expression, or `None` on unterminated input (diagnosed).
    fn scan_interpolation_body(&mut self, literal_start: u32) -> Option<(usize, usize)> {
        let body_start = self.position;
        let mut depth = 1u32;

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(literal_start);
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated interpolation in string literal",
                        span,
                    );
                    return None;
                }
                Some(b'{') => {
                    depth += 1;
                    self.bump(1);
                }
                Some(b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        let body_end = self.position;
                        self.bump(1); // }
                        return Some((body_start, body_end));
                    }
                    self.bump(1);
                }
                Some(b'"') => self.skip_nested_quoted(b'"'),
                Some(b'\'') => self.skip_nested_quoted(b'\''),
                Some(b'#') if self.peek_byte_n(1) != Some(b'{') => {
                    // A comment runs to the end of the line.
                    self.bump_while(|b| b != b'\n');
                }
                Some(b'\\') => {
                    self.bump(1);
                    if self.peek_byte().is_some() {
                        self.bump(1);
                    }
                }
                Some(_) => self.bump(1),
            }
        }
    }

    /// Skips a nested string literal inside an interpolation body.
    fn skip_nested_quoted(&mut self, quote: u8) {
        self.bump(1); // opening quote
        loop {
            match self.peek_byte() {
                None => break,
                Some(b) if b == quote => {
                    self.bump(1);
                    break;
                }
                Some(b'\\') => {
                    self.bump(1);
                    if self.peek_byte().is_some() {
                        self.bump(1);
                    }
                }
                Some(_) => {
                    self.bump(1);
                }
            }
        }
    }

    /// Builds the token triple for an interpolated string and queues the
    /// tail; returns the `StringStart` kind.
    fn finish_interpolated_string(
        &mut self,
        segments: Vec<(EcoString, Span)>,
        interp_ranges: Vec<(usize, usize)>,
        has_escapes: bool,
        unterminated: bool,
        literal_start: u32,
    ) -> TokenKind {
        if interp_ranges.is_empty() {
            // Unterminated with no interpolation: a plain flagged string.
            let value = segments
                .into_iter()
                .next()
                .map(|(value, _)| value)
                .unwrap_or_default();
            return TokenKind::String(StringLit {
                value,
                has_escapes,
                unterminated,
                heredoc: false,
            });
        }

        let mut tokens: Vec<Token> = Vec::new();
        for (i, &(interp_start, interp_end)) in interp_ranges.iter().enumerate() {
            if i > 0 {
                let (value, span) = &segments[i];
                tokens.push(Token::new(TokenKind::StringSegment(value.clone()), *span));
            }
            self.queue_sub_tokens(&mut tokens, interp_start, interp_end);
        }

        let (last_value, last_span) = segments
            .last()
            .cloned()
            .unwrap_or_else(|| (EcoString::new(), Span::empty(self.offset())));
        tokens.push(Token::new(
            TokenKind::StringEnd(last_value),
            Span::new(last_span.start(), self.offset()),
        ));

        self.pending_tokens.extend(tokens);

        let (first_value, first_span) = segments.into_iter().next().unwrap();
        // The StringStart span covers the opening delimiter through the
        // first `#{`.
        self.override_span = Some(Span::new(literal_start, first_span.end()));
        TokenKind::StringStart(StringLit {
            value: first_value,
            has_escapes,
            unterminated,
            heredoc: false,
        })
    }

    /// Sub-lexes an interpolation range and appends its tokens.
    fn queue_sub_tokens(&mut self, tokens: &mut Vec<Token>, start: usize, end: usize) {
        let mut sub = self.sub_lexer(start, end);
        loop {
            let token = sub.lex_token();
            if token.kind().is_eof() {
                break;
            }
            tokens.push(token);
        }
        self.diagnostics.append(&mut sub.diagnostics);
        self.comments.append(&mut sub.comments);
        // The enclosing scan already recorded this range's newlines.
    }

    /// Resolves one escape sequence into `value`.
    fn consume_escape(&mut self, value: &mut String) {
        let escape_start = self.offset();
        self.bump(1); // backslash
        let Some(byte) = self.peek_byte() else {
            value.push('\\');
            return;
        };
        self.bump(1);
        match byte {
            b'n' => value.push('\n'),
            b't' => value.push('\t'),
            b'r' => value.push('\r'),
            b'0' => value.push('\0'),
            b'e' => value.push('\x1b'),
            b'a' => value.push('\x07'),
            b'b' => value.push('\x08'),
            b'f' => value.push('\x0c'),
            b'v' => value.push('\x0b'),
            b's' => value.push(' '),
            b'x' => {
                let mut code: u32 = 0;
                let mut digits = 0;
                while digits < 2 && self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                    code = code * 16 + u32::from((self.peek_byte().unwrap() as char).to_digit(16).unwrap());
                    self.bump(1);
                    digits += 1;
                }
                if digits == 0 {
                    let span = self.span_from(escape_start);
                    self.error(
                        DiagnosticKind::InvalidEscape,
                        "`\\x` escape is missing hex digits",
                        span,
                    );
                } else {
                    value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            b'u' => {
                let mut code: u32 = 0;
                let mut digits = 0;
                while digits < 4 && self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                    code = code * 16 + u32::from((self.peek_byte().unwrap() as char).to_digit(16).unwrap());
                    self.bump(1);
                    digits += 1;
                }
                if digits < 4 {
                    let span = self.span_from(escape_start);
                    self.error(
                        DiagnosticKind::InvalidEscape,
                        "`\\u` escape requires four hex digits",
                        span,
                    );
                } else {
                    value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
            }
            // Any other escaped character stands for itself.
            _ => value.push(byte as char),
        }
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    /// Returns `true` if `/` at the cursor starts a pattern literal rather
    /// than division.
    ///
    /// Division requires the previous token to end an expression; even then,
    /// `foo /bar/` (space before the slash, none after) reads as a pattern
    /// in command-argument position. The residual ambiguity against the
    /// reference lexer is a documented divergence.
    fn pattern_ahead(&self) -> bool {
        if !self.last_ends_expr {
            return true;
        }
        self.space_before_current
            && !matches!(self.peek_byte_n(1), None | Some(b' ' | b'\t' | b'\n' | b'='))
    }

    /// Lexes a pattern literal body. The opening delimiter is consumed by
    /// the caller; escapes stay raw (the pattern engine owns them).
    fn lex_pattern(&mut self, start: u32, open: u8, close: u8) -> TokenKind {
        let paired = open != close;
        let mut depth = 1u32;
        let mut value = String::new();
        let mut seg_start = self.offset();
        let mut segments: Vec<(EcoString, Span)> = Vec::new();
        let mut interp_ranges: Vec<(usize, usize)> = Vec::new();
        let mut unterminated = false;

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::UnterminatedPattern,
                        "unterminated pattern literal",
                        span,
                    );
                    unterminated = true;
                    segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                    break;
                }
                Some(b) if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                        self.bump(1);
                        break;
                    }
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b) if paired && b == open => {
                    depth += 1;
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b'\\') => {
                    // Patterns keep escapes as written, including an escaped
                    // delimiter.
                    value.push('\\');
                    self.bump(1);
                    if let Some(next) = self.peek_byte() {
                        value.push(next as char);
                        self.bump(1);
                    }
                }
                Some(b'#') if self.peek_byte_n(1) == Some(b'{') => {
                    segments.push((value.as_str().into(), Span::new(seg_start, self.offset())));
                    value.clear();
                    self.bump(2);
                    match self.scan_interpolation_body(start) {
                        Some(range) => {
                            interp_ranges.push(range);
                            seg_start = self.offset();
                        }
                        None => {
                            unterminated = true;
                            segments.push((EcoString::new(), Span::empty(self.offset())));
                            break;
                        }
                    }
                }
                Some(_) => self.consume_content_byte(&mut value),
            }
        }

        let flags_start = self.offset();
        self.bump_while(|b| matches!(b, b'i' | b'm' | b'x'));
        let flags = self.text_for(self.span_from(flags_start));

        if interp_ranges.is_empty() {
            let (value, _) = segments.pop().unwrap_or_default();
            return TokenKind::Pattern(PatternLit {
                value,
                flags,
                unterminated,
            });
        }

        let mut tokens: Vec<Token> = Vec::new();
        for (i, &(interp_start, interp_end)) in interp_ranges.iter().enumerate() {
            if i > 0 {
                let (value, span) = &segments[i];
                tokens.push(Token::new(TokenKind::StringSegment(value.clone()), *span));
            }
            self.queue_sub_tokens(&mut tokens, interp_start, interp_end);
        }
        let (last_value, last_span) = segments
            .last()
            .cloned()
            .unwrap_or_else(|| (EcoString::new(), Span::empty(self.offset())));
        tokens.push(Token::new(
            TokenKind::PatternEnd(PatternEnd {
                text: last_value,
                flags,
            }),
            Span::new(last_span.start(), self.offset()),
        ));
        self.pending_tokens.extend(tokens);

        let (first_value, first_span) = segments.into_iter().next().unwrap();
        self.override_span = Some(Span::new(start, first_span.end()));
        TokenKind::PatternStart(first_value)
    }

    // ========================================================================
    // Percent literals
    // ========================================================================

    /// Returns `true` if `%` at the cursor starts a percent literal rather
    /// than the modulo operator.
    fn percent_ahead(&self) -> bool {
        let form_ok = match self.peek_byte_n(1) {
            Some(b'q' | b'Q' | b'w' | b'i' | b'r') => {
                matches!(self.peek_byte_n(2), Some(b) if !b.is_ascii_alphanumeric() && !b.is_ascii_whitespace())
            }
            Some(b) => !b.is_ascii_alphanumeric() && !b.is_ascii_whitespace() && b != b'=',
            None => false,
        };
        if !form_ok {
            return false;
        }
        if !self.last_ends_expr {
            return true;
        }
        self.space_before_current
    }

    /// Lexes a `%q` / `%Q` / `%w` / `%i` / `%r` / `%(...)` literal.
    fn lex_percent(&mut self, start: u32) -> TokenKind {
        self.bump(1); // %
        let designator = match self.peek_byte() {
            Some(b @ (b'q' | b'Q' | b'w' | b'i' | b'r')) => {
                self.bump(1);
                b
            }
            _ => b'Q',
        };
        let Some(open) = self.peek_byte() else {
            let span = self.span_from(start);
            self.error(
                DiagnosticKind::UnterminatedString,
                "percent literal is missing its delimiter",
                span,
            );
            return TokenKind::Error(self.text_for(span));
        };
        let close = closing_delimiter(open);

        match designator {
            b'q' => self.lex_percent_raw(start, open, close),
            b'Q' => {
                self.bump(1); // opening delimiter
                self.lex_string_literal(start, open, close, true, true)
            }
            b'w' | b'i' => self.lex_word_list(start, open, close, designator == b'i'),
            _ => {
                self.bump(1); // opening delimiter
                self.lex_pattern(start, open, close)
            }
        }
    }

    /// Lexes a `%q(...)` raw string: escapes are `\`, the delimiters, and
    /// nothing else.
    fn lex_percent_raw(&mut self, start: u32, open: u8, close: u8) -> TokenKind {
        self.bump(1); // opening delimiter
        let paired = open != close;
        let mut depth = 1u32;
        let mut value = String::new();
        let mut has_escapes = false;

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated string literal",
                        span,
                    );
                    return TokenKind::String(StringLit {
                        value: value.into(),
                        has_escapes,
                        unterminated: true,
                        heredoc: false,
                    });
                }
                Some(b) if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.bump(1);
                        break;
                    }
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b) if paired && b == open => {
                    depth += 1;
                    value.push(b as char);
                    self.bump(1);
                }
                Some(b'\\')
                    if matches!(self.peek_byte_n(1), Some(b) if b == close || b == open || b == b'\\') =>
                {
                    has_escapes = true;
                    value.push(self.peek_byte_n(1).unwrap() as char);
                    self.bump(2);
                }
                Some(_) => self.consume_content_byte(&mut value),
            }
        }

        TokenKind::String(StringLit {
            value: value.into(),
            has_escapes,
            unterminated: false,
            heredoc: false,
        })
    }

    /// Lexes a `%w(...)` word list or `%i(...)` symbol list into an open
    /// token, one token per element, and a close token.
    fn lex_word_list(&mut self, start: u32, open: u8, close: u8, symbols: bool) -> TokenKind {
        self.bump(1); // opening delimiter
        let open_end = self.offset();
        let paired = open != close;
        let mut depth = 1u32;
        let mut tokens: Vec<Token> = Vec::new();
        let mut word = String::new();
        let mut word_start = self.offset();

        let flush = |word: &mut String, span: Span, tokens: &mut Vec<Token>| {
            if word.is_empty() {
                return;
            }
            let text: EcoString = word.as_str().into();
            word.clear();
            let kind = if symbols {
                TokenKind::Symbol(text)
            } else {
                TokenKind::String(StringLit::plain(text))
            };
            tokens.push(Token::new(kind, span));
        };

        loop {
            match self.peek_byte() {
                None => {
                    let span = self.span_from(start);
                    self.error(
                        DiagnosticKind::UnterminatedString,
                        "unterminated word list",
                        span,
                    );
                    flush(&mut word, Span::new(word_start, self.offset()), &mut tokens);
                    break;
                }
                Some(b) if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        flush(&mut word, Span::new(word_start, self.offset()), &mut tokens);
                        self.bump(1);
                        break;
                    }
                    word.push(b as char);
                    self.bump(1);
                }
                Some(b) if paired && b == open => {
                    depth += 1;
                    word.push(b as char);
                    self.bump(1);
                }
                Some(b) if b.is_ascii_whitespace() => {
                    flush(&mut word, Span::new(word_start, self.offset()), &mut tokens);
                    self.bump_while(|b| b.is_ascii_whitespace());
                    word_start = self.offset();
                }
                Some(b'\\') if self.peek_byte_n(1).is_some() => {
                    // An escaped space (or delimiter) joins the word.
                    word.push(self.peek_byte_n(1).unwrap() as char);
                    self.bump(2);
                }
                Some(_) => self.consume_content_byte(&mut word),
            }
        }

        tokens.push(Token::new(
            TokenKind::WordsClose,
            Span::new(self.offset().saturating_sub(1), self.offset()),
        ));
        self.pending_tokens.extend(tokens);
        self.override_span = Some(Span::new(start, open_end));
        TokenKind::WordsOpen { symbols }
    }

    // ========================================================================
    // Heredocs
    // ========================================================================

    /// Returns `true` if `<<` at the cursor opens a heredoc.
    fn heredoc_ahead(&self) -> bool {
        if self.peek_byte_n(1) != Some(b'<') {
            return false;
        }
        let marker = match self.peek_byte_n(2) {
            Some(b'~' | b'-') => self.peek_byte_n(3),
            other => other,
        };
        let marker_ok = match marker {
            Some(b'"' | b'\'') => true,
            Some(b) => b.is_ascii_alphabetic() || b == b'_',
            None => false,
        };
        if !marker_ok {
            return false;
        }
        if !self.last_ends_expr {
            return true;
        }
        // `a << b` is a shift; `puts <<~DOC` is a heredoc argument.
        self.space_before_current && !matches!(self.peek_byte_n(2), Some(b' ' | b'\t'))
    }

    /// Lexes a heredoc opener and scans its deferred body.
    ///
    /// The emitted token's span is the opener's span, which is also the span
    /// the string node will carry (the documented exception to the location
    /// invariant). Bodies on the same line resolve in declaration order.
    fn lex_heredoc(&mut self, start: u32) -> TokenKind {
        self.bump(2); // <<
        let squiggly = self.peek_byte() == Some(b'~');
        let dash = !squiggly && self.peek_byte() == Some(b'-');
        if squiggly || dash {
            self.bump(1);
        }

        let quote = match self.peek_byte() {
            Some(b @ (b'"' | b'\'')) => {
                self.bump(1);
                Some(b)
            }
            _ => None,
        };
        let interpolates = quote != Some(b'\'');

        let id_start = self.position;
        self.bump_while(|b| b.is_ascii_alphanumeric() || b == b'_');
        let id = self.source[id_start..self.position].to_vec();

        if let Some(q) = quote {
            if self.peek_byte() == Some(q) {
                self.bump(1);
            } else {
                let span = self.span_from(start);
                self.error(
                    DiagnosticKind::UnterminatedHeredoc,
                    "heredoc marker is missing its closing quote",
                    span,
                );
            }
        }

        if id.is_empty() {
            let span = self.span_from(start);
            self.error(
                DiagnosticKind::UnterminatedHeredoc,
                "heredoc opener is missing its terminator name",
                span,
            );
            return TokenKind::Error(self.text_for(span));
        }

        let opener_span = self.span_from(start);

        // The body begins after the current logical line, or after the
        // previous heredoc's terminator when one line opens several.
        let body_start = self.heredoc_next_start.unwrap_or_else(|| {
            let mut index = self.position;
            while index < self.limit && self.source[index] != b'\n' {
                index += 1;
            }
            (index + 1).min(self.limit)
        });

        let body = self.scan_heredoc_body(body_start, &id, squiggly, dash, interpolates);
        if !body.terminated {
            self.error(
                DiagnosticKind::UnterminatedHeredoc,
                format!(
                    "heredoc body is missing its `{}` terminator",
                    String::from_utf8_lossy(&id)
                ),
                opener_span,
            );
        }
        self.pending_skips.push_back((body_start, body.skip_end));
        self.heredoc_next_start = Some(body.skip_end);

        if !interpolates || body.interp_ranges.is_empty() {
            let value: EcoString = body
                .segments
                .iter()
                .map(|(text, _)| text.as_str())
                .collect::<String>()
                .into();
            self.override_span = Some(opener_span);
            return TokenKind::String(StringLit {
                value,
                has_escapes: body.has_escapes,
                unterminated: !body.terminated,
                heredoc: true,
            });
        }

        let mut tokens: Vec<Token> = Vec::new();
        for (i, &(interp_start, interp_end)) in body.interp_ranges.iter().enumerate() {
            if i > 0 {
                let (value, span) = &body.segments[i];
                tokens.push(Token::new(TokenKind::StringSegment(value.clone()), *span));
            }
            self.queue_sub_tokens(&mut tokens, interp_start, interp_end);
        }
        let (last_value, last_span) = body
            .segments
            .last()
            .cloned()
            .unwrap_or_else(|| (EcoString::new(), Span::empty(opener_span.end())));
        tokens.push(Token::new(TokenKind::StringEnd(last_value), last_span));
        self.pending_tokens.extend(tokens);

        let first_value = body.segments.into_iter().next().map(|(v, _)| v).unwrap_or_default();
        self.override_span = Some(opener_span);
        TokenKind::StringStart(StringLit {
            value: first_value,
            has_escapes: body.has_escapes,
            unterminated: !body.terminated,
            heredoc: true,
        })
    }

    /// Scans a heredoc body ahead of the main cursor.
    ///
    /// Newlines inside the body are recorded here, because the main cursor
    /// jumps over the region instead of re-scanning it.
    fn scan_heredoc_body(
        &mut self,
        body_start: usize,
        id: &[u8],
        squiggly: bool,
        dash: bool,
        interpolates: bool,
    ) -> HeredocBody {
        // First pass: find the line ranges and the terminator.
        let mut lines: Vec<(usize, usize)> = Vec::new(); // [start, end) excluding newline
        let mut cursor = body_start;
        let mut terminated = false;
        let mut skip_end = self.limit;

        while cursor < self.limit {
            let line_start = cursor;
            let mut line_end = cursor;
            while line_end < self.limit && self.source[line_end] != b'\n' {
                line_end += 1;
            }
            let has_newline = line_end < self.limit;
            let after_line = if has_newline { line_end + 1 } else { line_end };
            if has_newline {
                self.record_line_start(after_line);
            }

            let content = &self.source[line_start..line_end];
            let trimmed = if squiggly || dash {
                let mut i = 0;
                while i < content.len() && matches!(content[i], b' ' | b'\t') {
                    i += 1;
                }
                &content[i..]
            } else {
                content
            };
            let without_cr = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
            if without_cr == id {
                terminated = true;
                skip_end = after_line;
                break;
            }

            lines.push((line_start, line_end));
            cursor = after_line;
            if !has_newline {
                break;
            }
        }
        if !terminated {
            skip_end = self.limit;
        }

        // Squiggly heredocs strip the common indentation of non-blank lines.
        let strip = if squiggly {
            lines
                .iter()
                .filter(|&&(start, end)| {
                    self.source[start..end].iter().any(|&b| !matches!(b, b' ' | b'\t' | b'\r'))
                })
                .map(|&(start, end)| {
                    self.source[start..end]
                        .iter()
                        .take_while(|&&b| matches!(b, b' ' | b'\t'))
                        .count()
                })
                .min()
                .unwrap_or(0)
        } else {
            0
        };

        // Second pass: cook the body, collecting interpolation ranges. An
        // interpolation may span lines; `resume` skips the lines it covered.
        let mut segments: Vec<(EcoString, Span)> = Vec::new();
        let mut interp_ranges: Vec<(usize, usize)> = Vec::new();
        let mut value = String::new();
        let mut has_escapes = false;
        let mut seg_start = lines
            .first()
            .map_or(body_start, |&(s, e)| (s + strip).min(e));
        let mut resume = 0usize;
        let mut invalid_bytes: Vec<usize> = Vec::new();

        for &(line_start, line_end) in &lines {
            if line_end < resume {
                continue;
            }
            let mut index = if resume > line_start {
                resume
            } else {
                (line_start + strip).min(line_end)
            };
            while index < line_end {
                let byte = self.source[index];
                match byte {
                    // Raw heredocs (single-quoted marker) keep backslashes
                    // and `#{` as literal text.
                    b'\\' if interpolates && index + 1 < line_end => {
                        has_escapes = true;
                        let (cooked, width) = cook_heredoc_escape(&self.source[index..line_end]);
                        value.push_str(&cooked);
                        index += width;
                    }
                    b'#' if interpolates && index + 1 < line_end && self.source[index + 1] == b'{' => {
                        segments.push((value.as_str().into(), Span::from(seg_start..index)));
                        value.clear();
                        // Find the matching closing brace, tracking depth.
                        let mut depth = 1u32;
                        let mut scan = index + 2;
                        while scan < skip_end && depth > 0 {
                            match self.source[scan] {
                                b'{' => depth += 1,
                                b'}' => depth -= 1,
                                _ => {}
                            }
                            scan += 1;
                        }
                        let interp_end = if depth == 0 { scan - 1 } else { scan };
                        interp_ranges.push((index + 2, interp_end));
                        index = interp_end + usize::from(depth == 0);
                        seg_start = index;
                        resume = index;
                    }
                    _ if byte < 0x80 => {
                        value.push(byte as char);
                        index += 1;
                    }
                    _ => match self.encoding.char_width(&self.source[index..line_end]) {
                        Some(width) => {
                            value.push_str(&String::from_utf8_lossy(
                                &self.source[index..index + width],
                            ));
                            index += width;
                        }
                        None => {
                            invalid_bytes.push(index);
                            value.push(char::REPLACEMENT_CHARACTER);
                            index += 1;
                        }
                    },
                }
            }
            if index <= line_end && line_end < skip_end {
                value.push('\n');
            }
        }
        let body_end = lines.last().map_or(body_start, |&(_, e)| e);
        segments.push((
            value.as_str().into(),
            Span::from(seg_start.min(body_end)..body_end),
        ));

        let encoding = self.encoding;
        for offset in invalid_bytes {
            let byte = self.source[offset];
            self.error(
                DiagnosticKind::InvalidByteSequence,
                format!("byte 0x{byte:02x} is not valid under the {encoding} encoding"),
                Span::from(offset..offset + 1),
            );
        }

        HeredocBody {
            segments,
            interp_ranges,
            has_escapes,
            terminated,
            skip_end,
        }
    }

    // ========================================================================
    // Symbols and operators
    // ========================================================================

    /// Lexes a symbol literal: `:name`, `:Const`, `:+`, `:"quoted"`.
    fn lex_symbol(&mut self, start: u32) -> TokenKind {
        self.bump(1); // :
        match self.peek_byte() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
                self.bump_identifier_bytes();
                if matches!(self.peek_byte(), Some(b'?' | b'!')) {
                    self.bump(1);
                }
                let text = self.text_for(Span::new(start + 1, self.offset()));
                TokenKind::Symbol(text)
            }
            Some(b'"') => {
                self.bump(1);
                let mut value = String::new();
                loop {
                    match self.peek_byte() {
                        None => {
                            let span = self.span_from(start);
                            self.error(
                                DiagnosticKind::UnterminatedString,
                                "unterminated symbol literal",
                                span,
                            );
                            break;
                        }
                        Some(b'"') => {
                            self.bump(1);
                            break;
                        }
                        Some(b'\\') if self.peek_byte_n(1).is_some() => {
                            value.push(self.peek_byte_n(1).unwrap() as char);
                            self.bump(2);
                        }
                        Some(_) => self.consume_content_byte(&mut value),
                    }
                }
                TokenKind::Symbol(value.into())
            }
            _ => {
                // Operator symbols, longest match first.
                const OPERATOR_SYMBOLS: &[&str] = &[
                    "<=>", "==", "**", "<<", ">>", "<=", ">=", "[]", "+", "-", "*", "/", "%", "<",
                    ">", "!", "~", "&", "|", "^",
                ];
                let rest = &self.source[self.position..self.limit];
                for op in OPERATOR_SYMBOLS {
                    if rest.starts_with(op.as_bytes()) {
                        self.bump(op.len());
                        return TokenKind::Symbol((*op).into());
                    }
                }
                let span = self.span_from(start);
                self.error(
                    DiagnosticKind::UnexpectedCharacter,
                    "`:` must begin a symbol",
                    span,
                );
                TokenKind::Error(self.text_for(span))
            }
        }
    }

    /// Lexes an operator with maximal munch.
    fn lex_operator(&mut self) -> TokenKind {
        const OPERATORS: &[&str] = &[
            "<=>", "**", "==", "!=", "<=", ">=", "<<", ">>", "&&", "||", "+", "-", "*", "/", "%",
            "<", ">", "!", "~", "&", "|", "^",
        ];
        let rest = &self.source[self.position..self.limit];
        for op in OPERATORS {
            if rest.starts_with(op.as_bytes()) {
                self.bump(op.len());
                return TokenKind::Operator((*op).into());
            }
        }
        unreachable!("lex_operator called on a non-operator byte")
    }
}

/// One scanned heredoc body.
struct HeredocBody {
    /// Cooked literal segments with their source spans.
    segments: Vec<(EcoString, Span)>,
    /// Byte ranges of `#{}` expression bodies.
    interp_ranges: Vec<(usize, usize)>,
    /// Whether any escape sequence was resolved.
    has_escapes: bool,
    /// Whether the terminator line was found.
    terminated: bool,
    /// First offset after the terminator line (or EOF).
    skip_end: usize,
}

/// Resolves one escape sequence in a heredoc body, returning the cooked text
/// and the number of source bytes consumed.
fn cook_heredoc_escape(bytes: &[u8]) -> (String, usize) {
    match bytes.get(1) {
        Some(b'n') => ("\n".into(), 2),
        Some(b't') => ("\t".into(), 2),
        Some(b'r') => ("\r".into(), 2),
        Some(b'\\') => ("\\".into(), 2),
        Some(b'#') => ("#".into(), 2),
        Some(&b) => ((b as char).to_string(), 2),
        None => ("\\".into(), 1),
    }
}

/// Returns the closing delimiter that matches an opening one.
fn closing_delimiter(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        b'<' => b'>',
        other => other,
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.lex_token();
        if token.kind().is_eof() {
            self.finished = true;
            return None;
        }
        Some(token)
    }
}

/// Lexes source bytes into tokens, excluding the EOF marker.
#[must_use]
pub fn lex(source: &[u8]) -> Vec<Token> {
    Lexer::new(source).collect()
}

/// Lexes source bytes into tokens, including the trailing EOF marker.
#[must_use]
pub fn lex_with_eof(source: &[u8]) -> Vec<Token> {
    Lexer::new(source).finish().tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source.as_bytes())
            .into_iter()
            .map(Token::into_kind)
            .collect()
    }

    fn single(source: &str) -> TokenKind {
        let mut tokens = kinds(source);
        assert_eq!(tokens.len(), 1, "expected one token for {source:?}: {tokens:?}");
        tokens.pop().unwrap()
    }

    #[test]
    fn lexes_identifiers_and_keywords() {
        assert!(matches!(single("foo"), TokenKind::Identifier(s) if s == "foo"));
        assert!(matches!(single("valid?"), TokenKind::Identifier(s) if s == "valid?"));
        assert!(matches!(single("save!"), TokenKind::Identifier(s) if s == "save!"));
        assert!(matches!(single("Foo"), TokenKind::Constant(s) if s == "Foo"));
        assert!(matches!(single("@name"), TokenKind::InstanceVariable(s) if s == "@name"));
        assert!(matches!(
            single("end"),
            TokenKind::Keyword(super::super::Keyword::End)
        ));
    }

    #[test]
    fn lexes_labels() {
        let tokens = kinds("{name: 1}");
        assert!(matches!(&tokens[1], TokenKind::Label(s) if s == "name"));
    }

    #[test]
    fn lexes_numbers() {
        assert!(matches!(single("42"), TokenKind::Number(s) if s == "42"));
        assert!(matches!(single("1_000"), TokenKind::Number(s) if s == "1_000"));
        assert!(matches!(single("0xff"), TokenKind::Number(s) if s == "0xff"));
        assert!(matches!(single("3.14"), TokenKind::Number(s) if s == "3.14"));
        assert!(matches!(single("1e10"), TokenKind::Number(s) if s == "1e10"));
        assert!(matches!(single("42r"), TokenKind::Number(s) if s == "42r"));
        assert!(matches!(single("42i"), TokenKind::Number(s) if s == "42i"));
        assert!(matches!(single("0.5ri"), TokenKind::Number(s) if s == "0.5ri"));
    }

    #[test]
    fn number_suffix_does_not_eat_keywords() {
        let tokens = kinds("1if");
        assert_eq!(tokens.len(), 2);
        assert!(matches!(&tokens[0], TokenKind::Number(s) if s == "1"));
        assert!(matches!(
            tokens[1],
            TokenKind::Keyword(super::super::Keyword::If)
        ));
    }

    #[test]
    fn range_does_not_become_float() {
        let tokens = kinds("1..2");
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[1], TokenKind::Operator(s) if s == ".."));
    }

    #[test]
    fn lexes_plain_strings() {
        match single("\"hello\"") {
            TokenKind::String(lit) => {
                assert_eq!(lit.value, "hello");
                assert!(!lit.has_escapes);
                assert!(!lit.unterminated);
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn string_escapes_are_cooked_and_flagged() {
        match single(r#""a\nb""#) {
            TokenKind::String(lit) => {
                assert_eq!(lit.value, "a\nb");
                assert!(lit.has_escapes);
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn single_quoted_strings_are_raw() {
        match single(r"'a\nb'") {
            TokenKind::String(lit) => {
                assert_eq!(lit.value, "a\\nb");
                assert!(!lit.has_escapes);
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_recovers_with_diagnostic() {
        let lexed = Lexer::new(b"\"abc").finish();
        assert!(matches!(
            lexed.tokens[0].kind(),
            TokenKind::String(lit) if lit.unterminated
        ));
        assert_eq!(
            lexed.diagnostics[0].kind,
            DiagnosticKind::UnterminatedString
        );
    }

    #[test]
    fn interpolation_produces_token_triple() {
        let tokens = kinds("\"a#{x}b\"");
        assert!(matches!(&tokens[0], TokenKind::StringStart(lit) if lit.value == "a"));
        assert!(matches!(&tokens[1], TokenKind::Identifier(s) if s == "x"));
        assert!(matches!(&tokens[2], TokenKind::StringEnd(s) if s == "b"));
    }

    #[test]
    fn interpolation_with_middle_segment() {
        let tokens = kinds("\"a#{x} and #{y}b\"");
        assert!(matches!(&tokens[0], TokenKind::StringStart(_)));
        assert!(matches!(&tokens[1], TokenKind::Identifier(s) if s == "x"));
        assert!(matches!(&tokens[2], TokenKind::StringSegment(s) if s == " and "));
        assert!(matches!(&tokens[3], TokenKind::Identifier(s) if s == "y"));
        assert!(matches!(&tokens[4], TokenKind::StringEnd(s) if s == "b"));
    }

    #[test]
    fn nested_interpolation() {
        let tokens = kinds("\"x#{\"y#{z}\"}w\"");
        assert!(matches!(&tokens[0], TokenKind::StringStart(lit) if lit.value == "x"));
        assert!(matches!(&tokens[1], TokenKind::StringStart(lit) if lit.value == "y"));
        assert!(matches!(&tokens[2], TokenKind::Identifier(s) if s == "z"));
        assert!(matches!(&tokens[3], TokenKind::StringEnd(s) if s.is_empty()));
        assert!(matches!(&tokens[4], TokenKind::StringEnd(s) if s == "w"));
    }

    #[test]
    fn lexes_symbols() {
        assert!(matches!(single(":foo"), TokenKind::Symbol(s) if s == "foo"));
        assert!(matches!(single(":+"), TokenKind::Symbol(s) if s == "+"));
        assert!(matches!(single(":<=>"), TokenKind::Symbol(s) if s == "<=>"));
        assert!(matches!(single(":\"with space\""), TokenKind::Symbol(s) if s == "with space"));
    }

    #[test]
    fn pattern_vs_division() {
        // After a value, `/` is division.
        let tokens = kinds("a / b");
        assert!(matches!(&tokens[1], TokenKind::Operator(s) if s == "/"));

        // At expression start, `/` opens a pattern.
        let tokens = kinds("x = /ab+/i");
        assert!(matches!(
            &tokens[2],
            TokenKind::Pattern(lit) if lit.value == "ab+" && lit.flags == "i"
        ));

        // Command-argument position: space before, none after.
        let tokens = kinds("foo /bar/");
        assert!(matches!(&tokens[1], TokenKind::Pattern(lit) if lit.value == "bar"));
    }

    #[test]
    fn pattern_interpolation() {
        let tokens = kinds("/a#{x}b/m");
        assert!(matches!(&tokens[0], TokenKind::PatternStart(s) if s == "a"));
        assert!(matches!(&tokens[1], TokenKind::Identifier(s) if s == "x"));
        assert!(matches!(
            &tokens[2],
            TokenKind::PatternEnd(end) if end.text == "b" && end.flags == "m"
        ));
    }

    #[test]
    fn percent_literals() {
        assert!(matches!(single("%q(raw)"), TokenKind::String(lit) if lit.value == "raw"));
        assert!(matches!(single("%(plain)"), TokenKind::String(lit) if lit.value == "plain"));
        assert!(matches!(
            single("%q[a[b]c]"),
            TokenKind::String(lit) if lit.value == "a[b]c"
        ));
        assert!(matches!(
            single("%r{ab}i"),
            TokenKind::Pattern(lit) if lit.value == "ab" && lit.flags == "i"
        ));
    }

    #[test]
    fn percent_word_lists() {
        let tokens = kinds("%w(a b c)");
        assert!(matches!(tokens[0], TokenKind::WordsOpen { symbols: false }));
        assert!(matches!(&tokens[1], TokenKind::String(lit) if lit.value == "a"));
        assert!(matches!(&tokens[2], TokenKind::String(lit) if lit.value == "b"));
        assert!(matches!(&tokens[3], TokenKind::String(lit) if lit.value == "c"));
        assert!(matches!(tokens[4], TokenKind::WordsClose));

        let tokens = kinds("%i[x y]");
        assert!(matches!(tokens[0], TokenKind::WordsOpen { symbols: true }));
        assert!(matches!(&tokens[1], TokenKind::Symbol(s) if s == "x"));
        assert!(matches!(&tokens[2], TokenKind::Symbol(s) if s == "y"));
    }

    #[test]
    fn modulo_stays_an_operator() {
        let tokens = kinds("a % b");
        assert!(matches!(&tokens[1], TokenKind::Operator(s) if s == "%"));
    }

    #[test]
    fn heredoc_plain_body() {
        let source = "x = <<~DOC\n  hello\n  world\nDOC\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        let token = &lexed.tokens[2];
        match token.kind() {
            TokenKind::String(lit) => {
                assert_eq!(lit.value, "hello\nworld\n");
                assert!(lit.heredoc);
                assert!(!lit.unterminated);
            }
            other => panic!("expected heredoc string, got {other:?}"),
        }
        // The token's span is the opener's span.
        assert_eq!(token.span(), Span::new(4, 10));
        assert!(lexed.diagnostics.is_empty());
    }

    #[test]
    fn heredoc_raw_marker_does_not_interpolate() {
        let source = "x = <<'DOC'\na#{b}\nDOC\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        match lexed.tokens[2].kind() {
            TokenKind::String(lit) => assert_eq!(lit.value, "a#{b}\n"),
            other => panic!("expected raw heredoc, got {other:?}"),
        }
    }

    #[test]
    fn heredoc_interpolation_tokens() {
        let source = "<<~DOC\n  a#{x}b\nDOC\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        assert!(matches!(
            lexed.tokens[0].kind(),
            TokenKind::StringStart(lit) if lit.heredoc && lit.value == "a"
        ));
        assert!(matches!(lexed.tokens[1].kind(), TokenKind::Identifier(s) if s == "x"));
        assert!(matches!(lexed.tokens[2].kind(), TokenKind::StringEnd(s) if s == "b\n"));
        // Opener span only.
        assert_eq!(lexed.tokens[0].span(), Span::new(0, 6));
    }

    #[test]
    fn two_heredocs_on_one_line_resolve_in_order() {
        let source = "foo(<<~A, <<~B)\n  first\nA\n  second\nB\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        let strings: Vec<_> = lexed
            .tokens
            .iter()
            .filter_map(|t| match t.kind() {
                TokenKind::String(lit) => Some(lit.value.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(strings, vec!["first\n", "second\n"]);
        assert!(lexed.diagnostics.is_empty());
    }

    #[test]
    fn unterminated_heredoc_diagnoses_at_opener() {
        let source = "x = <<~DOC\n  body";
        let lexed = Lexer::new(source.as_bytes()).finish();
        assert_eq!(
            lexed.diagnostics[0].kind,
            DiagnosticKind::UnterminatedHeredoc
        );
        assert!(matches!(
            lexed.tokens[2].kind(),
            TokenKind::String(lit) if lit.unterminated
        ));
    }

    #[test]
    fn shift_is_not_a_heredoc() {
        let tokens = kinds("a << b");
        assert!(matches!(&tokens[1], TokenKind::Operator(s) if s == "<<"));
    }

    #[test]
    fn newline_offsets_recorded() {
        let lexed = Lexer::new(b"a\nb\nc").finish();
        assert_eq!(lexed.newline_offsets, vec![0, 2, 4]);
    }

    #[test]
    fn newline_offsets_include_string_bodies() {
        let lexed = Lexer::new(b"x = \"a\nb\"\ny").finish();
        assert_eq!(lexed.newline_offsets, vec![0, 7, 10]);
    }

    #[test]
    fn comments_are_recorded_with_spans() {
        let lexed = Lexer::new(b"# one\nx # two\n").finish();
        assert_eq!(lexed.comments.len(), 2);
        assert_eq!(lexed.comments[0].kind, CommentKind::Line);
        assert_eq!(lexed.comments[0].span, Span::new(0, 5));
    }

    #[test]
    fn embedded_doc_comment() {
        let source = "=begin\nnotes\n=end\nx\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        assert_eq!(lexed.comments[0].kind, CommentKind::EmbeddedDoc);
        assert!(matches!(lexed.tokens[0].kind(), TokenKind::Identifier(s) if s == "x"));
    }

    #[test]
    fn end_marker_stops_lexing() {
        let source = "x\n__END__\nnot code\n";
        let lexed = Lexer::new(source.as_bytes()).finish();
        assert_eq!(lexed.tokens.len(), 2); // x, EOF
        assert_eq!(lexed.comments[0].kind, CommentKind::EndMarker);
        // Offsets stop at the __END__ line.
        assert_eq!(lexed.newline_offsets, vec![0, 2]);
    }

    #[test]
    fn magic_encoding_directive_is_applied() {
        let source = b"# encoding: binary\nx = \"\xff\"\n";
        let lexed = Lexer::new(source).finish();
        assert_eq!(lexed.encoding, Encoding::Binary);
        assert!(lexed.diagnostics.is_empty());
        assert_eq!(lexed.magic_directives.len(), 1);
        assert_eq!(lexed.magic_directives[0].key, "encoding");
    }

    #[test]
    fn invalid_bytes_diagnose_and_continue() {
        let source = b"x = \"a\xffb\"\ny = 1\n";
        let lexed = Lexer::new(source).finish();
        assert_eq!(
            lexed.diagnostics[0].kind,
            DiagnosticKind::InvalidByteSequence
        );
        // Lexing continued to the second statement.
        assert!(lexed
            .tokens
            .iter()
            .any(|t| matches!(t.kind(), TokenKind::Identifier(s) if s == "y")));
    }

    #[test]
    fn directive_after_code_warns() {
        let source = b"x = 1\n# encoding: binary\n";
        let lexed = Lexer::new(source).finish();
        assert_eq!(lexed.encoding, Encoding::Utf8);
        assert!(lexed
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DirectiveAfterCode));
    }

    #[test]
    fn trivia_attachment() {
        let tokens = lex(b"  x # note\n");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].leading_trivia().iter().any(Trivia::is_whitespace));
        assert!(tokens[0].trailing_trivia().iter().any(Trivia::is_comment));
    }

    #[test]
    fn operators_maximal_munch() {
        let tokens = kinds("a <=> b << 1");
        assert!(matches!(&tokens[1], TokenKind::Operator(s) if s == "<=>"));
        assert!(matches!(&tokens[3], TokenKind::Operator(s) if s == "<<"));
    }
}
