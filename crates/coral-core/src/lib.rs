// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Coral parsing engine.
//!
//! This crate is a portable source-code parsing engine for the Coral
//! scripting language:
//!
//! - Lexical analysis over raw bytes with a declared or detected encoding
//! - Error-tolerant parsing into a fully located AST
//! - A versioned binary dump/load form, so other processes can consume a
//!   parse without re-running the parser
//! - A legacy reference-lexer compatibility adapter for older tooling
//!
//! Parsing never fails: malformed input produces a complete tree with
//! placeholder nodes plus structured diagnostics. The engine holds no
//! global state, so independent buffers may be parsed concurrently.
//!
//! # Example
//!
//! ```
//! let result = coral_core::parse(b"greeting = \"hello\"\nputs greeting");
//! assert!(result.diagnostics.is_empty());
//! assert_eq!(result.root.statements.len(), 2);
//! ```

pub mod ast;
pub mod compat;
pub mod serialize;
pub mod source_analysis;

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use ast::{Comment, MagicDirective, Program};
use source_analysis::{parse_tokens, Diagnostic, Encoding, Lexer, Token};

pub use compat::{lex_compat, CompatResult, CompatToken, KNOWN_DIVERGENCES};
pub use serialize::FormatError;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::ast::{Comment, Expression, Numeric, Program};
    pub use crate::source_analysis::{Diagnostic, DiagnosticKind, Severity, Span};
    pub use crate::ParseResult;
}

/// Everything one parse produces. Immutable once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    /// The root node; always present, even for malformed input.
    pub root: Program,
    /// Diagnostics ordered by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Comment records ordered by position.
    pub comments: Vec<Comment>,
    /// Recognized magic directives, in source order.
    pub magic_directives: Vec<MagicDirective>,
    /// The resolved source encoding.
    pub encoding: Encoding,
    /// Byte offsets where each line begins; offset 0 is always present.
    pub newline_offsets: Vec<u32>,
    /// The path the source was read from, for file-based entry points.
    pub path: Option<Utf8PathBuf>,
}

impl ParseResult {
    /// Looks up a magic directive's value by key.
    #[must_use]
    pub fn magic_directive(&self, key: &str) -> Option<&str> {
        self.magic_directives
            .iter()
            .find(|directive| directive.key == key)
            .map(|directive| directive.value.as_str())
    }
}

/// A file-based entry point failed before parsing began.
///
/// Distinct from parse diagnostics: these are the filesystem
/// collaborator's errors, not the engine's.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum FileError {
    /// The file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// The path that failed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Parses source bytes into a [`ParseResult`].
///
/// Never fails and never panics: lexical, syntactic, and encoding problems
/// are collected as diagnostics inside the normally returned result.
#[must_use]
pub fn parse(source: &[u8]) -> ParseResult {
    let (result, _tokens) = parse_lex(source);
    result
}

/// Parses source bytes and also returns the token stream from the same
/// single pass, for consumers that need both without re-lexing.
#[must_use]
pub fn parse_lex(source: &[u8]) -> (ParseResult, Vec<Token>) {
    let lexed = Lexer::new(source).finish();
    let (root, diagnostics) = parse_tokens(&lexed);

    let result = ParseResult {
        root,
        diagnostics,
        comments: lexed.comments,
        magic_directives: lexed.magic_directives,
        encoding: lexed.encoding,
        newline_offsets: lexed.newline_offsets,
        path: None,
    };
    (result, lexed.tokens)
}

/// Lexes source bytes into tokens (excluding the EOF marker).
#[must_use]
pub fn lex(source: &[u8]) -> Vec<Token> {
    source_analysis::lex(source)
}

/// Returns the byte offsets where each line of `source` begins.
///
/// Offset 0 is always present. The table is produced by the lexer's
/// incremental scan, so it stops at an `__END__` marker just as parsing
/// does.
#[must_use]
pub fn newlines(source: &[u8]) -> Vec<u32> {
    Lexer::new(source).finish().newline_offsets
}

/// Parses source bytes and serializes the result to the versioned binary
/// form. Deterministic: the same source always dumps to identical bytes.
#[must_use]
pub fn dump(source: &[u8]) -> Vec<u8> {
    serialize::dump_result(&parse(source), source)
}

/// Reconstructs a [`ParseResult`] from source bytes and a buffer produced
/// by [`dump`], without re-parsing.
///
/// # Errors
///
/// Returns a [`FormatError`] when the buffer's magic, version, checksums,
/// or indices fail validation. A malformed buffer is never reinterpreted
/// as a partial tree.
pub fn load(source: &[u8], data: &[u8]) -> Result<ParseResult, FormatError> {
    serialize::load_result(source, data)
}

/// Reads and parses a file.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be read; parse problems are
/// diagnostics in the result, as always.
pub fn parse_file(path: &Utf8Path) -> Result<ParseResult, FileError> {
    let source = read_file(path)?;
    let mut result = parse(&source);
    result.path = Some(path.to_owned());
    Ok(result)
}

/// Reads and lexes a file.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be read.
pub fn lex_file(path: &Utf8Path) -> Result<Vec<Token>, FileError> {
    let source = read_file(path)?;
    Ok(lex(&source))
}

/// Reads a file and serializes its parse.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be read.
pub fn dump_file(path: &Utf8Path) -> Result<Vec<u8>, FileError> {
    let source = read_file(path)?;
    Ok(dump(&source))
}

fn read_file(path: &Utf8Path) -> Result<Vec<u8>, FileError> {
    std::fs::read(path).map_err(|source| FileError::Read {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_input() {
        let result = parse(b"");
        assert!(result.root.statements.is_empty());
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.newline_offsets, vec![0]);
        assert_eq!(result.encoding, Encoding::Utf8);
    }

    #[test]
    fn parse_lex_returns_tokens_from_the_same_pass() {
        let (result, tokens) = parse_lex(b"x = 1");
        assert!(result.diagnostics.is_empty());
        assert_eq!(tokens.len(), 4); // x, =, 1, EOF
        assert!(tokens.last().unwrap().kind().is_eof());
    }

    #[test]
    fn newlines_offsets() {
        assert_eq!(newlines(b"a\nb\nc"), vec![0, 2, 4]);
        assert_eq!(newlines(b""), vec![0]);
    }

    #[test]
    fn dump_is_deterministic() {
        let source = b"x = [1, 2]\nputs x";
        assert_eq!(dump(source), dump(source));
    }

    #[test]
    fn load_round_trips() {
        let source = b"x = 1 + 2\nputs \"total: #{x}\"";
        let dumped = dump(source);
        let loaded = load(source, &dumped).expect("load should succeed");
        let parsed = parse(source);
        assert_eq!(loaded.root, parsed.root);
        assert_eq!(loaded.diagnostics, parsed.diagnostics);
        assert_eq!(loaded.comments, parsed.comments);
        assert_eq!(loaded.newline_offsets, parsed.newline_offsets);
    }

    #[test]
    fn load_rejects_version_mismatch() {
        let source = b"x = 1";
        let mut dumped = dump(source);
        dumped[4] = 99; // major version byte
        assert!(matches!(
            load(source, &dumped),
            Err(FormatError::UnsupportedVersion { major: 99, .. })
        ));
    }

    #[test]
    fn load_rejects_wrong_source() {
        let dumped = dump(b"x = 1");
        assert_eq!(load(b"y = 2", &dumped), Err(FormatError::SourceMismatch));
    }

    #[test]
    fn load_rejects_truncation() {
        let source = b"x = 1";
        let dumped = dump(source);
        let truncated = &dumped[..dumped.len() - 3];
        assert!(load(source, truncated).is_err());
    }

    #[test]
    fn magic_directive_lookup() {
        let result = parse(b"# frozen_string_literal: true\nx = 1");
        assert_eq!(result.magic_directive("frozen_string_literal"), Some("true"));
        assert_eq!(result.magic_directive("encoding"), None);
    }
}
