// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Decoding a dumped buffer back into a parse result.
//!
//! Loading is a single forward pass: header validation, string table,
//! side tables, then the node records in post-order. Child references
//! always point backwards, so every node's children are already built
//! when the node itself is decoded. Every index is validated; any
//! inconsistency fails the whole load with a [`FormatError`], never a
//! partial tree.

use ecow::EcoString;

use crate::ast::{
    Comment, CommentKind, Expression, HashPair, IntValue, MagicDirective, Name, Numeric,
    Parameter, Program, StringPart,
};
use crate::source_analysis::{Diagnostic, DiagnosticKind, Encoding, Severity};
use crate::ParseResult;

use super::{fnv1a, FormatError, Reader, MAGIC, VERSION_MAJOR, VERSION_MINOR};

/// Decodes a dumped buffer, validating it against the source bytes it was
/// produced from.
pub fn load_result(source: &[u8], data: &[u8]) -> Result<ParseResult, FormatError> {
    let mut reader = Reader::new(data);

    // Header.
    if reader.read_bytes(4)? != MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    if major != VERSION_MAJOR || minor > VERSION_MINOR {
        return Err(FormatError::UnsupportedVersion { major, minor });
    }
    let encoding_tag = reader.read_u8()?;
    let encoding =
        Encoding::from_tag(encoding_tag).ok_or(FormatError::UnknownEncoding(encoding_tag))?;

    let source_len = reader.read_u32()?;
    let source_hash = reader.read_u32()?;
    if source_len as usize != source.len() || source_hash != fnv1a(source) {
        return Err(FormatError::SourceMismatch);
    }

    let payload_len = reader.read_u32()? as usize;
    let payload_hash = reader.read_u32()?;
    if reader.remaining() != payload_len {
        return Err(FormatError::Truncated);
    }
    let payload = reader.read_bytes(payload_len)?;
    if fnv1a(payload) != payload_hash {
        return Err(FormatError::ChecksumMismatch);
    }

    let mut loader = Loader {
        reader: Reader::new(payload),
        strings: Vec::new(),
    };
    loader.read_string_table()?;

    let magic_directives = loader.read_directives()?;
    let comments = loader.read_comments()?;
    let diagnostics = loader.read_diagnostics()?;
    let newline_offsets = loader.read_newlines()?;
    let root = loader.read_nodes()?;

    Ok(ParseResult {
        root,
        diagnostics,
        comments,
        magic_directives,
        encoding,
        newline_offsets,
        path: None,
    })
}

struct Loader<'b> {
    reader: Reader<'b>,
    strings: Vec<EcoString>,
}

impl Loader<'_> {
    fn read_string_table(&mut self) -> Result<(), FormatError> {
        let count = self.reader.read_varint()?;
        self.strings.reserve(count as usize);
        for _ in 0..count {
            let len = self.reader.read_varint()? as usize;
            let bytes = self.reader.read_bytes(len)?;
            let text = std::str::from_utf8(bytes).map_err(|_| FormatError::ChecksumMismatch)?;
            self.strings.push(EcoString::from(text));
        }
        Ok(())
    }

    fn string(&mut self) -> Result<EcoString, FormatError> {
        let idx = self.reader.read_varint()?;
        self.strings
            .get(idx as usize)
            .cloned()
            .ok_or(FormatError::InvalidStringIndex(idx))
    }

    fn read_directives(&mut self) -> Result<Vec<MagicDirective>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut directives = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key = self.string()?;
            let value = self.string()?;
            let span = self.reader.read_span()?;
            directives.push(MagicDirective { key, value, span });
        }
        Ok(directives)
    }

    fn read_comments(&mut self) -> Result<Vec<Comment>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut comments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = self.reader.read_u8()?;
            let kind = CommentKind::from_tag(tag).ok_or(FormatError::InvalidEnumTag(tag))?;
            let span = self.reader.read_span()?;
            comments.push(Comment::new(kind, span));
        }
        Ok(comments)
    }

    fn read_diagnostics(&mut self) -> Result<Vec<Diagnostic>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut diagnostics = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let kind_tag = self.reader.read_u8()?;
            let kind =
                DiagnosticKind::from_tag(kind_tag).ok_or(FormatError::InvalidEnumTag(kind_tag))?;
            let severity_tag = self.reader.read_u8()?;
            let severity =
                Severity::from_tag(severity_tag).ok_or(FormatError::InvalidEnumTag(severity_tag))?;
            let message = self.string()?;
            let span = self.reader.read_span()?;
            diagnostics.push(Diagnostic {
                kind,
                severity,
                message,
                span,
            });
        }
        Ok(diagnostics)
    }

    fn read_newlines(&mut self) -> Result<Vec<u32>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut offsets = Vec::with_capacity(count as usize);
        let mut previous = 0u64;
        for _ in 0..count {
            let delta = self.reader.read_varint()?;
            previous += delta;
            offsets.push(u32::try_from(previous).map_err(|_| FormatError::Truncated)?);
        }
        Ok(offsets)
    }

    /// Decodes the node records and the trailing program record.
    fn read_nodes(&mut self) -> Result<Program, FormatError> {
        let count = self.reader.read_varint()? as usize;

        // Offset table: validated against actual record positions below.
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(self.reader.read_u32()?);
        }

        let records_start = self.reader.position();
        let mut nodes: Vec<Option<Expression>> = Vec::with_capacity(count);
        for &offset in &offsets {
            if self.reader.position() - records_start != offset as usize {
                return Err(FormatError::InvalidNodeOffset);
            }
            let node = self.read_node(&nodes)?;
            nodes.push(Some(node));
        }

        // Program record.
        let statement_count = self.reader.read_varint()?;
        let mut statements = Vec::with_capacity(statement_count as usize);
        for _ in 0..statement_count {
            let idx = self.reader.read_varint()?;
            statements.push(take_node(&mut nodes, idx)?);
        }
        let span = self.reader.read_span()?;

        Ok(Program::new(statements, span))
    }

    /// Decodes one node record; child references resolve against the
    /// already-decoded slots.
    fn read_node(&mut self, built: &[Option<Expression>]) -> Result<Expression, FormatError> {
        let tag = self.reader.read_u8()?;
        let span = self.reader.read_span()?;

        let node = match tag {
            0 => Expression::Nil(span),
            1 => Expression::True(span),
            2 => Expression::False(span),
            3 => Expression::SelfRef(span),
            4 => {
                let numeric = self.read_numeric()?;
                Expression::Number(numeric, span)
            }
            5 => {
                let value = self.string()?;
                let heredoc = self.reader.read_u8()? != 0;
                Expression::Str {
                    value,
                    heredoc,
                    span,
                }
            }
            6 => {
                let heredoc = self.reader.read_u8()? != 0;
                let parts = self.read_parts(built)?;
                Expression::InterpolatedStr {
                    parts,
                    heredoc,
                    span,
                }
            }
            7 => {
                let name = self.string()?;
                Expression::Sym { name, span }
            }
            8 => {
                let flags = self.string()?;
                let parts = self.read_parts(built)?;
                Expression::Pattern { parts, flags, span }
            }
            9 => {
                let elements = self.read_children(built)?;
                Expression::Array { elements, span }
            }
            10 => {
                let count = self.reader.read_varint()?;
                let mut pairs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let key = self.child(built)?;
                    let value = self.child(built)?;
                    let pair_span = self.reader.read_span()?;
                    pairs.push(HashPair {
                        key,
                        value,
                        span: pair_span,
                    });
                }
                Expression::Hash { pairs, span }
            }
            11 | 12 | 13 => {
                let text = self.string()?;
                let name = Name::new(text, span);
                match tag {
                    11 => Expression::LocalRead(name),
                    12 => Expression::ConstantRead(name),
                    _ => Expression::InstanceVariableRead(name),
                }
            }
            14 => {
                let target = Box::new(self.child(built)?);
                let value = Box::new(self.child(built)?);
                Expression::Assign {
                    target,
                    value,
                    span,
                }
            }
            15 => {
                let bits = self.reader.read_u8()?;
                let receiver = if bits & 1 != 0 {
                    Some(Box::new(self.child(built)?))
                } else {
                    None
                };
                let text = self.string()?;
                let name_span = self.reader.read_span()?;
                let arguments = self.read_children(built)?;
                Expression::Call {
                    receiver,
                    name: Name::new(text, name_span),
                    arguments,
                    parenthesized: bits & 2 != 0,
                    span,
                }
            }
            16 => {
                let receiver = Box::new(self.child(built)?);
                let arguments = self.read_children(built)?;
                Expression::Index {
                    receiver,
                    arguments,
                    span,
                }
            }
            17 => {
                let op = self.string()?;
                let left = Box::new(self.child(built)?);
                let right = Box::new(self.child(built)?);
                Expression::Binary {
                    op,
                    left,
                    right,
                    span,
                }
            }
            18 => {
                let op = self.string()?;
                let operand = Box::new(self.child(built)?);
                Expression::Unary { op, operand, span }
            }
            19 | 20 => {
                let condition = Box::new(self.child(built)?);
                let then_body = self.read_children(built)?;
                let else_body = if self.reader.read_u8()? != 0 {
                    Some(self.read_children(built)?)
                } else {
                    None
                };
                if tag == 19 {
                    Expression::If {
                        condition,
                        then_body,
                        else_body,
                        span,
                    }
                } else {
                    Expression::Unless {
                        condition,
                        then_body,
                        else_body,
                        span,
                    }
                }
            }
            21 | 22 => {
                let condition = Box::new(self.child(built)?);
                let body = self.read_children(built)?;
                if tag == 21 {
                    Expression::While {
                        condition,
                        body,
                        span,
                    }
                } else {
                    Expression::Until {
                        condition,
                        body,
                        span,
                    }
                }
            }
            23 => {
                let text = self.string()?;
                let name_span = self.reader.read_span()?;
                let count = self.reader.read_varint()?;
                let mut parameters = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let text = self.string()?;
                    let param_span = self.reader.read_span()?;
                    parameters.push(Parameter::new(text, param_span));
                }
                let body = self.read_children(built)?;
                Expression::MethodDef {
                    name: Name::new(text, name_span),
                    parameters,
                    body,
                    span,
                }
            }
            24 | 25 | 26 => {
                let value = if self.reader.read_u8()? != 0 {
                    Some(Box::new(self.child(built)?))
                } else {
                    None
                };
                match tag {
                    24 => Expression::Return { value, span },
                    25 => Expression::Break { value, span },
                    _ => Expression::Next { value, span },
                }
            }
            27 => {
                let expression = Box::new(self.child(built)?);
                Expression::Parenthesized { expression, span }
            }
            28 => {
                let message = self.string()?;
                Expression::Error { message, span }
            }
            other => return Err(FormatError::InvalidNodeTag(other)),
        };

        Ok(node)
    }

    /// Reads a child node index and clones the referenced node.
    fn child(&mut self, built: &[Option<Expression>]) -> Result<Expression, FormatError> {
        let idx = self.reader.read_varint()?;
        built
            .get(idx as usize)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(FormatError::InvalidChildIndex(idx))
    }

    /// Reads a child list.
    fn read_children(
        &mut self,
        built: &[Option<Expression>],
    ) -> Result<Vec<Expression>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            children.push(self.child(built)?);
        }
        Ok(children)
    }

    /// Reads string parts.
    fn read_parts(
        &mut self,
        built: &[Option<Expression>],
    ) -> Result<Vec<StringPart>, FormatError> {
        let count = self.reader.read_varint()?;
        let mut parts = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = self.reader.read_u8()?;
            match tag {
                0 => {
                    let value = self.string()?;
                    let span = self.reader.read_span()?;
                    parts.push(StringPart::Literal { value, span });
                }
                1 => {
                    let expression = Box::new(self.child(built)?);
                    let span = self.reader.read_span()?;
                    parts.push(StringPart::Interpolation { expression, span });
                }
                other => return Err(FormatError::InvalidEnumTag(other)),
            }
        }
        Ok(parts)
    }

    /// Reads an exact numeric value.
    fn read_numeric(&mut self) -> Result<Numeric, FormatError> {
        let tag = self.reader.read_u8()?;
        Ok(match tag {
            0 => Numeric::Integer(self.read_int_value()?),
            1 => Numeric::Float(self.reader.read_f64()?),
            2 => Numeric::Rational {
                numerator: self.read_int_value()?,
                denominator: self.read_int_value()?,
            },
            3 => Numeric::Imaginary(Box::new(self.read_numeric()?)),
            other => return Err(FormatError::InvalidEnumTag(other)),
        })
    }

    /// Reads an exact integer.
    fn read_int_value(&mut self) -> Result<IntValue, FormatError> {
        let tag = self.reader.read_u8()?;
        Ok(match tag {
            0 => IntValue::Small(super::unzigzag(self.reader.read_varint()?)),
            1 => IntValue::Big(self.string()?),
            other => return Err(FormatError::InvalidEnumTag(other)),
        })
    }
}

/// Moves a node out of its slot for the program record.
fn take_node(nodes: &mut [Option<Expression>], idx: u64) -> Result<Expression, FormatError> {
    nodes
        .get_mut(idx as usize)
        .and_then(Option::take)
        .ok_or(FormatError::InvalidChildIndex(idx))
}
