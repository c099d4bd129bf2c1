// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Encoding a parse result into the versioned binary form.
//!
//! The writer works in two phases. First the sections that reference the
//! string table (directives, diagnostics, nodes) are serialized into
//! scratch buffers, interning strings as they go; then the table and the
//! sections are assembled behind the header. Interning is first-encounter
//! ordered, so identical trees always dump to identical bytes.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ast::{Expression, IntValue, Numeric, StringPart};
use crate::ParseResult;

use super::{fnv1a, write_span, write_varint, MAGIC, VERSION_MAJOR, VERSION_MINOR};

/// Serializes a parse result to a standalone binary buffer.
#[must_use]
pub fn dump_result(result: &ParseResult, source: &[u8]) -> Vec<u8> {
    let mut dumper = Dumper::default();

    // Sections that intern strings are built before the table is written.
    let directives = dumper.directives_section(result);
    let comments = comments_section(result);
    let diagnostics = dumper.diagnostics_section(result);
    let newlines = newlines_section(result);
    let nodes = dumper.nodes_section(result);

    let mut payload = Vec::new();
    dumper.write_string_table(&mut payload);
    payload.extend_from_slice(&directives);
    payload.extend_from_slice(&comments);
    payload.extend_from_slice(&diagnostics);
    payload.extend_from_slice(&newlines);
    payload.extend_from_slice(&nodes);

    let mut out = Vec::with_capacity(payload.len() + 32);
    out.extend_from_slice(MAGIC);
    out.push(VERSION_MAJOR);
    out.push(VERSION_MINOR);
    out.push(result.encoding.tag());
    out.extend_from_slice(&u32::try_from(source.len()).unwrap_or(u32::MAX).to_le_bytes());
    out.extend_from_slice(&fnv1a(source).to_le_bytes());
    out.extend_from_slice(&u32::try_from(payload.len()).unwrap_or(u32::MAX).to_le_bytes());
    out.extend_from_slice(&fnv1a(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Serializer state: the deduplicated string table.
#[derive(Default)]
struct Dumper {
    strings: Vec<EcoString>,
    index: HashMap<EcoString, u64>,
}

impl Dumper {
    /// Interns a string, returning its table index.
    fn intern(&mut self, text: &EcoString) -> u64 {
        if let Some(&idx) = self.index.get(text) {
            return idx;
        }
        let idx = self.strings.len() as u64;
        self.strings.push(text.clone());
        self.index.insert(text.clone(), idx);
        idx
    }

    /// Writes the table: count, then length-prefixed bytes per string.
    fn write_string_table(&self, out: &mut Vec<u8>) {
        write_varint(out, self.strings.len() as u64);
        for text in &self.strings {
            write_varint(out, text.len() as u64);
            out.extend_from_slice(text.as_bytes());
        }
    }

    fn directives_section(&mut self, result: &ParseResult) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, result.magic_directives.len() as u64);
        for directive in &result.magic_directives {
            let key = self.intern(&directive.key);
            let value = self.intern(&directive.value);
            write_varint(&mut buf, key);
            write_varint(&mut buf, value);
            write_span(&mut buf, directive.span);
        }
        buf
    }

    fn diagnostics_section(&mut self, result: &ParseResult) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, result.diagnostics.len() as u64);
        for diagnostic in &result.diagnostics {
            buf.push(diagnostic.kind.tag());
            buf.push(diagnostic.severity.tag());
            let message = self.intern(&diagnostic.message);
            write_varint(&mut buf, message);
            write_span(&mut buf, diagnostic.span);
        }
        buf
    }

    /// Flattens the tree into post-order records plus an offset table, then
    /// appends the program record.
    fn nodes_section(&mut self, result: &ParseResult) -> Vec<u8> {
        let mut records: Vec<Vec<u8>> = Vec::new();
        let mut statements = Vec::with_capacity(result.root.statements.len());
        for statement in &result.root.statements {
            statements.push(self.write_node(statement, &mut records));
        }

        let mut buf = Vec::new();
        write_varint(&mut buf, records.len() as u64);

        // Offset table: byte offset of each record within the record block,
        // for partial decoding without a full pass.
        let mut offset = 0u32;
        for record in &records {
            buf.extend_from_slice(&offset.to_le_bytes());
            offset += u32::try_from(record.len()).unwrap_or(u32::MAX);
        }
        for record in &records {
            buf.extend_from_slice(record);
        }

        // Program record.
        write_varint(&mut buf, statements.len() as u64);
        for idx in statements {
            write_varint(&mut buf, idx);
        }
        write_span(&mut buf, result.root.span);
        buf
    }

    /// Serializes one node after its children; returns the node's index.
    fn write_node(&mut self, node: &Expression, records: &mut Vec<Vec<u8>>) -> u64 {
        let mut buf = Vec::new();
        buf.push(node_tag(node));
        write_span(&mut buf, node.span());

        match node {
            Expression::Nil(_)
            | Expression::True(_)
            | Expression::False(_)
            | Expression::SelfRef(_) => {}

            Expression::Number(numeric, _) => self.write_numeric(&mut buf, numeric),

            Expression::Str { value, heredoc, .. } => {
                let value = self.intern(value);
                write_varint(&mut buf, value);
                buf.push(u8::from(*heredoc));
            }

            Expression::InterpolatedStr { parts, heredoc, .. } => {
                buf.push(u8::from(*heredoc));
                self.write_parts(&mut buf, parts, records);
            }

            Expression::Sym { name, .. } => {
                let name = self.intern(name);
                write_varint(&mut buf, name);
            }

            Expression::Pattern { parts, flags, .. } => {
                let flags = self.intern(flags);
                write_varint(&mut buf, flags);
                self.write_parts(&mut buf, parts, records);
            }

            Expression::Array { elements, .. } => {
                self.write_children(&mut buf, elements, records);
            }

            Expression::Hash { pairs, .. } => {
                write_varint(&mut buf, pairs.len() as u64);
                for pair in pairs {
                    let key = self.write_node(&pair.key, records);
                    let value = self.write_node(&pair.value, records);
                    write_varint(&mut buf, key);
                    write_varint(&mut buf, value);
                    write_span(&mut buf, pair.span);
                }
            }

            Expression::LocalRead(name)
            | Expression::ConstantRead(name)
            | Expression::InstanceVariableRead(name) => {
                let text = self.intern(&name.text);
                write_varint(&mut buf, text);
            }

            Expression::Assign { target, value, .. } => {
                let target = self.write_node(target, records);
                let value = self.write_node(value, records);
                write_varint(&mut buf, target);
                write_varint(&mut buf, value);
            }

            Expression::Call {
                receiver,
                name,
                arguments,
                parenthesized,
                ..
            } => {
                let receiver = receiver
                    .as_ref()
                    .map(|receiver| self.write_node(receiver, records));
                let mut bits = 0u8;
                if receiver.is_some() {
                    bits |= 1;
                }
                if *parenthesized {
                    bits |= 2;
                }
                buf.push(bits);
                if let Some(receiver) = receiver {
                    write_varint(&mut buf, receiver);
                }
                let text = self.intern(&name.text);
                write_varint(&mut buf, text);
                write_span(&mut buf, name.span);
                self.write_children(&mut buf, arguments, records);
            }

            Expression::Index {
                receiver,
                arguments,
                ..
            } => {
                let receiver = self.write_node(receiver, records);
                write_varint(&mut buf, receiver);
                self.write_children(&mut buf, arguments, records);
            }

            Expression::Binary {
                op, left, right, ..
            } => {
                let op = self.intern(op);
                let left = self.write_node(left, records);
                let right = self.write_node(right, records);
                write_varint(&mut buf, op);
                write_varint(&mut buf, left);
                write_varint(&mut buf, right);
            }

            Expression::Unary { op, operand, .. } => {
                let op = self.intern(op);
                let operand = self.write_node(operand, records);
                write_varint(&mut buf, op);
                write_varint(&mut buf, operand);
            }

            Expression::If {
                condition,
                then_body,
                else_body,
                ..
            }
            | Expression::Unless {
                condition,
                then_body,
                else_body,
                ..
            } => {
                let condition = self.write_node(condition, records);
                write_varint(&mut buf, condition);
                self.write_children(&mut buf, then_body, records);
                match else_body {
                    Some(body) => {
                        buf.push(1);
                        self.write_children(&mut buf, body, records);
                    }
                    None => buf.push(0),
                }
            }

            Expression::While {
                condition, body, ..
            }
            | Expression::Until {
                condition, body, ..
            } => {
                let condition = self.write_node(condition, records);
                write_varint(&mut buf, condition);
                self.write_children(&mut buf, body, records);
            }

            Expression::MethodDef {
                name,
                parameters,
                body,
                ..
            } => {
                let text = self.intern(&name.text);
                write_varint(&mut buf, text);
                write_span(&mut buf, name.span);
                write_varint(&mut buf, parameters.len() as u64);
                for parameter in parameters {
                    let text = self.intern(&parameter.name);
                    write_varint(&mut buf, text);
                    write_span(&mut buf, parameter.span);
                }
                self.write_children(&mut buf, body, records);
            }

            Expression::Return { value, .. }
            | Expression::Break { value, .. }
            | Expression::Next { value, .. } => match value {
                Some(value) => {
                    let value = self.write_node(value, records);
                    buf.push(1);
                    write_varint(&mut buf, value);
                }
                None => buf.push(0),
            },

            Expression::Parenthesized { expression, .. } => {
                let expression = self.write_node(expression, records);
                write_varint(&mut buf, expression);
            }

            Expression::Error { message, .. } => {
                let message = self.intern(message);
                write_varint(&mut buf, message);
            }
        }

        records.push(buf);
        (records.len() - 1) as u64
    }

    /// Writes a child list: count, then node indices.
    fn write_children(
        &mut self,
        buf: &mut Vec<u8>,
        children: &[Expression],
        records: &mut Vec<Vec<u8>>,
    ) {
        let indices: Vec<u64> = children
            .iter()
            .map(|child| self.write_node(child, records))
            .collect();
        write_varint(buf, indices.len() as u64);
        for idx in indices {
            write_varint(buf, idx);
        }
    }

    /// Writes string parts: count, then tagged literal or interpolation.
    fn write_parts(
        &mut self,
        buf: &mut Vec<u8>,
        parts: &[StringPart],
        records: &mut Vec<Vec<u8>>,
    ) {
        write_varint(buf, parts.len() as u64);
        for part in parts {
            match part {
                StringPart::Literal { value, span } => {
                    buf.push(0);
                    let value = self.intern(value);
                    write_varint(buf, value);
                    write_span(buf, *span);
                }
                StringPart::Interpolation { expression, span } => {
                    buf.push(1);
                    let idx = self.write_node(expression, records);
                    write_varint(buf, idx);
                    write_span(buf, *span);
                }
            }
        }
    }

    /// Writes an exact numeric value.
    fn write_numeric(&mut self, buf: &mut Vec<u8>, numeric: &Numeric) {
        match numeric {
            Numeric::Integer(value) => {
                buf.push(0);
                self.write_int_value(buf, value);
            }
            Numeric::Float(value) => {
                buf.push(1);
                buf.extend_from_slice(&value.to_bits().to_le_bytes());
            }
            Numeric::Rational {
                numerator,
                denominator,
            } => {
                buf.push(2);
                self.write_int_value(buf, numerator);
                self.write_int_value(buf, denominator);
            }
            Numeric::Imaginary(inner) => {
                buf.push(3);
                self.write_numeric(buf, inner);
            }
        }
    }

    /// Writes an exact integer: small values inline, big ones via the
    /// string table.
    fn write_int_value(&mut self, buf: &mut Vec<u8>, value: &IntValue) {
        match value {
            IntValue::Small(value) => {
                buf.push(0);
                write_varint(buf, super::zigzag(*value));
            }
            IntValue::Big(digits) => {
                buf.push(1);
                let digits = self.intern(digits);
                write_varint(buf, digits);
            }
        }
    }
}

fn comments_section(result: &ParseResult) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, result.comments.len() as u64);
    for comment in &result.comments {
        buf.push(comment.kind.tag());
        write_span(&mut buf, comment.span);
    }
    buf
}

fn newlines_section(result: &ParseResult) -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, result.newline_offsets.len() as u64);
    let mut previous = 0u32;
    for &offset in &result.newline_offsets {
        // Offsets are sorted; deltas keep the varints short.
        write_varint(&mut buf, u64::from(offset - previous));
        previous = offset;
    }
    buf
}

/// Returns the stable kind tag for a node. Tags are part of the format and
/// must not be reordered.
const fn node_tag(node: &Expression) -> u8 {
    match node {
        Expression::Nil(_) => 0,
        Expression::True(_) => 1,
        Expression::False(_) => 2,
        Expression::SelfRef(_) => 3,
        Expression::Number(..) => 4,
        Expression::Str { .. } => 5,
        Expression::InterpolatedStr { .. } => 6,
        Expression::Sym { .. } => 7,
        Expression::Pattern { .. } => 8,
        Expression::Array { .. } => 9,
        Expression::Hash { .. } => 10,
        Expression::LocalRead(_) => 11,
        Expression::ConstantRead(_) => 12,
        Expression::InstanceVariableRead(_) => 13,
        Expression::Assign { .. } => 14,
        Expression::Call { .. } => 15,
        Expression::Index { .. } => 16,
        Expression::Binary { .. } => 17,
        Expression::Unary { .. } => 18,
        Expression::If { .. } => 19,
        Expression::Unless { .. } => 20,
        Expression::While { .. } => 21,
        Expression::Until { .. } => 22,
        Expression::MethodDef { .. } => 23,
        Expression::Return { .. } => 24,
        Expression::Break { .. } => 25,
        Expression::Next { .. } => 26,
        Expression::Parenthesized { .. } => 27,
        Expression::Error { .. } => 28,
    }
}
