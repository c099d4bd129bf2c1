// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Plain-text reporting for parse results.

use camino::Utf8Path;
use coral_core::prelude::{Diagnostic, Severity};
use coral_core::ParseResult;

/// Prints the tree, comments, and diagnostics of one parse.
pub(crate) fn print_result(path: &Utf8Path, result: &ParseResult) {
    println!("== {path} ({})", result.encoding);
    for statement in &result.root.statements {
        println!("{statement:#?}");
    }
    if !result.comments.is_empty() {
        println!("-- {} comment(s)", result.comments.len());
    }
    print_diagnostics(path, result);
}

/// Prints diagnostics with their line and column.
pub(crate) fn print_diagnostics(path: &Utf8Path, result: &ParseResult) {
    for diagnostic in &result.diagnostics {
        let (line, column) = line_col(&result.newline_offsets, diagnostic.span.start());
        println!("{path}:{line}:{column}: {}: {diagnostic}", label(diagnostic));
    }
}

fn label(diagnostic: &Diagnostic) -> &'static str {
    match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    }
}

/// Translates a byte offset through the newline table.
fn line_col(newline_offsets: &[u32], offset: u32) -> (u32, u32) {
    let line = newline_offsets.partition_point(|&start| start <= offset);
    let line_start = newline_offsets
        .get(line.saturating_sub(1))
        .copied()
        .unwrap_or(0);
    (line as u32, offset - line_start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_translation() {
        let offsets = vec![0, 4, 9];
        assert_eq!(line_col(&offsets, 0), (1, 1));
        assert_eq!(line_col(&offsets, 3), (1, 4));
        assert_eq!(line_col(&offsets, 4), (2, 1));
        assert_eq!(line_col(&offsets, 10), (3, 2));
    }
}
