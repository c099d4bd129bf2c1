// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Coral parser command-line interface.
//!
//! A thin driver over `coral-core`'s file-based entry points, used by
//! conformance tooling and for poking at parses by hand.

use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};

mod report;

/// Coral: a parsing engine for the Coral scripting language
#[derive(Debug, Parser)]
#[command(name = "coral")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a source file and print the tree with its diagnostics
    Parse {
        /// Source file to parse
        path: Utf8PathBuf,
    },

    /// Lex a source file and print one token per line
    Lex {
        /// Source file to lex
        path: Utf8PathBuf,

        /// Use the legacy reference-lexer token shape
        #[arg(long)]
        compat: bool,
    },

    /// Serialize a parse to the binary dump format
    Dump {
        /// Source file to dump
        path: Utf8PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },

    /// Parse source files and report diagnostics, exiting non-zero on errors
    Check {
        /// Source files to check
        paths: Vec<Utf8PathBuf>,
    },
}

fn main() -> ExitCode {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse { path } => {
            let result = coral_core::parse_file(&path).into_diagnostic()?;
            report::print_result(&path, &result);
            Ok(ExitCode::SUCCESS)
        }

        Command::Lex { path, compat } => {
            if compat {
                let source = std::fs::read(&path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to read {path}"))?;
                for token in coral_core::lex_compat(&source).tokens {
                    println!(
                        "[{}, {}] {:<16} {:?}",
                        token.line,
                        token.column,
                        token.kind,
                        token.text.as_str()
                    );
                }
            } else {
                for token in coral_core::lex_file(&path).into_diagnostic()? {
                    println!(
                        "{:>5}..{:<5} {}",
                        token.span().start(),
                        token.span().end(),
                        token.kind()
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Dump { path, output } => {
            let buffer = coral_core::dump_file(&path).into_diagnostic()?;
            match output {
                Some(output) => std::fs::write(&output, buffer)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {output}"))?,
                None => std::io::stdout()
                    .write_all(&buffer)
                    .into_diagnostic()
                    .wrap_err("failed to write to stdout")?,
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Check { paths } => {
            let mut failed = false;
            for path in paths {
                let result = coral_core::parse_file(&path).into_diagnostic()?;
                if result.diagnostics.iter().any(|d| d.is_error()) {
                    failed = true;
                }
                report::print_diagnostics(&path, &result);
            }
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
