// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for parser crash safety.
//!
//! Feeds arbitrary bytes to the parser and asserts that it never panics.
//! The engine works on raw bytes by design, so invalid UTF-8 is in scope,
//! not filtered out.
//!
//! # Success Criteria
//!
//! - Never panics on any input
//! - Always returns a root node and a diagnostics list
//! - The location invariant's debug assertion never fires

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let result = coral_core::parse(data);

    // A root always comes back, even for garbage.
    let _ = result.root.statements.len();

    // The newline table always starts at offset zero.
    assert_eq!(result.newline_offsets.first(), Some(&0));
});
