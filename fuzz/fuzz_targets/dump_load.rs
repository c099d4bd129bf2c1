// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the serializer round trip.
//!
//! For any input: dumping must be deterministic, loading a dump must
//! succeed and reproduce the parsed tree exactly, and loading the dump
//! against *corrupted* bytes must fail cleanly rather than panic or
//! misinterpret.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let parsed = coral_core::parse(data);
    let dumped = coral_core::dump(data);

    // Determinism: byte-identical dumps.
    assert_eq!(dumped, coral_core::dump(data));

    // Round trip: structural equality.
    let loaded = coral_core::load(data, &dumped).expect("loading our own dump must succeed");
    assert_eq!(loaded.root, parsed.root);
    assert_eq!(loaded.diagnostics, parsed.diagnostics);

    // A truncated buffer must fail with an error, never panic.
    if !dumped.is_empty() {
        let _ = coral_core::load(data, &dumped[..dumped.len() - 1]);
    }
});
