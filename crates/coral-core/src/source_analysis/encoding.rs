// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Source encoding handling.
//!
//! Coral source is a byte buffer plus an encoding, either supplied by the
//! caller's tooling or declared with a magic directive (`# encoding: ...`).
//! The lexer consults the encoding for bytes ≥ 0x80: valid sequences are
//! identifier/content bytes, invalid ones become error tokens with an
//! `InvalidByteSequence` diagnostic. Lexing never stops for a bad byte.

/// A supported source encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// UTF-8, the default.
    #[default]
    Utf8,
    /// 7-bit ASCII.
    UsAscii,
    /// ISO-8859-1.
    Latin1,
    /// Raw bytes; every byte is valid.
    Binary,
}

impl Encoding {
    /// Looks up an encoding by name, case-insensitively.
    ///
    /// Recognized names and aliases follow the conventional spellings:
    /// `utf-8`, `us-ascii`/`ascii`, `iso-8859-1`/`latin-1`, and
    /// `binary`/`ascii-8bit`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Some(match lowered.as_str() {
            "utf-8" | "utf8" => Self::Utf8,
            "us-ascii" | "ascii" => Self::UsAscii,
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Self::Latin1,
            "binary" | "ascii-8bit" => Self::Binary,
            _ => return None,
        })
    }

    /// Returns the canonical name of this encoding.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::UsAscii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
            Self::Binary => "binary",
        }
    }

    /// Returns a stable single-byte tag for the serialized form.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Utf8 => 0,
            Self::UsAscii => 1,
            Self::Latin1 => 2,
            Self::Binary => 3,
        }
    }

    /// Looks up an encoding from its serialized tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Utf8,
            1 => Self::UsAscii,
            2 => Self::Latin1,
            3 => Self::Binary,
            _ => return None,
        })
    }

    /// Returns the width in bytes of the character starting at `bytes[0]`,
    /// or `None` if the bytes do not form a valid character under this
    /// encoding.
    ///
    /// `bytes` must be non-empty. ASCII bytes are always one-byte characters
    /// in every supported encoding.
    #[must_use]
    pub fn char_width(self, bytes: &[u8]) -> Option<usize> {
        let first = bytes[0];
        if first < 0x80 {
            return Some(1);
        }
        match self {
            Self::UsAscii => None,
            Self::Latin1 | Self::Binary => Some(1),
            Self::Utf8 => utf8_width(bytes),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validates one UTF-8 sequence at the start of `bytes`, returning its width.
fn utf8_width(bytes: &[u8]) -> Option<usize> {
    let first = bytes[0];
    let width = match first {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    if bytes.len() < width {
        return None;
    }
    let tail = &bytes[1..width];
    if !tail.iter().all(|&b| (0x80..=0xBF).contains(&b)) {
        return None;
    }
    // Reject overlong and out-of-range forms the leading-byte ranges alone
    // don't exclude.
    match (first, bytes[1]) {
        (0xE0, 0x80..=0x9F) | (0xED, 0xA0..=0xBF) | (0xF0, 0x80..=0x8F) | (0xF4, 0x90..=0xBF) => {
            None
        }
        _ => Some(width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_names() {
        assert_eq!(Encoding::from_name("UTF-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_name("ascii"), Some(Encoding::UsAscii));
        assert_eq!(Encoding::from_name("Latin-1"), Some(Encoding::Latin1));
        assert_eq!(Encoding::from_name("ASCII-8BIT"), Some(Encoding::Binary));
        assert_eq!(Encoding::from_name("utf-16"), None);
    }

    #[test]
    fn tag_round_trip() {
        for encoding in [
            Encoding::Utf8,
            Encoding::UsAscii,
            Encoding::Latin1,
            Encoding::Binary,
        ] {
            assert_eq!(Encoding::from_tag(encoding.tag()), Some(encoding));
        }
        assert_eq!(Encoding::from_tag(200), None);
    }

    #[test]
    fn ascii_is_single_byte_everywhere() {
        for encoding in [
            Encoding::Utf8,
            Encoding::UsAscii,
            Encoding::Latin1,
            Encoding::Binary,
        ] {
            assert_eq!(encoding.char_width(b"a"), Some(1));
        }
    }

    #[test]
    fn utf8_widths() {
        assert_eq!(Encoding::Utf8.char_width("é".as_bytes()), Some(2));
        assert_eq!(Encoding::Utf8.char_width("語".as_bytes()), Some(3));
        assert_eq!(Encoding::Utf8.char_width("🦀".as_bytes()), Some(4));
        // Bare continuation byte
        assert_eq!(Encoding::Utf8.char_width(&[0x80]), None);
        // Truncated sequence
        assert_eq!(Encoding::Utf8.char_width(&[0xE4, 0xB8]), None);
        // Overlong encoding of '/'
        assert_eq!(Encoding::Utf8.char_width(&[0xE0, 0x80, 0xAF]), None);
        // CESU-style surrogate half
        assert_eq!(Encoding::Utf8.char_width(&[0xED, 0xA0, 0x80]), None);
    }

    #[test]
    fn high_bytes_by_encoding() {
        assert_eq!(Encoding::UsAscii.char_width(&[0xE9]), None);
        assert_eq!(Encoding::Latin1.char_width(&[0xE9]), Some(1));
        assert_eq!(Encoding::Binary.char_width(&[0xE9]), Some(1));
        assert_eq!(Encoding::Utf8.char_width(&[0xE9, 0x20]), None);
    }
}
