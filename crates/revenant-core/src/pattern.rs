//! AOB pattern compilation and matching
//!
//! Patterns are hex strings with wildcards at nibble granularity: each `?`
//! stands in for exactly one hex digit, so `"48 8B ?5"` pins the low nibble
//! of the third byte while leaving its high nibble free. Compilation strips
//! every character outside `[0-9A-Fa-f?]`, so separators and formatting are
//! irrelevant.

use revenant_common::{Error, Result};
use std::fmt;

/// Byte order a pattern is matched under.
///
/// `Big` compares pattern bytes against the buffer in text order; `Little`
/// compares against the buffer reversed, for signatures written as the
/// target would store an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// An immutable compiled byte/wildcard matcher with a fixed size.
///
/// `bytes[i]` holds the pinned nibbles of byte `i` (wildcarded nibbles are
/// zero) and `mask[i]` holds which nibbles are pinned: `0xFF` both, `0xF0`
/// high only, `0x0F` low only, `0x00` fully wildcarded. Every set bit in
/// `bytes` is also set in `mask`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<u8>,
    byteorder: ByteOrder,
}

impl Pattern {
    /// Compile pattern text into a matcher.
    ///
    /// A trailing unpaired nibble is dropped. Text with no usable nibble
    /// pairs fails with [`Error::InvalidPattern`].
    pub fn compile(text: &str, byteorder: ByteOrder) -> Result<Pattern> {
        let nibbles: Vec<Option<u8>> = text
            .chars()
            .filter_map(|c| match c {
                '?' => Some(None),
                _ => c.to_digit(16).map(|d| Some(d as u8)),
            })
            .collect();

        let mut bytes = Vec::with_capacity(nibbles.len() / 2);
        let mut mask = Vec::with_capacity(nibbles.len() / 2);
        for pair in nibbles.chunks_exact(2) {
            let (high, low) = (pair[0], pair[1]);
            bytes.push(high.unwrap_or(0) << 4 | low.unwrap_or(0));
            mask.push(high.map_or(0, |_| 0xF0) | low.map_or(0, |_| 0x0F));
        }

        if bytes.is_empty() {
            return Err(Error::InvalidPattern(format!(
                "no hex byte pairs in pattern text {text:?}"
            )));
        }

        Ok(Pattern {
            bytes,
            mask,
            byteorder,
        })
    }

    /// Size of the pattern in bytes. Always equals the mask length, even
    /// when the pattern starts with wildcards.
    pub fn size(&self) -> usize {
        self.mask.len()
    }

    pub fn byteorder(&self) -> ByteOrder {
        self.byteorder
    }

    /// Masked comparison of `data` against the pattern. `data` must be
    /// exactly [`size`](Self::size) bytes.
    pub fn match_one(&self, data: &[u8]) -> bool {
        if data.len() != self.size() {
            return false;
        }
        match self.byteorder {
            ByteOrder::Big => self.matches_at(data.iter()),
            ByteOrder::Little => self.matches_at(data.iter().rev()),
        }
    }

    fn matches_at<'a>(&self, data: impl Iterator<Item = &'a u8>) -> bool {
        self.bytes
            .iter()
            .zip(self.mask.iter())
            .zip(data)
            .all(|((&b, &m), &d)| d & m == b)
    }

    /// Offset of the first (lowest) match within `buffer`, if any.
    pub fn find_first(&self, buffer: &[u8]) -> Option<usize> {
        let size = self.size();
        if buffer.len() < size {
            return None;
        }
        (0..=buffer.len() - size).find(|&offset| self.match_one(&buffer[offset..offset + size]))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (&b, &m)) in self.bytes.iter().zip(self.mask.iter()).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            for (nibble, nibble_mask) in [(b >> 4, m >> 4), (b & 0x0F, m & 0x0F)] {
                if nibble_mask == 0 {
                    write!(f, "?")?;
                } else {
                    write!(f, "{nibble:X}")?;
                }
            }
        }
        Ok(())
    }
}
