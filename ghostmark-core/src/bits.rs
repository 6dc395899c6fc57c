//! Byte message <-> bit sequence conversion.
//!
//! Bytes expand MSB first. Decoding stops at the first byte outside printable ASCII and
//! reports where it stopped; that is how a font-size channel signals the end of a message.

use crate::error::{GhostmarkError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Printable ASCII range accepted by [`decode`]
pub const PRINTABLE: std::ops::RangeInclusive<u8> = 32..=126;

/// An ordered sequence of bits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitstream {
    bits: Vec<bool>,
}

impl Bitstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn extend(&mut self, other: &Bitstream) {
        self.bits.extend_from_slice(&other.bits);
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }
}

impl From<Vec<bool>> for Bitstream {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

impl FromIterator<bool> for Bitstream {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Bitstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.bits {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Serialize for Bitstream {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Bitstream {
    type Err = GhostmarkError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(GhostmarkError::InvalidParameters(format!(
                    "bitstream contains '{other}'"
                ))),
            })
            .collect()
    }
}

/// Result of [`decode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedBytes {
    pub bytes: Vec<u8>,
    /// Index of the 8-bit group that stopped decoding, if any
    pub truncated_at: Option<usize>,
}

impl DecodedBytes {
    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }

    /// The decoded bytes as text. Every byte is printable ASCII, so this never loses data.
    pub fn text(&self) -> String {
        self.bytes.iter().map(|b| char::from(*b)).collect()
    }
}

/// Expand each byte into 8 bits, most significant first.
pub fn encode(message: &[u8]) -> Bitstream {
    message
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
        .collect()
}

/// Pack bits into bytes, zero-padding a short trailing group, stopping at the first
/// group whose value is not printable ASCII.
pub fn decode(bits: &Bitstream) -> DecodedBytes {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));

    for (index, group) in bits.as_slice().chunks(8).enumerate() {
        let value = group
            .iter()
            .chain(std::iter::repeat(&false))
            .take(8)
            .fold(0u8, |acc, bit| (acc << 1) | u8::from(*bit));

        if !PRINTABLE.contains(&value) {
            return DecodedBytes {
                bytes,
                truncated_at: Some(index),
            };
        }
        bytes.push(value);
    }

    DecodedBytes {
        bytes,
        truncated_at: None,
    }
}
