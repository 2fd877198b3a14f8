//! Sign-bit binary codes.
//!
//! A [`BinaryCode`] keeps one bit per dimension: 1 when the normalized
//! component is strictly positive, 0 otherwise. Bits are packed
//! most-significant-bit first and the code is left-padded with zero bits up to
//! a whole number of bytes, i.e. a code for `D` dimensions reads as the
//! `D`-bit big-endian number `b0 b1 ... b(D-1)`.
//!
//! Hamming distance between two codes approximates the angle between the
//! vectors they came from; it is only a candidate filter and results are
//! always reranked on the exact vectors.

use serde::{Deserialize, Serialize};

/// Packed sign bits of a normalized vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryCode(Vec<u8>);

impl BinaryCode {
    /// Encode the signs of `normalized`.
    pub fn encode(normalized: &[f32]) -> Self {
        let dimension = normalized.len();
        let len = code_len(dimension);
        let pad = len * 8 - dimension;
        let mut bytes = vec![0u8; len];

        for (i, &x) in normalized.iter().enumerate() {
            if x > 0.0 {
                let bit = pad + i;
                bytes[bit / 8] |= 0x80 >> (bit % 8);
            }
        }

        Self(bytes)
    }

    /// Wrap bytes read back from storage.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw packed bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the packed bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes in the code.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the code has no bytes (zero-dimensional input).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Hamming distance to another code.
    pub fn hamming(&self, other: &BinaryCode) -> u32 {
        hamming_distance(&self.0, &other.0)
    }
}

impl AsRef<[u8]> for BinaryCode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Bytes needed to hold a code for `dimension` components.
pub fn code_len(dimension: usize) -> usize {
    dimension.div_ceil(8)
}

/// Number of differing bits between two packed codes.
///
/// Compares eight bytes at a time. Trailing bytes present in only one code
/// count as differing from zero.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    let shared = a.len().min(b.len());
    let (a_head, a_tail) = a.split_at(shared);
    let (b_head, b_tail) = b.split_at(shared);

    let a_words = a_head.chunks_exact(8);
    let b_words = b_head.chunks_exact(8);
    let rem: u32 = a_words
        .remainder()
        .iter()
        .zip(b_words.remainder())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum();

    let words: u32 = a_words
        .zip(b_words)
        .map(|(x, y)| (word(x) ^ word(y)).count_ones())
        .sum();

    let tail: u32 = a_tail
        .iter()
        .chain(b_tail.iter())
        .map(|x| x.count_ones())
        .sum();

    words + rem + tail
}

fn word(chunk: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(chunk);
    u64::from_be_bytes(buf)
}

// ============================================================================
// Tests
// ============================================================================
