//! Column encoding for float vectors.
//!
//! Vectors are stored as BLOBs of little-endian `f32`, which round-trips every
//! value bit for bit.

use crate::error::{DbError, DbResult};

/// Encode a vector as a little-endian `f32` blob.
pub fn encode_f32s(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode a blob produced by [`encode_f32s`].
pub fn decode_f32s(bytes: &[u8]) -> DbResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(DbError::storage(format!(
            "corrupt vector blob: {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_exact() {
        let v = vec![0.1f32, -3.5e-8, f32::MAX, f32::MIN_POSITIVE, 0.0, -0.0];
        let decoded = decode_f32s(&encode_f32s(&v)).unwrap();
        assert_eq!(
            decoded.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            v.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_layout() {
        assert_eq!(encode_f32s(&[1.0]), vec![0x00, 0x00, 0x80, 0x3f]);
        assert!(encode_f32s(&[]).is_empty());
    }

    #[test]
    fn test_corrupt_blob() {
        assert!(matches!(
            decode_f32s(&[1, 2, 3]),
            Err(DbError::Storage { .. })
        ));
    }
}
