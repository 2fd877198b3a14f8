//! Binary (sign-bit LSH) prefilter.
//!
//! Each record's index key is the sign pattern of its normalized vector. A
//! query takes the records with the smallest Hamming distance to its own code
//! and hands them to exact scoring. The shortlist is wider than the result
//! count so that exact rerank can recover from collisions in code space.

use crate::error::DbResult;
use crate::store::{Candidates, Session};
use crate::types::{IndexKey, VectorId};
use sqlvec_core::{BinaryCode, TableConfig};
use tracing::trace;

/// Index key for a binary-strategy record.
pub fn assign(normalized: &[f32]) -> IndexKey {
    IndexKey::Code(BinaryCode::encode(normalized))
}

/// Shortlist for a query asking for `n` results.
pub fn candidates(
    session: &Session<'_>,
    config: &TableConfig,
    query_normalized: &[f32],
    n: usize,
) -> DbResult<Candidates> {
    let code = BinaryCode::encode(query_normalized);
    let limit = config.candidate_count(n);
    let ids: Vec<VectorId> = session.hamming_candidates(&code, limit)?;
    trace!(
        "Hamming prefilter kept {} of limit {} for n={}",
        ids.len(),
        limit,
        n
    );
    Ok(Candidates::Ids(ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_encodes_signs() {
        let key = assign(&[0.5, -0.5, 0.1, -0.1, 0.0, 0.3, -0.2, 0.9]);
        let code = key.code().unwrap();
        assert_eq!(code.as_bytes(), &[0b1010_0101]);
    }
}
