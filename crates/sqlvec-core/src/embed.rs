//! Boundary to text embedding models.
//!
//! Tokenization and model inference live outside sqlvec. A table only needs
//! something that turns texts into vectors of a known dimension.

use crate::error::{CoreError, CoreResult};

/// Turns texts into dense vectors.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one model can serve several tables.
pub trait Embedder: Send + Sync {
    /// Generate one embedding per input text, in input order.
    fn embed(&self, texts: &[&str]) -> CoreResult<Vec<Vec<f32>>>;

    /// Length of every embedding this model produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vectors = self.embed(&[text])?;
        match vectors.len() {
            1 => vectors
                .pop()
                .ok_or_else(|| CoreError::embedding("embedder returned no vectors")),
            n => Err(CoreError::embedding(format!(
                "embedder returned {} vectors for 1 text",
                n
            ))),
        }
    }
}

/// Run `embedder` and check it returned one vector of `expected` length per text.
pub fn embed_checked(
    embedder: &dyn Embedder,
    texts: &[&str],
    expected: usize,
) -> CoreResult<Vec<Vec<f32>>> {
    if embedder.dimension() != expected {
        return Err(CoreError::DimensionMismatch {
            expected,
            actual: embedder.dimension(),
        });
    }

    let vectors = embedder.embed(texts)?;
    if vectors.len() != texts.len() {
        return Err(CoreError::embedding(format!(
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        )));
    }
    for v in &vectors {
        crate::math::check_dimension(v, expected)?;
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bag-of-letters embedder: counts of 'a'..'d'.
    struct LetterCounts;

    impl Embedder for LetterCounts {
        fn embed(&self, texts: &[&str]) -> CoreResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c', 'd']
                        .iter()
                        .map(|l| t.chars().filter(|c| c == l).count() as f32)
                        .collect()
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_embed_checked() {
        let vectors = embed_checked(&LetterCounts, &["abba", "cd"], 4).unwrap();
        assert_eq!(vectors[0], vec![2.0, 2.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_embed_checked_dimension() {
        let err = embed_checked(&LetterCounts, &["abba"], 8).unwrap_err();
        assert_eq!(
            err,
            CoreError::DimensionMismatch {
                expected: 8,
                actual: 4
            }
        );
    }

    /// Returns two vectors whatever it is given.
    struct Doubled;

    impl Embedder for Doubled {
        fn embed(&self, _texts: &[&str]) -> CoreResult<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0], vec![0.0, 1.0]])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_embed_one_requires_exactly_one_vector() {
        assert!(matches!(
            Doubled.embed_one("x"),
            Err(CoreError::Embedding { .. })
        ));
    }

    #[test]
    fn test_embed_one() {
        assert_eq!(LetterCounts.embed_one("dad").unwrap(), vec![1.0, 0.0, 0.0, 2.0]);
    }
}
