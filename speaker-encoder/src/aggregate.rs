//! Reduction of partial embeddings to one utterance embedding.

use crate::error::EncoderError;

/// Averages `embeddings` element-wise and L2-normalizes the mean.
///
/// The result has unit length. Accumulation uses f64.
///
/// # Errors
///
/// - [`EncoderError::InvalidInput`] if `embeddings` is empty.
/// - [`EncoderError::DimensionMismatch`] if rows differ in length.
/// - [`EncoderError::DegenerateEmbedding`] if the mean has zero or
///   non-finite norm.
pub fn aggregate(embeddings: &[Vec<f32>]) -> Result<Vec<f32>, EncoderError> {
    let first = embeddings
        .first()
        .ok_or_else(|| EncoderError::InvalidInput("no partial embeddings to aggregate".into()))?;
    let dim = first.len();

    let mut sum = vec![0.0f64; dim];
    for emb in embeddings {
        if emb.len() != dim {
            return Err(EncoderError::DimensionMismatch {
                expected: dim,
                got: emb.len(),
            });
        }
        for (acc, &v) in sum.iter_mut().zip(emb) {
            *acc += v as f64;
        }
    }

    let n = embeddings.len() as f64;
    let mean: Vec<f64> = sum.into_iter().map(|v| v / n).collect();
    let norm = mean.iter().map(|v| v * v).sum::<f64>().sqrt();
    if !(norm.is_finite() && norm > 0.0) {
        return Err(EncoderError::DegenerateEmbedding);
    }

    Ok(mean.into_iter().map(|v| (v / norm) as f32).collect())
}

/// Euclidean norm with f64 accumulation.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_then_normalize() {
        let out = aggregate(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0] - expected).abs() < 1e-6);
        assert!((out[1] - expected).abs() < 1e-6);
        assert!((l2_norm(&out) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identical_rows_are_idempotent() {
        let mut unit = vec![0.6f32, 0.8, 0.0];
        let out = aggregate(&[unit.clone(), unit.clone(), unit.clone()]).unwrap();
        for (a, b) in out.iter().zip(&unit) {
            assert!((a - b).abs() < 1e-6);
        }

        for x in unit.iter_mut() {
            *x *= 5.0;
        }
        let out = aggregate(&[unit.clone(), unit]).unwrap();
        assert!((out[0] - 0.6).abs() < 1e-6);
        assert!((out[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn norm_is_one() {
        let rows: Vec<Vec<f32>> = (0..7)
            .map(|r| (0..256).map(|i| ((r * 31 + i * 7) % 13) as f32 - 4.0).collect())
            .collect();
        let out = aggregate(&rows).unwrap();
        assert_eq!(out.len(), 256);
        assert!((l2_norm(&out) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn zero_mean_is_degenerate() {
        let err = aggregate(&[vec![1.0, -2.0], vec![-1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, EncoderError::DegenerateEmbedding));

        let err = aggregate(&[vec![0.0; 4]]).unwrap_err();
        assert!(matches!(err, EncoderError::DegenerateEmbedding));
    }

    #[test]
    fn l2_norm_accumulates_in_f64() {
        assert!((l2_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert_eq!(l2_norm(&[]), 0.0);
    }

    #[test]
    fn nan_is_degenerate() {
        let err = aggregate(&[vec![f32::NAN, 1.0]]).unwrap_err();
        assert!(matches!(err, EncoderError::DegenerateEmbedding));
    }

    #[test]
    fn empty_and_ragged_rejected() {
        assert!(matches!(
            aggregate(&[]).unwrap_err(),
            EncoderError::InvalidInput(_)
        ));
        assert!(matches!(
            aggregate(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err(),
            EncoderError::DimensionMismatch { expected: 2, got: 1 }
        ));
    }
}
