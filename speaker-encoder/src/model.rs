use crate::error::EncoderError;
use crate::spectrogram::FrameBatch;

/// Maps batches of spectrogram slices to speaker embeddings.
///
/// The input is a `[batch, frames, channels]` tensor; the output holds one
/// embedding of [`SpeakerModel::embedding_size`] values per batch item,
/// in batch order. Embeddings are expected to be unit length already.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use. `forward` must not
/// keep state between calls.
pub trait SpeakerModel: Send + Sync {
    /// Runs the network on a batch of spectrogram slices.
    fn forward(&self, batch: &FrameBatch) -> Result<Vec<Vec<f32>>, EncoderError>;

    /// Returns the dimensionality of the embedding vectors (e.g., 256).
    fn embedding_size(&self) -> usize;
}

/// Runs `model` and checks that its output matches the batch shape.
pub(crate) fn forward_checked(
    model: &dyn SpeakerModel,
    batch: &FrameBatch,
) -> Result<Vec<Vec<f32>>, EncoderError> {
    let embeddings = model.forward(batch)?;
    if embeddings.len() != batch.batch() {
        return Err(EncoderError::DimensionMismatch {
            expected: batch.batch(),
            got: embeddings.len(),
        });
    }
    let dim = model.embedding_size();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dim) {
        return Err(EncoderError::DimensionMismatch {
            expected: dim,
            got: bad.len(),
        });
    }
    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel {
        rows: usize,
        dim: usize,
    }

    impl SpeakerModel for FixedModel {
        fn forward(&self, _batch: &FrameBatch) -> Result<Vec<Vec<f32>>, EncoderError> {
            Ok(vec![vec![1.0; self.dim]; self.rows])
        }

        fn embedding_size(&self) -> usize {
            4
        }
    }

    fn batch_of(n: usize) -> FrameBatch {
        let mut batch = FrameBatch::with_capacity(2, 1, n);
        for _ in 0..n {
            batch.push(&[0.0, 0.0]).unwrap();
        }
        batch
    }

    #[test]
    fn accepts_matching_output() {
        let model = FixedModel { rows: 3, dim: 4 };
        let out = forward_checked(&model, &batch_of(3)).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn rejects_wrong_row_count() {
        let model = FixedModel { rows: 2, dim: 4 };
        let err = forward_checked(&model, &batch_of(3)).unwrap_err();
        assert!(matches!(
            err,
            EncoderError::DimensionMismatch { expected: 3, got: 2 }
        ));
    }

    #[test]
    fn rejects_wrong_embedding_size() {
        let model = FixedModel { rows: 1, dim: 5 };
        let err = forward_checked(&model, &batch_of(1)).unwrap_err();
        assert!(matches!(
            err,
            EncoderError::DimensionMismatch { expected: 4, got: 5 }
        ));
    }
}
