//! Turns a [`SegmentPlan`] into model input: a padded waveform and a batch
//! of spectrogram slices.

use crate::error::EncoderError;
use crate::fbank::FeatureExtractor;
use crate::plan::SegmentPlan;
use crate::spectrogram::{FrameBatch, Spectrogram};

/// Output of [`materialize`].
#[derive(Debug, Clone)]
pub struct Materialized {
    /// Waveform zero-padded up to [`SegmentPlan::padded_len`].
    pub wave: Vec<f32>,
    /// One spectrogram slice per plan segment, in plan order.
    pub batch: FrameBatch,
}

/// Returns a copy of `wave` right-padded with silence up to the stop of the
/// plan's last waveform range. Longer waveforms are copied unchanged.
pub fn pad_waveform(wave: &[f32], plan: &SegmentPlan) -> Vec<f32> {
    let target = plan.padded_len().max(wave.len());
    let mut padded = Vec::with_capacity(target);
    padded.extend_from_slice(wave);
    padded.resize(target, 0.0);
    padded
}

/// Stacks the spectrogram slice of every plan segment into a batch.
///
/// `spec` must have been computed from the padded waveform; a frame range
/// past its end means the plan and the extractor disagree on framing and
/// is reported as [`EncoderError::Inconsistent`].
pub fn slice_frames(spec: &Spectrogram, plan: &SegmentPlan) -> Result<FrameBatch, EncoderError> {
    let frames = plan.last().frames.len();
    let mut batch = FrameBatch::with_capacity(frames, spec.channels(), plan.len());
    for seg in plan {
        let rows = spec.rows(seg.frames.as_range()).ok_or_else(|| {
            EncoderError::Inconsistent(format!(
                "frame range {} exceeds spectrogram of {} frames",
                seg.frames,
                spec.frames()
            ))
        })?;
        batch.push(rows)?;
    }
    Ok(batch)
}

/// Pads `wave` for `plan`, extracts its spectrogram and slices it into a batch.
pub fn materialize(
    wave: &[f32],
    plan: &SegmentPlan,
    extractor: &dyn FeatureExtractor,
) -> Result<Materialized, EncoderError> {
    let wave = pad_waveform(wave, plan);
    let spec = extractor.extract(&wave)?;
    let batch = slice_frames(&spec, plan)?;
    Ok(Materialized { wave, batch })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FramingConfig;
    use crate::fbank::MelFilterbank;
    use crate::plan::compute_plan;

    /// Extractor whose frame `t` is `[t, t]`, with the centered frame count.
    struct IndexExtractor {
        hop: usize,
    }

    impl FeatureExtractor for IndexExtractor {
        fn extract(&self, wave: &[f32]) -> Result<Spectrogram, EncoderError> {
            let frames = wave.len() / self.hop + 1;
            let data = (0..frames).flat_map(|t| [t as f32, t as f32]).collect();
            Spectrogram::new(2, data)
        }

        fn channels(&self) -> usize {
            2
        }
    }

    #[test]
    fn pads_short_waveform_with_silence() {
        let plan = compute_plan(8000, &FramingConfig::default()).unwrap();
        let wave = vec![0.5f32; 8000];
        let padded = pad_waveform(&wave, &plan);
        assert_eq!(padded.len(), 25600);
        assert!(padded[..8000].iter().all(|&v| v == 0.5));
        assert!(padded[8000..].iter().all(|&v| v == 0.0));
        assert_eq!(wave.len(), 8000);
    }

    #[test]
    fn long_waveform_is_not_truncated() {
        // 30000 samples: the tail is dropped, last stop (25600) < len.
        let plan = compute_plan(30000, &FramingConfig::default()).unwrap();
        assert_eq!(plan.padded_len(), 25600);
        let padded = pad_waveform(&vec![1.0f32; 30000], &plan);
        assert_eq!(padded.len(), 30000);
    }

    #[test]
    fn slices_follow_plan() {
        let plan = compute_plan(32000, &FramingConfig::default()).unwrap();
        let out = materialize(&vec![0.1f32; 32000], &plan, &IndexExtractor { hop: 160 }).unwrap();

        assert_eq!(out.wave.len(), 38400);
        assert_eq!(out.batch.shape(), [2, 160, 2]);
        assert_eq!(out.batch.item(0).unwrap()[0], 0.0);
        assert_eq!(out.batch.item(1).unwrap()[0], 80.0);
        assert_eq!(*out.batch.item(1).unwrap().last().unwrap(), 239.0);
    }

    #[test]
    fn out_of_bounds_slice_is_inconsistent() {
        let plan = compute_plan(32000, &FramingConfig::default()).unwrap();
        // Spectrogram of the unpadded waveform: 201 frames < 240.
        let spec = IndexExtractor { hop: 160 }.extract(&vec![0.0f32; 32000]).unwrap();
        let err = slice_frames(&spec, &plan).unwrap_err();
        assert!(matches!(err, EncoderError::Inconsistent(_)));
    }

    #[test]
    fn mel_extractor_aligns_with_plan() {
        let framing = FramingConfig::default();
        let mel = MelFilterbank::default();
        for n in [1usize, 8000, 25600, 30000, 32000, 41234] {
            let plan = compute_plan(n, &framing).unwrap();
            let out = materialize(&vec![0.01f32; n], &plan, &mel).unwrap();
            assert_eq!(out.batch.batch(), plan.len(), "n_samples={n}");
            assert_eq!(out.batch.frames(), 160);
            assert_eq!(out.batch.channels(), 40);
        }
    }
}
