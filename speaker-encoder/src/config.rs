//! Framing parameters shared by the geometry resolver and the feature extractor.

use serde::{Deserialize, Serialize};

use crate::error::EncoderError;

/// Sampling rate of every waveform fed to the encoder, in Hz.
pub const SAMPLING_RATE: u32 = 16000;

/// Mel analysis window length in milliseconds.
pub const MEL_WINDOW_LENGTH_MS: u32 = 25;

/// Mel analysis window step in milliseconds (one spectrogram frame).
pub const MEL_WINDOW_STEP_MS: u32 = 10;

/// Number of mel channels produced by the reference extractor.
pub const MEL_N_CHANNELS: usize = 40;

/// Number of spectrogram frames in a partial utterance (1.6s at 10ms).
pub const PARTIAL_UTTERANCE_FRAMES: usize = 160;

/// Dimensionality of the speaker embedding.
pub const MODEL_EMBEDDING_SIZE: usize = 256;

/// Validated partial-utterance framing configuration.
///
/// Holds the sampling rate and spectrogram frame step together so that
/// `samples_per_frame` is derived in exactly one place. Values can only
/// be obtained through [`FramingConfig::new`] (or deserialization, which
/// goes through the same checks), so every instance satisfies:
///
/// - `0 <= overlap < 1`
/// - `0 < min_pad_coverage <= 1`
/// - `samples_per_frame = round(sampling_rate * frame_step_ms / 1000) >= 1`
/// - `partial_frames >= 1`
/// - `partial_frames * samples_per_frame` fits in a `usize`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FramingParams", into = "FramingParams")]
pub struct FramingConfig {
    params: FramingParams,
    samples_per_frame: usize,
}

/// Raw framing parameters, as written in a config file.
///
/// Missing fields take the defaults of [`FramingParams::default`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingParams {
    /// Waveform sampling rate in Hz (default: 16000).
    pub sampling_rate: u32,
    /// Spectrogram frame step in milliseconds (default: 10).
    pub frame_step_ms: f64,
    /// Partial utterance length in frames (default: 160).
    pub partial_frames: usize,
    /// Overlap fraction between consecutive partials (default: 0.5).
    pub overlap: f64,
    /// Minimum real-sample coverage of the tail partial (default: 0.75).
    pub min_pad_coverage: f64,
}

impl Default for FramingParams {
    fn default() -> Self {
        Self {
            sampling_rate: SAMPLING_RATE,
            frame_step_ms: MEL_WINDOW_STEP_MS as f64,
            partial_frames: PARTIAL_UTTERANCE_FRAMES,
            overlap: 0.5,
            min_pad_coverage: 0.75,
        }
    }
}

impl FramingConfig {
    /// Validates `params` and derives the samples-per-frame ratio.
    pub fn new(params: FramingParams) -> Result<Self, EncoderError> {
        if params.sampling_rate == 0 {
            return Err(EncoderError::InvalidConfig(
                "sampling_rate must be positive".into(),
            ));
        }
        if !(params.frame_step_ms.is_finite() && params.frame_step_ms > 0.0) {
            return Err(EncoderError::InvalidConfig(format!(
                "frame_step_ms must be positive, got {}",
                params.frame_step_ms
            )));
        }
        if params.partial_frames == 0 {
            return Err(EncoderError::InvalidConfig(
                "partial_frames must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&params.overlap) {
            return Err(EncoderError::InvalidConfig(format!(
                "overlap must be in [0, 1), got {}",
                params.overlap
            )));
        }
        if !(params.min_pad_coverage > 0.0 && params.min_pad_coverage <= 1.0) {
            return Err(EncoderError::InvalidConfig(format!(
                "min_pad_coverage must be in (0, 1], got {}",
                params.min_pad_coverage
            )));
        }

        let spf = (params.sampling_rate as f64 * params.frame_step_ms / 1000.0).round();
        if spf < 1.0 {
            return Err(EncoderError::InvalidConfig(format!(
                "{} Hz with a {} ms step yields less than one sample per frame",
                params.sampling_rate, params.frame_step_ms
            )));
        }

        let samples_per_frame = spf as usize;
        if params.partial_frames.checked_mul(samples_per_frame).is_none() {
            return Err(EncoderError::InvalidConfig(format!(
                "partial_frames {} at {samples_per_frame} samples per frame overflows",
                params.partial_frames
            )));
        }

        Ok(Self {
            params,
            samples_per_frame,
        })
    }

    /// Parses and validates a JSON-encoded [`FramingParams`] document.
    pub fn from_json(json_data: &[u8]) -> Result<Self, EncoderError> {
        let params: FramingParams = serde_json::from_slice(json_data)?;
        Self::new(params)
    }

    /// Returns a copy with a different overlap fraction.
    pub fn with_overlap(self, overlap: f64) -> Result<Self, EncoderError> {
        Self::new(FramingParams {
            overlap,
            ..self.params
        })
    }

    /// Returns a copy with a different tail coverage threshold.
    pub fn with_min_pad_coverage(self, min_pad_coverage: f64) -> Result<Self, EncoderError> {
        Self::new(FramingParams {
            min_pad_coverage,
            ..self.params
        })
    }

    /// Returns a copy with a different partial utterance length.
    pub fn with_partial_frames(self, partial_frames: usize) -> Result<Self, EncoderError> {
        Self::new(FramingParams {
            partial_frames,
            ..self.params
        })
    }

    pub fn params(&self) -> &FramingParams {
        &self.params
    }

    pub fn sampling_rate(&self) -> u32 {
        self.params.sampling_rate
    }

    pub fn frame_step_ms(&self) -> f64 {
        self.params.frame_step_ms
    }

    pub fn partial_frames(&self) -> usize {
        self.params.partial_frames
    }

    pub fn overlap(&self) -> f64 {
        self.params.overlap
    }

    pub fn min_pad_coverage(&self) -> f64 {
        self.params.min_pad_coverage
    }

    /// Waveform samples covered by one spectrogram frame.
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Waveform samples covered by one partial utterance. Checked at
    /// construction not to overflow.
    pub fn partial_samples(&self) -> usize {
        self.params.partial_frames * self.samples_per_frame
    }

    /// Hop between consecutive partial utterances, in frames. Never zero.
    ///
    /// Exact halves round to even.
    pub fn frame_step(&self) -> usize {
        let step = (self.params.partial_frames as f64 * (1.0 - self.params.overlap)).round_ties_even();
        (step as usize).max(1)
    }

    /// Number of spectrogram frames the feature extractor yields for
    /// `n_samples` waveform samples: `ceil((n_samples + 1) / samples_per_frame)`.
    ///
    /// The extra sample accounts for the centered first frame.
    pub fn frame_count(&self, n_samples: usize) -> usize {
        n_samples / self.samples_per_frame + 1
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        let params = FramingParams::default();
        Self {
            samples_per_frame: (params.sampling_rate as usize * MEL_WINDOW_STEP_MS as usize) / 1000,
            params,
        }
    }
}

impl TryFrom<FramingParams> for FramingConfig {
    type Error = EncoderError;

    fn try_from(params: FramingParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<FramingConfig> for FramingParams {
    fn from(cfg: FramingConfig) -> Self {
        cfg.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = FramingConfig::default();
        assert_eq!(cfg.sampling_rate(), 16000);
        assert_eq!(cfg.samples_per_frame(), 160);
        assert_eq!(cfg.partial_frames(), 160);
        assert_eq!(cfg.partial_samples(), 25600);
        assert_eq!(cfg.frame_step(), 80);
        assert_eq!(cfg, FramingConfig::new(FramingParams::default()).unwrap());
    }

    #[test]
    fn frame_count_matches_ceil_formula() {
        let cfg = FramingConfig::default();
        for n in [1usize, 159, 160, 161, 319, 320, 8000, 32000, 32001] {
            let expected = ((n + 1) as f64 / 160.0).ceil() as usize;
            assert_eq!(cfg.frame_count(n), expected, "n_samples={n}");
        }
        assert_eq!(cfg.frame_count(32000), 201);
    }

    #[test]
    fn rejects_overlap_out_of_range() {
        for overlap in [-0.1, 1.0, 1.5, f64::NAN] {
            let err = FramingConfig::default().with_overlap(overlap).unwrap_err();
            assert!(matches!(err, EncoderError::InvalidConfig(_)), "overlap={overlap}");
        }
        assert!(FramingConfig::default().with_overlap(0.0).is_ok());
        assert!(FramingConfig::default().with_overlap(0.999).is_ok());
    }

    #[test]
    fn rejects_coverage_out_of_range() {
        for cov in [0.0, -0.5, 1.01, f64::NAN] {
            let err = FramingConfig::default().with_min_pad_coverage(cov).unwrap_err();
            assert!(matches!(err, EncoderError::InvalidConfig(_)), "coverage={cov}");
        }
        assert!(FramingConfig::default().with_min_pad_coverage(1.0).is_ok());
    }

    #[test]
    fn rejects_sub_sample_frames() {
        let err = FramingConfig::new(FramingParams {
            sampling_rate: 40,
            frame_step_ms: 10.0,
            ..FramingParams::default()
        })
        .unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));
    }

    #[test]
    fn samples_per_frame_rounds() {
        let cfg = FramingConfig::new(FramingParams {
            sampling_rate: 22050,
            frame_step_ms: 12.5,
            ..FramingParams::default()
        })
        .unwrap();
        // 22050 * 12.5 / 1000 = 275.625
        assert_eq!(cfg.samples_per_frame(), 276);
    }

    #[test]
    fn frame_step_never_zero() {
        let cfg = FramingConfig::default()
            .with_partial_frames(4)
            .unwrap()
            .with_overlap(0.99)
            .unwrap();
        assert_eq!(cfg.frame_step(), 1);
    }

    #[test]
    fn from_json_partial_document() {
        let cfg = FramingConfig::from_json(br#"{"overlap": 0.25, "partial_frames": 100}"#).unwrap();
        assert_eq!(cfg.overlap(), 0.25);
        assert_eq!(cfg.partial_frames(), 100);
        assert_eq!(cfg.frame_step(), 75);
        assert_eq!(cfg.sampling_rate(), 16000);
    }

    #[test]
    fn from_json_validates() {
        let err = FramingConfig::from_json(br#"{"overlap": 1.0}"#).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));

        let err = FramingConfig::from_json(b"not json").unwrap_err();
        assert!(matches!(err, EncoderError::Config(_)));
    }

    #[test]
    fn rejects_overflowing_partial_length() {
        let json = format!(r#"{{"partial_frames": {}}}"#, usize::MAX);
        let err = FramingConfig::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));

        let err = FramingConfig::default()
            .with_partial_frames(usize::MAX / 160 + 1)
            .unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));

        let cfg = FramingConfig::default()
            .with_partial_frames(usize::MAX / 160)
            .unwrap();
        assert_eq!(cfg.partial_samples(), usize::MAX / 160 * 160);
    }

    #[test]
    fn serde_roundtrip_through_params() {
        let cfg = FramingConfig::default().with_overlap(0.3).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FramingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);

        let bad = r#"{"sampling_rate":16000,"frame_step_ms":10.0,"partial_frames":160,"overlap":2.0,"min_pad_coverage":0.75}"#;
        assert!(serde_json::from_str::<FramingConfig>(bad).is_err());
    }
}
