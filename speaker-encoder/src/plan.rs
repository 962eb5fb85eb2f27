//! Partial-utterance geometry: where to cut a waveform and its spectrogram.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::config::FramingConfig;
use crate::error::EncoderError;

/// Half-open interval `[start, stop)` over sample or frame indices.
///
/// `stop > start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    start: usize,
    stop: usize,
}

impl Range {
    /// Creates a range, rejecting empty or inverted bounds.
    pub fn new(start: usize, stop: usize) -> Result<Self, EncoderError> {
        if stop <= start {
            return Err(EncoderError::InvalidInput(format!(
                "range stop {stop} must exceed start {start}"
            )));
        }
        Ok(Self { start, stop })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Number of indices covered. Always positive.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.stop
    }
}

impl From<Range> for std::ops::Range<usize> {
    fn from(r: Range) -> Self {
        r.as_range()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// One partial utterance: a waveform range and the spectrogram frames it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Waveform sample range. May extend past the end of the waveform.
    pub wave: Range,
    /// Spectrogram frame range. May extend past the unpadded spectrogram.
    pub frames: Range,
}

/// Ordered, non-empty list of partial utterances for one waveform length.
///
/// Segment starts are strictly increasing and every segment has the same
/// length (`partial_frames` frames, `partial_frames * samples_per_frame`
/// samples).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentPlan {
    segments: Vec<Segment>,
}

impl SegmentPlan {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of partial utterances. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// The final partial utterance.
    pub fn last(&self) -> &Segment {
        &self.segments[self.segments.len() - 1]
    }

    /// Length the waveform must be zero-padded to before feature extraction.
    pub fn padded_len(&self) -> usize {
        self.last().wave.stop()
    }

    /// Waveform ranges in plan order.
    pub fn wave_ranges(&self) -> Vec<Range> {
        self.segments.iter().map(|s| s.wave).collect()
    }

    /// Spectrogram frame ranges in plan order.
    pub fn frame_ranges(&self) -> Vec<Range> {
        self.segments.iter().map(|s| s.frames).collect()
    }
}

impl<'a> IntoIterator for &'a SegmentPlan {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Computes where to split a waveform of `n_samples` samples and its mel
/// spectrogram into partial utterances.
///
/// # Algorithm
///
/// 1. `n_frames = ceil((n_samples + 1) / samples_per_frame)`
/// 2. Segment starts are enumerated every `frame_step` frames while below
///    `max(1, n_frames - partial_frames + frame_step + 1)`.
/// 3. If the last segment's real-sample coverage is below
///    `min_pad_coverage` and it is not the only segment, it is dropped.
///
/// The returned ranges may index past the end of the waveform; pad the
/// waveform with zeros up to [`SegmentPlan::padded_len`] before
/// extracting the spectrogram.
pub fn compute_plan(n_samples: usize, cfg: &FramingConfig) -> Result<SegmentPlan, EncoderError> {
    if n_samples == 0 {
        return Err(EncoderError::InvalidInput("waveform is empty".into()));
    }

    let spf = cfg.samples_per_frame();
    let partial = cfg.partial_frames();
    let frame_step = cfg.frame_step();
    let n_frames = (n_samples / spf)
        .checked_add(1)
        .ok_or_else(|| plan_overflow(n_samples))?;
    let steps = n_frames
        .checked_add(frame_step)
        .and_then(|v| v.checked_add(1))
        .ok_or_else(|| plan_overflow(n_samples))?
        .saturating_sub(partial)
        .max(1);

    // Every other segment ends before the last one, so bounding it bounds all.
    let count = steps.div_ceil(frame_step);
    (count - 1)
        .checked_mul(frame_step)
        .and_then(|start| start.checked_add(partial))
        .and_then(|stop| stop.checked_mul(spf))
        .ok_or_else(|| plan_overflow(n_samples))?;

    let mut segments = Vec::with_capacity(count);
    for i in (0..steps).step_by(frame_step) {
        segments.push(Segment {
            wave: Range {
                start: i * spf,
                stop: (i + partial) * spf,
            },
            frames: Range {
                start: i,
                stop: i + partial,
            },
        });
    }

    // steps >= 1, so the loop always emits the segment at offset 0.
    let last = segments[segments.len() - 1].wave;
    let coverage = (n_samples as f64 - last.start as f64) / last.len() as f64;
    let drop_tail = coverage < cfg.min_pad_coverage() && segments.len() > 1;
    if drop_tail {
        segments.pop();
    }

    debug!(
        n_samples,
        n_frames,
        segments = segments.len(),
        tail_coverage = coverage,
        drop_tail,
        "speaker-encoder: computed partial plan"
    );

    Ok(SegmentPlan { segments })
}

fn plan_overflow(n_samples: usize) -> EncoderError {
    EncoderError::InvalidInput(format!(
        "{n_samples} samples overflow the partial-utterance index range"
    ))
}
