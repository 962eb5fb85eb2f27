//! Row-major containers for spectrogram frames and model input batches.

use crate::error::EncoderError;

/// A `[frames][channels]` matrix of spectrogram values, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    channels: usize,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Wraps flat row-major data. `data.len()` must be a multiple of `channels`.
    pub fn new(channels: usize, data: Vec<f32>) -> Result<Self, EncoderError> {
        if channels == 0 {
            return Err(EncoderError::InvalidInput("spectrogram has zero channels".into()));
        }
        if data.len() % channels != 0 {
            return Err(EncoderError::InvalidInput(format!(
                "spectrogram data length {} is not a multiple of {channels} channels",
                data.len()
            )));
        }
        Ok(Self { channels, data })
    }

    /// Builds a spectrogram from per-frame rows of equal length.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, EncoderError> {
        let channels = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * channels);
        for row in rows {
            if row.len() != channels {
                return Err(EncoderError::DimensionMismatch {
                    expected: channels,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(channels, data)
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns frame `t`, or `None` past the end.
    pub fn frame(&self, t: usize) -> Option<&[f32]> {
        let start = t.checked_mul(self.channels)?;
        self.data.get(start..start + self.channels)
    }

    /// Returns the contiguous values of frames `range`, or `None` if out of bounds.
    pub fn rows(&self, range: std::ops::Range<usize>) -> Option<&[f32]> {
        if range.end > self.frames() || range.start > range.end {
            return None;
        }
        Some(&self.data[range.start * self.channels..range.end * self.channels])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// A `[batch][frames][channels]` tensor of spectrogram slices, stored
/// row-major. This is the input layout of [`crate::SpeakerModel::forward`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    batch: usize,
    frames: usize,
    channels: usize,
    data: Vec<f32>,
}

impl FrameBatch {
    /// Creates an empty batch of `frames x channels` items.
    pub fn with_capacity(frames: usize, channels: usize, capacity: usize) -> Self {
        Self {
            batch: 0,
            frames,
            channels,
            data: Vec::with_capacity(capacity * frames * channels),
        }
    }

    /// Wraps a whole spectrogram as a batch of one.
    pub fn single(spec: Spectrogram) -> Self {
        Self {
            batch: 1,
            frames: spec.frames(),
            channels: spec.channels(),
            data: spec.into_vec(),
        }
    }

    /// Appends one `frames x channels` item.
    pub fn push(&mut self, item: &[f32]) -> Result<(), EncoderError> {
        let expected = self.frames * self.channels;
        if item.len() != expected {
            return Err(EncoderError::DimensionMismatch {
                expected,
                got: item.len(),
            });
        }
        self.data.extend_from_slice(item);
        self.batch += 1;
        Ok(())
    }

    /// Number of items in the batch.
    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns `[batch, frames, channels]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.batch, self.frames, self.channels]
    }

    /// Returns item `i` as a flat `frames x channels` slice.
    pub fn item(&self, i: usize) -> Option<&[f32]> {
        let size = self.frames * self.channels;
        let start = i.checked_mul(size)?;
        if i >= self.batch {
            return None;
        }
        self.data.get(start..start + size)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}
