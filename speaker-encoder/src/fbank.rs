//! Mel filterbank feature extraction with centered frames.
//!
//! The encoder's geometry assumes the extractor yields
//! `ceil((n_samples + 1) / hop)` frames, i.e. one frame centered on every
//! hop boundary from sample 0 up to and including sample `n_samples`.
//! [`MelFilterbank`] frames the signal that way by reflecting it around
//! both ends, so its output always lines up with
//! [`FramingConfig::frame_count`](crate::FramingConfig::frame_count).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::{FramingConfig, MEL_N_CHANNELS, MEL_WINDOW_LENGTH_MS, SAMPLING_RATE};
use crate::error::EncoderError;
use crate::spectrogram::Spectrogram;

/// Turns a waveform into a `[frames][channels]` spectrogram.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use.
pub trait FeatureExtractor: Send + Sync {
    /// Computes the spectrogram of a mono waveform.
    fn extract(&self, wave: &[f32]) -> Result<Spectrogram, EncoderError>;

    /// Number of channels per frame.
    fn channels(&self) -> usize;
}

/// Configures mel filterbank feature extraction.
///
/// Defaults produce 40-channel mel power frames from 25ms periodic Hann
/// windows every 10ms at 16kHz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelConfig {
    /// Input sample rate in Hz (default: 16000).
    pub sample_rate: usize,
    /// Number of mel filterbank channels (default: 40).
    pub num_mels: usize,
    /// Window length in samples (default: 400 = 25ms @ 16kHz).
    pub window_length: usize,
    /// Hop between frame centers in samples (default: 160 = 10ms @ 16kHz).
    pub hop_length: usize,
    /// FFT length; a power of two no shorter than the window (default: 512).
    pub fft_size: usize,
    /// Low cutoff frequency for mel bins (default: 0 Hz).
    pub low_freq: f64,
    /// High cutoff frequency, non-positive = offset from Nyquist (default: 0).
    pub high_freq: f64,
    /// Take the natural log of mel energies (default: false).
    pub log_mel: bool,
    /// Floor for mel energies (default: 1e-10).
    pub energy_floor: f64,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLING_RATE as usize,
            num_mels: MEL_N_CHANNELS,
            window_length: 400, // 25ms @ 16kHz
            hop_length: 160,    // 10ms @ 16kHz
            fft_size: 512,
            low_freq: 0.0,
            high_freq: 0.0,
            log_mel: false,
            energy_floor: 1e-10,
        }
    }
}

impl MelConfig {
    /// Derives sample rate and hop from `framing` so the spectrogram lines
    /// up with the partial-utterance geometry.
    pub fn from_framing(framing: &FramingConfig) -> Self {
        let sample_rate = framing.sampling_rate() as usize;
        let window_length = (sample_rate * MEL_WINDOW_LENGTH_MS as usize / 1000).max(1);
        Self {
            sample_rate,
            window_length,
            hop_length: framing.samples_per_frame(),
            fft_size: window_length.next_power_of_two(),
            ..Self::default()
        }
    }
}

/// Mel filterbank extractor over centered, reflect-padded frames.
///
/// For `n` input samples the output has `n / hop_length + 1` frames.
#[derive(Debug)]
pub struct MelFilterbank {
    cfg: MelConfig,
    window: Vec<f64>,
    twiddles: Vec<(f64, f64)>,
    filterbank: Vec<MelFilter>,
}

/// Nonzero span of one triangular filter over the power spectrum.
#[derive(Debug)]
struct MelFilter {
    first_bin: usize,
    weights: Vec<f64>,
}

impl MelFilterbank {
    /// Creates an extractor, validating the configuration.
    pub fn new(cfg: MelConfig) -> Result<Self, EncoderError> {
        if cfg.sample_rate == 0 || cfg.hop_length == 0 || cfg.window_length == 0 || cfg.num_mels == 0 {
            return Err(EncoderError::InvalidConfig(format!(
                "mel config needs positive sample_rate, hop_length, window_length and num_mels: {cfg:?}"
            )));
        }
        if !cfg.fft_size.is_power_of_two() || cfg.fft_size < cfg.window_length {
            return Err(EncoderError::InvalidConfig(format!(
                "fft_size {} must be a power of two >= window_length {}",
                cfg.fft_size, cfg.window_length
            )));
        }
        let nyquist = cfg.sample_rate as f64 / 2.0;
        let high_freq = resolve_high_freq(&cfg);
        if !(cfg.low_freq >= 0.0 && cfg.low_freq < high_freq && high_freq <= nyquist) {
            return Err(EncoderError::InvalidConfig(format!(
                "mel band [{}, {high_freq}] Hz must lie within [0, {nyquist}]",
                cfg.low_freq
            )));
        }
        Ok(Self::build(cfg))
    }

    fn build(cfg: MelConfig) -> Self {
        let filterbank = mel_filters(&cfg);
        Self {
            window: hann_window(cfg.window_length),
            twiddles: twiddles(cfg.fft_size),
            filterbank,
            cfg,
        }
    }

    pub fn config(&self) -> &MelConfig {
        &self.cfg
    }

    /// Number of frames produced for `n_samples` input samples.
    pub fn num_frames(&self, n_samples: usize) -> usize {
        n_samples / self.cfg.hop_length + 1
    }
}

impl Default for MelFilterbank {
    fn default() -> Self {
        Self::build(MelConfig::default())
    }
}

impl FeatureExtractor for MelFilterbank {
    fn extract(&self, wave: &[f32]) -> Result<Spectrogram, EncoderError> {
        let cfg = &self.cfg;
        let n = wave.len();
        if n == 0 {
            return Err(EncoderError::InvalidInput("waveform is empty".into()));
        }

        let num_frames = self.num_frames(n);
        let half_window = (cfg.window_length / 2) as isize;

        let mut data = Vec::with_capacity(num_frames * cfg.num_mels);
        let mut fft_buf = vec![(0.0f64, 0.0f64); cfg.fft_size];
        let mut power_spec = vec![0.0f64; cfg.fft_size / 2 + 1];

        for f in 0..num_frames {
            let origin = (f * cfg.hop_length) as isize - half_window;

            fft_buf.fill((0.0, 0.0));
            for (i, (slot, w)) in fft_buf.iter_mut().zip(&self.window).enumerate() {
                let idx = reflect(origin + i as isize, n);
                *slot = (wave[idx] as f64 * w, 0.0);
            }
            fft(&mut fft_buf, &self.twiddles);

            for (p, &(re, im)) in power_spec.iter_mut().zip(&fft_buf) {
                *p = re * re + im * im;
            }

            for filter in &self.filterbank {
                let bins = &power_spec[filter.first_bin..filter.first_bin + filter.weights.len()];
                let energy: f64 = filter.weights.iter().zip(bins).map(|(w, p)| w * p).sum();
                let energy = energy.max(cfg.energy_floor);
                let value = if cfg.log_mel { energy.ln() } else { energy };
                data.push(value as f32);
            }
        }

        Spectrogram::new(cfg.num_mels, data)
    }

    fn channels(&self) -> usize {
        self.cfg.num_mels
    }
}

fn resolve_high_freq(cfg: &MelConfig) -> f64 {
    if cfg.high_freq <= 0.0 {
        cfg.sample_rate as f64 / 2.0 + cfg.high_freq
    } else {
        cfg.high_freq
    }
}

/// Maps an out-of-range sample index back into `[0, n)` by mirroring
/// around the edge samples (edges are not repeated).
fn reflect(idx: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut i = idx.rem_euclid(period);
    if i >= n as isize {
        i = period - i;
    }
    i as usize
}

/// Periodic Hann window.
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters with edges equally spaced on the mel scale between
/// `low_freq` and the resolved high cutoff, snapped down to FFT bins.
fn mel_filters(cfg: &MelConfig) -> Vec<MelFilter> {
    let last_bin = cfg.fft_size / 2;
    let mel_low = hz_to_mel(cfg.low_freq);
    let mel_step = (hz_to_mel(resolve_high_freq(cfg)) - mel_low) / (cfg.num_mels + 1) as f64;
    let hz_per_bin = cfg.sample_rate as f64 / cfg.fft_size as f64;

    let edges: Vec<usize> = (0..cfg.num_mels + 2)
        .map(|i| {
            let bin = (mel_to_hz(mel_low + i as f64 * mel_step) / hz_per_bin).floor();
            (bin.max(0.0) as usize).min(last_bin)
        })
        .collect();

    edges
        .windows(3)
        .map(|e| {
            let (left, center, right) = (e[0], e[1], e[2]);
            let weights = (left..=right)
                .map(|k| {
                    if k < center {
                        (k - left) as f64 / (center - left) as f64
                    } else if k > center {
                        (right - k) as f64 / (right - center) as f64
                    } else if center > left || right > center {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect();
            MelFilter {
                first_bin: left,
                weights,
            }
        })
        .collect()
}

/// Twiddle factors `e^{-2 pi i k / n}` for `k < n / 2`.
fn twiddles(n: usize) -> Vec<(f64, f64)> {
    (0..n / 2)
        .map(|k| {
            let angle = -2.0 * PI * k as f64 / n as f64;
            (angle.cos(), angle.sin())
        })
        .collect()
}

/// In-place iterative radix-2 FFT over `(re, im)` pairs. `x.len()` must be
/// a power of two and `twiddles` must come from [`twiddles`] for that length.
fn fft(x: &mut [(f64, f64)], twiddles: &[(f64, f64)]) {
    let n = x.len();
    if n <= 1 {
        return;
    }

    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            x.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let stride = n / len;
        for block in x.chunks_exact_mut(len) {
            let (lo, hi) = block.split_at_mut(half);
            for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                let (wr, wi) = twiddles[k * stride];
                let t = (wr * b.0 - wi * b.1, wr * b.1 + wi * b.0);
                *b = (a.0 - t.0, a.1 - t.1);
                *a = (a.0 + t.0, a.1 + t.1);
            }
        }
        len <<= 1;
    }
}
