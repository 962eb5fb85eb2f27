//! Speaker embeddings from variable-length utterances.
//!
//! # Architecture
//!
//! An utterance embedding is computed in four stages:
//!
//! 1. [`compute_plan`]: waveform length -> overlapping partial utterances
//!    (paired waveform / spectrogram frame ranges)
//! 2. [`materialize()`]: zero-pad the waveform, extract its spectrogram and
//!    stack one slice per partial into a [`FrameBatch`]
//! 3. [`SpeakerModel::forward`]: batch -> one embedding per partial
//! 4. [`aggregate()`]: mean of the partial embeddings, L2-normalized
//!
//! [`embed_utterance`] runs the whole pipeline; [`SpeakerEncoder`] bundles
//! it with an explicitly loaded model.
//!
//! # Partial Utterances
//!
//! With the default [`FramingConfig`] (16kHz, 10ms frames, 160-frame
//! partials, 50% overlap, 75% minimum coverage) a 2s utterance yields:
//!
//! ```text
//! frames   [0, 160)   [80, 240)
//! samples  [0, 25600) [12800, 38400)   <- tail covers 0.75, kept
//! ```
//!
//! A trailing partial with less real audio than `min_pad_coverage` is
//! dropped, unless it is the only one.
//!
//! # Feature Extraction
//!
//! The [`fbank`] module provides a centered-frame mel filterbank whose
//! frame count always matches [`FramingConfig::frame_count`]. Any other
//! [`FeatureExtractor`] must keep that alignment.

pub mod aggregate;
pub mod config;
mod encoder;
mod error;
pub mod fbank;
pub mod materialize;
mod model;
pub mod plan;
mod spectrogram;
mod utterance;

pub use aggregate::{aggregate, l2_norm};
pub use config::{FramingConfig, FramingParams};
pub use encoder::SpeakerEncoder;
pub use error::EncoderError;
pub use fbank::{FeatureExtractor, MelConfig, MelFilterbank};
pub use materialize::{materialize, pad_waveform, slice_frames, Materialized};
pub use model::SpeakerModel;
pub use plan::{compute_plan, Range, Segment, SegmentPlan};
pub use spectrogram::{FrameBatch, Spectrogram};
pub use utterance::{embed_utterance, EmbedOptions, Partials, UtteranceEmbedding};
