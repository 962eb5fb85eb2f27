//! Single-utterance embedding pipeline.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::aggregate;
use crate::config::FramingConfig;
use crate::error::EncoderError;
use crate::fbank::FeatureExtractor;
use crate::materialize::{materialize, Materialized};
use crate::model::{forward_checked, SpeakerModel};
use crate::plan::{compute_plan, Range};
use crate::spectrogram::FrameBatch;

/// Controls how [`embed_utterance`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedOptions {
    /// Split the utterance into partials and average their embeddings
    /// (default: true). When false the whole spectrogram is fed to the
    /// model at once.
    pub use_partials: bool,
    /// Also return the partial embeddings and their waveform ranges
    /// (default: false). Ignored when `use_partials` is false.
    pub return_partials: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            use_partials: true,
            return_partials: false,
        }
    }
}

/// Per-partial embeddings paired with the waveform range each one covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partials {
    embeddings: Vec<Vec<f32>>,
    wave_ranges: Vec<Range>,
}

impl Partials {
    /// Pairs embeddings with waveform ranges; both must have equal length.
    pub fn new(embeddings: Vec<Vec<f32>>, wave_ranges: Vec<Range>) -> Result<Self, EncoderError> {
        if embeddings.len() != wave_ranges.len() {
            return Err(EncoderError::Inconsistent(format!(
                "{} partial embeddings for {} waveform ranges",
                embeddings.len(),
                wave_ranges.len()
            )));
        }
        Ok(Self {
            embeddings,
            wave_ranges,
        })
    }

    /// Raw model outputs, one per partial, in temporal order.
    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Waveform range of each partial, in temporal order.
    pub fn wave_ranges(&self) -> &[Range] {
        &self.wave_ranges
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Iterates `(embedding, waveform range)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], Range)> {
        self.embeddings
            .iter()
            .map(Vec::as_slice)
            .zip(self.wave_ranges.iter().copied())
    }
}

/// Result of [`embed_utterance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtteranceEmbedding {
    /// The utterance embedding.
    pub embedding: Vec<f32>,
    /// Partial embeddings and ranges, present only when partials were
    /// used and requested.
    pub partials: Option<Partials>,
}

/// Computes the embedding of a single utterance.
///
/// With `use_partials`, the waveform is cut into overlapping partial
/// utterances ([`compute_plan`]), zero-padded, converted to a spectrogram
/// batch, embedded by `model`, and the partial embeddings are averaged and
/// L2-normalized. Without it, the whole spectrogram goes through `model`
/// as a batch of one and the output is returned as is.
pub fn embed_utterance(
    model: &dyn SpeakerModel,
    extractor: &dyn FeatureExtractor,
    wave: &[f32],
    opts: &EmbedOptions,
    framing: &FramingConfig,
) -> Result<UtteranceEmbedding, EncoderError> {
    if wave.is_empty() {
        return Err(EncoderError::InvalidInput("waveform is empty".into()));
    }

    if !opts.use_partials {
        let batch = FrameBatch::single(extractor.extract(wave)?);
        debug!(
            n_samples = wave.len(),
            frames = batch.frames(),
            "speaker-encoder: embedding whole utterance"
        );
        let embedding = forward_checked(model, &batch)?
            .into_iter()
            .next()
            .ok_or_else(|| EncoderError::Inconsistent("model returned no embedding".into()))?;
        return Ok(UtteranceEmbedding {
            embedding,
            partials: None,
        });
    }

    let plan = compute_plan(wave.len(), framing)?;
    let Materialized { batch, .. } = materialize(wave, &plan, extractor)?;
    let partial_embeds = forward_checked(model, &batch)?;
    let embedding = aggregate(&partial_embeds)?;

    debug!(
        n_samples = wave.len(),
        partials = plan.len(),
        padded_len = plan.padded_len(),
        "speaker-encoder: embedded utterance from partials"
    );

    let partials = if opts.return_partials {
        Some(Partials::new(partial_embeds, plan.wave_ranges())?)
    } else {
        None
    };
    Ok(UtteranceEmbedding {
        embedding,
        partials,
    })
}
