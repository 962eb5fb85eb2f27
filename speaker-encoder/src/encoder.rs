//! Caller-owned speaker model handle.

use parking_lot::RwLock;
use tracing::info;

use crate::config::FramingConfig;
use crate::error::EncoderError;
use crate::fbank::{FeatureExtractor, MelConfig, MelFilterbank};
use crate::model::{forward_checked, SpeakerModel};
use crate::spectrogram::FrameBatch;
use crate::utterance::{embed_utterance, EmbedOptions, UtteranceEmbedding};

/// Holds a feature extractor, a framing configuration and an optionally
/// loaded [`SpeakerModel`].
///
/// The model is loaded explicitly with [`SpeakerEncoder::load`] and
/// released with [`SpeakerEncoder::close`]; embedding before a model is
/// loaded fails with [`EncoderError::ModelNotLoaded`].
///
/// # Thread Safety
///
/// SpeakerEncoder is safe for concurrent use. Embedding calls share a read
/// lock on the model; `load` and `close` wait for them to finish.
pub struct SpeakerEncoder {
    framing: FramingConfig,
    extractor: Box<dyn FeatureExtractor>,
    model: RwLock<Option<Box<dyn SpeakerModel>>>,
}

impl SpeakerEncoder {
    /// Creates an encoder with a [`MelFilterbank`] matched to `framing`.
    /// No model is loaded.
    pub fn new(framing: FramingConfig) -> Result<Self, EncoderError> {
        let extractor = MelFilterbank::new(MelConfig::from_framing(&framing))?;
        Ok(Self::with_extractor(framing, Box::new(extractor)))
    }

    /// Creates an encoder with a custom feature extractor. The extractor
    /// must yield [`FramingConfig::frame_count`] frames per waveform.
    pub fn with_extractor(framing: FramingConfig, extractor: Box<dyn FeatureExtractor>) -> Self {
        Self {
            framing,
            extractor,
            model: RwLock::new(None),
        }
    }

    /// Loads `model` at construction time.
    pub fn with_model(self, model: Box<dyn SpeakerModel>) -> Self {
        self.load(model);
        self
    }

    /// Loads a model, replacing any previously loaded one.
    pub fn load(&self, model: Box<dyn SpeakerModel>) {
        let embedding_size = model.embedding_size();
        *self.model.write() = Some(model);
        info!(embedding_size, "speaker-encoder: model loaded");
    }

    /// Reports whether a model is loaded.
    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    /// Releases the loaded model, if any.
    pub fn close(&self) {
        if self.model.write().take().is_some() {
            info!("speaker-encoder: model closed");
        }
    }

    /// Embedding dimensionality of the loaded model.
    pub fn embedding_size(&self) -> Option<usize> {
        self.model.read().as_ref().map(|m| m.embedding_size())
    }

    pub fn framing(&self) -> &FramingConfig {
        &self.framing
    }

    pub fn extractor(&self) -> &dyn FeatureExtractor {
        self.extractor.as_ref()
    }

    /// Computes embeddings for a `[batch, frames, channels]` batch of
    /// spectrogram slices.
    pub fn embed_frames_batch(&self, batch: &FrameBatch) -> Result<Vec<Vec<f32>>, EncoderError> {
        let guard = self.model.read();
        let model = guard.as_deref().ok_or(EncoderError::ModelNotLoaded)?;
        forward_checked(model, batch)
    }

    /// Computes the embedding of a single utterance with the loaded model.
    /// See [`embed_utterance`].
    pub fn embed_utterance(
        &self,
        wave: &[f32],
        opts: &EmbedOptions,
    ) -> Result<UtteranceEmbedding, EncoderError> {
        let guard = self.model.read();
        let model = guard.as_deref().ok_or(EncoderError::ModelNotLoaded)?;
        embed_utterance(model, self.extractor.as_ref(), wave, opts, &self.framing)
    }
}
