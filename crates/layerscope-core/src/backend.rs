//! Boundary with the generative model.
//!
//! Everything behind [`ModelBackend`] (forward pass, tokenizer, logit
//! filtering) is owned by the backend. This crate only consumes the raw
//! tensors it hands back, one step at a time.

use serde::Deserialize;
use serde::Serialize;

use crate::error::BackendError;

pub type TokenId = u32;

/// Sampling parameters forwarded verbatim to [`ModelBackend::step`].
///
/// None of these are interpreted here; the backend applies its own filtering
/// before returning logits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub min_p: f32,
    pub repetition_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_k: 50,
            top_p: 1.0,
            min_p: 0.0,
            repetition_penalty: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub skip_special_tokens: bool,
}

impl DecodeOptions {
    pub const RAW: Self = Self {
        skip_special_tokens: false,
    };

    pub const CLEAN: Self = Self {
        skip_special_tokens: true,
    };
}

/// Attention weights for one layer, laid out as `[heads, queries, keys]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionWeights {
    pub heads: usize,
    pub queries: usize,
    pub keys: usize,
    pub weights: Vec<f32>,
}

impl AttentionWeights {
    pub fn new(heads: usize, queries: usize, keys: usize, weights: Vec<f32>) -> Self {
        Self {
            heads,
            queries,
            keys,
            weights,
        }
    }

    /// Number of elements implied by the declared dimensions.
    pub fn expected_len(&self) -> usize {
        self.heads
            .saturating_mul(self.queries)
            .saturating_mul(self.keys)
    }

    pub(crate) fn weight(&self, head: usize, query: usize, key: usize) -> f32 {
        self.weights[(head * self.queries + query) * self.keys + key]
    }
}

/// Raw tensors for one step. Consumed once by the measurement processor and
/// then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStepOutput {
    /// Next-token logits, one per vocabulary entry.
    pub logits: Vec<f32>,
    /// One flattened hidden-state tensor per layer.
    pub hidden_states: Vec<Vec<f32>>,
    pub attentions: Vec<AttentionWeights>,
}

pub trait Detokenizer {
    fn decode(&self, ids: &[TokenId], options: DecodeOptions) -> Result<String, BackendError>;
}

/// The generative model as seen by the generation driver.
pub trait ModelBackend: Detokenizer + Send {
    /// Human readable identity, shown in the dashboard title.
    fn model_identity(&self) -> String;

    fn tokenize(&mut self, prompt: &str) -> Result<Vec<TokenId>, BackendError>;

    /// Run one forward pass over `ids` and return logits, hidden states and
    /// attention weights for the newest position.
    fn step(
        &mut self,
        ids: &[TokenId],
        sampling: &SamplingConfig,
    ) -> Result<RawStepOutput, BackendError>;
}
