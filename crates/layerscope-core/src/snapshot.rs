use serde::Serialize;

use crate::backend::TokenId;

/// A value prepared for a bar chart: the scaled, clamped magnitude (sign kept)
/// and the number of glyphs to draw for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedValue {
    pub magnitude: f32,
    pub bar_length: usize,
}

impl NormalizedValue {
    pub const ZERO: Self = Self {
        magnitude: 0.0,
        bar_length: 0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenCandidate {
    pub token_id: TokenId,
    /// Decoded text, trimmed and cut to the display width. Never empty.
    pub text: String,
    pub probability: f32,
    pub logit: f32,
}

/// Display-ready measurements for one generation step.
///
/// Built once by [`crate::MeasurementProcessor`] and shared read-only (behind
/// an `Arc`) with every consumer. The next step produces a new snapshot
/// instead of touching this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSnapshot {
    /// Zero-based step index within the run.
    pub step: usize,
    /// One signed aggregate magnitude per hidden-state layer.
    pub layer_activations: Vec<f32>,
    pub layer_activations_normalized: Vec<NormalizedValue>,
    /// One non-negative entropy value per attention layer.
    pub layer_entropy: Vec<f32>,
    pub layer_entropy_normalized: Vec<NormalizedValue>,
    /// Everything decoded so far, excluding the newest token.
    pub generated_text: String,
    pub predicted_token_id: TokenId,
    pub predicted_token_text: String,
    /// Softmax of the step's logits; sums to 1.
    pub next_token_distribution: Vec<f32>,
    /// Highest-probability candidates, most likely first.
    pub top_candidates: Vec<TokenCandidate>,
    /// Decoded text of the most recent tokens, oldest first, newest last.
    pub recent_tokens: Vec<String>,
}

impl MeasurementSnapshot {
    /// Uncertainty measure handed to the sonifier: entropy of the first
    /// attention layer.
    pub fn uncertainty(&self) -> f32 {
        self.layer_entropy.first().copied().unwrap_or(0.0)
    }
}
