//! A small, deterministic character-level model.
//!
//! It has no weights worth the name: logits are an English letter-frequency
//! prior perturbed by noise derived from the recent context, and hidden
//! states and attention weights are shaped like a real transformer's. That
//! is enough to drive the whole dashboard without a model runtime.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::backend::AttentionWeights;
use crate::backend::DecodeOptions;
use crate::backend::Detokenizer;
use crate::backend::ModelBackend;
use crate::backend::RawStepOutput;
use crate::backend::SamplingConfig;
use crate::backend::TokenId;
use crate::error::BackendError;

/// Beginning-of-sequence marker, the only special token.
pub const BOS: TokenId = 0;

const FIRST_CHAR: char = ' ';
const LAST_CHAR: char = '~';

/// BOS plus every printable ASCII character.
pub const VOCAB_SIZE: usize = 1 + (LAST_CHAR as usize - FIRST_CHAR as usize + 1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticConfig {
    pub layers: usize,
    pub heads: usize,
    pub hidden_size: usize,
    /// Only the most recent `attention_window` positions are attended to.
    pub attention_window: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            layers: 6,
            heads: 4,
            hidden_size: 16,
            attention_window: 32,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    config: SyntheticConfig,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    fn token_for(c: char) -> TokenId {
        let c = if (FIRST_CHAR..=LAST_CHAR).contains(&c) {
            c
        } else {
            '?'
        };
        (c as u32 - FIRST_CHAR as u32) + 1
    }

    fn char_for(id: TokenId) -> Option<char> {
        if id == BOS {
            return None;
        }
        (FIRST_CHAR as u32)
            .checked_add(id - 1)
            .and_then(char::from_u32)
            .filter(|c| *c <= LAST_CHAR)
    }

    fn context_rng(&self, ids: &[TokenId]) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.config.seed.hash(&mut hasher);
        ids.len().hash(&mut hasher);
        let tail = ids.len().saturating_sub(4);
        ids[tail..].hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    fn logits(rng: &mut StdRng, ids: &[TokenId]) -> Vec<f32> {
        let previous = ids.last().copied().and_then(Self::char_for);
        (0..VOCAB_SIZE)
            .map(|index| {
                let Some(c) = TokenId::try_from(index).ok().and_then(Self::char_for) else {
                    return f32::NEG_INFINITY;
                };
                let mut logit = letter_prior(c);
                // Discourage doubled spaces and punctuation runs.
                if previous == Some(c) && !c.is_ascii_alphabetic() {
                    logit -= 3.0;
                }
                if previous.is_some_and(|p| p.is_ascii_punctuation()) && c == ' ' {
                    logit += 2.0;
                }
                logit + rng.random_range(-0.75..0.75)
            })
            .collect()
    }

    fn hidden_states(&self, rng: &mut StdRng, ids: &[TokenId]) -> Vec<Vec<f32>> {
        let newest = ids.last().copied().unwrap_or(BOS) as f32;
        // Embedding layer plus one output per transformer block.
        (0..=self.config.layers)
            .map(|layer| {
                let depth = 1.0 + layer as f32 * 0.35;
                (0..self.config.hidden_size)
                    .map(|unit| {
                        let carrier = (newest * 0.37 + unit as f32 * 1.3 + layer as f32).sin();
                        depth * carrier + rng.random_range(-0.5..0.5)
                    })
                    .collect()
            })
            .collect()
    }

    fn attentions(&self, rng: &mut StdRng, ids: &[TokenId]) -> Vec<AttentionWeights> {
        let keys = ids.len().min(self.config.attention_window.max(1));
        let heads = self.config.heads.max(1);
        (0..self.config.layers)
            .map(|layer| {
                // Deeper layers attend more sharply.
                let sharpness = 0.5 + layer as f32 * 0.6;
                let mut weights = Vec::with_capacity(heads * keys);
                for _ in 0..heads {
                    let scores: Vec<f32> = (0..keys)
                        .map(|key| {
                            let recency = (key + 1) as f32 / keys as f32;
                            sharpness * recency * 3.0 + rng.random_range(0.0..1.0)
                        })
                        .collect();
                    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
                    let total: f32 = exps.iter().sum();
                    weights.extend(exps.iter().map(|e| e / total));
                }
                AttentionWeights::new(heads, 1, keys, weights)
            })
            .collect()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl Detokenizer for SyntheticBackend {
    fn decode(&self, ids: &[TokenId], options: DecodeOptions) -> Result<String, BackendError> {
        let mut text = String::with_capacity(ids.len());
        for &id in ids {
            if id == BOS {
                if !options.skip_special_tokens {
                    text.push_str("<bos>");
                }
                continue;
            }
            match Self::char_for(id) {
                Some(c) => text.push(c),
                None => return Err(BackendError::new(format!("token id {id} is out of range"))),
            }
        }
        Ok(text)
    }
}

impl ModelBackend for SyntheticBackend {
    fn model_identity(&self) -> String {
        format!("synthetic-char-lm ({} layers)", self.config.layers)
    }

    fn tokenize(&mut self, prompt: &str) -> Result<Vec<TokenId>, BackendError> {
        let mut ids = Vec::with_capacity(prompt.len() + 1);
        ids.push(BOS);
        ids.extend(prompt.chars().map(Self::token_for));
        Ok(ids)
    }

    /// Sampling parameters are accepted and ignored; the logits are already
    /// the final distribution.
    fn step(
        &mut self,
        ids: &[TokenId],
        _sampling: &SamplingConfig,
    ) -> Result<RawStepOutput, BackendError> {
        if ids.is_empty() {
            return Err(BackendError::new("cannot step an empty sequence"));
        }
        if self.config.layers == 0 || self.config.hidden_size == 0 {
            return Err(BackendError::new("synthetic model has no layers"));
        }
        let mut rng = self.context_rng(ids);
        Ok(RawStepOutput {
            logits: Self::logits(&mut rng, ids),
            hidden_states: self.hidden_states(&mut rng, ids),
            attentions: self.attentions(&mut rng, ids),
        })
    }
}

fn letter_prior(c: char) -> f32 {
    match c.to_ascii_lowercase() {
        ' ' => 3.2,
        'e' => 2.6,
        't' | 'a' => 2.2,
        'o' | 'i' | 'n' => 2.0,
        's' | 'h' | 'r' => 1.8,
        'd' | 'l' => 1.4,
        'c' | 'u' | 'm' | 'w' | 'f' => 1.0,
        'g' | 'y' | 'p' | 'b' => 0.7,
        'v' | 'k' => 0.2,
        'j' | 'x' | 'q' | 'z' => -0.6,
        '.' | ',' => 0.3,
        _ => -2.0,
    }
}
