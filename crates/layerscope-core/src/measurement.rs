//! Turns one step's raw tensors into a [`MeasurementSnapshot`].
//!
//! The processor knows nothing about rendering. Everything here is a pure
//! function of the raw output, the id sequence and the [`MeasurementConfig`].

use std::cmp::Ordering;

use crate::backend::AttentionWeights;
use crate::backend::DecodeOptions;
use crate::backend::Detokenizer;
use crate::backend::RawStepOutput;
use crate::backend::TokenId;
use crate::config_types::AggregationStrategy;
use crate::config_types::MeasurementConfig;
use crate::config_types::ScaleType;
use crate::error::CoreError;
use crate::error::Result;
use crate::snapshot::MeasurementSnapshot;
use crate::snapshot::NormalizedValue;
use crate::snapshot::TokenCandidate;

/// Number of candidates kept in [`MeasurementSnapshot::top_candidates`].
pub const TOP_K: usize = 20;

/// Candidate texts are cut to this many characters.
pub const CANDIDATE_DISPLAY_WIDTH: usize = 10;

/// Length of [`MeasurementSnapshot::recent_tokens`].
pub const RECENT_TOKEN_HISTORY: usize = 20;

/// Whether a value set may go negative once normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Signed,
    Unsigned,
}

/// Where in the run a step sits, as seen by the processor.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub step: usize,
    /// Full id sequence, newest sampled id last.
    pub ids: &'a [TokenId],
    /// Decoded text of the previous tokens, oldest first.
    pub history: &'a [String],
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementProcessor {
    config: MeasurementConfig,
}

impl MeasurementProcessor {
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    pub fn process<D>(
        &self,
        raw: RawStepOutput,
        context: StepContext<'_>,
        decoder: &D,
    ) -> Result<MeasurementSnapshot>
    where
        D: Detokenizer + ?Sized,
    {
        validate(&raw)?;
        let Some((&predicted_token_id, prefix)) = context.ids.split_last() else {
            return Err(CoreError::malformed("token sequence is empty"));
        };

        let layer_activations: Vec<f32> = raw
            .hidden_states
            .iter()
            .map(|layer| aggregate_layer(layer, self.config.aggregation))
            .collect();
        let layer_entropy: Vec<f32> = raw.attentions.iter().map(attention_entropy).collect();

        let layer_activations_normalized = normalize_activations(&layer_activations, &self.config);
        let layer_entropy_normalized = normalize_entropy(&layer_entropy, &self.config);

        let next_token_distribution = softmax(&raw.logits)?;
        let top_candidates = top_candidates(&raw.logits, &next_token_distribution, decoder)?;

        let generated_text = decoder.decode(prefix, DecodeOptions::CLEAN)?;
        let predicted_token_text = decoder.decode(&[predicted_token_id], DecodeOptions::RAW)?;

        let keep = RECENT_TOKEN_HISTORY.saturating_sub(1);
        let mut recent_tokens: Vec<String> = context.history
            [context.history.len().saturating_sub(keep)..]
            .to_vec();
        recent_tokens.push(predicted_token_text.clone());

        Ok(MeasurementSnapshot {
            step: context.step,
            layer_activations,
            layer_activations_normalized,
            layer_entropy,
            layer_entropy_normalized,
            generated_text,
            predicted_token_id,
            predicted_token_text,
            next_token_distribution,
            top_candidates,
            recent_tokens,
        })
    }
}

fn validate(raw: &RawStepOutput) -> Result<()> {
    if raw.logits.is_empty() {
        return Err(CoreError::malformed("logits are empty"));
    }
    if raw.logits.iter().any(|logit| logit.is_nan()) {
        return Err(CoreError::malformed("logits contain NaN"));
    }
    if raw.hidden_states.is_empty() {
        return Err(CoreError::malformed("no hidden-state layers"));
    }
    for (index, layer) in raw.hidden_states.iter().enumerate() {
        if layer.is_empty() {
            return Err(CoreError::malformed(format!(
                "hidden-state layer {index} is empty"
            )));
        }
        if layer.iter().any(|value| !value.is_finite()) {
            return Err(CoreError::malformed(format!(
                "hidden-state layer {index} contains non-finite values"
            )));
        }
    }
    if raw.attentions.is_empty() {
        return Err(CoreError::malformed("no attention layers"));
    }
    for (index, attention) in raw.attentions.iter().enumerate() {
        if attention.heads == 0 || attention.queries == 0 || attention.keys == 0 {
            return Err(CoreError::malformed(format!(
                "attention layer {index} has a zero dimension ({} x {} x {})",
                attention.heads, attention.queries, attention.keys
            )));
        }
        if attention.weights.len() != attention.expected_len() {
            return Err(CoreError::malformed(format!(
                "attention layer {index} has {} weights, expected {}",
                attention.weights.len(),
                attention.expected_len()
            )));
        }
        if attention.weights.iter().any(|weight| !weight.is_finite()) {
            return Err(CoreError::malformed(format!(
                "attention layer {index} contains non-finite weights"
            )));
        }
    }
    Ok(())
}

/// Reduce a flattened layer to one signed magnitude. The sign is that of the
/// element with the largest absolute value.
pub fn aggregate_layer(values: &[f32], strategy: AggregationStrategy) -> f32 {
    let dominant = values
        .iter()
        .copied()
        .fold(0.0_f32, |best, value| if value.abs() > best.abs() { value } else { best });
    let magnitude = match strategy {
        AggregationStrategy::L2 => values.iter().map(|value| value * value).sum::<f32>().sqrt(),
        AggregationStrategy::MaxAbs => dominant.abs(),
    };
    if dominant < 0.0 { -magnitude } else { magnitude }
}

/// Mean Shannon entropy (nats) of the head-averaged attention rows.
pub fn attention_entropy(attention: &AttentionWeights) -> f32 {
    if attention.heads == 0 || attention.queries == 0 {
        return 0.0;
    }
    let heads = attention.heads as f64;
    let mut total = 0.0_f64;
    for query in 0..attention.queries {
        let mut row_entropy = 0.0_f64;
        for key in 0..attention.keys {
            let mean = (0..attention.heads)
                .map(|head| f64::from(attention.weight(head, query, key)))
                .sum::<f64>()
                / heads;
            if mean > 0.0 {
                row_entropy -= mean * mean.ln();
            }
        }
        total += row_entropy;
    }
    (total / attention.queries as f64).max(0.0) as f32
}

pub fn normalize_activations(values: &[f32], config: &MeasurementConfig) -> Vec<NormalizedValue> {
    normalize(values, config, Polarity::Signed)
}

pub fn normalize_entropy(values: &[f32], config: &MeasurementConfig) -> Vec<NormalizedValue> {
    normalize(values, config, Polarity::Unsigned)
}

/// Bounds come from this value set alone; nothing carries over between steps.
fn normalize(values: &[f32], config: &MeasurementConfig, polarity: Polarity) -> Vec<NormalizedValue> {
    let limit = config.max_bar_length as f32;
    let lower = match polarity {
        Polarity::Signed => -limit,
        Polarity::Unsigned => 0.0,
    };

    let scaled: Vec<f32> = match config.scale {
        ScaleType::Linear => values
            .iter()
            .map(|value| value * config.linear_scale)
            .collect(),
        ScaleType::Log => values
            .iter()
            .map(|value| value.signum() * value.abs().ln_1p() * config.linear_scale)
            .collect(),
        ScaleType::MinMax => {
            let min = values.iter().copied().fold(f32::INFINITY, f32::min);
            let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let span = max - min;
            if span.is_nan() || span <= 0.0 {
                return vec![NormalizedValue::ZERO; values.len()];
            }
            values
                .iter()
                .map(|value| {
                    let unit = (value - min) / span;
                    match polarity {
                        Polarity::Signed => lower + unit * 2.0 * limit,
                        Polarity::Unsigned => unit * limit,
                    }
                })
                .collect()
        }
    };

    scaled
        .into_iter()
        .map(|value| {
            let magnitude = if value.is_nan() { 0.0 } else { value.clamp(lower, limit) };
            NormalizedValue {
                magnitude,
                bar_length: (magnitude.abs().floor() as usize).min(config.max_bar_length),
            }
        })
        .collect()
}

/// Softmax over the logits. Filtered entries (`-inf`) get probability 0.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Err(CoreError::malformed(format!(
            "logits have no finite maximum (max = {max})"
        )));
    }
    let exps: Vec<f64> = logits
        .iter()
        .map(|logit| f64::from(logit - max).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|exp| (exp / sum) as f32).collect())
}

fn top_candidates<D>(
    logits: &[f32],
    distribution: &[f32],
    decoder: &D,
) -> Result<Vec<TokenCandidate>>
where
    D: Detokenizer + ?Sized,
{
    let mut order: Vec<usize> = (0..distribution.len()).collect();
    order.sort_by(|&a, &b| {
        distribution[b]
            .partial_cmp(&distribution[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    order
        .into_iter()
        .take(TOP_K)
        .map(|index| {
            let token_id = TokenId::try_from(index)
                .map_err(|_| CoreError::malformed(format!("vocabulary index {index} overflows")))?;
            let decoded = decoder.decode(&[token_id], DecodeOptions::RAW)?;
            Ok(TokenCandidate {
                token_id,
                text: candidate_text(&decoded),
                probability: distribution[index],
                logit: logits[index],
            })
        })
        .collect()
}

fn candidate_text(decoded: &str) -> String {
    let text: String = decoded.trim().chars().take(CANDIDATE_DISPLAY_WIDTH).collect();
    if text.is_empty() {
        " ".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use pretty_assertions::assert_eq;

    struct Letters;

    impl Detokenizer for Letters {
        fn decode(
            &self,
            ids: &[TokenId],
            _options: DecodeOptions,
        ) -> std::result::Result<String, BackendError> {
            Ok(ids
                .iter()
                .map(|id| match id {
                    0 => ' ',
                    id => char::from(b'a' + (*id as u8 - 1) % 26),
                })
                .collect())
        }
    }

    fn config(scale: ScaleType) -> MeasurementConfig {
        MeasurementConfig {
            scale,
            max_bar_length: 10,
            ..MeasurementConfig::default()
        }
    }

    fn uniform_attention(keys: usize) -> AttentionWeights {
        AttentionWeights::new(2, 1, keys, vec![1.0 / keys as f32; 2 * keys])
    }

    fn raw_output() -> RawStepOutput {
        RawStepOutput {
            logits: (0..30).map(|i| i as f32 * 0.1).collect(),
            hidden_states: vec![vec![1.0, -2.0], vec![3.0, 4.0], vec![-0.5, 0.25]],
            attentions: vec![uniform_attention(4), uniform_attention(2)],
        }
    }

    #[test]
    fn l2_keeps_sign_of_dominant_element() {
        assert_eq!(aggregate_layer(&[3.0, 4.0], AggregationStrategy::L2), 5.0);
        assert_eq!(aggregate_layer(&[-3.0, 4.0], AggregationStrategy::L2), 5.0);
        assert_eq!(aggregate_layer(&[3.0, -4.0], AggregationStrategy::L2), -5.0);
    }

    #[test]
    fn max_abs_picks_largest_magnitude() {
        assert_eq!(aggregate_layer(&[0.5, -7.0, 6.0], AggregationStrategy::MaxAbs), -7.0);
        assert_eq!(aggregate_layer(&[0.5, 2.0], AggregationStrategy::MaxAbs), 2.0);
    }

    #[test]
    fn peaked_attention_has_zero_entropy() {
        let weights = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let attention = AttentionWeights::new(2, 1, 4, weights);
        assert!(attention_entropy(&attention).abs() < 1e-6);
    }

    #[test]
    fn uniform_attention_entropy_is_ln_n() {
        for keys in [2_usize, 5, 16] {
            let entropy = attention_entropy(&uniform_attention(keys));
            assert!((entropy - (keys as f32).ln()).abs() < 1e-5, "keys={keys}: {entropy}");
        }
    }

    #[test]
    fn entropy_averages_heads_before_rows() {
        // Head 0 looks at key 0, head 1 at key 1: the averaged row is uniform.
        let attention = AttentionWeights::new(2, 1, 2, vec![1.0, 0.0, 0.0, 1.0]);
        assert!((attention_entropy(&attention) - 2_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn linear_scale_clamps_to_bar_limit() {
        let normalized = normalize_activations(&[3.4, -25.0, 12.0], &config(ScaleType::Linear));
        let bars: Vec<usize> = normalized.iter().map(|value| value.bar_length).collect();
        assert_eq!(bars, vec![3, 10, 10]);
        assert_eq!(normalized[1].magnitude, -10.0);

        let entropy = normalize_entropy(&[-1.0, 4.0], &config(ScaleType::Linear));
        assert_eq!(entropy[0], NormalizedValue::ZERO);
        assert_eq!(entropy[1].bar_length, 4);
    }

    #[test]
    fn log_scale_preserves_sign() {
        let normalized = normalize_activations(&[-20.0, 0.0, 1000.0], &config(ScaleType::Log));
        assert!((normalized[0].magnitude + 21_f32.ln()).abs() < 1e-5);
        assert_eq!(normalized[0].bar_length, 3);
        assert_eq!(normalized[1].bar_length, 0);
        // ln(1001) ~ 6.9: large outliers no longer saturate the bar.
        assert_eq!(normalized[2].bar_length, 6);
    }

    #[test]
    fn minmax_with_identical_values_renders_zero_bars() {
        let activations = normalize_activations(&[2.5; 4], &config(ScaleType::MinMax));
        let entropy = normalize_entropy(&[0.7; 3], &config(ScaleType::MinMax));
        assert!(activations.iter().all(|value| value.bar_length == 0));
        assert!(entropy.iter().all(|value| value.bar_length == 0));
        assert_eq!(activations.len(), 4);
        assert_eq!(entropy.len(), 3);
    }

    #[test]
    fn minmax_spans_the_full_range() {
        let activations = normalize_activations(&[1.0, 2.0, 3.0], &config(ScaleType::MinMax));
        let magnitudes: Vec<f32> = activations.iter().map(|value| value.magnitude).collect();
        assert_eq!(magnitudes, vec![-10.0, 0.0, 10.0]);

        let entropy = normalize_entropy(&[1.0, 2.0, 3.0], &config(ScaleType::MinMax));
        let bars: Vec<usize> = entropy.iter().map(|value| value.bar_length).collect();
        assert_eq!(bars, vec![0, 5, 10]);
    }

    #[test]
    fn softmax_sums_to_one() {
        for logits in [
            vec![0.0_f32; 7],
            vec![100.0, -100.0, 3.0],
            vec![f32::NEG_INFINITY, 2.0, 1.0],
            (0..50_000).map(|i| (i % 97) as f32 * 0.31).collect(),
        ] {
            let distribution = softmax(&logits).unwrap_or_default();
            let sum: f32 = distribution.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "sum = {sum}");
        }
    }

    #[test]
    fn softmax_rejects_fully_filtered_logits() {
        assert!(matches!(
            softmax(&[f32::NEG_INFINITY; 3]),
            Err(CoreError::MalformedModelOutput(_))
        ));
    }

    #[test]
    fn process_builds_consistent_snapshot() {
        let processor = MeasurementProcessor::new(config(ScaleType::Linear));
        let history = vec!["a".to_string(), "b".to_string()];
        let snapshot = processor
            .process(
                raw_output(),
                StepContext {
                    step: 3,
                    ids: &[1, 2, 3],
                    history: &history,
                },
                &Letters,
            )
            .unwrap_or_else(|err| panic!("process failed: {err}"));

        assert_eq!(snapshot.step, 3);
        assert_eq!(snapshot.layer_activations.len(), 3);
        assert_eq!(snapshot.layer_activations_normalized.len(), 3);
        assert_eq!(snapshot.layer_entropy.len(), 2);
        assert_eq!(snapshot.layer_entropy_normalized.len(), 2);
        assert_eq!(snapshot.generated_text, "ab");
        assert_eq!(snapshot.predicted_token_text, "c");
        assert_eq!(snapshot.predicted_token_id, 3);
        assert_eq!(snapshot.recent_tokens, vec!["a", "b", "c"]);
        assert_eq!(snapshot.top_candidates.len(), TOP_K);
        assert_eq!(snapshot.top_candidates[0].token_id, 29);
        assert!(
            snapshot
                .top_candidates
                .windows(2)
                .all(|pair| pair[0].probability > pair[1].probability)
        );
    }

    #[test]
    fn whitespace_candidates_render_as_single_space() {
        assert_eq!(candidate_text("   "), " ");
        assert_eq!(candidate_text(" extraordinarily"), "extraordin");
    }

    #[test]
    fn zero_layers_is_malformed() {
        let processor = MeasurementProcessor::default();
        let mut raw = raw_output();
        raw.hidden_states.clear();
        let result = processor.process(
            raw,
            StepContext {
                step: 0,
                ids: &[1],
                history: &[],
            },
            &Letters,
        );
        assert!(matches!(result, Err(CoreError::MalformedModelOutput(_))));
    }

    #[test]
    fn mismatched_attention_shape_is_malformed() {
        let processor = MeasurementProcessor::default();
        let mut raw = raw_output();
        raw.attentions[1].weights.pop();
        let result = processor.process(
            raw,
            StepContext {
                step: 0,
                ids: &[1],
                history: &[],
            },
            &Letters,
        );
        let Err(CoreError::MalformedModelOutput(message)) = result else {
            panic!("expected malformed output");
        };
        assert!(message.contains("attention layer 1"), "{message}");
    }
}
