//! Value types used by [`crate::MeasurementProcessor`] and the sonifier.

// Simple struct/enum definitions only; no business logic here.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::AsRefStr;
use strum_macros::Display;
use strum_macros::EnumIter;
use strum_macros::EnumString;

/// Reduction applied to a layer's hidden-state tensor.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum AggregationStrategy {
    /// Euclidean norm of the flattened layer.
    #[default]
    #[serde(rename = "l2")]
    #[strum(serialize = "l2")]
    L2,

    /// Largest absolute element.
    #[serde(rename = "max_abs")]
    #[strum(serialize = "max_abs")]
    MaxAbs,
}

/// How raw values are mapped onto bar lengths.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum ScaleType {
    #[default]
    #[serde(rename = "linear")]
    #[strum(serialize = "linear")]
    Linear,

    #[serde(rename = "log")]
    #[strum(serialize = "log")]
    Log,

    #[serde(rename = "minmax")]
    #[strum(serialize = "minmax")]
    MinMax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementConfig {
    pub aggregation: AggregationStrategy,
    pub scale: ScaleType,
    /// Upper bound for every bar length, in glyphs. Must be at least 1.
    pub max_bar_length: usize,
    /// Constant applied by the `linear` and `log` scales before clamping.
    pub linear_scale: f32,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationStrategy::default(),
            scale: ScaleType::default(),
            max_bar_length: 50,
            linear_scale: 1.0,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum SonificationPolicy {
    #[default]
    #[serde(rename = "simple")]
    #[strum(serialize = "simple")]
    Simple,

    #[serde(rename = "expressive")]
    #[strum(serialize = "expressive")]
    Expressive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn names_round_trip_through_from_str() {
        assert_eq!(AggregationStrategy::from_str("max_abs"), Ok(AggregationStrategy::MaxAbs));
        assert_eq!(ScaleType::from_str("minmax"), Ok(ScaleType::MinMax));
        assert_eq!(ScaleType::Log.to_string(), "log");
        assert_eq!(AggregationStrategy::L2.as_ref(), "l2");
        assert!(ScaleType::from_str("cubic").is_err());
    }
}
