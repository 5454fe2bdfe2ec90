//! Per-step measurement of a generative language model.
//!
//! The [`GenerationDriver`] pulls raw tensors from a [`ModelBackend`] one step
//! at a time and turns each step into an immutable [`MeasurementSnapshot`].
//! Nothing in this crate touches a terminal.

mod backend;
pub mod config_types;
mod driver;
mod error;
pub mod measurement;
mod snapshot;
pub mod sonify;
pub mod synthetic;

pub use backend::AttentionWeights;
pub use backend::DecodeOptions;
pub use backend::Detokenizer;
pub use backend::ModelBackend;
pub use backend::RawStepOutput;
pub use backend::SamplingConfig;
pub use backend::TokenId;
pub use config_types::AggregationStrategy;
pub use config_types::MeasurementConfig;
pub use config_types::ScaleType;
pub use config_types::SonificationPolicy;
pub use driver::DriverConfig;
pub use driver::DriverState;
pub use driver::GenerationDriver;
pub use error::AudioUnavailable;
pub use error::BackendError;
pub use error::CoreError;
pub use error::Result;
pub use measurement::MeasurementProcessor;
pub use snapshot::MeasurementSnapshot;
pub use snapshot::NormalizedValue;
pub use snapshot::TokenCandidate;
pub use sonify::AudioEvent;
pub use sonify::AudioSink;
pub use sonify::SonificationMapper;
pub use sonify::Sonifier;
pub use synthetic::SyntheticBackend;
pub use synthetic::SyntheticConfig;
