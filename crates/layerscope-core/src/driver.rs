//! Step loop against the model backend.
//!
//! [`GenerationDriver`] is a lazy, finite iterator: each call to `next` runs
//! exactly one backend step and yields exactly one snapshot. Nothing is
//! computed ahead of the consumer and a finished driver never restarts.

use std::iter::FusedIterator;

use rand::SeedableRng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use strum_macros::Display;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::backend::ModelBackend;
use crate::backend::SamplingConfig;
use crate::backend::TokenId;
use crate::error::CoreError;
use crate::error::Result;
use crate::measurement::MeasurementProcessor;
use crate::measurement::RECENT_TOKEN_HISTORY;
use crate::measurement::StepContext;
use crate::measurement::softmax;
use crate::snapshot::MeasurementSnapshot;
use crate::sonify::Sonifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DriverState {
    Idle,
    Stepping,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Number of snapshots produced before the run is `Done`.
    pub max_steps: usize,
    pub sampling: SamplingConfig,
    /// Seed for the multinomial draw of the next token.
    pub seed: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_steps: 200,
            sampling: SamplingConfig::default(),
            seed: 42,
        }
    }
}

pub struct GenerationDriver {
    backend: Box<dyn ModelBackend>,
    processor: MeasurementProcessor,
    config: DriverConfig,
    sonifier: Option<Sonifier>,
    rng: StdRng,
    state: DriverState,
    ids: Vec<TokenId>,
    recent_tokens: Vec<String>,
    steps_taken: usize,
}

impl GenerationDriver {
    pub fn new(
        backend: Box<dyn ModelBackend>,
        processor: MeasurementProcessor,
        config: DriverConfig,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            backend,
            processor,
            config,
            sonifier: None,
            rng,
            state: DriverState::Idle,
            ids: Vec::new(),
            recent_tokens: Vec::new(),
            steps_taken: 0,
        }
    }

    /// Attach the per-run sonifier. It is invoked once per produced snapshot.
    pub fn with_sonifier(mut self, sonifier: Sonifier) -> Self {
        self.sonifier = Some(sonifier);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn model_identity(&self) -> String {
        self.backend.model_identity()
    }

    /// Current id sequence: the tokenized prompt plus every sampled id.
    pub fn token_ids(&self) -> &[TokenId] {
        &self.ids
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Tokenize `prompt` and move from `Idle` to `Stepping`.
    pub fn start(&mut self, prompt: &str) -> Result<()> {
        if self.state != DriverState::Idle {
            return Err(CoreError::DriverNotIdle(self.state));
        }

        let ids = match self.backend.tokenize(prompt) {
            Ok(ids) => ids,
            Err(err) => {
                self.state = DriverState::Failed;
                error!("failed to tokenize prompt: {err}");
                return Err(err.into());
            }
        };
        if ids.is_empty() {
            self.state = DriverState::Failed;
            return Err(CoreError::malformed("prompt tokenized to an empty sequence"));
        }

        info!(
            prompt_tokens = ids.len(),
            max_steps = self.config.max_steps,
            "starting generation run"
        );
        self.ids = ids;
        self.state = if self.config.max_steps == 0 {
            DriverState::Done
        } else {
            DriverState::Stepping
        };
        Ok(())
    }

    fn step(&mut self) -> Result<MeasurementSnapshot> {
        let raw = self.backend.step(&self.ids, &self.config.sampling)?;
        let distribution = softmax(&raw.logits)?;
        let next_id = self.sample(&distribution)?;
        self.ids.push(next_id);

        let snapshot = self.processor.process(
            raw,
            StepContext {
                step: self.steps_taken,
                ids: &self.ids,
                history: &self.recent_tokens,
            },
            &*self.backend,
        )?;

        self.recent_tokens.push(snapshot.predicted_token_text.clone());
        if self.recent_tokens.len() > RECENT_TOKEN_HISTORY {
            let excess = self.recent_tokens.len() - RECENT_TOKEN_HISTORY;
            self.recent_tokens.drain(..excess);
        }

        if let Some(sonifier) = self.sonifier.as_mut() {
            sonifier.observe(snapshot.predicted_token_id, snapshot.uncertainty());
        }

        debug!(
            step = snapshot.step,
            token = next_id,
            text = %snapshot.predicted_token_text,
            "produced snapshot"
        );
        Ok(snapshot)
    }

    fn sample(&mut self, distribution: &[f32]) -> Result<TokenId> {
        let weights = WeightedIndex::new(distribution).map_err(|err| {
            CoreError::malformed(format!("cannot sample from next-token distribution: {err}"))
        })?;
        let index = weights.sample(&mut self.rng);
        TokenId::try_from(index)
            .map_err(|_| CoreError::malformed(format!("sampled index {index} overflows a token id")))
    }
}

impl Iterator for GenerationDriver {
    type Item = Result<MeasurementSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != DriverState::Stepping {
            return None;
        }
        match self.step() {
            Ok(snapshot) => {
                self.steps_taken += 1;
                if self.steps_taken >= self.config.max_steps {
                    self.state = DriverState::Done;
                    info!(steps = self.steps_taken, "generation run finished");
                }
                Some(Ok(snapshot))
            }
            Err(err) => {
                self.state = DriverState::Failed;
                error!(step = self.steps_taken, "generation run failed: {err}");
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for GenerationDriver {}
