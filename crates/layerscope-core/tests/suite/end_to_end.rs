use layerscope_core::AttentionWeights;
use layerscope_core::BackendError;
use layerscope_core::CoreError;
use layerscope_core::DecodeOptions;
use layerscope_core::Detokenizer;
use layerscope_core::DriverConfig;
use layerscope_core::DriverState;
use layerscope_core::GenerationDriver;
use layerscope_core::MeasurementProcessor;
use layerscope_core::ModelBackend;
use layerscope_core::RawStepOutput;
use layerscope_core::SamplingConfig;
use layerscope_core::TokenId;
use pretty_assertions::assert_eq;

const VOCAB: usize = 30;

/// Decodes ids as base-36 digits; every prompt tokenizes to `[1, 2, 3]`.
struct Scripted {
    fail_on_step: Option<usize>,
    steps: usize,
}

impl Scripted {
    fn new() -> Self {
        Self {
            fail_on_step: None,
            steps: 0,
        }
    }

    fn failing_on(step: usize) -> Self {
        Self {
            fail_on_step: Some(step),
            steps: 0,
        }
    }
}

fn spell(id: TokenId) -> char {
    char::from_digit(id % 36, 36).unwrap_or('?')
}

impl Detokenizer for Scripted {
    fn decode(&self, ids: &[TokenId], _options: DecodeOptions) -> Result<String, BackendError> {
        Ok(ids.iter().copied().map(spell).collect())
    }
}

impl ModelBackend for Scripted {
    fn model_identity(&self) -> String {
        "scripted".to_string()
    }

    fn tokenize(&mut self, _prompt: &str) -> Result<Vec<TokenId>, BackendError> {
        Ok(vec![1, 2, 3])
    }

    fn step(
        &mut self,
        ids: &[TokenId],
        _sampling: &SamplingConfig,
    ) -> Result<RawStepOutput, BackendError> {
        if self.fail_on_step == Some(self.steps) {
            return Err(BackendError::new("out of memory"));
        }
        self.steps += 1;
        let keys = ids.len();
        Ok(RawStepOutput {
            logits: (0..VOCAB).map(|i| i as f32 * 0.1).collect(),
            hidden_states: vec![vec![0.5, -1.5, 2.0]; 4],
            attentions: vec![
                AttentionWeights::new(2, 1, keys, vec![1.0 / keys as f32; 2 * keys]);
                4
            ],
        })
    }
}

fn driver(backend: Scripted, max_steps: usize) -> GenerationDriver {
    GenerationDriver::new(
        Box::new(backend),
        MeasurementProcessor::default(),
        DriverConfig {
            max_steps,
            ..DriverConfig::default()
        },
    )
}

#[test]
fn single_step_produces_a_consistent_snapshot() {
    let mut driver = driver(Scripted::new(), 1);
    driver.start("anything").unwrap();

    let snapshots: Vec<_> = driver.by_ref().collect::<Result<_, CoreError>>().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(driver.state(), DriverState::Done);

    let snapshot = &snapshots[0];
    assert_eq!(snapshot.step, 0);
    assert_eq!(snapshot.generated_text, "123");
    assert_eq!(
        snapshot.predicted_token_text,
        spell(snapshot.predicted_token_id).to_string()
    );
    assert_eq!(&driver.token_ids()[..3], &[1, 2, 3]);
    assert_eq!(driver.token_ids()[3], snapshot.predicted_token_id);

    assert_eq!(snapshot.layer_activations.len(), 4);
    assert_eq!(snapshot.layer_entropy.len(), 4);
    assert_eq!(snapshot.next_token_distribution.len(), VOCAB);
    let total: f32 = snapshot.next_token_distribution.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);

    assert_eq!(snapshot.top_candidates.len(), 20);
    assert_eq!(snapshot.top_candidates[0].token_id, 29);
    assert!(
        snapshot
            .top_candidates
            .windows(2)
            .all(|pair| pair[0].probability > pair[1].probability)
    );
}

#[test]
fn backend_failure_keeps_earlier_snapshots() {
    let mut driver = driver(Scripted::failing_on(2), 10);
    driver.start("anything").unwrap();

    let results: Vec<_> = driver.by_ref().collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(CoreError::Backend(_))));
    assert_eq!(driver.state(), DriverState::Failed);
}

#[test]
fn tokenize_failure_never_steps() {
    struct Broken;

    impl Detokenizer for Broken {
        fn decode(
            &self,
            _ids: &[TokenId],
            _options: DecodeOptions,
        ) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    impl ModelBackend for Broken {
        fn model_identity(&self) -> String {
            "broken".to_string()
        }

        fn tokenize(&mut self, _prompt: &str) -> Result<Vec<TokenId>, BackendError> {
            Err(BackendError::new("no vocabulary"))
        }

        fn step(
            &mut self,
            _ids: &[TokenId],
            _sampling: &SamplingConfig,
        ) -> Result<RawStepOutput, BackendError> {
            panic!("step must not run after a tokenize failure");
        }
    }

    let mut driver = GenerationDriver::new(
        Box::new(Broken),
        MeasurementProcessor::default(),
        DriverConfig::default(),
    );
    assert!(matches!(driver.start("x"), Err(CoreError::Backend(_))));
    assert_eq!(driver.state(), DriverState::Failed);
    assert!(driver.next().is_none());
}
