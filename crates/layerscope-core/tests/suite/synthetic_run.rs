use layerscope_core::AudioEvent;
use layerscope_core::AudioSink;
use layerscope_core::AudioUnavailable;
use layerscope_core::DriverConfig;
use layerscope_core::DriverState;
use layerscope_core::GenerationDriver;
use layerscope_core::MeasurementConfig;
use layerscope_core::MeasurementProcessor;
use layerscope_core::MeasurementSnapshot;
use layerscope_core::ScaleType;
use layerscope_core::SonificationMapper;
use layerscope_core::SonificationPolicy;
use layerscope_core::Sonifier;
use layerscope_core::SyntheticBackend;
use pretty_assertions::assert_eq;

struct Unplugged;

impl AudioSink for Unplugged {
    fn play(&mut self, _event: &AudioEvent) -> Result<(), AudioUnavailable> {
        Err(AudioUnavailable::new("no device"))
    }
}

fn run(sonifier: Option<Sonifier>, scale: ScaleType) -> Vec<MeasurementSnapshot> {
    let processor = MeasurementProcessor::new(MeasurementConfig {
        scale,
        ..MeasurementConfig::default()
    });
    let config = DriverConfig {
        max_steps: 12,
        seed: 7,
        ..DriverConfig::default()
    };
    let mut driver = GenerationDriver::new(Box::new(SyntheticBackend::default()), processor, config);
    if let Some(sonifier) = sonifier {
        driver = driver.with_sonifier(sonifier);
    }
    driver.start("The quick brown fox").unwrap();
    let snapshots: Vec<MeasurementSnapshot> = driver.by_ref().map(Result::unwrap).collect();
    assert_eq!(driver.state(), DriverState::Done);
    snapshots
}

#[test]
fn same_seed_same_run() {
    assert_eq!(run(None, ScaleType::Linear), run(None, ScaleType::Linear));
}

#[test]
fn unavailable_audio_does_not_change_the_run() {
    let silent = run(None, ScaleType::Linear);
    let sonifier = Sonifier::new(
        SonificationMapper::new(SonificationPolicy::Expressive, 0.1),
        Some(Box::new(Unplugged)),
    );
    let with_broken_audio = run(Some(sonifier), ScaleType::Linear);
    assert_eq!(silent, with_broken_audio);
}

#[test]
fn every_snapshot_respects_bar_bounds() {
    let max_bar = MeasurementConfig::default().max_bar_length;
    for scale in [ScaleType::Linear, ScaleType::Log, ScaleType::MinMax] {
        for snapshot in run(None, scale) {
            assert_eq!(snapshot.layer_activations.len(), 7);
            assert_eq!(snapshot.layer_entropy.len(), 6);
            assert!(snapshot.layer_entropy.iter().all(|e| *e >= 0.0));
            assert!(
                snapshot
                    .layer_activations_normalized
                    .iter()
                    .chain(&snapshot.layer_entropy_normalized)
                    .all(|value| value.bar_length <= max_bar)
            );
            assert!(snapshot.top_candidates.len() <= 20);
            assert!(!snapshot.predicted_token_text.is_empty());
        }
    }
}

#[test]
fn generated_text_grows_by_the_previous_prediction() {
    let snapshots = run(None, ScaleType::Linear);
    for pair in snapshots.windows(2) {
        let expected = format!("{}{}", pair[0].generated_text, pair[0].predicted_token_text);
        assert_eq!(pair[1].generated_text, expected);
    }
    assert!(snapshots[0].generated_text.starts_with("The quick brown fox"));
}
