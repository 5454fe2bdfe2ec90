use std::io;
use std::time::Duration;

use layerscope_core::CoreError;
use layerscope_core::DriverConfig;
use layerscope_core::GenerationDriver;
use layerscope_core::MeasurementProcessor;
use layerscope_core::MeasurementSnapshot;
use layerscope_core::SyntheticBackend;
use layerscope_tui::DashboardError;
use layerscope_tui::DashboardView;
use layerscope_tui::ExitReason;
use layerscope_tui::LiveRenderer;
use layerscope_tui::Pacing;
use layerscope_tui::PanelRegistry;
use layerscope_tui::RunOutcome;
use layerscope_tui::SnapshotFeed;
use layerscope_tui::panels::RenderOptions;
use layerscope_tui::tui::SurfaceModes;
use pretty_assertions::assert_eq;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct RecordingModes {
    calls: Vec<&'static str>,
}

impl SurfaceModes for RecordingModes {
    fn enter(&mut self) -> io::Result<()> {
        self.calls.push("enter");
        Ok(())
    }

    fn leave(&mut self) -> io::Result<()> {
        self.calls.push("leave");
        Ok(())
    }
}

type Renderer = LiveRenderer<TestBackend, RecordingModes>;

fn started_driver(max_steps: usize) -> GenerationDriver {
    let config = DriverConfig {
        max_steps,
        ..DriverConfig::default()
    };
    let mut driver = GenerationDriver::new(
        Box::new(SyntheticBackend::default()),
        MeasurementProcessor::default(),
        config,
    );
    driver.start("Once upon a timeline ").unwrap();
    driver
}

fn snapshots(count: usize) -> Vec<MeasurementSnapshot> {
    started_driver(count).map(Result::unwrap).collect()
}

fn renderer(pacing: Pacing, cancel: CancellationToken) -> Renderer {
    let registry = PanelRegistry::with_builtin_panels();
    let selection = registry
        .resolve(&["generated_text", "top_predictions", "attention_entropy"])
        .unwrap();
    let view = DashboardView::new(registry, selection, RenderOptions::default(), 2, "synthetic")
        .with_hint(pacing == Pacing::Interactive);
    let terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    LiveRenderer::new(terminal, RecordingModes::default(), view, pacing, cancel)
}

fn screen_text(renderer: &Renderer) -> String {
    let buffer = renderer.terminal().backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

fn acks(lines: &[&str]) -> (UnboundedSender<String>, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = unbounded_channel();
    for line in lines {
        tx.send((*line).to_string()).unwrap();
    }
    (tx, rx)
}

#[tokio::test]
async fn quit_after_second_frame_stops_after_two_frames() {
    let mut feed = SnapshotFeed::spawn(started_driver(10)).unwrap();
    let (_tx, mut rx) = acks(&["", "Q"]);
    let mut renderer = renderer(Pacing::Interactive, CancellationToken::new());

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome {
            frames: 2,
            exit: ExitReason::Quit,
        }
    );
    assert_eq!(renderer.modes().calls, vec!["enter", "leave"]);
    assert!(screen_text(&renderer).contains("quit"));
}

#[tokio::test]
async fn closed_acknowledgment_channel_quits() {
    let mut feed = SnapshotFeed::spawn(started_driver(10)).unwrap();
    let (tx, mut rx) = acks(&[]);
    drop(tx);
    let mut renderer = renderer(Pacing::Interactive, CancellationToken::new());

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(outcome.frames, 1);
    assert_eq!(outcome.exit, ExitReason::Quit);
}

#[tokio::test]
async fn timed_run_paints_every_step_then_completes() {
    let mut feed = SnapshotFeed::spawn(started_driver(3)).unwrap();
    let (_tx, mut rx) = acks(&[]);
    let mut renderer = renderer(Pacing::Timed(Duration::ZERO), CancellationToken::new());

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome {
            frames: 3,
            exit: ExitReason::Completed,
        }
    );
    let screen = screen_text(&renderer);
    assert!(screen.contains("| layerscope v"));
    assert!(screen.contains("Generated Text"));
    assert!(screen.contains("Attention Entropy"));
    assert!(!screen.contains("quit"));
    assert_eq!(renderer.modes().calls, vec!["enter", "leave"]);
}

#[tokio::test]
async fn producer_failure_is_fatal_and_restores_the_terminal() {
    let mut steps = snapshots(1)
        .into_iter()
        .map(Ok)
        .collect::<Vec<Result<MeasurementSnapshot, CoreError>>>();
    steps.push(Err(CoreError::MalformedModelOutput(
        "hidden states missing".to_string(),
    )));
    let mut feed = SnapshotFeed::spawn(steps.into_iter()).unwrap();
    let (_tx, mut rx) = acks(&[]);
    let mut renderer = renderer(Pacing::Timed(Duration::ZERO), CancellationToken::new());

    let result = renderer.run(&mut feed, &mut rx).await;

    assert!(matches!(
        result,
        Err(DashboardError::Core(CoreError::MalformedModelOutput(_)))
    ));
    assert_eq!(renderer.modes().calls, vec!["enter", "leave"]);
}

#[tokio::test]
async fn cancellation_while_waiting_for_a_step_paints_nothing() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut pending = snapshots(1).into_iter();
    let steps = std::iter::from_fn(move || {
        trigger.cancel();
        pending.next().map(Ok)
    });
    let mut feed = SnapshotFeed::spawn(steps).unwrap();
    let (_tx, mut rx) = acks(&[]);
    let mut renderer = renderer(Pacing::Timed(Duration::ZERO), cancel);

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome {
            frames: 0,
            exit: ExitReason::Cancelled,
        }
    );
    assert_eq!(renderer.modes().calls, vec!["enter", "leave"]);
}

#[tokio::test]
async fn cancellation_interrupts_an_acknowledgment_wait() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let mut feed = SnapshotFeed::spawn(started_driver(10)).unwrap();
    // The sender stays alive, so only cancellation can end the wait.
    let (_tx, mut rx) = acks(&[]);
    let mut renderer = renderer(Pacing::Interactive, cancel);

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome {
            frames: 1,
            exit: ExitReason::Cancelled,
        }
    );
    assert_eq!(renderer.modes().calls, vec!["enter", "leave"]);
}

#[tokio::test]
async fn cancellation_interrupts_the_refresh_sleep() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    let mut feed = SnapshotFeed::spawn(started_driver(10)).unwrap();
    let (_tx, mut rx) = acks(&[]);
    let mut renderer = renderer(Pacing::Timed(Duration::from_secs(60)), cancel);

    let outcome = renderer.run(&mut feed, &mut rx).await.unwrap();

    assert_eq!(outcome.frames, 1);
    assert_eq!(outcome.exit, ExitReason::Cancelled);
}
