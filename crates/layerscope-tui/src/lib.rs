// Forbid accidental stdout/stderr writes in the *library* portion of the TUI.
// The standalone `layerscope` binary prints the panel list.
#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::fs::OpenOptions;

use layerscope_core::GenerationDriver;
use layerscope_core::MeasurementProcessor;
use layerscope_core::SonificationMapper;
use layerscope_core::Sonifier;
use layerscope_core::SyntheticBackend;
use layerscope_core::SyntheticConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
pub mod config;
mod error;
mod feed;
pub mod input;
mod key_hint;
pub mod layout;
mod live;
pub mod panels;
mod text_formatting;
pub mod tui;

pub use cli::Cli;
pub use config::Config;
pub use config::ConfigOverrides;
pub use error::DashboardError;
pub use error::Result;
pub use feed::SnapshotFeed;
pub use live::Acknowledgment;
pub use live::DashboardView;
pub use live::ExitReason;
pub use live::LiveRenderer;
pub use live::Pacing;
pub use live::RunOutcome;
pub use panels::PanelKind;
pub use panels::PanelRegistry;

const LOG_FILE_NAME: &str = "layerscope.log";
const DEFAULT_LOG_FILTER: &str = "layerscope_core=info,layerscope_tui=info";

/// Names accepted by `--panels`, in registration order.
pub fn available_panel_names() -> Vec<&'static str> {
    PanelRegistry::with_builtin_panels()
        .available_panels()
        .into_iter()
        .map(PanelKind::as_str)
        .collect()
}

pub async fn run_main(cli: Cli) -> color_eyre::Result<RunOutcome> {
    let config = Config::load_with_overrides(cli.overrides())?;
    let _log_guard = init_logging(&config)?;
    info!(
        panels = ?config.panels,
        max_new_tokens = config.driver.max_steps,
        interactive = config.interactive,
        "starting layerscope"
    );

    // Panel names are checked before anything touches the terminal.
    let registry = PanelRegistry::with_builtin_panels();
    let selection = registry.resolve(&config.panels)?;

    let backend = SyntheticBackend::new(SyntheticConfig {
        seed: config.driver.seed,
        ..SyntheticConfig::default()
    });
    let processor = MeasurementProcessor::new(config.measurement.clone());
    let mut driver = GenerationDriver::new(Box::new(backend), processor, config.driver.clone());
    if config.audio.enabled {
        // No output device backend is built in, so the sonifier starts muted.
        let mapper = SonificationMapper::new(config.audio.policy, config.audio.duration);
        driver = driver.with_sonifier(Sonifier::new(mapper, None));
    }
    driver.start(&config.prompt)?;

    let view = DashboardView::new(
        registry,
        selection,
        config.render,
        config.num_grid_rows,
        &driver.model_identity(),
    )
    .with_hint(config.interactive);
    let pacing = if config.interactive {
        Pacing::Interactive
    } else {
        Pacing::Timed(config.refresh_interval)
    };

    let mut feed = SnapshotFeed::spawn(driver)?;
    let cancel = CancellationToken::new();
    let mut acks = input::spawn_input_task(cancel.clone());
    let terminal = tui::init_terminal()?;
    let mut renderer = LiveRenderer::new(
        terminal,
        tui::CrosstermModes::default(),
        view,
        pacing,
        cancel.clone(),
    );

    let result = renderer.run(&mut feed, &mut acks).await;
    // Stops the input task.
    cancel.cancel();
    match result {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            tracing::error!("run failed: {err}");
            Err(err.into())
        }
    }
}

fn init_logging(config: &Config) -> std::io::Result<WorkerGuard> {
    let log_dir = config::log_dir(config);
    std::fs::create_dir_all(&log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))?;

    // Wrap file in non‑blocking writer.
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    // Fallback to the default filter if `RUST_LOG` is not set _or_ contains
    // an invalid value.
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    Ok(guard)
}
