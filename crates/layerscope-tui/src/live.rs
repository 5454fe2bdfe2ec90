//! The refresh loop.
//!
//! [`LiveRenderer::run`] pulls one snapshot per frame from a
//! [`SnapshotFeed`], paints it through the [`DashboardView`] and then waits,
//! either for a fixed interval or for the user to acknowledge the frame.
//! Cancellation is observed at every wait, and the terminal modes entered at
//! the start of the run are left on every exit path.

use std::io;
use std::time::Duration;

use layerscope_core::MeasurementSnapshot;
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::error::Result;
use crate::feed::SnapshotFeed;
use crate::key_hint;
use crate::layout::LayoutGrid;
use crate::panels::PanelRegistry;
use crate::panels::PanelSelection;
use crate::panels::RenderOptions;
use crate::tui::SurfaceModes;

const TITLE_HEIGHT: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep between frames. Zero means no delay.
    Timed(Duration),
    /// Wait for an acknowledgment line after every frame.
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    Continue,
    Quit,
}

impl Acknowledgment {
    /// `q` in any casing quits; any other line continues.
    pub fn from_line(line: &str) -> Self {
        if line.trim().eq_ignore_ascii_case("q") {
            Self::Quit
        } else {
            Self::Continue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The driver produced its last snapshot.
    Completed,
    /// The user acknowledged a frame with `q`.
    Quit,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub frames: usize,
    pub exit: ExitReason,
}

/// Everything needed to turn a snapshot into a frame.
pub struct DashboardView {
    registry: PanelRegistry,
    selection: PanelSelection,
    options: RenderOptions,
    row_count: usize,
    title: String,
    show_hint: bool,
}

impl DashboardView {
    pub fn new(
        registry: PanelRegistry,
        selection: PanelSelection,
        options: RenderOptions,
        row_count: usize,
        model_identity: &str,
    ) -> Self {
        Self {
            registry,
            selection,
            options,
            row_count,
            title: format!(
                "| layerscope v{} | {model_identity}",
                env!("CARGO_PKG_VERSION")
            ),
            show_hint: false,
        }
    }

    /// Show the key hint row under the grid.
    pub fn with_hint(mut self, show_hint: bool) -> Self {
        self.show_hint = show_hint;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Paint one whole frame. Panels are rendered before drawing starts, so
    /// the terminal only ever sees complete frames.
    pub fn paint<B: Backend>(
        &self,
        terminal: &mut Terminal<B>,
        snapshot: &MeasurementSnapshot,
    ) -> io::Result<()> {
        let panels = self
            .registry
            .render(snapshot, &self.selection, &self.options);
        let grid = LayoutGrid::arrange(panels, self.row_count);
        let title = Paragraph::new(Line::from(self.title.as_str()).bold())
            .block(Block::bordered().border_style(Style::default().fg(Color::White)));
        let hint_height = u16::from(self.show_hint);

        terminal.draw(|frame| {
            let [title_area, grid_area, hint_area] = Layout::vertical([
                Constraint::Length(TITLE_HEIGHT),
                Constraint::Fill(1),
                Constraint::Length(hint_height),
            ])
            .areas(frame.area());

            title.render_ref(title_area, frame.buffer_mut());
            for (panel, area) in grid.placements(grid_area) {
                panel.render_ref(area, frame.buffer_mut());
            }
            if self.show_hint {
                hint_line().render_ref(hint_area, frame.buffer_mut());
            }
        })?;
        Ok(())
    }
}

fn hint_line() -> Line<'static> {
    Line::from(vec![
        " ".into(),
        key_hint::plain("Enter"),
        " next step   ".dim(),
        key_hint::plain("q"),
        " + ".dim(),
        key_hint::plain("Enter"),
        " quit   ".dim(),
        key_hint::ctrl("C"),
        " abort".dim(),
    ])
}

/// Leaves the surface modes when dropped, unless [`SurfaceGuard::leave`]
/// already did.
struct SurfaceGuard<'a, M: SurfaceModes> {
    modes: &'a mut M,
    active: bool,
}

impl<'a, M: SurfaceModes> SurfaceGuard<'a, M> {
    fn enter(modes: &'a mut M) -> io::Result<Self> {
        let mut guard = Self {
            modes,
            active: true,
        };
        // On failure the guard drops here and undoes whatever did get set.
        guard.modes.enter()?;
        Ok(guard)
    }

    fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.modes.leave()
    }
}

impl<M: SurfaceModes> Drop for SurfaceGuard<'_, M> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.modes.leave();
        }
    }
}

pub struct LiveRenderer<B: Backend, M: SurfaceModes> {
    terminal: Terminal<B>,
    modes: M,
    view: DashboardView,
    pacing: Pacing,
    cancel: CancellationToken,
}

impl<B: Backend, M: SurfaceModes> LiveRenderer<B, M> {
    pub fn new(
        terminal: Terminal<B>,
        modes: M,
        view: DashboardView,
        pacing: Pacing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            terminal,
            modes,
            view,
            pacing,
            cancel,
        }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn modes(&self) -> &M {
        &self.modes
    }

    /// Run until the feed ends, the user quits or `cancel` fires. The terminal
    /// modes are restored before this returns, including on error.
    pub async fn run(
        &mut self,
        feed: &mut SnapshotFeed,
        acks: &mut UnboundedReceiver<String>,
    ) -> Result<RunOutcome> {
        let mut guard = SurfaceGuard::enter(&mut self.modes)?;
        info!(pacing = ?self.pacing, "starting live render loop");
        let result = drive(
            &mut self.terminal,
            &self.view,
            self.pacing,
            &self.cancel,
            feed,
            acks,
        )
        .await;
        let restored = guard.leave();

        let outcome = result?;
        restored?;
        info!(
            frames = outcome.frames,
            exit = ?outcome.exit,
            "live render loop finished"
        );
        Ok(outcome)
    }
}

async fn drive<B: Backend>(
    terminal: &mut Terminal<B>,
    view: &DashboardView,
    pacing: Pacing,
    cancel: &CancellationToken,
    feed: &mut SnapshotFeed,
    acks: &mut UnboundedReceiver<String>,
) -> Result<RunOutcome> {
    let mut frames = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(RunOutcome {
                    frames,
                    exit: ExitReason::Cancelled,
                });
            }
            next = feed.next_snapshot() => next?,
        };
        let Some(snapshot) = next else {
            return Ok(RunOutcome {
                frames,
                exit: ExitReason::Completed,
            });
        };

        view.paint(terminal, &snapshot)?;
        frames += 1;
        debug!(frame = frames, step = snapshot.step, "painted frame");

        let exit = match pacing {
            Pacing::Timed(interval) if interval.is_zero() => {
                cancel.is_cancelled().then_some(ExitReason::Cancelled)
            }
            Pacing::Timed(interval) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(ExitReason::Cancelled),
                    _ = tokio::time::sleep(interval) => None,
                }
            }
            Pacing::Interactive => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some(ExitReason::Cancelled),
                    // A closed acknowledgment channel means input is gone.
                    line = acks.recv() => match line.as_deref().map(Acknowledgment::from_line) {
                        Some(Acknowledgment::Continue) => None,
                        Some(Acknowledgment::Quit) | None => Some(ExitReason::Quit),
                    },
                }
            }
        };
        if let Some(exit) = exit {
            return Ok(RunOutcome { frames, exit });
        }
    }
}
