//! Named, independently renderable views of a [`MeasurementSnapshot`].
//!
//! A panel is a `(kind, metadata, renderer)` triple held by the
//! [`PanelRegistry`]. The live renderer only ever talks to the registry, so a
//! new panel is added with one [`PanelRegistry::register`] call.

use std::fmt;

use layerscope_core::MeasurementSnapshot;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;
use ratatui::widgets::Wrap;
use tracing::debug;
use tracing::warn;

use crate::error::DashboardError;
use crate::error::Result;

mod attention_entropy;
mod generated_text;
mod layer_activations;
mod output_distribution;
mod token_art;
mod top_predictions;

/// Rendered body of a panel.
pub type TextBlock = Vec<Line<'static>>;

/// Stable identifier of a panel, as used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelKind(&'static str);

impl PanelKind {
    pub const TOP_PREDICTIONS: Self = Self("top_predictions");
    pub const LAYER_ACTIVATIONS: Self = Self("layer_activations");
    pub const ATTENTION_ENTROPY: Self = Self("attention_entropy");
    pub const OUTPUT_DISTRIBUTION: Self = Self("output_distribution");
    pub const GENERATED_TEXT: Self = Self("generated_text");
    pub const TOKEN_ART: Self = Self("token_art");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Rendering knobs shared by every panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_bar_length: usize,
    /// How much of the generated text to show.
    pub limit_chars: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_bar_length: 50,
            limit_chars: 250,
        }
    }
}

/// Builds a panel body from a snapshot. Must be pure: the same snapshot and
/// options always give the same lines.
pub trait Renderable: Send + Sync {
    fn render(&self, snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock;
}

impl<F> Renderable for F
where
    F: Fn(&MeasurementSnapshot, &RenderOptions) -> TextBlock + Send + Sync,
{
    fn render(&self, snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock {
        self(snapshot, options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelMeta {
    pub title: &'static str,
    pub accent: Color,
}

struct RegisteredPanel {
    kind: PanelKind,
    meta: PanelMeta,
    renderer: Box<dyn Renderable>,
}

/// A requested panel name that no registered panel answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPanelName {
    pub name: String,
}

impl fmt::Display for UnknownPanelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown panel '{}'", self.name)
    }
}

/// Ordered, de-duplicated panels chosen for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSelection {
    kinds: Vec<PanelKind>,
    warnings: Vec<UnknownPanelName>,
}

impl PanelSelection {
    pub fn kinds(&self) -> &[PanelKind] {
        &self.kinds
    }

    /// Names that were requested but dropped.
    pub fn warnings(&self) -> &[UnknownPanelName] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// One panel, ready to be painted.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPanel {
    pub kind: PanelKind,
    pub title: &'static str,
    pub accent: Color,
    pub body: TextBlock,
}

impl WidgetRef for RenderedPanel {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", self.title)).bold())
            .border_style(Style::default().fg(self.accent));
        Paragraph::new(self.body.clone())
            .wrap(Wrap { trim: false })
            .block(block)
            .render_ref(area, buf);
    }
}

#[derive(Default)]
pub struct PanelRegistry {
    panels: Vec<RegisteredPanel>,
}

impl PanelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every panel that ships with layerscope.
    pub fn with_builtin_panels() -> Self {
        let mut registry = Self::empty();
        registry.register(
            PanelKind::TOP_PREDICTIONS,
            top_predictions::META,
            top_predictions::render,
        );
        registry.register(
            PanelKind::LAYER_ACTIVATIONS,
            layer_activations::META,
            layer_activations::render,
        );
        registry.register(
            PanelKind::ATTENTION_ENTROPY,
            attention_entropy::META,
            attention_entropy::render,
        );
        registry.register(
            PanelKind::OUTPUT_DISTRIBUTION,
            output_distribution::META,
            output_distribution::render,
        );
        registry.register(
            PanelKind::GENERATED_TEXT,
            generated_text::META,
            generated_text::render,
        );
        registry.register(PanelKind::TOKEN_ART, token_art::META, token_art::render);
        registry
    }

    /// Add a panel, replacing any earlier registration of the same kind.
    pub fn register<R>(&mut self, kind: PanelKind, meta: PanelMeta, renderer: R)
    where
        R: Renderable + 'static,
    {
        let entry = RegisteredPanel {
            kind,
            meta,
            renderer: Box::new(renderer),
        };
        match self.panels.iter_mut().find(|panel| panel.kind == kind) {
            Some(existing) => {
                debug!("replacing registered panel {kind}");
                *existing = entry;
            }
            None => self.panels.push(entry),
        }
    }

    /// Every registered kind, in registration order.
    pub fn available_panels(&self) -> Vec<PanelKind> {
        self.panels.iter().map(|panel| panel.kind).collect()
    }

    pub fn lookup(&self, name: &str) -> Option<PanelKind> {
        self.panels
            .iter()
            .map(|panel| panel.kind)
            .find(|kind| kind.as_str() == name)
    }

    pub fn meta(&self, kind: PanelKind) -> Option<PanelMeta> {
        self.entry(kind).map(|panel| panel.meta)
    }

    /// Turn configured names into a selection. Duplicates are dropped
    /// silently, unknown names with a warning. An empty result is an error.
    pub fn resolve<S>(&self, names: &[S]) -> Result<PanelSelection>
    where
        S: AsRef<str>,
    {
        let mut kinds: Vec<PanelKind> = Vec::with_capacity(names.len());
        let mut warnings = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            match self.lookup(name) {
                Some(kind) if kinds.contains(&kind) => {}
                Some(kind) => kinds.push(kind),
                None => {
                    let unknown = UnknownPanelName {
                        name: name.to_string(),
                    };
                    warn!("{unknown}; ignoring it");
                    warnings.push(unknown);
                }
            }
        }
        if kinds.is_empty() {
            return Err(DashboardError::NoPanelsSelected);
        }
        Ok(PanelSelection { kinds, warnings })
    }

    /// Render every selected panel, in selection order.
    pub fn render(
        &self,
        snapshot: &MeasurementSnapshot,
        selection: &PanelSelection,
        options: &RenderOptions,
    ) -> Vec<RenderedPanel> {
        selection
            .kinds
            .iter()
            .filter_map(|kind| self.entry(*kind))
            .map(|panel| RenderedPanel {
                kind: panel.kind,
                title: panel.meta.title,
                accent: panel.meta.accent,
                body: panel.renderer.render(snapshot, options),
            })
            .collect()
    }

    fn entry(&self, kind: PanelKind) -> Option<&RegisteredPanel> {
        self.panels.iter().find(|panel| panel.kind == kind)
    }
}

/// Run of full blocks `length` long, padded with spaces to `width`.
pub(crate) fn bar(length: usize, width: usize) -> String {
    let mut bar = "█".repeat(length);
    bar.extend(std::iter::repeat_n(' ', width.saturating_sub(length)));
    bar
}
