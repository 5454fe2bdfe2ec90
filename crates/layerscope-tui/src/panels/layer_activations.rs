use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Stylize;
use ratatui::text::Line;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use super::bar;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Layer Activations",
    accent: Color::Cyan,
};

/// Signed bar per layer: yellow for net-positive layers, magenta for
/// net-negative ones, followed by the raw aggregate.
pub(super) fn render(snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock {
    snapshot
        .layer_activations
        .iter()
        .zip(&snapshot.layer_activations_normalized)
        .enumerate()
        .map(|(layer, (raw, normalized))| {
            let bar = bar(normalized.bar_length, options.max_bar_length);
            let bar = if *raw >= 0.0 {
                bar.yellow()
            } else {
                bar.magenta()
            };
            Line::from(vec![
                format!("Layer {layer:2}").white().bold(),
                " | ".into(),
                ":".yellow().bold(),
                " ".into(),
                bar,
                " ".into(),
                format!("{raw:+.1}").yellow().bold(),
            ])
        })
        .collect()
}
