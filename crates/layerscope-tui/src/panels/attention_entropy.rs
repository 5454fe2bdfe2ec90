use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Stylize;
use ratatui::text::Line;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use super::bar;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Attention Entropy",
    accent: Color::Magenta,
};

pub(super) fn render(snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock {
    snapshot
        .layer_entropy
        .iter()
        .zip(&snapshot.layer_entropy_normalized)
        .enumerate()
        .map(|(index, (entropy, normalized))| {
            let layer = index + 1;
            Line::from(vec![
                format!("Layer {layer:2}").white().bold(),
                " | ".into(),
                ":".yellow().bold(),
                " [".into(),
                bar(normalized.bar_length, options.max_bar_length).magenta(),
                format!("] {entropy:.1}").into(),
            ])
        })
        .collect()
}
