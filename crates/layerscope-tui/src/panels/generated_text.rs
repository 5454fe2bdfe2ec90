use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use crate::text_formatting::tail_graphemes;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Generated Text",
    accent: Color::Green,
};

/// The tail of the text generated so far, with the newest token highlighted.
pub(super) fn render(snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock {
    let mut lines = vec![Line::default()];
    push_styled(
        &mut lines,
        tail_graphemes(&snapshot.generated_text, options.limit_chars),
        Style::new().light_red().bold(),
    );
    push_styled(
        &mut lines,
        &snapshot.predicted_token_text,
        Style::new().bold().on_green(),
    );
    lines
}

/// Append `text` to the last line, starting a new line at every `\n`.
fn push_styled(lines: &mut TextBlock, text: &str, style: Style) {
    for (index, piece) in text.split('\n').enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }
        if piece.is_empty() {
            continue;
        }
        if let Some(line) = lines.last_mut() {
            line.spans.push(Span::styled(piece.to_string(), style));
        }
    }
}
