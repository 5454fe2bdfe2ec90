use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Stylize;
use ratatui::text::Line;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use crate::text_formatting::pad_to_width;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Top Predictions",
    accent: Color::Blue,
};

const TEXT_COLUMN_WIDTH: usize = 10;

pub(super) fn render(snapshot: &MeasurementSnapshot, _options: &RenderOptions) -> TextBlock {
    snapshot
        .top_candidates
        .iter()
        .map(|candidate| {
            let percent = candidate.probability * 100.0;
            let logit = candidate.logit;
            Line::from(vec![
                pad_to_width(&candidate.text, TEXT_COLUMN_WIDTH).magenta().bold(),
                " (".into(),
                format!("{percent:>5.1}%").yellow().bold(),
                ", ".into(),
                format!("{logit:>4.1}").cyan().bold(),
                ")".into(),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panels::test_support::plain;
    use crate::panels::test_support::snapshot;
    use pretty_assertions::assert_eq;

    #[test]
    fn one_line_per_candidate() {
        let lines = render(&snapshot(), &RenderOptions::default());
        assert_eq!(
            plain(&lines),
            vec![
                "l          ( 50.0%,  2.0)".to_string(),
                "           ( 30.0%,  1.5)".to_string(),
            ]
        );
    }
}
