//! Histogram of the next-token distribution.
//!
//! Probabilities are binned into equal-width buckets over `[0, 1]`. Almost
//! every token lands in the lowest bucket, so bar lengths are log-scaled by
//! count to keep the rare high-probability buckets visible.

use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Stylize;
use ratatui::text::Line;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use super::bar;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Output Distribution",
    accent: Color::Yellow,
};

const BIN_COUNT: usize = 20;

pub(super) fn render(snapshot: &MeasurementSnapshot, options: &RenderOptions) -> TextBlock {
    let counts = histogram(&snapshot.next_token_distribution);
    let max_count = counts.iter().copied().max().unwrap_or(0);
    let width = BIN_COUNT as f64;

    counts
        .iter()
        .enumerate()
        .map(|(index, &count)| {
            let low = index as f64 / width;
            let high = (index + 1) as f64 / width;
            let length = log_bar_length(count, max_count, options.max_bar_length);
            Line::from(vec![
                format!("{low:.2}-{high:.2}").white().bold(),
                " | ".into(),
                bar(length, options.max_bar_length).yellow(),
                format!(" {count}").into(),
            ])
        })
        .collect()
}

fn histogram(distribution: &[f32]) -> [usize; BIN_COUNT] {
    let mut counts = [0usize; BIN_COUNT];
    for probability in distribution.iter().filter(|p| !p.is_nan()) {
        let bin = (probability.clamp(0.0, 1.0) * BIN_COUNT as f32) as usize;
        counts[bin.min(BIN_COUNT - 1)] += 1;
    }
    counts
}

/// `ln(1 + count) / ln(1 + max_count)` of the full bar.
fn log_bar_length(count: usize, max_count: usize, max_bar_length: usize) -> usize {
    if count == 0 || max_count == 0 {
        return 0;
    }
    let ratio = (count as f64).ln_1p() / (max_count as f64).ln_1p();
    ((ratio * max_bar_length as f64).floor() as usize).min(max_bar_length)
}
