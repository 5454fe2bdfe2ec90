//! Recent tokens drawn as large block letters.

use layerscope_core::MeasurementSnapshot;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;

use super::PanelMeta;
use super::RenderOptions;
use super::TextBlock;
use crate::text_formatting::truncate_text;

pub(super) const META: PanelMeta = PanelMeta {
    title: "Token Art",
    accent: Color::LightYellow,
};

const GLYPH_ROWS: usize = 5;
const MAX_ART_WIDTH: usize = 80;
const PALETTE: [Color; 6] = [
    Color::Red,
    Color::Green,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::Yellow,
];

/// 3x5 bitmaps, one `u8` per row, most significant of the three bits on the
/// left.
const GLYPHS: &[(char, [u8; GLYPH_ROWS])] = &[
    ('a', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('b', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('c', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('d', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('e', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('f', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('g', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('h', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('i', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('j', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('k', [0b101, 0b101, 0b110, 0b101, 0b101]),
    ('l', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('m', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('n', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('o', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('p', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('r', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('s', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('t', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('u', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('v', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('w', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('x', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b110, 0b001, 0b010, 0b100, 0b111]),
    ('3', [0b110, 0b001, 0b010, 0b001, 0b110]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b110, 0b001, 0b110]),
    ('6', [0b011, 0b100, 0b110, 0b101, 0b010]),
    ('7', [0b111, 0b001, 0b010, 0b010, 0b010]),
    ('8', [0b010, 0b101, 0b010, 0b101, 0b010]),
    ('9', [0b010, 0b101, 0b011, 0b001, 0b110]),
    ('.', [0b000, 0b000, 0b000, 0b000, 0b010]),
    (',', [0b000, 0b000, 0b000, 0b010, 0b100]),
    ('!', [0b010, 0b010, 0b010, 0b000, 0b010]),
    ('?', [0b110, 0b001, 0b010, 0b000, 0b010]),
];

const BLANK: [u8; GLYPH_ROWS] = [0; GLYPH_ROWS];

fn glyph(c: char) -> [u8; GLYPH_ROWS] {
    let c = c.to_ascii_lowercase();
    GLYPHS
        .iter()
        .find(|(key, _)| *key == c)
        .map_or(BLANK, |(_, rows)| *rows)
}

fn art_rows(word: &str) -> Vec<String> {
    (0..GLYPH_ROWS)
        .map(|row| {
            let mut line = String::new();
            for c in word.chars() {
                let bits = glyph(c)[row];
                for column in (0..3).rev() {
                    line.push_str(if bits & (1 << column) != 0 { "██" } else { "  " });
                }
                line.push(' ');
            }
            truncate_text(&line, MAX_ART_WIDTH)
        })
        .collect()
}

pub(super) fn render(snapshot: &MeasurementSnapshot, _options: &RenderOptions) -> TextBlock {
    let joined = snapshot.recent_tokens.concat();
    let word = joined.trim();
    let color = PALETTE[snapshot.step % PALETTE.len()];
    let art_style = Style::new().fg(color).bold();

    let mut lines: TextBlock = art_rows(if word.is_empty() { " " } else { word })
        .into_iter()
        .map(|row| Line::from(Span::styled(row, art_style)))
        .collect();
    lines.push(Line::default());
    let label = if word.is_empty() { "[SPACE]" } else { word };
    lines.push(Line::from(format!("'{label}'").white().bold()));
    lines
}
