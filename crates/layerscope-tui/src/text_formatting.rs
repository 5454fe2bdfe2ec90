use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Truncate `text` to `max_graphemes` graphemes. Using graphemes to avoid accidentally truncating in the middle of a multi-codepoint character.
pub(crate) fn truncate_text(text: &str, max_graphemes: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);

    // A grapheme at position `max_graphemes` means the text is too long.
    let Some((byte_index, _)) = graphemes.nth(max_graphemes) else {
        return text.to_string();
    };

    if max_graphemes >= 3 {
        // Keep `max_graphemes - 3` and add "..." to stay within the limit.
        match text.grapheme_indices(true).nth(max_graphemes - 3) {
            Some((truncate_byte_index, _)) => format!("{}...", &text[..truncate_byte_index]),
            None => text.to_string(),
        }
    } else {
        text[..byte_index].to_string()
    }
}

/// The last `max_graphemes` graphemes of `text`.
pub(crate) fn tail_graphemes(text: &str, max_graphemes: usize) -> &str {
    if max_graphemes == 0 {
        return "";
    }
    match text.grapheme_indices(true).rev().nth(max_graphemes - 1) {
        Some((byte_index, _)) => &text[byte_index..],
        None => text,
    }
}

/// Left-align `text` in a column `width` cells wide. Wide characters count
/// as two cells, so `format!("{:<10}")` would misalign them.
pub(crate) fn pad_to_width(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    let mut padded = text.to_string();
    padded.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    padded
}
