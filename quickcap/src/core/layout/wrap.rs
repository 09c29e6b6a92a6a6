//! Greedy word-granularity line wrapping.

use super::font::GlyphFont;

/// One visual row of a caption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutLine {
    /// Row text, words joined by single spaces
    pub text: String,
    /// Indices into the wrapped word sequence, in order
    pub word_indices: Vec<usize>,
    pub width: u32,
    pub height: u32,
}

/// Wrapped text with a word-to-line mapping parallel to the input words
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrappedText {
    pub lines: Vec<LayoutLine>,
    pub word_lines: Vec<usize>,
}

impl WrappedText {
    /// Sum of line heights plus `spacing` after every line
    pub fn block_height(&self, spacing: u32) -> u32 {
        self.lines.iter().map(|l| l.height + spacing).sum()
    }
}

/// Wraps `words` into lines no wider than `max_width` where possible.
///
/// A word that alone exceeds `max_width` gets a line of its own; words are
/// never broken.
pub fn wrap_words(words: &[&str], font: &dyn GlyphFont, max_width: u32) -> WrappedText {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_text = String::new();

    for (index, word) in words.iter().enumerate() {
        if current.is_empty() {
            current_text.push_str(word);
            current.push(index);
            continue;
        }
        let candidate = format!("{current_text} {word}");
        if font.measure(&candidate).width <= max_width {
            current_text = candidate;
            current.push(index);
        } else {
            groups.push(std::mem::take(&mut current));
            current_text = (*word).to_string();
            current.push(index);
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let mut word_lines = vec![0; words.len()];
    let lines = groups
        .into_iter()
        .enumerate()
        .map(|(line_index, indices)| {
            for &i in &indices {
                word_lines[i] = line_index;
            }
            let text = indices
                .iter()
                .map(|&i| words[i])
                .collect::<Vec<_>>()
                .join(" ");
            let size = font.measure(&text);
            LayoutLine {
                text,
                word_indices: indices,
                width: size.width,
                height: size.height,
            }
        })
        .collect();

    WrappedText { lines, word_lines }
}
