//! Word stream normalization and phrase chunking.

use tracing::debug;

use super::models::{Phrase, TranscriptSegment, Word};

/// Default number of words per caption phrase
pub const DEFAULT_WORDS_PER_PHRASE: usize = 6;

/// Flattens transcription segments into one ordered stream of words.
///
/// Every returned word is a single non-empty token with `0 <= start <= end`.
/// Words carrying several tokens are split, sharing their window evenly, so
/// word indices line up with the tokens the layout engine wraps.
pub fn normalize_segments(segments: &[TranscriptSegment]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut dropped = 0usize;

    for word in segments.iter().flat_map(|s| s.words.iter()) {
        let tokens: Vec<&str> = word.text.split_whitespace().collect();
        if tokens.is_empty() {
            dropped += 1;
            continue;
        }

        let (start, end) = sanitize_times(word.start, word.end);
        if tokens.len() == 1 {
            words.push(Word::new(tokens[0], start, end));
            continue;
        }

        let step = (end - start) / tokens.len() as f64;
        for (i, token) in tokens.iter().enumerate() {
            let token_start = start + step * i as f64;
            let token_end = if i + 1 == tokens.len() {
                end
            } else {
                token_start + step
            };
            words.push(Word::new(*token, token_start, token_end));
        }
    }

    if dropped > 0 {
        debug!("Dropped {} empty words from transcript", dropped);
    }

    // Stable: words sharing a start keep their spoken order.
    words.sort_by(|a, b| a.start.total_cmp(&b.start));
    words
}

fn sanitize_times(start: f64, end: f64) -> (f64, f64) {
    let start = if start.is_finite() { start.max(0.0) } else { 0.0 };
    let end = if end.is_finite() { end.max(0.0) } else { start };
    if start > end {
        (end, start)
    } else {
        (start, end)
    }
}

/// Groups words into phrases of exactly `size` words; the final phrase holds
/// the remainder. A `size` of 0 is treated as 1.
pub fn chunk(words: Vec<Word>, size: usize) -> Vec<Phrase> {
    let size = size.max(1);
    let mut phrases = Vec::with_capacity(words.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);

    for word in words {
        current.push(word);
        if current.len() == size {
            phrases.push(Phrase::new(std::mem::replace(
                &mut current,
                Vec::with_capacity(size),
            )));
        }
    }
    if !current.is_empty() {
        phrases.push(Phrase::new(current));
    }

    phrases
}

// =============================================================================
// Tests
// =============================================================================
