//! Caption Data Models
//!
//! Defines the word/phrase/frame structures that flow through the caption
//! pipeline.
//!
//! # Overview
//!
//! - `TranscriptSegment` / `Word`: timing data from the transcription step
//! - `Phrase`: a contiguous group of words rendered as one caption unit
//! - `FramePlan`: one caption image to render, with its visibility window
//! - `CaptionFrame`: a rendered plan, written to the request workspace

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::{TimeSec, TimeWindow};

// =============================================================================
// Transcription Output
// =============================================================================

/// A single timestamped word
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Word text (a single whitespace-free token once normalized)
    #[serde(alias = "word")]
    pub text: String,
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds
    pub end: TimeSec,
}

impl Word {
    /// Creates a new word
    pub fn new(text: impl Into<String>, start: TimeSec, end: TimeSec) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    /// The word's visibility window
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// A transcription segment with word-level timing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds
    pub end: TimeSec,
    /// Segment text
    #[serde(default)]
    pub text: String,
    /// Words in spoken order
    #[serde(default)]
    pub words: Vec<Word>,
}

impl TranscriptSegment {
    /// Builds a segment whose bounds and text are derived from its words
    pub fn from_words(words: Vec<Word>) -> Self {
        let start = words.first().map(|w| w.start).unwrap_or(0.0);
        let end = words.last().map(|w| w.end).unwrap_or(start);
        let text = words
            .iter()
            .map(|w| w.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            start,
            end,
            text,
            words,
        }
    }
}

// =============================================================================
// Phrases
// =============================================================================

/// A fixed-size contiguous group of words treated as one caption unit
#[derive(Clone, Debug, PartialEq)]
pub struct Phrase {
    words: Vec<Word>,
}

impl Phrase {
    /// Creates a phrase. Callers guarantee `words` is non-empty.
    pub(crate) fn new(words: Vec<Word>) -> Self {
        debug_assert!(!words.is_empty(), "phrases are never empty");
        Self { words }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Start of the first word
    pub fn start(&self) -> TimeSec {
        self.words.first().map(|w| w.start).unwrap_or(0.0)
    }

    /// End of the last word
    pub fn end(&self) -> TimeSec {
        self.words.last().map(|w| w.end).unwrap_or(0.0)
    }

    /// Window spanning every word of the phrase
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start(), self.end())
    }

    /// Words joined with single spaces
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn into_words(self) -> Vec<Word> {
        self.words
    }
}

// =============================================================================
// Frames
// =============================================================================

/// What a caption frame shows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FrameKind {
    /// Whole phrase in the base color, visible for the whole phrase
    Static,
    /// Whole phrase with one word emphasized, visible while that word is spoken
    Highlight { word_index: usize },
    /// A single word (word-by-word templates)
    SingleWord,
}

impl FrameKind {
    /// Frames that are shorter than their phrase need time-gated overlays
    pub fn is_time_gated(&self) -> bool {
        !matches!(self, FrameKind::Static)
    }
}

/// One caption image to render
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FramePlan {
    /// Emission order, starting at 0
    pub sequence: usize,
    /// Text of the rendering unit (phrase or single word), before case transform
    pub text: String,
    /// When the frame is visible
    pub window: TimeWindow,
    pub kind: FrameKind,
}

impl FramePlan {
    /// Global index of the emphasized word within the rendering unit
    pub fn highlight_index(&self) -> Option<usize> {
        match self.kind {
            FrameKind::Highlight { word_index } => Some(word_index),
            _ => None,
        }
    }

    /// Stable file name for the rendered image
    pub fn file_name(&self) -> String {
        match self.kind {
            FrameKind::Static => format!("phrase_{:05}.png", self.sequence),
            FrameKind::Highlight { word_index } => {
                format!("phrase_{:05}_w{}.png", self.sequence, word_index)
            }
            FrameKind::SingleWord => format!("word_{:05}.png", self.sequence),
        }
    }
}

/// A rendered caption frame
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionFrame {
    pub plan: FramePlan,
    /// Transparent PNG inside the request workspace
    pub image_path: PathBuf,
}

impl CaptionFrame {
    pub fn window(&self) -> TimeWindow {
        self.plan.window
    }

    pub fn is_time_gated(&self) -> bool {
        self.plan.kind.is_time_gated()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_bounds_and_text() {
        let phrase = Phrase::new(vec![
            Word::new("Hello", 0.5, 0.9),
            Word::new("there", 1.0, 1.4),
        ]);

        assert_eq!(phrase.start(), 0.5);
        assert_eq!(phrase.end(), 1.4);
        assert_eq!(phrase.text(), "Hello there");
        assert_eq!(phrase.window(), TimeWindow::new(0.5, 1.4));
    }

    #[test]
    fn test_segment_from_words() {
        let segment = TranscriptSegment::from_words(vec![
            Word::new(" Hi", 0.0, 0.2),
            Word::new(" all", 0.3, 0.6),
        ]);
        assert_eq!(segment.start, 0.0);
        assert_eq!(segment.end, 0.6);
        assert_eq!(segment.text, "Hi all");
    }

    #[test]
    fn test_frame_kind_gating() {
        assert!(!FrameKind::Static.is_time_gated());
        assert!(FrameKind::Highlight { word_index: 0 }.is_time_gated());
        assert!(FrameKind::SingleWord.is_time_gated());
    }

    #[test]
    fn test_frame_file_names_are_distinct() {
        let plan = |sequence, kind| FramePlan {
            sequence,
            text: "x".into(),
            window: TimeWindow::new(0.0, 1.0),
            kind,
        };
        let a = plan(0, FrameKind::Highlight { word_index: 0 }).file_name();
        let b = plan(1, FrameKind::Highlight { word_index: 1 }).file_name();
        let c = plan(2, FrameKind::Static).file_name();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(c.ends_with(".png"));
    }
}
