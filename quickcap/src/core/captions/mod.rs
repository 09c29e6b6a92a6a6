//! Caption Timing Module
//!
//! Turns speech into timed caption frames:
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────┐   ┌─────────────┐
//! │ Transcriber  │──▶│ normalize  │──▶│  chunk  │──▶│ plan_frames │
//! │ (whisper or  │   │ (one token │   │ (fixed- │   │ (static /   │
//! │  JSON file)  │   │  per word) │   │  size)  │   │  per word)  │
//! └──────────────┘   └────────────┘   └─────────┘   └─────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::core::captions::{chunk, normalize_segments, plan_frames};
//!
//! let words = normalize_segments(&segments);
//! let phrases = chunk(words, 6);
//! let plans = plan_frames(&phrases, template);
//! ```

pub mod audio;
mod chunker;
mod models;
mod planner;
mod transcript;
pub mod whisper;

pub use chunker::{chunk, normalize_segments, DEFAULT_WORDS_PER_PHRASE};
pub use models::{CaptionFrame, FrameKind, FramePlan, Phrase, TranscriptSegment, Word};
pub use planner::plan_frames;
pub use transcript::{parse_transcript, Transcriber, TranscriptError, TranscriptFile};
pub use whisper::{WhisperError, WhisperModel, WhisperTranscriber};
