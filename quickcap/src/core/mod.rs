//! QuickCap Core Engine
//!
//! Caption timing, layout and compositing for short-form vertical video.
//! Transcription, font files and the ffmpeg binary are reached through the
//! seams defined here, so the whole pipeline runs against fakes in tests.

pub mod captions;
pub mod ffmpeg;
pub mod layout;
pub mod pipeline;
pub mod process;
pub mod schedule;
pub mod settings;
pub mod templates;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
mod tests_destructive;
