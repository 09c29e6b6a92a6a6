//! Transcription boundary.
//!
//! [`Transcriber`] is the seam between the caption pipeline and whatever
//! produces word timing. [`TranscriptFile`] replays a Whisper-style JSON
//! transcript from disk instead of running a model:
//!
//! ```json
//! {"segments": [{"start": 0.0, "end": 1.2, "text": " Hi there",
//!   "words": [{"word": " Hi", "start": 0.0, "end": 0.4}, ...]}]}
//! ```
//!
//! A bare array of segments is accepted too. Segments without word timing have
//! their text spread evenly over the segment window.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{TranscriptSegment, Word};
use crate::core::CoreResult;

/// Produces timestamped words for a media file
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes `media`; `scratch` is a request-private directory for
    /// intermediate files.
    async fn transcribe(&self, media: &Path, scratch: &Path) -> CoreResult<Vec<TranscriptSegment>>;
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("Transcript not found: {0}")]
    NotFound(String),

    #[error("Failed to read transcript: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed transcript: {0}")]
    Malformed(#[from] serde_json::Error),
}

// =============================================================================
// Transcript Files
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptDocument {
    Wrapped { segments: Vec<TranscriptSegment> },
    Bare(Vec<TranscriptSegment>),
}

/// Parses a transcript document, filling in word timing where it is missing
pub fn parse_transcript(content: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
    let segments = match serde_json::from_str(content)? {
        TranscriptDocument::Wrapped { segments } => segments,
        TranscriptDocument::Bare(segments) => segments,
    };

    Ok(segments
        .into_iter()
        .map(|mut segment| {
            if segment.words.is_empty() && !segment.text.trim().is_empty() {
                debug!(
                    "Segment {:.2}-{:.2} has no word timing, spreading text evenly",
                    segment.start, segment.end
                );
                segment.words = spread_words(&segment.text, segment.start, segment.end);
            }
            segment
        })
        .collect())
}

/// Assigns each whitespace token of `text` an equal share of `[start, end]`
fn spread_words(text: &str, start: f64, end: f64) -> Vec<Word> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    let step = (end - start).max(0.0) / tokens.len() as f64;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let token_start = start + step * i as f64;
            Word::new(*token, token_start, token_start + step)
        })
        .collect()
}

/// [`Transcriber`] that ignores the media and returns a stored transcript
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<TranscriptSegment>, TranscriptError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TranscriptError::NotFound(
                    self.path.to_string_lossy().to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        let segments = parse_transcript(&content)?;
        if segments.is_empty() {
            warn!("Transcript {} contains no segments", self.path.display());
        }
        Ok(segments)
    }
}

#[async_trait]
impl Transcriber for TranscriptFile {
    async fn transcribe(&self, _media: &Path, _scratch: &Path) -> CoreResult<Vec<TranscriptSegment>> {
        Ok(self.load().await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoreError;
    use tempfile::TempDir;

    const WHISPER_JSON: &str = r#"{
        "text": " Hello world",
        "segments": [
            {
                "id": 0,
                "start": 0.0,
                "end": 1.0,
                "text": " Hello world",
                "words": [
                    {"word": " Hello", "start": 0.0, "end": 0.4, "probability": 0.9},
                    {"word": " world", "start": 0.5, "end": 1.0, "probability": 0.8}
                ]
            }
        ],
        "language": "en"
    }"#;

    #[test]
    fn test_parse_whisper_document() {
        let segments = parse_transcript(WHISPER_JSON).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].words.len(), 2);
        assert_eq!(segments[0].words[1].text, " world");
        assert_eq!(segments[0].words[1].end, 1.0);
    }

    #[test]
    fn test_parse_bare_segment_list() {
        let content = r#"[{"start": 1.0, "end": 2.0, "words": [{"text": "hi", "start": 1.0, "end": 1.5}]}]"#;
        let segments = parse_transcript(content).unwrap();
        assert_eq!(segments[0].words[0], Word::new("hi", 1.0, 1.5));
    }

    #[test]
    fn test_segment_without_words_is_spread() {
        let content = r#"{"segments": [{"start": 0.0, "end": 2.0, "text": "one two three four"}]}"#;
        let segments = parse_transcript(content).unwrap();
        let words = &segments[0].words;
        assert_eq!(words.len(), 4);
        assert_eq!(words[0], Word::new("one", 0.0, 0.5));
        assert_eq!(words[3], Word::new("four", 1.5, 2.0));
    }

    #[test]
    fn test_malformed_transcript() {
        assert!(matches!(
            parse_transcript("{\"segments\": 3}"),
            Err(TranscriptError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_transcript_file_transcriber() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.json");
        std::fs::write(&path, WHISPER_JSON).unwrap();

        let transcriber = TranscriptFile::new(&path);
        let segments = transcriber
            .transcribe(Path::new("ignored.mp4"), dir.path())
            .await
            .unwrap();
        assert_eq!(segments[0].words.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_transcript_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let transcriber = TranscriptFile::new(dir.path().join("missing.json"));
        let err = transcriber
            .transcribe(Path::new("ignored.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }
}
