//! Speech Audio Extraction
//!
//! Pulls the audio track of an uploaded clip into a 16 kHz mono PCM WAV in the
//! request workspace, then decodes it into normalized samples for Whisper.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::core::process::{run_bounded, RunOutcome};

/// Sample rate Whisper expects
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Upper bound for a single extraction run
const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during audio extraction
#[derive(Error, Debug)]
pub enum AudioExtractionError {
    /// Input file not found
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    /// Output directory does not exist
    #[error("Output directory does not exist: {0}")]
    OutputDirNotFound(String),

    /// FFmpeg returned a non-zero exit code
    #[error("Audio extraction failed: {0}")]
    ProcessError(String),

    #[error("Audio extraction timed out")]
    Timeout,

    /// The WAV file could not be decoded or has the wrong layout
    #[error("Invalid speech audio: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for audio extraction operations
pub type AudioResult<T> = Result<T, AudioExtractionError>;

// =============================================================================
// Extraction
// =============================================================================

/// Extracts the speech track of `input` as `<scratch>/speech.wav`.
///
/// Returns the path of the written WAV file.
pub async fn extract_speech_wav(
    ffmpeg: &Path,
    input: &Path,
    scratch: &Path,
) -> AudioResult<PathBuf> {
    if !input.exists() {
        return Err(AudioExtractionError::InputNotFound(
            input.to_string_lossy().to_string(),
        ));
    }
    if !scratch.is_dir() {
        return Err(AudioExtractionError::OutputDirNotFound(
            scratch.to_string_lossy().to_string(),
        ));
    }

    let output = scratch.join("speech.wav");
    let mut cmd = tokio::process::Command::new(ffmpeg);
    cmd.arg("-i")
        .arg(input)
        .args(["-vn", "-ar"])
        .arg(WHISPER_SAMPLE_RATE.to_string())
        .args(["-ac", "1", "-c:a", "pcm_s16le", "-y"])
        .arg(&output);

    debug!("Extracting speech audio: {:?}", cmd.as_std());

    match run_bounded(&mut cmd, Some(EXTRACTION_TIMEOUT)).await? {
        RunOutcome::Completed(result) if result.success() => Ok(output),
        RunOutcome::Completed(result) => Err(AudioExtractionError::ProcessError(
            last_lines(&result.stderr, 5),
        )),
        RunOutcome::TimedOut => Err(AudioExtractionError::Timeout),
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

// =============================================================================
// Decoding
// =============================================================================

/// Loads a 16 kHz mono WAV as f32 samples normalized to [-1.0, 1.0].
pub fn load_audio_samples(wav_path: &Path) -> AudioResult<Vec<f32>> {
    let reader = hound::WavReader::open(wav_path).map_err(|e| {
        AudioExtractionError::InvalidAudio(format!("Failed to open WAV file: {}", e))
    })?;

    let spec = reader.spec();
    if spec.sample_rate != WHISPER_SAMPLE_RATE {
        return Err(AudioExtractionError::InvalidAudio(format!(
            "Expected 16kHz sample rate, got {} Hz",
            spec.sample_rate
        )));
    }
    if spec.channels != 1 {
        return Err(AudioExtractionError::InvalidAudio(format!(
            "Expected mono audio, got {} channels",
            spec.channels
        )));
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (hound::SampleFormat::Int, 32) => reader
            .into_samples::<i32>()
            .filter_map(Result::ok)
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .filter_map(Result::ok)
            .map(|s| s.clamp(-1.0, 1.0))
            .collect(),
        (_, bits) => {
            return Err(AudioExtractionError::InvalidAudio(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    };

    Ok(samples)
}

// =============================================================================
// Tests
// =============================================================================
