//! Whisper Transcription Engine
//!
//! Speech-to-text with word-level timing using whisper.cpp via whisper-rs.
//! The engine is compiled only with the `whisper` feature; without it a stub
//! reports [`WhisperError::FeatureNotEnabled`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

use super::audio::{extract_speech_wav, load_audio_samples, WHISPER_SAMPLE_RATE};
use super::models::{TranscriptSegment, Word};
use super::transcript::Transcriber;
use crate::core::CoreResult;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during transcription
#[derive(Error, Debug)]
pub enum WhisperError {
    /// Whisper model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Failed to load Whisper model
    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    /// Failed to prepare audio samples
    #[error("Failed to read audio: {0}")]
    AudioReadError(String),

    /// Transcription inference failed
    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    /// Whisper feature not enabled
    #[error("Whisper feature not enabled. Rebuild with --features whisper")]
    FeatureNotEnabled,
}

/// Result type for whisper operations
pub type WhisperResult<T> = Result<T, WhisperError>;

// =============================================================================
// Whisper Model Types
// =============================================================================

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhisperModel {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Returns the ggml filename for this model size
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large.bin",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(WhisperError::ModelLoadError(format!(
                "Unknown model size: {}",
                s
            ))),
        }
    }
}

/// Returns the default directory searched for ggml model files
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quickcap")
        .join("models")
        .join("whisper")
}

/// Checks if whisper transcription is compiled in
pub fn is_whisper_available() -> bool {
    cfg!(feature = "whisper")
}

// =============================================================================
// Transcription Options
// =============================================================================

/// Options for transcription
#[derive(Debug, Clone)]
pub struct TranscriptionOptions {
    /// Language code (e.g., "en", "ko") or "auto" for detection
    pub language: Option<String>,
    /// Number of threads to use (0 = auto)
    pub threads: u32,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: Some("auto".to_string()),
            threads: 0,
        }
    }
}

// =============================================================================
// Token Grouping
// =============================================================================

/// A decoded token with its timestamps in centiseconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedToken {
    pub text: String,
    pub t0: i64,
    pub t1: i64,
}

impl TimedToken {
    pub fn new(text: impl Into<String>, t0: i64, t1: i64) -> Self {
        Self {
            text: text.into(),
            t0,
            t1,
        }
    }

    /// Control tokens such as `[_BEG_]` or `<|endoftext|>`
    fn is_special(&self) -> bool {
        let trimmed = self.text.trim_start();
        trimmed.starts_with("[_") || trimmed.starts_with("<|")
    }
}

/// Merges sub-word tokens into timed words.
///
/// A token with leading whitespace starts a new word; other tokens extend the
/// current one. Word times come from the first and last contributing tokens.
pub fn group_tokens_into_words(tokens: &[TimedToken]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(String, i64, i64)> = None;

    for token in tokens.iter().filter(|t| !t.is_special()) {
        let starts_word = token.text.starts_with(char::is_whitespace);
        match current.as_mut() {
            Some((text, _, end)) if !starts_word => {
                text.push_str(&token.text);
                *end = token.t1.max(*end);
            }
            _ => {
                if let Some(done) = current.take() {
                    push_word(&mut words, done);
                }
                current = Some((token.text.clone(), token.t0, token.t1));
            }
        }
    }
    if let Some(done) = current {
        push_word(&mut words, done);
    }

    words
}

fn push_word(words: &mut Vec<Word>, (text, t0, t1): (String, i64, i64)) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    words.push(Word::new(
        text,
        centis_to_secs(t0),
        centis_to_secs(t1.max(t0)),
    ));
}

fn centis_to_secs(t: i64) -> f64 {
    t.max(0) as f64 / 100.0
}

// =============================================================================
// Whisper Engine - Feature-gated Implementation
// =============================================================================

#[cfg(feature = "whisper")]
mod engine_impl {
    use super::*;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper transcription engine
    pub struct WhisperEngine {
        context: WhisperContext,
        model_name: String,
    }

    impl WhisperEngine {
        /// Loads the ggml model at `model_path`
        pub fn new(model_path: &Path) -> WhisperResult<Self> {
            if !model_path.exists() {
                return Err(WhisperError::ModelNotFound(
                    model_path.to_string_lossy().to_string(),
                ));
            }

            let path = model_path.to_str().ok_or_else(|| {
                WhisperError::ModelLoadError("Model path is not valid UTF-8".to_string())
            })?;
            let params = WhisperContextParameters::default();
            let context = WhisperContext::new_with_params(path, params)
                .map_err(|e| WhisperError::ModelLoadError(e.to_string()))?;

            let model_name = model_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            Ok(Self {
                context,
                model_name,
            })
        }

        pub fn model_name(&self) -> &str {
            &self.model_name
        }

        /// Transcribes 16 kHz mono samples into segments with word timing
        pub fn transcribe(
            &self,
            samples: &[f32],
            options: &TranscriptionOptions,
        ) -> WhisperResult<Vec<TranscriptSegment>> {
            let mut state = self
                .context
                .create_state()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if let Some(ref lang) = options.language {
                if lang != "auto" {
                    params.set_language(Some(lang));
                }
            }
            params.set_token_timestamps(true);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);
            if options.threads > 0 {
                params.set_n_threads(options.threads as i32);
            }

            state
                .full(params, samples)
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
            for i in 0..num_segments {
                let num_tokens = state
                    .full_n_tokens(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

                let mut tokens = Vec::with_capacity(num_tokens.max(0) as usize);
                for j in 0..num_tokens {
                    let text = state
                        .full_get_token_text(i, j)
                        .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;
                    let data = state
                        .full_get_token_data(i, j)
                        .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;
                    tokens.push(TimedToken::new(text, data.t0, data.t1));
                }

                let words = group_tokens_into_words(&tokens);
                if !words.is_empty() {
                    segments.push(TranscriptSegment::from_words(words));
                }
            }

            Ok(segments)
        }
    }
}

#[cfg(feature = "whisper")]
pub use engine_impl::WhisperEngine;

// =============================================================================
// Stub Implementation (when whisper feature is disabled)
// =============================================================================

#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine;

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Creates a new WhisperEngine (stub - returns error)
    pub fn new(_model_path: &Path) -> WhisperResult<Self> {
        Err(WhisperError::FeatureNotEnabled)
    }

    pub fn model_name(&self) -> &str {
        ""
    }

    /// Transcribes audio samples (stub - returns error)
    pub fn transcribe(
        &self,
        _samples: &[f32],
        _options: &TranscriptionOptions,
    ) -> WhisperResult<Vec<TranscriptSegment>> {
        Err(WhisperError::FeatureNotEnabled)
    }
}

// =============================================================================
// Transcriber
// =============================================================================

/// [`Transcriber`] backed by a lazily loaded Whisper model
pub struct WhisperTranscriber {
    ffmpeg: PathBuf,
    model_path: PathBuf,
    options: TranscriptionOptions,
    engine: OnceCell<Arc<WhisperEngine>>,
}

impl WhisperTranscriber {
    pub fn new(ffmpeg: PathBuf, model_path: PathBuf, options: TranscriptionOptions) -> Self {
        Self {
            ffmpeg,
            model_path,
            options,
            engine: OnceCell::new(),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    async fn engine(&self) -> WhisperResult<Arc<WhisperEngine>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                let model_path = self.model_path.clone();
                info!("Loading Whisper model from {}", model_path.display());
                tokio::task::spawn_blocking(move || WhisperEngine::new(&model_path))
                    .await
                    .map_err(|e| WhisperError::ModelLoadError(e.to_string()))?
                    .map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, media: &Path, scratch: &Path) -> CoreResult<Vec<TranscriptSegment>> {
        if !is_whisper_available() {
            return Err(WhisperError::FeatureNotEnabled.into());
        }

        let wav = extract_speech_wav(&self.ffmpeg, media, scratch)
            .await
            .map_err(|e| WhisperError::AudioReadError(e.to_string()))?;
        let engine = self.engine().await?;
        let options = self.options.clone();

        let segments = tokio::task::spawn_blocking(move || {
            let samples = load_audio_samples(&wav)
                .map_err(|e| WhisperError::AudioReadError(e.to_string()))?;
            info!(
                "Transcribing {:.1}s of audio with model {}",
                samples.len() as f64 / WHISPER_SAMPLE_RATE as f64,
                engine.model_name()
            );
            engine.transcribe(&samples, &options)
        })
        .await??;

        Ok(segments)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_model_filename() {
        assert_eq!(WhisperModel::Tiny.filename(), "ggml-tiny.bin");
        assert_eq!(WhisperModel::default().filename(), "ggml-small.bin");
        assert_eq!(WhisperModel::Large.filename(), "ggml-large.bin");
    }

    #[test]
    fn test_whisper_model_from_str() {
        assert_eq!("tiny".parse::<WhisperModel>().unwrap(), WhisperModel::Tiny);
        assert_eq!("BASE".parse::<WhisperModel>().unwrap(), WhisperModel::Base);
        assert!("invalid".parse::<WhisperModel>().is_err());
    }

    #[test]
    fn test_group_tokens_merges_subwords() {
        let tokens = vec![
            TimedToken::new("[_BEG_]", 0, 0),
            TimedToken::new(" Hel", 10, 30),
            TimedToken::new("lo", 30, 45),
            TimedToken::new(" world", 50, 90),
            TimedToken::new("!", 90, 95),
            TimedToken::new("<|endoftext|>", 95, 95),
        ];

        let words = group_tokens_into_words(&tokens);
        assert_eq!(
            words,
            vec![Word::new("Hello", 0.10, 0.45), Word::new("world!", 0.50, 0.95)]
        );
    }

    #[test]
    fn test_group_tokens_first_token_without_space() {
        let tokens = vec![TimedToken::new("Yes", 0, 20), TimedToken::new(" no", 25, 40)];
        let words = group_tokens_into_words(&tokens);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Yes");
    }

    #[test]
    fn test_group_tokens_skips_blank_and_fixes_inverted_times() {
        let tokens = vec![TimedToken::new(" ", 0, 5), TimedToken::new(" odd", 40, 30)];
        let words = group_tokens_into_words(&tokens);
        assert_eq!(words, vec![Word::new("odd", 0.40, 0.40)]);
    }

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().to_string_lossy().contains("whisper"));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_engine_stub_returns_error() {
        let result = WhisperEngine::new(Path::new("/some/model.bin"));
        assert!(matches!(
            result.unwrap_err(),
            WhisperError::FeatureNotEnabled
        ));
    }

    #[cfg(not(feature = "whisper"))]
    #[tokio::test]
    async fn test_transcriber_without_feature_fails() {
        let transcriber = WhisperTranscriber::new(
            PathBuf::from("ffmpeg"),
            PathBuf::from("/models/ggml-small.bin"),
            TranscriptionOptions::default(),
        );
        let dir = tempfile::TempDir::new().unwrap();
        let err = transcriber
            .transcribe(Path::new("/nonexistent.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not enabled"));
    }
}
