//! Settings Persistence System
//!
//! Provides the server/CLI configuration with:
//! - Schema defaults for every field (a partial file is valid)
//! - Normalization of out-of-range values instead of hard failures
//! - `QUICKCAP_*` environment overrides applied after the file
//! - Atomic file writes (temp file + rename)
//!
//! Default storage location: {data_local_dir}/quickcap/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::captions::whisper::{default_models_dir, TranscriptionOptions, WhisperModel};
use crate::core::captions::DEFAULT_WORDS_PER_PHRASE;
use crate::core::layout::CanvasSpec;
use crate::core::schedule::ScheduleConfig;

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "QUICKCAP_";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Request surface settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Output geometry and caption placement
    #[serde(default)]
    pub video: VideoSettings,

    /// Compositor encoding settings
    #[serde(default)]
    pub encoder: EncoderSettings,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathSettings,

    /// Speech-to-text settings
    #[serde(default)]
    pub transcription: TranscriptionSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            server: ServerSettings::default(),
            video: VideoSettings::default(),
            encoder: EncoderSettings::default(),
            paths: PathSettings::default(),
            transcription: TranscriptionSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so loaded state is always valid.
    ///
    /// Tolerant on purpose: bad values are corrected, never rejected.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        if self.server.host.trim().is_empty() {
            self.server.host = default_host();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        self.server.max_concurrent_jobs = self.server.max_concurrent_jobs.clamp(1, 64);
        self.server.max_upload_bytes = self
            .server
            .max_upload_bytes
            .clamp(1024 * 1024, 16 * 1024 * 1024 * 1024);

        self.video.width = even(self.video.width.clamp(128, 4096));
        self.video.height = even(self.video.height.clamp(128, 4096));
        self.video.caption_canvas_height = self
            .video
            .caption_canvas_height
            .clamp(32, self.video.height);
        self.video.max_text_width_ratio = clamp_f64(self.video.max_text_width_ratio, 0.1, 1.0);
        self.video.caption_y_position = clamp_f64(self.video.caption_y_position, 0.0, 0.95);
        self.video.words_per_phrase = self.video.words_per_phrase.clamp(1, 32);

        if self.encoder.software_codec.trim().is_empty() {
            self.encoder.software_codec = default_software_codec();
        }
        if self.encoder.hardware_codec.trim().is_empty() {
            self.encoder.hardware_codec = default_hardware_codec();
        }
        if self.encoder.audio_codec.trim().is_empty() {
            self.encoder.audio_codec = default_audio_codec();
        }
        self.encoder.preset = normalize_enum(
            &self.encoder.preset,
            &[
                "ultrafast",
                "superfast",
                "veryfast",
                "faster",
                "fast",
                "medium",
                "slow",
                "slower",
                "veryslow",
            ],
            default_preset(),
        );
        if !is_bitrate(&self.encoder.video_bitrate) {
            self.encoder.video_bitrate = default_video_bitrate();
        }
        self.encoder.timeout_secs = self.encoder.timeout_secs.clamp(10, 24 * 60 * 60);

        if self.paths.font_dirs.is_empty() {
            self.paths.font_dirs = default_font_dirs();
        }

        self.transcription.model = normalize_enum(
            &self.transcription.model,
            &["tiny", "base", "small", "medium", "large"],
            default_model(),
        );
        if let Some(language) = &self.transcription.language {
            if language.trim().is_empty() {
                self.transcription.language = None;
            }
        }
    }

    /// Applies `QUICKCAP_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, keyed by full variable name.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid {}PORT value: {}", ENV_PREFIX, port),
            }
        }
        if let Some(dir) = var("WORK_DIR") {
            self.paths.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("FONT_DIR") {
            self.paths.font_dirs = vec![PathBuf::from(dir)];
        }
        if let Some(path) = var("FFMPEG") {
            self.paths.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("FFPROBE") {
            self.paths.ffprobe_path = Some(PathBuf::from(path));
        }
        if let Some(model) = var("WHISPER_MODEL") {
            // Either a size name or a path to a ggml file
            if model.parse::<WhisperModel>().is_ok() {
                self.transcription.model = model.to_ascii_lowercase();
            } else {
                self.transcription.model_path = Some(PathBuf::from(model));
            }
        }
        if let Some(flag) = var("ALLOW_HARDWARE") {
            match parse_bool(&flag) {
                Some(allow) => self.encoder.allow_hardware = allow,
                None => warn!("Ignoring invalid {}ALLOW_HARDWARE value: {}", ENV_PREFIX, flag),
            }
        }
        if let Some(dir) = var("LOG_DIR") {
            self.paths.log_dir = Some(PathBuf::from(dir));
        }
    }

    /// Caption canvas derived from the video section
    pub fn canvas_spec(&self) -> CanvasSpec {
        CanvasSpec {
            width: self.video.width,
            height: self.video.caption_canvas_height,
            max_text_width_ratio: self.video.max_text_width_ratio,
        }
    }

    /// Overlay schedule knobs derived from the video and encoder sections
    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            target_width: self.video.width,
            target_height: self.video.height,
            caption_y_position: self.video.caption_y_position,
            allow_hardware: self.encoder.allow_hardware,
        }
    }

    /// Compositor timeout
    pub fn composite_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.encoder.timeout_secs)
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

/// Encoders reject odd dimensions for yuv420p output
fn even(value: u32) -> u32 {
    value & !1
}

/// FFmpeg bitrate syntax: digits with an optional k/M/G suffix
fn is_bitrate(value: &str) -> bool {
    let digits = value.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    !digits.is_empty()
        && value.len() - digits.len() <= 1
        && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================
// Server Settings
// ============================================================

/// Request surface settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Pipelines allowed to run at once
    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: usize,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_jobs: default_max_jobs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_jobs() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn default_max_upload_bytes() -> u64 {
    2 * 1024 * 1024 * 1024 // 2GB
}

// ============================================================
// Video Settings
// ============================================================

/// Output geometry and caption placement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// Output width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Height of each rendered caption image
    #[serde(default = "default_canvas_height")]
    pub caption_canvas_height: u32,

    /// Fraction of the width text may occupy (0.1 - 1.0)
    #[serde(default = "default_max_text_width_ratio")]
    pub max_text_width_ratio: f64,

    /// Caption top edge as a fraction of output height (0.0 - 0.95)
    #[serde(default = "default_caption_y_position")]
    pub caption_y_position: f64,

    /// Words grouped into one phrase
    #[serde(default = "default_words_per_phrase")]
    pub words_per_phrase: usize,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            caption_canvas_height: default_canvas_height(),
            max_text_width_ratio: default_max_text_width_ratio(),
            caption_y_position: default_caption_y_position(),
            words_per_phrase: default_words_per_phrase(),
        }
    }
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_canvas_height() -> u32 {
    300
}

fn default_max_text_width_ratio() -> f64 {
    0.8
}

fn default_caption_y_position() -> f64 {
    0.7
}

fn default_words_per_phrase() -> usize {
    DEFAULT_WORDS_PER_PHRASE
}

// ============================================================
// Encoder Settings
// ============================================================

/// Compositor encoding settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncoderSettings {
    /// Video encoder for the CPU profile
    #[serde(default = "default_software_codec")]
    pub software_codec: String,

    /// Video encoder for the GPU profile
    #[serde(default = "default_hardware_codec")]
    pub hardware_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Encoder preset (ultrafast, ..., veryslow)
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Target video bitrate in FFmpeg syntax (e.g. "5M")
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Permit the GPU profile when every overlay spans a whole phrase
    #[serde(default = "default_true")]
    pub allow_hardware: bool,

    /// Compositor wall-clock limit
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            software_codec: default_software_codec(),
            hardware_codec: default_hardware_codec(),
            audio_codec: default_audio_codec(),
            preset: default_preset(),
            video_bitrate: default_video_bitrate(),
            allow_hardware: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_software_codec() -> String {
    "libx264".to_string()
}

fn default_hardware_codec() -> String {
    "h264_nvenc".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_video_bitrate() -> String {
    "5M".to_string()
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_true() -> bool {
    true
}

// ============================================================
// Path Settings
// ============================================================

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathSettings {
    /// Parent of the per-request workspaces
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Directories searched for template font files
    #[serde(default = "default_font_dirs")]
    pub font_dirs: Vec<PathBuf>,

    /// Explicit ffmpeg binary (otherwise discovered)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe binary (otherwise discovered)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Daily-rolling log file directory; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            font_dirs: default_font_dirs(),
            ffmpeg_path: None,
            ffprobe_path: None,
            log_dir: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("quickcap")
        .join("work")
}

fn default_font_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("fonts")]
}

// ============================================================
// Transcription Settings
// ============================================================

/// Speech-to-text settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionSettings {
    /// Whisper model size (tiny, base, small, medium, large)
    #[serde(default = "default_model")]
    pub model: String,

    /// Explicit ggml model file; overrides `model`
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Language code; unset means auto-detect
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            model_path: None,
            language: None,
        }
    }
}

fn default_model() -> String {
    "small".to_string()
}

impl TranscriptionSettings {
    /// Model file to load: the explicit path, else the sized model in the
    /// default models directory
    pub fn resolved_model_path(&self) -> PathBuf {
        if let Some(path) = &self.model_path {
            return path.clone();
        }
        let model = self.model.parse::<WhisperModel>().unwrap_or_default();
        default_models_dir().join(model.filename())
    }

    pub fn options(&self) -> TranscriptionOptions {
        TranscriptionOptions {
            language: Some(
                self.language
                    .clone()
                    .unwrap_or_else(|| "auto".to_string()),
            ),
            threads: 0,
        }
    }
}

// ============================================================
// Settings Manager
// ============================================================

/// Settings manager for loading and saving a settings file
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a settings manager for an explicit file
    pub fn new(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    /// Create a settings manager for `{config_dir}/settings.json`
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(SETTINGS_FILE))
    }

    /// Manager for the platform default location
    pub fn default_location() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quickcap");
        Self::in_dir(&dir)
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, then apply environment overrides.
    ///
    /// A missing or unreadable file yields defaults.
    pub fn load(&self) -> AppSettings {
        let mut settings = self.load_file();
        settings.apply_env_overrides();
        settings.normalize();
        settings
    }

    /// Load settings from disk without consulting the environment
    pub fn load_file(&self) -> AppSettings {
        match self.read() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    fn read(&self) -> Result<AppSettings, String> {
        if !self.settings_path.exists() {
            info!(
                "Settings file {} not found, using defaults",
                self.settings_path.display()
            );
            return Ok(AppSettings::default());
        }

        let content = fs::read_to_string(&self.settings_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        let mut settings = serde_json::from_str::<AppSettings>(&content)
            .map_err(|e| format!("Failed to parse settings file: {}", e))?;

        if settings.version < SETTINGS_VERSION {
            info!(
                "Migrating settings from version {} to {}",
                settings.version, SETTINGS_VERSION
            );
            settings.version = SETTINGS_VERSION;
        }

        settings.normalize();
        Ok(settings)
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> Result<AppSettings, String> {
        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        let mut normalized = settings.clone();
        normalized.normalize();

        let content = serde_json::to_string_pretty(&normalized)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)
            .map_err(|e| format!("Failed to create temp settings file: {}", e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| format!("Failed to write settings: {}", e))?;
        file.sync_all()
            .map_err(|e| format!("Failed to sync settings file: {}", e))?;

        if cfg!(windows) && self.settings_path.exists() {
            // Windows: rename does not overwrite.
            let _ = fs::remove_file(&self.settings_path);
        }
        fs::rename(&temp_path, &self.settings_path)
            .map_err(|e| format!("Failed to finalize settings file: {}", e))?;

        info!("Settings saved to {}", self.settings_path.display());
        Ok(normalized)
    }
}
