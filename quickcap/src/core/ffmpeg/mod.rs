//! FFmpeg Integration Module
//!
//! The compositor boundary. Overlay schedules become FFmpeg syntax only here:
//!
//! - `filtergraph.rs` - schedule to `-filter_complex`
//! - `invocation.rs`  - inputs, mapping and encoder arguments
//! - `runner.rs`      - bounded ffmpeg/ffprobe execution
//! - `detection.rs`   - binary discovery

mod detection;
mod filtergraph;
mod invocation;
mod runner;

use std::path::Path;

use async_trait::async_trait;

pub use detection::{detect_ffmpeg, FFmpegInfo};
pub use filtergraph::to_filter_complex;
pub use invocation::CompositorInvocation;
pub use runner::{AudioStreamInfo, FFmpegRunner, MediaInfo, VideoStreamInfo};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set QUICKCAP_FFMPEG.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Compositor exited with {}: {}", describe_exit(.exit_code), stderr_tail(.stderr))]
    CompositorFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout: operation took too long")]
    Timeout,
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Last few stderr lines; ffmpeg prints its banner first and the cause last
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(3)..].join(" | ")
}

/// Turns a source video plus caption frames into the output video
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Rejects sources the compositor cannot read or that lack a video stream
    async fn validate_source(&self, source: &Path) -> FFmpegResult<MediaInfo>;

    /// Runs `invocation`; a failed run leaves no output file behind
    async fn composite(&self, invocation: &CompositorInvocation) -> FFmpegResult<()>;
}
