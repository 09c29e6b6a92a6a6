//! FFmpeg Runner Module
//!
//! Probes sources and runs compositor invocations as bounded subprocesses.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::invocation::CompositorInvocation;
use super::{Compositor, FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::process::{run_bounded, RunOutcome};

/// Media information extracted by FFprobe
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_sec: f64,
    /// Video stream info (if present)
    pub video: Option<VideoStreamInfo>,
    /// Audio stream info (if present)
    pub audio: Option<AudioStreamInfo>,
    /// Container format
    pub format: String,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Video stream information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate (frames per second)
    pub fps: f64,
    /// Codec name (e.g., "h264", "vp9")
    pub codec: String,
}

/// Audio stream information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    pub codec: String,
}

/// Upper bound for an ffprobe run
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// FFmpeg Runner for probing and compositing
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
    timeout: Option<Duration>,
}

impl FFmpegRunner {
    /// `timeout` bounds every compositor run; `None` waits indefinitely
    pub fn new(info: FFmpegInfo, timeout: Option<Duration>) -> Self {
        Self {
            info: Arc::new(info),
            timeout,
        }
    }

    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Probe media file to get information
    pub async fn probe(&self, input: &Path) -> FFmpegResult<MediaInfo> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let mut cmd = tokio::process::Command::new(&self.info.ffprobe_path);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(input);

        let output = match run_bounded(&mut cmd, Some(PROBE_TIMEOUT)).await? {
            RunOutcome::Completed(output) => output,
            RunOutcome::TimedOut => return Err(FFmpegError::Timeout),
        };

        if !output.success() {
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed: {}",
                output.stderr.trim()
            )));
        }

        parse_probe_output(&output.stdout)
    }

    async fn run_invocation(&self, invocation: &CompositorInvocation) -> FFmpegResult<()> {
        if let Some(script) = &invocation.filter_script {
            tokio::fs::write(script, &invocation.filter_complex).await?;
            debug!("Filter graph written to {}", script.display());
        }

        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        cmd.args(invocation.args());

        info!(
            "Compositing {} caption frames ({:?})",
            invocation.frames.len(),
            invocation.profile
        );
        debug!("FFmpeg command: {}", invocation.display_args());

        match run_bounded(&mut cmd, self.timeout).await? {
            RunOutcome::Completed(output) if output.success() => Ok(()),
            RunOutcome::Completed(output) => Err(FFmpegError::CompositorFailed {
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            RunOutcome::TimedOut => Err(FFmpegError::Timeout),
        }
    }
}

#[async_trait]
impl Compositor for FFmpegRunner {
    async fn validate_source(&self, source: &Path) -> FFmpegResult<MediaInfo> {
        let info = match self.probe(source).await {
            Ok(info) => info,
            Err(FFmpegError::ProbeError(msg)) | Err(FFmpegError::ParseError(msg)) => {
                return Err(FFmpegError::InvalidInput(format!(
                    "Unreadable media file: {}",
                    msg
                )));
            }
            Err(e) => return Err(e),
        };

        if info.video.is_none() {
            return Err(FFmpegError::InvalidInput(
                "Uploaded file has no video stream".to_string(),
            ));
        }
        Ok(info)
    }

    async fn composite(&self, invocation: &CompositorInvocation) -> FFmpegResult<()> {
        let result = self.run_invocation(invocation).await;
        if let Err(ref e) = result {
            warn!("Compositor failed: {}", e);
            if invocation.output.exists() {
                if let Err(remove_err) = tokio::fs::remove_file(&invocation.output).await {
                    warn!(
                        "Failed to remove partial output {}: {}",
                        invocation.output.display(),
                        remove_err
                    );
                }
            }
        }
        result
    }
}

// =============================================================================
// Probe Parsing
// =============================================================================

fn parse_probe_output(json_str: &str) -> FFmpegResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let duration_sec = format
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size_bytes = format
        .get("size")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut video_info: Option<VideoStreamInfo> = None;
    let mut audio_info: Option<AudioStreamInfo> = None;

    for stream in streams {
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if video_info.is_none() && !is_cover_art(&stream) => {
                video_info = Some(parse_video_stream(&stream));
            }
            Some("audio") if audio_info.is_none() => {
                audio_info = Some(parse_audio_stream(&stream));
            }
            _ => {}
        }
    }

    Ok(MediaInfo {
        duration_sec,
        video: video_info,
        audio: audio_info,
        format: format_name,
        size_bytes,
    })
}

/// Embedded album art shows up as a single-frame video stream
fn is_cover_art(stream: &serde_json::Value) -> bool {
    stream
        .get("disposition")
        .and_then(|d| d.get("attached_pic"))
        .and_then(|v| v.as_i64())
        == Some(1)
}

fn parse_video_stream(stream: &serde_json::Value) -> VideoStreamInfo {
    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    // r_frame_rate is "30/1" or "30000/1001"
    let fps = stream
        .get("r_frame_rate")
        .and_then(|f| f.as_str())
        .and_then(|s| match s.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().ok()?;
                let den: f64 = den.parse().ok()?;
                (den > 0.0).then(|| num / den)
            }
            None => s.parse().ok(),
        })
        .unwrap_or(30.0);

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    VideoStreamInfo {
        width,
        height,
        fps,
        codec,
    }
}

fn parse_audio_stream(stream: &serde_json::Value) -> AudioStreamInfo {
    let sample_rate = stream
        .get("sample_rate")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(44100);

    let channels = stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(2) as u8;

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    AudioStreamInfo {
        sample_rate,
        channels,
        codec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "duration": "10.5",
                "size": "1048576",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30/1",
                    "pix_fmt": "yuv420p"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2
                }
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_sec, 10.5);
        assert_eq!(info.size_bytes, 1048576);

        let video = info.video.unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.fps, 30.0);
        assert_eq!(video.codec, "h264");

        let audio = info.audio.unwrap();
        assert_eq!(audio.sample_rate, 48000);
        assert_eq!(audio.channels, 2);
    }

    #[test]
    fn test_parse_fractional_framerate() {
        let json = r#"{
            "format": {"duration": "1.0", "size": "1000", "format_name": "mp4"},
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920, "r_frame_rate": "30000/1001"}]
        }"#;

        let video = parse_probe_output(json).unwrap().video.unwrap();
        assert!((video.fps - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_audio_with_cover_art_has_no_video() {
        let json = r#"{
            "format": {"duration": "180.0", "format_name": "mp3"},
            "streams": [
                {"codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100", "channels": 2},
                {"codec_type": "video", "codec_name": "mjpeg", "width": 500, "height": 500,
                 "disposition": {"attached_pic": 1}}
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!(info.video.is_none());
        assert!(info.audio.is_some());
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(FFmpegError::ParseError(_))
        ));
        assert!(matches!(
            parse_probe_output("{}"),
            Err(FFmpegError::ParseError(_))
        ));
    }

    fn fake_runner(ffmpeg: &str, ffprobe: &str) -> FFmpegRunner {
        FFmpegRunner::new(
            FFmpegInfo {
                ffmpeg_path: PathBuf::from(ffmpeg),
                ffprobe_path: PathBuf::from(ffprobe),
                version: "test".to_string(),
            },
            Some(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn test_validate_missing_source_is_input_error() {
        let runner = fake_runner("ffmpeg", "ffprobe");
        let err = runner
            .validate_source(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, FFmpegError::InvalidInput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_composite_failure_reports_streams_and_removes_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\necho partial > \"$(eval echo \\${$#})\"\necho 'Invalid filtergraph' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = dir.path().join("out.mp4");
        let invocation = CompositorInvocation {
            source: dir.path().join("in.mp4"),
            frames: vec![],
            output: output.clone(),
            filter_complex: "[0:v]null[scaled]".to_string(),
            filter_script: None,
            terminal_label: "scaled".to_string(),
            profile: crate::core::schedule::CompositeProfile::SoftwareTimeline,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "fast".to_string(),
            video_bitrate: "5M".to_string(),
        };

        let runner = fake_runner(script.to_str().unwrap(), "ffprobe");
        let err = runner.composite(&invocation).await.unwrap_err();
        match err {
            FFmpegError::CompositorFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("Invalid filtergraph"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_composite_writes_filter_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let graph = dir.path().join("filtergraph.txt");
        let invocation = CompositorInvocation {
            source: dir.path().join("in.mp4"),
            frames: vec![],
            output: dir.path().join("out.mp4"),
            filter_complex: "[0:v]null[scaled]".to_string(),
            filter_script: Some(graph.clone()),
            terminal_label: "scaled".to_string(),
            profile: crate::core::schedule::CompositeProfile::SoftwareTimeline,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "fast".to_string(),
            video_bitrate: "5M".to_string(),
        };

        let runner = fake_runner(script.to_str().unwrap(), "ffprobe");
        runner.composite(&invocation).await.unwrap();
        assert_eq!(std::fs::read_to_string(&graph).unwrap(), "[0:v]null[scaled]");
    }
}
