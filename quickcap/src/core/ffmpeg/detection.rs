//! FFmpeg Detection Module
//!
//! Locates the ffmpeg/ffprobe binaries: an explicitly configured path wins,
//! then common install directories, then a `PATH` lookup.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use super::{FFmpegError, FFmpegResult};
use crate::core::process::configure_std_command;

/// Information about detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detects ffmpeg and ffprobe, honoring explicit overrides
pub fn detect_ffmpeg(
    ffmpeg_override: Option<&Path>,
    ffprobe_override: Option<&Path>,
) -> FFmpegResult<FFmpegInfo> {
    let ffmpeg_path = locate_binary("ffmpeg", ffmpeg_override)?;
    let ffprobe_path = match ffprobe_override {
        Some(path) => locate_binary("ffprobe", Some(path))?,
        None => sibling_ffprobe(&ffmpeg_path).map_or_else(|| locate_binary("ffprobe", None), Ok)?,
    };
    let version = get_ffmpeg_version(&ffmpeg_path)?;

    info!(
        "Using FFmpeg {} at {} (ffprobe: {})",
        version,
        ffmpeg_path.display(),
        ffprobe_path.display()
    );

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn binary_file_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// ffprobe shipped next to a configured ffmpeg
fn sibling_ffprobe(ffmpeg_path: &Path) -> Option<PathBuf> {
    let candidate = ffmpeg_path.parent()?.join(binary_file_name("ffprobe"));
    candidate.is_file().then_some(candidate)
}

/// Resolves one binary by override, common directories, then `PATH`
fn locate_binary(name: &str, override_path: Option<&Path>) -> FFmpegResult<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        // A bare name such as "ffmpeg7" is looked up on PATH.
        return which::which(path).map_err(|_| {
            debug!("Configured {} path {} is not usable", name, path.display());
            FFmpegError::NotFound
        });
    }

    let file_name = binary_file_name(name);
    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    which::which(name).map_err(|_| FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &Path) -> FFmpegResult<String> {
    let mut cmd = Command::new(ffmpeg_path);
    configure_std_command(&mut cmd);
    let output = cmd
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the first line of `ffmpeg -version`: "ffmpeg version X.X.X ..."
fn parse_version_output(output: &str) -> FFmpegResult<String> {
    let Some(first_line) = output.lines().next().filter(|l| !l.trim().is_empty()) else {
        return Err(FFmpegError::ParseError(
            "Could not parse FFmpeg version".to_string(),
        ));
    };

    Ok(first_line
        .strip_prefix("ffmpeg version ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or(first_line)
        .to_string())
}
