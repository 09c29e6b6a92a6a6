//! Compositor command-line construction.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::filtergraph::to_filter_complex;
use crate::core::schedule::{CompositeProfile, OverlaySchedule};
use crate::core::settings::EncoderSettings;

/// Graphs longer than this are passed as a script file instead of one argv
/// entry, which Linux caps at 128 KiB
pub const INLINE_FILTER_LIMIT: usize = 64 * 1024;

/// A fully described compositor run: inputs, graph, mapping and encoding
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorInvocation {
    pub source: PathBuf,
    pub frames: Vec<PathBuf>,
    pub output: PathBuf,
    pub filter_complex: String,
    /// Where `filter_complex` is written when it is too long to inline
    pub filter_script: Option<PathBuf>,
    pub terminal_label: String,
    pub profile: CompositeProfile,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub video_bitrate: String,
}

impl CompositorInvocation {
    pub fn new(
        schedule: &OverlaySchedule,
        source: &Path,
        output: &Path,
        encoder: &EncoderSettings,
    ) -> Self {
        let video_codec = if schedule.profile.is_hardware() {
            &encoder.hardware_codec
        } else {
            &encoder.software_codec
        };

        Self {
            source: source.to_path_buf(),
            frames: schedule.frames.clone(),
            output: output.to_path_buf(),
            filter_complex: to_filter_complex(schedule),
            filter_script: None,
            terminal_label: schedule.terminal_label().to_string(),
            profile: schedule.profile,
            video_codec: video_codec.clone(),
            audio_codec: encoder.audio_codec.clone(),
            preset: encoder.preset.clone(),
            video_bitrate: encoder.video_bitrate.clone(),
        }
    }

    /// Routes the graph through `path` if it exceeds [`INLINE_FILTER_LIMIT`]
    pub fn with_filter_script(mut self, path: PathBuf) -> Self {
        if self.filter_complex.len() > INLINE_FILTER_LIMIT {
            self.filter_script = Some(path);
        }
        self
    }

    /// Arguments passed to the ffmpeg binary, in order
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(20 + self.frames.len() * 2);

        if self.profile.is_hardware() {
            args.extend(["-hwaccel", "cuda"].map(OsString::from));
        }

        args.push("-i".into());
        args.push(self.source.clone().into_os_string());
        for frame in &self.frames {
            args.push("-i".into());
            args.push(frame.clone().into_os_string());
        }

        match &self.filter_script {
            Some(script) => {
                args.push("-filter_complex_script".into());
                args.push(script.clone().into_os_string());
            }
            None => {
                args.push("-filter_complex".into());
                args.push(self.filter_complex.clone().into());
            }
        }
        args.push("-map".into());
        args.push(format!("[{}]", self.terminal_label).into());
        // Sources without an audio stream are still accepted.
        args.push("-map".into());
        args.push("0:a?".into());

        args.extend(
            [
                "-c:v",
                self.video_codec.as_str(),
                "-c:a",
                self.audio_codec.as_str(),
                "-preset",
                self.preset.as_str(),
                "-b:v",
                self.video_bitrate.as_str(),
                "-y",
            ]
            .map(OsString::from),
        );
        args.push(self.output.clone().into_os_string());

        args
    }

    /// Human-readable command line for logs
    pub fn display_args(&self) -> String {
        self.args()
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::{CaptionFrame, FrameKind, FramePlan};
    use crate::core::schedule::{build_schedule, ScheduleConfig};
    use crate::core::TimeWindow;

    fn schedule(kind: FrameKind, count: usize) -> OverlaySchedule {
        let frames: Vec<CaptionFrame> = (0..count)
            .map(|i| CaptionFrame {
                plan: FramePlan {
                    sequence: i,
                    text: "x".into(),
                    window: TimeWindow::new(i as f64, i as f64 + 1.0),
                    kind,
                },
                image_path: PathBuf::from(format!("/work/f{i}.png")),
            })
            .collect();
        build_schedule(&frames, &ScheduleConfig::default())
    }

    fn strings(invocation: &CompositorInvocation) -> Vec<String> {
        invocation
            .args()
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_software_invocation() {
        let invocation = CompositorInvocation::new(
            &schedule(FrameKind::SingleWord, 2),
            Path::new("/work/in.mp4"),
            Path::new("/work/out.mp4"),
            &EncoderSettings::default(),
        );
        let args = strings(&invocation);

        assert_eq!(&args[..6], &["-i", "/work/in.mp4", "-i", "/work/f0.png", "-i", "/work/f1.png"]);
        let map = args.iter().position(|a| a == "-map").unwrap();
        assert_eq!(args[map + 1], "[v2]");
        assert_eq!(args[map + 3], "0:a?");
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "fast"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "5M"]));
        assert_eq!(args.last().unwrap(), "/work/out.mp4");
    }

    #[test]
    fn test_hardware_invocation() {
        let invocation = CompositorInvocation::new(
            &schedule(FrameKind::Static, 1),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        );
        let args = strings(&invocation);

        assert_eq!(&args[..2], &["-hwaccel", "cuda"]);
        assert!(args.windows(2).any(|w| w == ["-c:v", "h264_nvenc"]));
        assert!(invocation.filter_complex.contains("overlay_cuda"));
    }

    #[test]
    fn test_long_graph_moves_to_script() {
        let short = CompositorInvocation::new(
            &schedule(FrameKind::SingleWord, 3),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        )
        .with_filter_script(PathBuf::from("/work/graph.txt"));
        assert!(short.filter_script.is_none());
        assert!(strings(&short).contains(&"-filter_complex".to_string()));

        // ~80 bytes per overlay step
        let long = CompositorInvocation::new(
            &schedule(FrameKind::SingleWord, 2000),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        )
        .with_filter_script(PathBuf::from("/work/graph.txt"));
        assert!(long.filter_complex.len() > INLINE_FILTER_LIMIT);

        let args = strings(&long);
        let at = args.iter().position(|a| a == "-filter_complex_script").unwrap();
        assert_eq!(args[at + 1], "/work/graph.txt");
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert!(args.iter().all(|a| a.len() < INLINE_FILTER_LIMIT));
    }

    #[test]
    fn test_no_frames_maps_scaled() {
        let invocation = CompositorInvocation::new(
            &schedule(FrameKind::Static, 0),
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        );
        assert_eq!(invocation.terminal_label, "scaled");
        assert!(invocation.display_args().contains("-map [scaled]"));
    }
}
