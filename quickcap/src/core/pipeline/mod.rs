//! Caption Pipeline
//!
//! Runs one request end to end:
//!
//! ```text
//! validate ─▶ transcribe ─▶ normalize ─▶ chunk ─▶ plan ─▶ render ─▶ schedule ─▶ composite
//! (ffprobe)   (Transcriber)                              (blocking)             (ffmpeg)
//! ```
//!
//! Everything a request writes lives in its [`RequestWorkspace`]; the
//! workspace travels with the [`CaptionOutput`] and is removed when either is
//! dropped, so failed requests clean up the same way successful ones do.

mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

pub use workspace::{output_file_name, RequestWorkspace};

use crate::core::captions::{
    chunk, normalize_segments, plan_frames, CaptionFrame, FramePlan, Transcriber,
    WhisperTranscriber,
};
use crate::core::ffmpeg::{
    Compositor, CompositorInvocation, FFmpegError, FFmpegInfo, FFmpegRunner,
};
use crate::core::layout::{CanvasSpec, CaptionRenderer, FileFontResolver, FontResolver};
use crate::core::schedule::{build_schedule, CompositeProfile};
use crate::core::settings::AppSettings;
use crate::core::templates::{catalog, StyleTemplate, DEFAULT_TEMPLATE_ID};
use crate::core::{CoreError, CoreResult};

/// One captioning request
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Source video, normally inside the request workspace
    pub source: PathBuf,
    /// Template id; unknown or missing ids use the default template
    pub template_id: Option<String>,
}

/// Result of a successful run
#[derive(Debug)]
pub struct CaptionOutput {
    /// Owns the output file; dropping it removes everything
    pub workspace: RequestWorkspace,
    pub output_path: PathBuf,
    /// Download name, derived from the target aspect
    pub file_name: String,
    pub template_id: String,
    pub frame_count: usize,
    pub profile: CompositeProfile,
}

/// Orchestrates transcription, layout, scheduling and compositing
#[derive(Clone)]
pub struct CaptionPipeline {
    settings: Arc<AppSettings>,
    transcriber: Arc<dyn Transcriber>,
    compositor: Arc<dyn Compositor>,
    fonts: Arc<dyn FontResolver>,
}

impl CaptionPipeline {
    pub fn new(
        settings: Arc<AppSettings>,
        transcriber: Arc<dyn Transcriber>,
        compositor: Arc<dyn Compositor>,
        fonts: Arc<dyn FontResolver>,
    ) -> Self {
        Self {
            settings,
            transcriber,
            compositor,
            fonts,
        }
    }

    /// Production wiring: Whisper, the ffmpeg runner and fonts from the
    /// configured directories
    pub fn from_settings(settings: Arc<AppSettings>, ffmpeg: FFmpegInfo) -> Self {
        let transcriber = WhisperTranscriber::new(
            ffmpeg.ffmpeg_path.clone(),
            settings.transcription.resolved_model_path(),
            settings.transcription.options(),
        );
        let compositor = FFmpegRunner::new(ffmpeg, Some(settings.composite_timeout()));
        let fonts = FileFontResolver::new(settings.paths.font_dirs.clone());
        Self::new(
            settings,
            Arc::new(transcriber),
            Arc::new(compositor),
            Arc::new(fonts),
        )
    }

    /// Same wiring with a different transcriber
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Creates a fresh workspace under the configured work directory
    pub fn create_workspace(&self) -> CoreResult<RequestWorkspace> {
        RequestWorkspace::create(&self.settings.paths.work_dir)
    }

    /// Runs the full pipeline; on error `workspace` is dropped and removed
    pub async fn run(
        &self,
        workspace: RequestWorkspace,
        request: CaptionRequest,
    ) -> CoreResult<CaptionOutput> {
        let started = Instant::now();
        let source = request.source.as_path();

        if !source.is_file() {
            return Err(CoreError::FileNotFound(source.to_string_lossy().to_string()));
        }

        let template = catalog().get_or_default(
            request
                .template_id
                .as_deref()
                .unwrap_or(DEFAULT_TEMPLATE_ID),
        );
        info!(
            "[{}] Captioning {} with template '{}'",
            workspace.id(),
            source.display(),
            template.id
        );

        let media = self
            .compositor
            .validate_source(source)
            .await
            .map_err(|e| match e {
                FFmpegError::InvalidInput(msg) => CoreError::InvalidInput(msg),
                other => CoreError::from(other),
            })?;
        debug!(
            "[{}] Source duration {:.2}s, audio: {}",
            workspace.id(),
            media.duration_sec,
            media.audio.is_some()
        );

        let segments = self.transcriber.transcribe(source, workspace.path()).await?;
        let words = normalize_segments(&segments);
        info!(
            "[{}] Transcribed {} segments, {} words",
            workspace.id(),
            segments.len(),
            words.len()
        );

        let phrases = chunk(words, self.settings.video.words_per_phrase);
        let plans = plan_frames(&phrases, template);

        let frames = render_frames(
            plans,
            template,
            self.settings.canvas_spec(),
            Arc::clone(&self.fonts),
            workspace.frames_dir(),
        )
        .await?;
        info!(
            "[{}] Rendered {} caption frames from {} phrases",
            workspace.id(),
            frames.len(),
            phrases.len()
        );

        let schedule = build_schedule(&frames, &self.settings.schedule_config());
        if !schedule.is_contiguous() {
            return Err(CoreError::Internal(
                "overlay chain is not contiguous".to_string(),
            ));
        }

        let file_name = output_file_name(&schedule.base);
        let output_path = workspace.output_path(&schedule.base);
        let invocation =
            CompositorInvocation::new(&schedule, source, &output_path, &self.settings.encoder)
                .with_filter_script(workspace.filter_script_path());
        debug!("[{}] ffmpeg {}", workspace.id(), invocation.display_args());

        self.compositor.composite(&invocation).await?;

        info!(
            "[{}] Composited {} ({:?}) in {:.1}s",
            workspace.id(),
            output_path.display(),
            schedule.profile,
            started.elapsed().as_secs_f64()
        );

        Ok(CaptionOutput {
            workspace,
            output_path,
            file_name,
            template_id: template.id.to_string(),
            frame_count: frames.len(),
            profile: schedule.profile,
        })
    }
}

/// Rasterizes every plan into `dir` on the blocking pool, in plan order
pub async fn render_frames(
    plans: Vec<FramePlan>,
    template: &'static StyleTemplate,
    canvas: CanvasSpec,
    fonts: Arc<dyn FontResolver>,
    dir: PathBuf,
) -> CoreResult<Vec<CaptionFrame>> {
    if plans.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || {
        render_frames_blocking(&plans, template, canvas, fonts.as_ref(), &dir)
    })
    .await?
}

fn render_frames_blocking(
    plans: &[FramePlan],
    template: &StyleTemplate,
    canvas: CanvasSpec,
    fonts: &dyn FontResolver,
    dir: &Path,
) -> CoreResult<Vec<CaptionFrame>> {
    let renderer = CaptionRenderer::new(template, canvas, fonts);
    plans
        .iter()
        .map(|plan| renderer.render_frame(plan, dir))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
