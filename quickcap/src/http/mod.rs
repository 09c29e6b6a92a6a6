//! HTTP request surface.
//!
//! - `GET  /templates` - template catalog listing
//! - `POST /upload/`   - multipart upload (`file`, optional `template`),
//!   answers with the captioned video
//! - `GET  /health`    - liveness plus the detected ffmpeg version

mod error;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;

pub use error::HttpError;

use crate::core::pipeline::{CaptionOutput, CaptionPipeline, CaptionRequest, RequestWorkspace};
use crate::core::templates::catalog;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: CaptionPipeline,
    /// Bounds concurrently running pipelines
    pub jobs: Arc<Semaphore>,
    pub ffmpeg_version: Option<String>,
}

impl AppState {
    pub fn new(pipeline: CaptionPipeline, ffmpeg_version: Option<String>) -> Self {
        let permits = pipeline.settings().server.max_concurrent_jobs.max(1);
        Self {
            pipeline,
            jobs: Arc::new(Semaphore::new(permits)),
            ffmpeg_version,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit =
        usize::try_from(state.pipeline.settings().server.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/templates", get(list_templates))
        .route("/upload/", post(upload))
        .route("/upload", post(upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Binds the configured address and serves until Ctrl-C
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let server = &state.pipeline.settings().server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        address = %addr,
        max_concurrent_jobs = server.max_concurrent_jobs,
        "caption server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
}

async fn list_templates() -> impl IntoResponse {
    Json(catalog().listing())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "ffmpeg": state.ffmpeg_version,
    }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, HttpError> {
    let workspace = state.pipeline.create_workspace()?;
    let mut source: Option<PathBuf> = None;
    let mut template: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let path = workspace.source_path(field.file_name());
                let mut file = tokio::fs::File::create(&path).await?;
                let mut written = 0usize;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                    written += chunk.len();
                }
                file.flush().await?;
                tracing::info!(
                    request_id = %workspace.id(),
                    bytes = written,
                    "received upload"
                );
                if written > 0 {
                    source = Some(path);
                }
            }
            Some("template") => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    template = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let Some(source) = source else {
        return Err(HttpError::validation("missing or empty 'file' field"));
    };

    run_pipeline(&state, workspace, source, template).await
}

async fn run_pipeline(
    state: &AppState,
    workspace: RequestWorkspace,
    source: PathBuf,
    template_id: Option<String>,
) -> Result<Response, HttpError> {
    let _permit = Arc::clone(&state.jobs)
        .acquire_owned()
        .await
        .map_err(|e| HttpError::Internal {
            message: e.to_string(),
        })?;

    let request_id = workspace.id();
    let output = match state
        .pipeline
        .run(workspace, CaptionRequest { source, template_id })
        .await
    {
        Ok(output) => output,
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "caption request failed");
            return Err(error.into());
        }
    };

    let file = tokio::fs::File::open(&output.output_path).await?;
    let length = file.metadata().await?.len();
    tracing::info!(
        request_id = %request_id,
        frames = output.frame_count,
        bytes = length,
        "caption request completed"
    );

    let disposition = format!("attachment; filename=\"{}\"", output.file_name);
    let body = Body::from_stream(ReaderStream::new(OutputReader { file, output }));
    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Streams the composited video and keeps its workspace alive until the
/// response body is dropped. Fields drop in order: the file handle closes
/// before the directory is removed.
struct OutputReader {
    file: tokio::fs::File,
    output: CaptionOutput,
}

impl AsyncRead for OutputReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

impl Drop for OutputReader {
    fn drop(&mut self) {
        tracing::debug!(
            request_id = %self.output.workspace.id(),
            "response body released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::{Transcriber, TranscriptSegment, Word};
    use crate::core::ffmpeg::{
        Compositor, CompositorInvocation, FFmpegError, FFmpegResult, MediaInfo, VideoStreamInfo,
    };
    use crate::core::layout::testing::FixedFontResolver;
    use crate::core::settings::AppSettings;
    use crate::core::CoreResult;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "quickcap-test-boundary";

    struct StaticTranscriber;

    #[async_trait]
    impl Transcriber for StaticTranscriber {
        async fn transcribe(
            &self,
            _media: &Path,
            _scratch: &Path,
        ) -> CoreResult<Vec<TranscriptSegment>> {
            Ok(vec![TranscriptSegment::from_words(vec![
                Word::new("hello", 0.0, 0.5),
                Word::new("world", 0.5, 1.0),
            ])])
        }
    }

    struct CopyCompositor;

    #[async_trait]
    impl Compositor for CopyCompositor {
        async fn validate_source(&self, source: &Path) -> FFmpegResult<MediaInfo> {
            let bytes = std::fs::read(source)?;
            if !bytes.starts_with(b"VIDEO") {
                return Err(FFmpegError::InvalidInput("no video stream".into()));
            }
            Ok(MediaInfo {
                duration_sec: 1.0,
                video: Some(VideoStreamInfo {
                    width: 1920,
                    height: 1080,
                    fps: 30.0,
                    codec: "h264".into(),
                }),
                audio: None,
                format: "mp4".into(),
                size_bytes: bytes.len() as u64,
            })
        }

        async fn composite(&self, invocation: &CompositorInvocation) -> FFmpegResult<()> {
            std::fs::write(
                &invocation.output,
                format!("captioned {} frames", invocation.frames.len()),
            )?;
            Ok(())
        }
    }

    fn app(work: &TempDir) -> Router {
        let mut settings = AppSettings::default();
        settings.paths.work_dir = work.path().to_path_buf();
        let pipeline = CaptionPipeline::new(
            Arc::new(settings),
            Arc::new(StaticTranscriber),
            Arc::new(CopyCompositor),
            Arc::new(FixedFontResolver::default()),
        );
        router(AppState::new(pipeline, Some("6.1".into())))
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: video/mp4\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn workspace_count(work: &TempDir) -> usize {
        std::fs::read_dir(work.path()).unwrap().count()
    }

    #[tokio::test]
    async fn test_templates_listing() {
        let work = TempDir::new().unwrap();
        let response = app(&work)
            .oneshot(Request::get("/templates").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["current_template"], "MrBeast");
        let templates = json["templates"].as_array().unwrap();
        assert_eq!(templates.len(), catalog().len());
        assert!(templates[0]["id"].is_string());
        assert!(templates[0]["has_highlighting"].is_boolean());
    }

    #[tokio::test]
    async fn test_health() {
        let work = TempDir::new().unwrap();
        let response = app(&work)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ffmpeg"], "6.1");
    }

    #[tokio::test]
    async fn test_upload_returns_video_attachment() {
        let work = TempDir::new().unwrap();
        let body = multipart_body(&[
            ("file", Some("clip.mp4"), b"VIDEO bytes"),
            ("template", None, b"Word by Word"),
        ]);

        let response = app(&work).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"captioned_9_16_video.mp4\""
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "18");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"captioned 2 frames");
        assert_eq!(workspace_count(&work), 0);
    }

    #[tokio::test]
    async fn test_workspace_outlives_streaming_body() {
        let work = TempDir::new().unwrap();
        let body = multipart_body(&[("file", Some("clip.mp4"), b"VIDEO bytes")]);

        let response = app(&work).oneshot(upload_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The output is still on disk while the body is unread.
        assert_eq!(workspace_count(&work), 1);

        drop(response);
        assert_eq!(workspace_count(&work), 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_is_unprocessable() {
        let work = TempDir::new().unwrap();
        let body = multipart_body(&[("template", None, b"MrBeast")]);

        let response = app(&work).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("file"));
        assert_eq!(workspace_count(&work), 0);
    }

    #[tokio::test]
    async fn test_upload_of_non_video_is_unprocessable() {
        let work = TempDir::new().unwrap();
        let body = multipart_body(&[("file", Some("notes.txt"), b"plain text")]);

        let response = app(&work).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert!(json["error"].as_str().unwrap().contains("no video stream"));
        assert_eq!(workspace_count(&work), 0);
    }
}
