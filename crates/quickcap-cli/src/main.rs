//! QuickCap command line: render one video, run the upload server, or list
//! the caption templates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use quickcap_lib::core::captions::TranscriptFile;
use quickcap_lib::core::ffmpeg::{detect_ffmpeg, FFmpegInfo};
use quickcap_lib::core::pipeline::{CaptionPipeline, CaptionRequest};
use quickcap_lib::core::settings::{AppSettings, SettingsManager};
use quickcap_lib::core::templates::catalog;
use quickcap_lib::http::{self, AppState};

/// Word-synchronized captions for short-form vertical video
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP upload server
    Serve {
        /// Override the configured bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Caption a single video
    Render {
        /// Source video
        input: PathBuf,
        /// Where to write the captioned video
        #[arg(short, long)]
        output: PathBuf,
        /// Caption template id
        #[arg(short, long)]
        template: Option<String>,
        /// Use a Whisper-style JSON transcript instead of running Whisper
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// Never use the GPU compositor profile
        #[arg(long)]
        software: bool,
    },

    /// List caption templates
    Templates {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_settings(config: Option<&Path>) -> AppSettings {
    let manager = match config {
        Some(path) => SettingsManager::new(path.to_path_buf()),
        None => SettingsManager::default_location(),
    };
    manager.load()
}

fn locate_ffmpeg(settings: &AppSettings) -> Result<FFmpegInfo> {
    detect_ffmpeg(
        settings.paths.ffmpeg_path.as_deref(),
        settings.paths.ffprobe_path.as_deref(),
    )
    .context("ffmpeg is required for captioning")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref());
    quickcap_lib::init_logging(settings.paths.log_dir.as_deref());

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            let ffmpeg = locate_ffmpeg(&settings)?;
            let version = ffmpeg.version.clone();
            let pipeline = CaptionPipeline::from_settings(Arc::new(settings), ffmpeg);
            http::serve(AppState::new(pipeline, Some(version)))
                .await
                .context("server stopped with an error")?;
        }

        Commands::Render {
            input,
            output,
            template,
            transcript,
            software,
        } => {
            if !input.is_file() {
                bail!("input video not found: {}", input.display());
            }
            if software {
                settings.encoder.allow_hardware = false;
            }
            if let Some(id) = template.as_deref() {
                if catalog().get(id).is_none() {
                    tracing::warn!("Unknown template '{}', using the default", id);
                }
            }

            let ffmpeg = locate_ffmpeg(&settings)?;
            let mut pipeline = CaptionPipeline::from_settings(Arc::new(settings), ffmpeg);
            if let Some(path) = transcript {
                pipeline = pipeline.with_transcriber(Arc::new(TranscriptFile::new(path)));
            }

            let workspace = pipeline.create_workspace()?;
            let result = pipeline
                .run(
                    workspace,
                    CaptionRequest {
                        source: input.clone(),
                        template_id: template,
                    },
                )
                .await
                .with_context(|| format!("failed to caption {}", input.display()))?;

            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&result.output_path, &output)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;

            println!(
                "Wrote {} ({} caption frames, template '{}', {:?})",
                output.display(),
                result.frame_count,
                result.template_id,
                result.profile
            );
        }

        Commands::Templates { json } => {
            let listing = catalog().listing();
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                for summary in &listing.templates {
                    let marker = if summary.id == listing.current_template {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {:<18} {}", marker, summary.id, summary.description);
                }
            }
        }
    }

    Ok(())
}
