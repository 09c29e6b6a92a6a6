//! Per-request scratch directories.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::schedule::BaseTransform;
use crate::core::CoreResult;

/// File name of the composited video, `captioned_9_16_video.mp4` for the
/// default 1080×1920 target
pub fn output_file_name(base: &BaseTransform) -> String {
    format!(
        "captioned_{}_{}_video.mp4",
        base.aspect_width, base.aspect_height
    )
}

const FRAMES_DIR: &str = "frames";
const FILTER_SCRIPT_NAME: &str = "filtergraph.txt";

/// `<work_dir>/<uuid>/` holding one request's upload, frames, audio and
/// output. The whole directory is removed when the value is dropped.
#[derive(Debug)]
pub struct RequestWorkspace {
    id: Uuid,
    root: PathBuf,
}

impl RequestWorkspace {
    pub fn create(work_dir: &Path) -> CoreResult<Self> {
        let id = Uuid::new_v4();
        let root = work_dir.join(id.to_string());
        std::fs::create_dir_all(root.join(FRAMES_DIR))?;
        debug!("Created request workspace {}", root.display());
        Ok(Self { id, root })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    /// Where an uploaded source is stored, keeping its extension for ffmpeg's
    /// format probing
    pub fn source_path(&self, original_name: Option<&str>) -> PathBuf {
        let extension = original_name
            .map(Path::new)
            .and_then(Path::extension)
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");
        self.root.join(format!("source.{}", extension.to_ascii_lowercase()))
    }

    pub fn output_path(&self, base: &BaseTransform) -> PathBuf {
        self.root.join(output_file_name(base))
    }

    pub fn filter_script_path(&self) -> PathBuf {
        self.root.join(FILTER_SCRIPT_NAME)
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if !self.root.exists() {
            return;
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!("Removed request workspace {}", self.root.display()),
            Err(e) => warn!(
                "Failed to remove request workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_lifecycle() {
        let work = TempDir::new().unwrap();
        let workspace = RequestWorkspace::create(work.path()).unwrap();
        let root = workspace.path().to_path_buf();

        assert!(root.starts_with(work.path()));
        assert!(workspace.frames_dir().is_dir());
        let output = workspace.output_path(&BaseTransform::new(1080, 1920));
        assert!(output.ends_with("captioned_9_16_video.mp4"));
        std::fs::write(output, b"video").unwrap();

        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_output_name_follows_target_aspect() {
        assert_eq!(
            output_file_name(&BaseTransform::new(1080, 1920)),
            "captioned_9_16_video.mp4"
        );
        assert_eq!(
            output_file_name(&BaseTransform::new(1080, 1080)),
            "captioned_1_1_video.mp4"
        );
        assert_eq!(
            output_file_name(&BaseTransform::new(1920, 1080)),
            "captioned_16_9_video.mp4"
        );
    }

    #[test]
    fn test_workspaces_are_unique() {
        let work = TempDir::new().unwrap();
        let a = RequestWorkspace::create(work.path()).unwrap();
        let b = RequestWorkspace::create(work.path()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_source_path_keeps_safe_extension() {
        let work = TempDir::new().unwrap();
        let workspace = RequestWorkspace::create(work.path()).unwrap();

        assert!(workspace.source_path(Some("clip.MOV")).ends_with("source.mov"));
        assert!(workspace.source_path(None).ends_with("source.mp4"));
        assert!(workspace.source_path(Some("noext")).ends_with("source.mp4"));
        assert!(workspace
            .source_path(Some("../../etc/passwd.m$v"))
            .ends_with("source.mp4"));
    }

    #[test]
    fn test_drop_tolerates_missing_dir() {
        let work = TempDir::new().unwrap();
        let workspace = RequestWorkspace::create(work.path()).unwrap();
        std::fs::remove_dir_all(workspace.path()).unwrap();
        drop(workspace);
    }
}
