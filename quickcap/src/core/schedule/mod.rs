//! Overlay Schedule Builder
//!
//! Maps rendered caption frames onto a linear overlay chain over the
//! reframed source video. The schedule is a typed description; it is turned
//! into FFmpeg syntax only at the compositor boundary.
//!
//! ```text
//! [0:v] ─crop/scale─▶ [scaled] ─overlay 1─▶ [v1] ─overlay 2─▶ [v2] ... ─▶ terminal
//!                                  ▲                ▲
//!                                [1:v]            [2:v]
//! ```

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::core::captions::CaptionFrame;
use crate::core::TimeWindow;

/// Label of the reframed base stream
pub const BASE_LABEL: &str = "scaled";

// =============================================================================
// Types
// =============================================================================

/// How the compositor should be invoked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeProfile {
    /// GPU decode, scale, overlay and encode; only for phrase-long overlays
    HardwareStatic,
    /// CPU filters with per-step time gating
    SoftwareTimeline,
}

impl CompositeProfile {
    pub fn is_hardware(&self) -> bool {
        matches!(self, CompositeProfile::HardwareStatic)
    }
}

/// Aspect crop and scale applied once to the source video
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BaseTransform {
    pub target_width: u32,
    pub target_height: u32,
    /// Reduced target aspect, width part (9 for 1080×1920)
    pub aspect_width: u32,
    /// Reduced target aspect, height part (16 for 1080×1920)
    pub aspect_height: u32,
}

impl BaseTransform {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        let divisor = gcd(target_width, target_height).max(1);
        Self {
            target_width,
            target_height,
            aspect_width: target_width / divisor,
            aspect_height: target_height / divisor,
        }
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// One overlay in the chain
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayStep {
    /// Compositor input carrying the frame image (1-based; 0 is the source)
    pub input_index: usize,
    /// Position in the chain, starting at 1
    pub stack_index: usize,
    pub input_label: String,
    pub output_label: String,
    /// When the overlay is enabled
    pub window: TimeWindow,
}

/// Knobs for [`build_schedule`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleConfig {
    pub target_width: u32,
    pub target_height: u32,
    /// Top edge of captions as a fraction of output height
    pub caption_y_position: f64,
    pub allow_hardware: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            target_width: 1080,
            target_height: 1920,
            caption_y_position: 0.7,
            allow_hardware: true,
        }
    }
}

/// Fully materialized compositing plan
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlaySchedule {
    pub base: BaseTransform,
    pub steps: Vec<OverlayStep>,
    /// Frame images, `frames[i]` is compositor input `i + 1`
    pub frames: Vec<PathBuf>,
    pub y_fraction: f64,
    pub profile: CompositeProfile,
}

impl OverlaySchedule {
    /// Label carrying the final composited video
    pub fn terminal_label(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.output_label.as_str())
            .unwrap_or(BASE_LABEL)
    }

    /// Every step consumes its predecessor's output and inputs are numbered
    /// consecutively from 1
    pub fn is_contiguous(&self) -> bool {
        let mut previous = BASE_LABEL;
        for (i, step) in self.steps.iter().enumerate() {
            if step.input_label != previous || step.input_index != i + 1 || step.stack_index != i + 1
            {
                return false;
            }
            previous = &step.output_label;
        }
        self.steps.len() == self.frames.len()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the overlay chain for `frames` in emission order
pub fn build_schedule(frames: &[CaptionFrame], config: &ScheduleConfig) -> OverlaySchedule {
    let mut steps = Vec::with_capacity(frames.len());
    let mut current_label = BASE_LABEL.to_string();

    for (i, frame) in frames.iter().enumerate() {
        let index = i + 1;
        let output_label = format!("v{index}");
        steps.push(OverlayStep {
            input_index: index,
            stack_index: index,
            input_label: std::mem::replace(&mut current_label, output_label.clone()),
            output_label,
            window: frame.window(),
        });
    }

    let time_gated = frames.iter().any(CaptionFrame::is_time_gated);
    let profile = if config.allow_hardware && !time_gated {
        CompositeProfile::HardwareStatic
    } else {
        CompositeProfile::SoftwareTimeline
    };

    debug!(
        "Built overlay schedule: {} steps, profile {:?}",
        steps.len(),
        profile
    );

    OverlaySchedule {
        base: BaseTransform::new(config.target_width, config.target_height),
        steps,
        frames: frames.iter().map(|f| f.image_path.clone()).collect(),
        y_fraction: config.caption_y_position,
        profile,
    }
}

// =============================================================================
// Tests
// =============================================================================
