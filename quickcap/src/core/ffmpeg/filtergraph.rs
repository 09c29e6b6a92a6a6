//! Overlay schedule to `-filter_complex` serialization.
//!
//! ```text
//! [0:v]crop=(in_h*9/16):in_h,scale=1080:1920[scaled];
//! [scaled][1:v]overlay=enable='between(t,0.000,1.200)':x=(W-w)/2:y=H*0.7[v1];
//! [v1][2:v]overlay=enable='between(t,1.200,2.500)':x=(W-w)/2:y=H*0.7[v2]
//! ```
//!
//! The hardware profile swaps in `scale_cuda` and `overlay_cuda`.

use crate::core::schedule::{OverlaySchedule, OverlayStep, BASE_LABEL};

fn scale_filter(schedule: &OverlaySchedule) -> &'static str {
    if schedule.profile.is_hardware() {
        "scale_cuda"
    } else {
        "scale"
    }
}

fn overlay_filter(schedule: &OverlaySchedule) -> &'static str {
    if schedule.profile.is_hardware() {
        "overlay_cuda"
    } else {
        "overlay"
    }
}

/// Crop to the target aspect from the full source height, then scale once
pub fn base_filter(schedule: &OverlaySchedule) -> String {
    let base = &schedule.base;
    format!(
        "[0:v]crop=(in_h*{}/{}):in_h,{}={}:{}[{}]",
        base.aspect_width,
        base.aspect_height,
        scale_filter(schedule),
        base.target_width,
        base.target_height,
        BASE_LABEL
    )
}

/// One time-gated, horizontally centered overlay
pub fn step_filter(schedule: &OverlaySchedule, step: &OverlayStep) -> String {
    format!(
        "[{}][{}:v]{}=enable='between(t,{:.3},{:.3})':x=(W-w)/2:y=H*{}[{}]",
        step.input_label,
        step.input_index,
        overlay_filter(schedule),
        step.window.start,
        step.window.end,
        schedule.y_fraction,
        step.output_label
    )
}

/// Full `-filter_complex` argument for `schedule`
pub fn to_filter_complex(schedule: &OverlaySchedule) -> String {
    std::iter::once(base_filter(schedule))
        .chain(schedule.steps.iter().map(|step| step_filter(schedule, step)))
        .collect::<Vec<_>>()
        .join(";")
}
