//! Frame planning: decides which caption images exist and when each is shown.

use super::models::{FrameKind, FramePlan, Phrase};
use crate::core::templates::StyleTemplate;

/// Plans caption frames for `phrases` under `template`.
///
/// Every planned window lies inside its source phrase's window, and sequence
/// numbers increase by one from 0 in emission order.
pub fn plan_frames(phrases: &[Phrase], template: &StyleTemplate) -> Vec<FramePlan> {
    let mut plans = Vec::new();

    for phrase in phrases {
        if template.is_word_by_word() {
            for word in phrase.words() {
                plans.push(FramePlan {
                    sequence: plans.len(),
                    text: word.text.clone(),
                    window: word.window(),
                    kind: FrameKind::SingleWord,
                });
            }
        } else if template.has_highlighting() {
            let text = phrase.text();
            for (word_index, word) in phrase.words().iter().enumerate() {
                plans.push(FramePlan {
                    sequence: plans.len(),
                    text: text.clone(),
                    window: word.window(),
                    kind: FrameKind::Highlight { word_index },
                });
            }
        } else {
            plans.push(FramePlan {
                sequence: plans.len(),
                text: phrase.text(),
                window: phrase.window(),
                kind: FrameKind::Static,
            });
        }
    }

    plans
}
