//! Destructive and Edge Case Tests for the Caption Pipeline
//!
//! These tests push degenerate transcripts, geometry and template input
//! through the stages and check that each one degrades structurally instead
//! of panicking or emitting a broken overlay chain.

use std::path::PathBuf;

use crate::core::captions::{
    chunk, normalize_segments, parse_transcript, plan_frames, CaptionFrame, FrameKind,
    TranscriptSegment, Word,
};
use crate::core::ffmpeg::to_filter_complex;
use crate::core::layout::testing::{FixedFont, FixedFontResolver};
use crate::core::layout::{wrap_words, CanvasSpec, CaptionRenderer};
use crate::core::schedule::{build_schedule, ScheduleConfig};
use crate::core::templates::{catalog, DEFAULT_TEMPLATE_ID};
use crate::core::TimeWindow;

fn frames_for(plans: Vec<crate::core::captions::FramePlan>) -> Vec<CaptionFrame> {
    plans
        .into_iter()
        .map(|plan| CaptionFrame {
            image_path: PathBuf::from(format!("/work/{}", plan.file_name())),
            plan,
        })
        .collect()
}

#[test]
fn test_destructive_time_window_inversion() {
    let window = TimeWindow::new(10.0, 5.0);
    assert_eq!(window.start, 5.0);
    assert_eq!(window.end, 10.0);
}

#[test]
fn test_destructive_non_finite_word_times() {
    let segment = TranscriptSegment::from_words(vec![
        Word::new("nan", f64::NAN, f64::NAN),
        Word::new("neg", -3.0, -1.0),
        Word::new("inf", 1.0, f64::INFINITY),
    ]);
    let words = normalize_segments(&[segment]);

    assert_eq!(words.len(), 3);
    for word in &words {
        assert!(word.start.is_finite() && word.end.is_finite());
        assert!(word.start >= 0.0);
        assert!(word.start <= word.end);
    }
}

#[test]
fn test_destructive_whitespace_only_words_are_dropped() {
    let segment = TranscriptSegment::from_words(vec![
        Word::new("   ", 0.0, 0.1),
        Word::new("", 0.1, 0.2),
        Word::new("kept", 0.2, 0.3),
    ]);
    let words = normalize_segments(&[segment]);
    assert_eq!(words.len(), 1);
    assert_eq!(words[0].text, "kept");
}

#[test]
fn test_destructive_chunk_size_zero() {
    let words: Vec<Word> = (0..3)
        .map(|i| Word::new(format!("w{i}"), i as f64, i as f64 + 1.0))
        .collect();
    let phrases = chunk(words, 0);
    assert_eq!(phrases.len(), 3);
    assert!(phrases.iter().all(|p| p.len() == 1));
}

#[test]
fn test_destructive_empty_transcript_yields_bare_reframe() {
    let phrases = chunk(normalize_segments(&[]), 6);
    let plans = plan_frames(&phrases, catalog().default_template());
    assert!(plans.is_empty());

    let schedule = build_schedule(&[], &ScheduleConfig::default());
    assert!(schedule.is_contiguous());
    assert_eq!(
        to_filter_complex(&schedule),
        "[0:v]crop=(in_h*9/16):in_h,scale_cuda=1080:1920[scaled]"
    );
}

#[test]
fn test_destructive_malformed_transcripts() {
    assert!(parse_transcript("").is_err());
    assert!(parse_transcript("{\"segments\": 7}").is_err());
    assert!(parse_transcript("[{\"start\": \"zero\"}]").is_err());
}

#[test]
fn test_destructive_zero_length_words_keep_chain_intact() {
    let segment = TranscriptSegment::from_words(
        (0..5).map(|i| Word::new(format!("w{i}"), 1.0, 1.0)).collect(),
    );
    let phrases = chunk(normalize_segments(&[segment]), 2);
    let template = catalog().get(DEFAULT_TEMPLATE_ID).unwrap();
    let frames = frames_for(plan_frames(&phrases, template));
    let schedule = build_schedule(&frames, &ScheduleConfig::default());

    assert_eq!(schedule.steps.len(), 5);
    assert!(schedule.is_contiguous());
    assert!(schedule.steps.iter().all(|s| s.window.duration() == 0.0));
}

#[test]
fn test_destructive_every_frame_within_its_phrase() {
    let words: Vec<Word> = (0..17)
        .map(|i| Word::new(format!("word{i}"), i as f64 * 0.3, i as f64 * 0.3 + 0.25))
        .collect();
    let phrases = chunk(words, 6);

    for template in catalog().iter() {
        let plans = plan_frames(&phrases, template);
        assert!(!plans.is_empty(), "{}", template.id);
        for plan in &plans {
            let phrase = phrases
                .iter()
                .find(|p| p.start() <= plan.window.start && plan.window.end <= p.end());
            assert!(phrase.is_some(), "{}: {:?}", template.id, plan.window);
        }
        let sequences: Vec<usize> = plans.iter().map(|p| p.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_destructive_overlong_word_is_not_split() {
    let font = FixedFont::new(10, 20);
    let long = "supercalifragilisticexpialidocious";
    let wrapped = wrap_words(&["a", long, "b"], &font, 100);

    assert_eq!(wrapped.lines.len(), 3);
    assert_eq!(wrapped.lines[1].text, long);
    assert!(wrapped.lines[1].width > 100);
    assert_eq!(wrapped.word_lines, vec![0, 1, 2]);
}

#[test]
fn test_destructive_render_empty_and_huge_text() {
    let fonts = FixedFontResolver::default();
    let template = catalog().default_template();
    let renderer = CaptionRenderer::new(template, CanvasSpec::default(), &fonts);

    let empty = renderer.render("", None);
    assert_eq!(empty.dimensions(), (1080, 300));
    assert!(empty.pixels().all(|p| p.0[3] == 0));

    // Far more text than fits vertically: drawing clips instead of panicking.
    let huge = vec!["overflowing"; 200].join(" ");
    let image = renderer.render(&huge, Some(150));
    assert_eq!(image.dimensions(), (1080, 300));
}

#[test]
fn test_destructive_highlight_index_out_of_range() {
    let fonts = FixedFontResolver::default();
    let renderer = CaptionRenderer::new(
        catalog().get("MrBeast").unwrap(),
        CanvasSpec::default(),
        &fonts,
    );
    let image = renderer.render("two words", Some(99));
    assert!(image.pixels().any(|p| p.0[3] > 0));
}

#[test]
fn test_destructive_unknown_and_empty_template_ids() {
    assert_eq!(catalog().get_or_default("").id, DEFAULT_TEMPLATE_ID);
    assert_eq!(catalog().get_or_default("mrbeast ").id, DEFAULT_TEMPLATE_ID);
    assert!(catalog().get("'; DROP TABLE templates; --").is_none());
}

#[test]
fn test_destructive_word_by_word_frames_are_time_gated() {
    let words: Vec<Word> = (0..5)
        .map(|i| Word::new(format!("w{i}"), i as f64, i as f64 + 0.5))
        .collect();
    let template = catalog().get("Word by Word").unwrap();
    let plans = plan_frames(&chunk(words, 6), template);

    assert_eq!(plans.len(), 5);
    assert!(plans.iter().all(|p| p.kind == FrameKind::SingleWord));
    let schedule = build_schedule(&frames_for(plans), &ScheduleConfig::default());
    assert!(!schedule.profile.is_hardware());
}
