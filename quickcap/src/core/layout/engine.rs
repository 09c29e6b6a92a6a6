//! Caption rasterization: wrapped, centered, optionally per-word highlighted
//! text on a transparent canvas.

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use super::font::{FontResolver, GlyphFont};
use super::raster::{fill_rounded_rect, stamp};
use super::wrap::{wrap_words, LayoutLine, WrappedText};
use crate::core::captions::{CaptionFrame, FrameKind, FramePlan};
use crate::core::templates::{Emphasis, StyleTemplate, BAR_CORNER_RADIUS};
use crate::core::{Color, CoreError, CoreResult};

/// Caption canvas geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    /// Fraction of the canvas width text may occupy before wrapping
    pub max_text_width_ratio: f64,
}

impl CanvasSpec {
    pub fn max_text_width(&self) -> u32 {
        (self.width as f64 * self.max_text_width_ratio).floor().max(0.0) as u32
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 300,
            max_text_width_ratio: 0.8,
        }
    }
}

/// A wrapped line with its draw origin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionedLine {
    pub line: LayoutLine,
    pub x: i32,
    pub y: i32,
}

/// Wrapped and positioned caption text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub words: Vec<String>,
    pub lines: Vec<PositionedLine>,
    pub word_lines: Vec<usize>,
}

/// Renders caption frames for one template.
///
/// Fonts are resolved once at construction, so a renderer can be moved into a
/// blocking task and reused for every frame of a request.
pub struct CaptionRenderer {
    template: StyleTemplate,
    canvas: CanvasSpec,
    base_font: Arc<dyn GlyphFont>,
    emphasis_font: Option<Arc<dyn GlyphFont>>,
    word_font: Arc<dyn GlyphFont>,
}

impl CaptionRenderer {
    pub fn new(template: &StyleTemplate, canvas: CanvasSpec, fonts: &dyn FontResolver) -> Self {
        let candidates = template.font_candidates;
        let base_size = template.font_size as f32;
        let base_font = fonts.resolve(candidates, base_size);

        let emphasis_font = match template.emphasis {
            Emphasis::Scale { factor } => {
                let scaled = (base_size * factor).floor().max(1.0);
                Some(fonts.resolve(candidates, scaled))
            }
            _ => None,
        };

        let word_font = if template.word_font_size() == template.font_size {
            Arc::clone(&base_font)
        } else {
            fonts.resolve(candidates, template.word_font_size() as f32)
        };

        Self {
            template: template.clone(),
            canvas,
            base_font,
            emphasis_font,
            word_font,
        }
    }

    pub fn template(&self) -> &StyleTemplate {
        &self.template
    }

    pub fn canvas(&self) -> CanvasSpec {
        self.canvas
    }

    /// Wraps and positions `text` (case transform applied) with `font`
    pub fn layout(&self, text: &str, font: &dyn GlyphFont) -> BlockLayout {
        let transformed = self.template.text_case.apply(text);
        let words: Vec<String> = transformed.split_whitespace().map(str::to_string).collect();
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        let WrappedText { lines, word_lines } =
            wrap_words(&refs, font, self.canvas.max_text_width());

        let spacing = self.template.line_spacing as i32;
        let total: i32 = lines.iter().map(|l| l.height as i32 + spacing).sum();
        let mut y = (self.canvas.height as i32 - total) / 2;

        let lines = lines
            .into_iter()
            .map(|line| {
                let x = (self.canvas.width as i32 - line.width as i32) / 2;
                let positioned = PositionedLine { x, y, line };
                y += positioned.line.height as i32 + spacing;
                positioned
            })
            .collect();

        BlockLayout {
            words,
            lines,
            word_lines,
        }
    }

    /// Renders `text` at the base size, emphasizing word `highlight` if the
    /// template highlights words
    pub fn render(&self, text: &str, highlight: Option<usize>) -> RgbaImage {
        self.render_with(text, self.base_font.as_ref(), highlight)
    }

    /// Renders the image a frame plan describes
    pub fn render_plan(&self, plan: &FramePlan) -> RgbaImage {
        match plan.kind {
            FrameKind::SingleWord => self.render_with(&plan.text, self.word_font.as_ref(), None),
            FrameKind::Highlight { word_index } => self.render(&plan.text, Some(word_index)),
            FrameKind::Static => self.render(&plan.text, None),
        }
    }

    /// Renders `plan` into `dir` as a PNG
    pub fn render_frame(&self, plan: &FramePlan, dir: &Path) -> CoreResult<CaptionFrame> {
        let image = self.render_plan(plan);
        let image_path = dir.join(plan.file_name());
        image
            .save(&image_path)
            .map_err(|e| CoreError::RenderFailed(format!("{}: {}", image_path.display(), e)))?;
        debug!("Rendered caption frame {}", image_path.display());
        Ok(CaptionFrame {
            plan: plan.clone(),
            image_path,
        })
    }

    fn render_with(&self, text: &str, font: &dyn GlyphFont, highlight: Option<usize>) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.canvas.width, self.canvas.height);
        let block = self.layout(text, font);

        let per_word = highlight.filter(|_| self.template.has_highlighting());
        for positioned in &block.lines {
            match per_word {
                Some(index) => {
                    self.draw_line_words(&mut canvas, &block, positioned, font, index);
                }
                None => self.draw_styled(
                    &mut canvas,
                    font,
                    &positioned.line.text,
                    positioned.x,
                    positioned.y,
                    self.template.text_color,
                ),
            }
        }
        canvas
    }

    fn draw_line_words(
        &self,
        canvas: &mut RgbaImage,
        block: &BlockLayout,
        positioned: &PositionedLine,
        font: &dyn GlyphFont,
        highlight: usize,
    ) {
        let base_color = self.template.text_color;
        let mut x = positioned.x;
        let y = positioned.y;

        for &index in &positioned.line.word_indices {
            let word = block.words[index].as_str();
            let advance_text = format!("{word} ");

            if index != highlight {
                self.draw_styled(canvas, font, word, x, y, base_color);
                x += font.measure(&advance_text).width as i32;
                continue;
            }

            let color = self.template.highlight_color(index).unwrap_or(base_color);
            match (self.template.emphasis, self.emphasis_font.as_deref()) {
                (Emphasis::Bars { padding }, _) => {
                    let size = font.measure(word);
                    let pad = padding as i32;
                    fill_rounded_rect(
                        canvas,
                        (x - pad, y - pad),
                        (x + size.width as i32 + pad, y + size.height as i32 + pad),
                        BAR_CORNER_RADIUS,
                        color,
                    );
                    self.draw_styled(canvas, font, word, x, y, base_color);
                    x += font.measure(&advance_text).width as i32;
                }
                (Emphasis::Scale { .. }, Some(scaled)) => {
                    let regular_h = font.measure(word).height as i32;
                    let scaled_h = scaled.measure(word).height as i32;
                    let y_offset = (scaled_h - regular_h) / 2;
                    self.draw_styled(canvas, scaled, word, x, y - y_offset, color);
                    x += scaled.measure(&advance_text).width as i32;
                }
                _ => {
                    self.draw_styled(canvas, font, word, x, y, color);
                    x += font.measure(&advance_text).width as i32;
                }
            }
        }
    }

    /// Shadow stroke, shadow fill, main stroke, main fill
    fn draw_styled(
        &self,
        canvas: &mut RgbaImage,
        font: &dyn GlyphFont,
        text: &str,
        x: i32,
        y: i32,
        fill: Color,
    ) {
        let mask = font.rasterize(text);
        if mask.is_empty() {
            return;
        }
        let stroke = self.template.active_stroke();
        let outline = stroke.map(|s| mask.dilate(s.width));

        if let Some(shadow) = self.template.shadow {
            let (sx, sy) = (x + shadow.offset.0, y + shadow.offset.1);
            if let Some(outline) = &outline {
                stamp(canvas, outline, sx, sy, shadow.color);
            }
            stamp(canvas, &mask, sx, sy, shadow.color);
        }
        if let (Some(stroke), Some(outline)) = (stroke, &outline) {
            stamp(canvas, outline, x, y, stroke.color);
        }
        stamp(canvas, &mask, x, y, fill);
    }
}

// =============================================================================
// Tests
// =============================================================================
