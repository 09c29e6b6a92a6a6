//! Deterministic fonts for layout tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::font::{FontResolver, GlyphFont, GlyphMask, TextSize};

/// Every char advances `advance` px; glyphs are solid `advance × height`
/// blocks, spaces are blank.
#[derive(Debug, Clone)]
pub struct FixedFont {
    advance: u32,
    height: u32,
    size: f32,
}

impl FixedFont {
    pub fn new(advance: u32, height: u32) -> Self {
        Self {
            advance,
            height,
            size: height as f32,
        }
    }

    /// Half-width advance, full-size height
    pub fn at_size(size: f32) -> Self {
        Self {
            advance: (size / 2.0).floor().max(1.0) as u32,
            height: size.floor().max(1.0) as u32,
            size,
        }
    }

    pub fn advance(&self) -> u32 {
        self.advance
    }
}

impl GlyphFont for FixedFont {
    fn size(&self) -> f32 {
        self.size
    }

    fn measure(&self, text: &str) -> TextSize {
        let chars = text.chars().count() as u32;
        if chars == 0 {
            return TextSize::default();
        }
        TextSize {
            width: chars * self.advance,
            height: self.height,
        }
    }

    fn rasterize(&self, text: &str) -> GlyphMask {
        let size = self.measure(text);
        if size.width == 0 {
            return GlyphMask::empty();
        }
        let width = size.width as usize;
        let mut coverage = vec![0u8; width * self.height as usize];
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let start = i * self.advance as usize;
            for row in 0..self.height as usize {
                let offset = row * width + start;
                coverage[offset..offset + self.advance as usize].fill(255);
            }
        }
        GlyphMask {
            left: 0,
            top: 0,
            width: size.width,
            height: size.height,
            coverage,
        }
    }
}

/// Resolver handing out [`FixedFont::at_size`] and recording requested sizes
#[derive(Debug, Default)]
pub struct FixedFontResolver {
    pub calls: AtomicUsize,
    pub sizes: Mutex<Vec<f32>>,
}

impl FixedFontResolver {
    pub fn requested_sizes(&self) -> Vec<f32> {
        self.sizes.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl FontResolver for FixedFontResolver {
    fn resolve(&self, _candidates: &[&str], size: f32) -> Arc<dyn GlyphFont> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sizes) = self.sizes.lock() {
            sizes.push(size);
        }
        Arc::new(FixedFont::at_size(size))
    }
}
