//! Font capability and resolution.
//!
//! The layout engine only needs two things from a face: how large a string is
//! and what its coverage looks like. [`GlyphFont`] captures that; [`TrueTypeFont`]
//! implements it with fontdue and [`BuiltinFont`] with the font8x8 bitmaps so a
//! caption can always be drawn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use fontdue::{Font, FontSettings, Metrics};
use tracing::{debug, warn};

/// Pixel extent of a string
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextSize {
    pub width: u32,
    pub height: u32,
}

/// 8-bit coverage of a rasterized string.
///
/// `left`/`top` are the mask's offset from the string's draw origin (the
/// top-left corner of its measured box).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphMask {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

impl GlyphMask {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at mask-local `(x, y)`; 0 outside the mask
    pub fn at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    /// Square max filter of radius `r`: coverage of the union of copies of
    /// this mask shifted by every offset in `[-r, r]²`.
    pub fn dilate(&self, r: u32) -> GlyphMask {
        if r == 0 || self.is_empty() {
            return self.clone();
        }
        let r_i = r as i32;
        let w = self.width as usize;
        let h = self.height as usize;
        let out_w = w + 2 * r as usize;
        let out_h = h + 2 * r as usize;

        // Separable: horizontal pass then vertical pass.
        let mut horizontal = vec![0u8; out_w * h];
        for y in 0..h {
            for x in 0..out_w {
                let cx = x as i32 - r_i;
                let mut best = 0u8;
                for sx in (cx - r_i).max(0)..=(cx + r_i).min(w as i32 - 1) {
                    best = best.max(self.coverage[y * w + sx as usize]);
                }
                horizontal[y * out_w + x] = best;
            }
        }

        let mut coverage = vec![0u8; out_w * out_h];
        for y in 0..out_h {
            let cy = y as i32 - r_i;
            for x in 0..out_w {
                let mut best = 0u8;
                for sy in (cy - r_i).max(0)..=(cy + r_i).min(h as i32 - 1) {
                    best = best.max(horizontal[sy as usize * out_w + x]);
                }
                coverage[y * out_w + x] = best;
            }
        }

        GlyphMask {
            left: self.left - r_i,
            top: self.top - r_i,
            width: out_w as u32,
            height: out_h as u32,
            coverage,
        }
    }
}

/// A font face at a fixed pixel size
pub trait GlyphFont: Send + Sync {
    /// Pixel size the face was resolved at
    fn size(&self) -> f32;

    /// Extent of `text` drawn on one line
    fn measure(&self, text: &str) -> TextSize;

    /// Coverage of `text` drawn on one line
    fn rasterize(&self, text: &str) -> GlyphMask;
}

// =============================================================================
// TrueType / OpenType Faces
// =============================================================================

/// Glyph coverage accumulated into a growing bounding box
struct MaskBuilder {
    glyphs: Vec<(i32, i32, usize, usize, Vec<u8>)>,
}

impl MaskBuilder {
    fn new() -> Self {
        Self { glyphs: Vec::new() }
    }

    fn push(&mut self, left: i32, top: i32, width: usize, height: usize, coverage: Vec<u8>) {
        if width > 0 && height > 0 {
            self.glyphs.push((left, top, width, height, coverage));
        }
    }

    fn build(self) -> GlyphMask {
        if self.glyphs.is_empty() {
            return GlyphMask::empty();
        }
        let min_x = self.glyphs.iter().map(|g| g.0).min().unwrap_or(0);
        let min_y = self.glyphs.iter().map(|g| g.1).min().unwrap_or(0);
        let max_x = self
            .glyphs
            .iter()
            .map(|g| g.0 + g.2 as i32)
            .max()
            .unwrap_or(0);
        let max_y = self
            .glyphs
            .iter()
            .map(|g| g.1 + g.3 as i32)
            .max()
            .unwrap_or(0);

        let width = (max_x - min_x) as usize;
        let height = (max_y - min_y) as usize;
        let mut coverage = vec![0u8; width * height];
        for (left, top, w, h, glyph) in &self.glyphs {
            let ox = (left - min_x) as usize;
            let oy = (top - min_y) as usize;
            for row in 0..*h {
                for col in 0..*w {
                    let idx = (oy + row) * width + ox + col;
                    coverage[idx] = coverage[idx].max(glyph[row * w + col]);
                }
            }
        }

        GlyphMask {
            left: min_x,
            top: min_y,
            width: width as u32,
            height: height as u32,
            coverage,
        }
    }
}

/// fontdue-backed face
pub struct TrueTypeFont {
    font: Arc<Font>,
    size: f32,
    ascent: f32,
    line_height: u32,
    glyphs: Mutex<HashMap<char, (Metrics, Arc<Vec<u8>>)>>,
}

impl TrueTypeFont {
    pub fn new(font: Arc<Font>, size: f32) -> Self {
        let (ascent, line_height) = match font.horizontal_line_metrics(size) {
            Some(metrics) => (
                metrics.ascent,
                (metrics.ascent - metrics.descent).ceil().max(1.0) as u32,
            ),
            None => (size, size.ceil().max(1.0) as u32),
        };
        Self {
            font,
            size,
            ascent,
            line_height,
            glyphs: Mutex::new(HashMap::new()),
        }
    }

    fn glyph(&self, ch: char) -> (Metrics, Arc<Vec<u8>>) {
        if let Ok(cache) = self.glyphs.lock() {
            if let Some(hit) = cache.get(&ch) {
                return hit.clone();
            }
        }
        let (metrics, bitmap) = self.font.rasterize(ch, self.size);
        let entry = (metrics, Arc::new(bitmap));
        if let Ok(mut cache) = self.glyphs.lock() {
            cache.insert(ch, entry.clone());
        }
        entry
    }
}

impl GlyphFont for TrueTypeFont {
    fn size(&self) -> f32 {
        self.size
    }

    fn measure(&self, text: &str) -> TextSize {
        if text.is_empty() {
            return TextSize::default();
        }
        let advance: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum();
        TextSize {
            width: advance.ceil().max(0.0) as u32,
            height: self.line_height,
        }
    }

    fn rasterize(&self, text: &str) -> GlyphMask {
        let mut builder = MaskBuilder::new();
        let mut pen_x = 0.0f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.glyph(ch);
            let left = (pen_x + metrics.xmin as f32).round() as i32;
            let top = (self.ascent - metrics.height as f32 - metrics.ymin as f32).round() as i32;
            builder.push(
                left,
                top,
                metrics.width,
                metrics.height,
                bitmap.as_ref().clone(),
            );
            pen_x += metrics.advance_width;
        }
        builder.build()
    }
}

// =============================================================================
// Built-in Bitmap Face
// =============================================================================

/// font8x8 bitmaps scaled to the nearest integer multiple of 8 px
#[derive(Debug, Clone)]
pub struct BuiltinFont {
    size: f32,
    scale: u32,
}

impl BuiltinFont {
    pub fn new(size: f32) -> Self {
        let scale = (size / 8.0).round().max(1.0) as u32;
        Self { size, scale }
    }

    fn cell(&self) -> u32 {
        8 * self.scale
    }

    fn bitmap(ch: char) -> Option<[u8; 8]> {
        BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .or_else(|| BASIC_FONTS.get('?'))
    }
}

impl GlyphFont for BuiltinFont {
    fn size(&self) -> f32 {
        self.size
    }

    fn measure(&self, text: &str) -> TextSize {
        let chars = text.chars().count() as u32;
        if chars == 0 {
            return TextSize::default();
        }
        TextSize {
            width: chars * self.cell(),
            height: self.cell(),
        }
    }

    fn rasterize(&self, text: &str) -> GlyphMask {
        let cell = self.cell() as usize;
        let scale = self.scale as usize;
        let mut builder = MaskBuilder::new();

        for (i, ch) in text.chars().enumerate() {
            let Some(rows) = Self::bitmap(ch) else {
                continue;
            };
            if rows.iter().all(|row| *row == 0) {
                continue;
            }
            let mut coverage = vec![0u8; cell * cell];
            for (row_idx, row) in rows.iter().enumerate() {
                for col_idx in 0..8 {
                    if (row >> col_idx) & 1 == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        let y = row_idx * scale + sy;
                        let start = y * cell + col_idx * scale;
                        coverage[start..start + scale].fill(255);
                    }
                }
            }
            builder.push((i * cell) as i32, 0, cell, cell, coverage);
        }
        builder.build()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Maps a template's font candidates to a usable face
pub trait FontResolver: Send + Sync {
    /// Returns the first usable candidate at `size`, or the built-in face.
    /// Never fails.
    fn resolve(&self, candidates: &[&str], size: f32) -> Arc<dyn GlyphFont>;
}

/// Resolves candidates against the filesystem, caching parsed font files
pub struct FileFontResolver {
    search_dirs: Vec<PathBuf>,
    cache: Mutex<HashMap<PathBuf, Option<Arc<Font>>>>,
}

impl FileFontResolver {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Paths tried for one candidate, in order
    fn candidate_paths(&self, candidate: &str) -> Vec<PathBuf> {
        let path = Path::new(candidate);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        let mut paths: Vec<PathBuf> = self.search_dirs.iter().map(|d| d.join(path)).collect();
        if let Some(name) = path.file_name() {
            for dir in &self.search_dirs {
                let flattened = dir.join(name);
                if !paths.contains(&flattened) {
                    paths.push(flattened);
                }
            }
        }
        paths.push(path.to_path_buf());
        paths
    }

    fn load(&self, path: &Path) -> Option<Arc<Font>> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(entry) = cache.get(path) {
                return entry.clone();
            }
        }

        let loaded = if path.is_file() {
            match std::fs::read(path) {
                Ok(bytes) => match Font::from_bytes(bytes, FontSettings::default()) {
                    Ok(font) => Some(Arc::new(font)),
                    Err(e) => {
                        warn!("Failed to parse font {}: {}", path.display(), e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Failed to read font {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path.to_path_buf(), loaded.clone());
        }
        loaded
    }
}

impl FontResolver for FileFontResolver {
    fn resolve(&self, candidates: &[&str], size: f32) -> Arc<dyn GlyphFont> {
        for candidate in candidates {
            for path in self.candidate_paths(candidate) {
                if let Some(font) = self.load(&path) {
                    debug!("Resolved font '{}' to {}", candidate, path.display());
                    return Arc::new(TrueTypeFont::new(font, size));
                }
            }
        }
        warn!(
            "No usable font among {:?}, falling back to built-in bitmap face",
            candidates
        );
        Arc::new(BuiltinFont::new(size))
    }
}

/// Resolver that always returns the built-in face
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFontResolver;

impl FontResolver for BuiltinFontResolver {
    fn resolve(&self, _candidates: &[&str], size: f32) -> Arc<dyn GlyphFont> {
        Arc::new(BuiltinFont::new(size))
    }
}

// =============================================================================
// Tests
// =============================================================================
