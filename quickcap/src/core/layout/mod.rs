//! Caption Layout Engine
//!
//! Measures, wraps and rasterizes caption text into transparent frames.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  font.rs    - GlyphFont capability, fontdue/font8x8 faces │
//! │  wrap.rs    - Greedy line wrapping                        │
//! │  raster.rs  - Blending, stamping, rounded bars            │
//! │  engine.rs  - CaptionRenderer (positions + draw order)    │
//! └───────────────────────────────────────────────────────────┘
//! ```

mod engine;
mod font;
mod raster;
#[cfg(test)]
pub(crate) mod testing;
mod wrap;

pub use engine::{BlockLayout, CanvasSpec, CaptionRenderer, PositionedLine};
pub use font::{
    BuiltinFont, BuiltinFontResolver, FileFontResolver, FontResolver, GlyphFont, GlyphMask,
    TextSize, TrueTypeFont,
};
pub use raster::{blend_over, fill_rounded_rect, stamp};
pub use wrap::{wrap_words, LayoutLine, WrappedText};
