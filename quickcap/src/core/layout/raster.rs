//! Raster operations on transparent RGBA canvases.

use image::{Rgba, RgbaImage};

use super::font::GlyphMask;
use crate::core::Color;

/// Source-over blend of `src` (straight alpha) onto `dst`
pub fn blend_over(dst: Rgba<u8>, src: Color, coverage: u8) -> Rgba<u8> {
    let sa = u32::from(src.a) * u32::from(coverage) / 255;
    if sa == 0 {
        return dst;
    }
    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    let out_a = sa * 255 + da * inv;
    if out_a == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |s: u8, d: u8| -> u8 {
        let value = (u32::from(s) * sa * 255 + u32::from(d) * da * inv + out_a / 2) / out_a;
        value.min(255) as u8
    };

    Rgba([
        channel(src.r, dst[0]),
        channel(src.g, dst[1]),
        channel(src.b, dst[2]),
        ((out_a + 127) / 255).min(255) as u8,
    ])
}

/// Paints `mask` in `color` with its draw origin at `(x, y)`
pub fn stamp(canvas: &mut RgbaImage, mask: &GlyphMask, x: i32, y: i32, color: Color) {
    if mask.is_empty() || color.a == 0 {
        return;
    }
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let ox = x + mask.left;
    let oy = y + mask.top;

    for row in 0..mask.height as i32 {
        let py = oy + row;
        if py < 0 || py >= ch {
            continue;
        }
        for col in 0..mask.width as i32 {
            let px = ox + col;
            if px < 0 || px >= cw {
                continue;
            }
            let coverage = mask.at(col, row);
            if coverage == 0 {
                continue;
            }
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            *pixel = blend_over(*pixel, color, coverage);
        }
    }
}

/// Fills an axis-aligned rectangle with corners rounded to `radius`.
///
/// `(x0, y0)` is inclusive, `(x1, y1)` exclusive.
pub fn fill_rounded_rect(
    canvas: &mut RgbaImage,
    (x0, y0): (i32, i32),
    (x1, y1): (i32, i32),
    radius: u32,
    color: Color,
) {
    if x1 <= x0 || y1 <= y0 || color.a == 0 {
        return;
    }
    let r = (radius as i32).min((x1 - x0) / 2).min((y1 - y0) / 2).max(0);
    let r_sq = (r * r) as i64;
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);

    for py in y0.max(0)..y1.min(ch) {
        for px in x0.max(0)..x1.min(cw) {
            // Distance from the nearest corner center, only inside corner boxes.
            let dx = if px < x0 + r {
                x0 + r - px
            } else if px >= x1 - r {
                px - (x1 - r - 1)
            } else {
                0
            };
            let dy = if py < y0 + r {
                y0 + r - py
            } else if py >= y1 - r {
                py - (y1 - r - 1)
            } else {
                0
            };
            if dx > 0 && dy > 0 && (dx as i64 * dx as i64 + dy as i64 * dy as i64) > r_sq {
                continue;
            }
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            *pixel = blend_over(*pixel, color, 255);
        }
    }
}
