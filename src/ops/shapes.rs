use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::ops::text::Coverage;

/// Source-over blend of `top`, scaled by `coverage`, onto `base`.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let coverage = coverage.clamp(0.0, 1.0);
    let top_a = (top[3] as f32 / 255.0) * coverage;

    // Fast paths: nothing to blend, or an opaque overwrite
    if top_a <= 0.0 {
        return base;
    }
    if top_a >= 1.0 {
        return top;
    }

    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let b = base[i] as f32 / 255.0;
        let t = top[i] as f32 / 255.0;
        let v = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Blend a solid `color` through a coverage mask.
pub fn paint_coverage(target: &mut RgbaImage, mask: &Coverage, color: Rgba<u8>) {
    let (tw, th) = (target.width() as i32, target.height() as i32);
    for my in 0..mask.height as i32 {
        let ty = mask.off_y + my;
        if ty < 0 || ty >= th {
            continue;
        }
        for mx in 0..mask.width as i32 {
            let tx = mask.off_x + mx;
            if tx < 0 || tx >= tw {
                continue;
            }
            let cov = mask.data[(my * mask.width as i32 + mx) as usize];
            if cov > 0.001 {
                let px = target.get_pixel_mut(tx as u32, ty as u32);
                *px = blend_over(*px, color, cov);
            }
        }
    }
}

/// Draw `source` scaled into the box `(x, y, w, h)` (output pixels).
pub fn draw_image(target: &mut RgbaImage, source: &RgbaImage, x: f32, y: f32, w: f32, h: f32) {
    let dw = w.round() as u32;
    let dh = h.round() as u32;
    if dw == 0 || dh == 0 {
        return;
    }
    let scaled;
    let pixels = if source.dimensions() == (dw, dh) {
        source
    } else {
        scaled = imageops::resize(source, dw, dh, FilterType::Triangle);
        &scaled
    };

    let (dx, dy) = (x.round() as i64, y.round() as i64);
    let (tw, th) = (target.width() as i64, target.height() as i64);
    for (sx, sy, px) in pixels.enumerate_pixels() {
        let tx = dx + sx as i64;
        let ty = dy + sy as i64;
        if tx < 0 || ty < 0 || tx >= tw || ty >= th {
            continue;
        }
        let dst = target.get_pixel_mut(tx as u32, ty as u32);
        *dst = blend_over(*dst, *px, 1.0);
    }
}

/// Stroke the edge of the box `(x, y, w, h)` with a band `width` pixels wide
/// centered on the edge. Pixels are sampled at their centers.
pub fn stroke_rect(target: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, width: f32, color: Rgba<u8>) {
    if width <= 0.0 {
        return;
    }
    let half = width * 0.5;
    let (ox0, oy0, ox1, oy1) = (x - half, y - half, x + w + half, y + h + half);
    let (ix0, iy0, ix1, iy1) = (x + half, y + half, x + w - half, y + h - half);

    let clamp_x = |v: f32| v.floor().clamp(0.0, target.width() as f32) as u32;
    let clamp_y = |v: f32| v.floor().clamp(0.0, target.height() as f32) as u32;
    let (px0, px1) = (clamp_x(ox0), clamp_x(ox1.ceil()));
    let (py0, py1) = (clamp_y(oy0), clamp_y(oy1.ceil()));

    for py in py0..py1 {
        let cy = py as f32 + 0.5;
        if cy < oy0 || cy >= oy1 {
            continue;
        }
        for px in px0..px1 {
            let cx = px as f32 + 0.5;
            if cx < ox0 || cx >= ox1 {
                continue;
            }
            let inside = cx >= ix0 && cx < ix1 && cy >= iy0 && cy < iy1;
            if !inside {
                let dst = target.get_pixel_mut(px, py);
                *dst = blend_over(*dst, color, 1.0);
            }
        }
    }
}
