use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::{log_info, log_warn};

/// Largest stroke radius (in output pixels) the morphology pass will run.
const MAX_STROKE_RADIUS: f32 = 32.0;

/// Single-channel coverage buffer positioned in output pixel space.
#[derive(Clone, Debug, Default)]
pub struct Coverage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub off_x: i32,
    pub off_y: i32,
}

impl Coverage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn at(&self, x: i32, y: i32) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0.0;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Lay out a single line of text starting at x = 0, baseline at `ascent`.
/// Returns `(glyphs, total_width)`.
fn layout_line(font: &FontArc, line: &str, font_size: f32) -> (Vec<(GlyphId, f32, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();

    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x, ascent));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    (glyphs, cursor_x)
}

/// Size of the text box: widest line by `lines * line_height`.
pub fn measure_text(font: &FontArc, text: &str, font_size: f32) -> (f32, f32) {
    let line_height = font.as_scaled(font_size).height();
    let mut width = 0.0f32;
    let mut lines = 0;
    for line in text.split('\n') {
        width = width.max(layout_line(font, line, font_size).1);
        lines += 1;
    }
    (width, lines as f32 * line_height)
}

/// Rasterize text coverage with the top-left of the text box at
/// `(origin_x, origin_y)`. Supports multiline text via '\n'.
///
/// `pad` extra pixels are reserved on every side so a stroke can grow past
/// the glyph edges.
pub fn rasterize_coverage(
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    origin_y: f32,
    pad: u32,
) -> Coverage {
    let line_height = font.as_scaled(font_size).height();

    let mut all_glyphs: Vec<(GlyphId, f32, f32)> = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        let y_offset = line_idx as f32 * line_height;
        let (glyphs, _) = layout_line(font, line, font_size);
        all_glyphs.extend(glyphs.into_iter().map(|(id, gx, gy)| (id, gx, gy + y_offset)));
    }

    // Bounding box of all glyph outlines, relative to the origin
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(gx, gy));
        let bounds = font.glyph_bounds(&glyph);
        min_x = min_x.min(bounds.min.x);
        min_y = min_y.min(bounds.min.y);
        max_x = max_x.max(bounds.max.x);
        max_y = max_y.max(bounds.max.y);
    }
    if min_x >= max_x || min_y >= max_y {
        return Coverage::default();
    }

    let pad = pad as f32 + 2.0;
    let x0 = (origin_x + min_x - pad).floor() as i32;
    let y0 = (origin_y + min_y - pad).floor() as i32;
    let x1 = (origin_x + max_x + pad).ceil() as i32;
    let y1 = (origin_y + max_y + pad).ceil() as i32;
    let width = (x1 - x0).max(0) as u32;
    let height = (y1 - y0).max(0) as u32;
    let mut data = vec![0.0f32; width as usize * height as usize];

    for &(glyph_id, gx, gy) in &all_glyphs {
        let glyph =
            glyph_id.with_scale_and_position(font_size, point(origin_x + gx, origin_y + gy));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let b = outlined.px_bounds();
        let (bx, by) = (b.min.x as i32 - x0, b.min.y as i32 - y0);
        outlined.draw(|px, py, cov| {
            let ix = bx + px as i32;
            let iy = by + py as i32;
            if ix >= 0 && iy >= 0 && (ix as u32) < width && (iy as u32) < height {
                let idx = iy as usize * width as usize + ix as usize;
                data[idx] = data[idx].max(cov.min(1.0));
            }
        });
    }

    Coverage {
        data,
        width,
        height,
        off_x: x0,
        off_y: y0,
    }
}

/// Coverage of a stroke `width` pixels wide centered on the edges of `fill`:
/// dilation minus erosion over a disc of radius `width / 2`.
pub fn stroke_band(fill: &Coverage, width: f32) -> Coverage {
    let radius = (width * 0.5).min(MAX_STROKE_RADIUS);
    if fill.is_empty() || radius <= 0.0 {
        return Coverage::default();
    }

    let r = radius.ceil() as i32;
    let r_sq = radius * radius;
    let disc: Vec<(i32, i32)> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| (dx * dx + dy * dy) as f32 <= r_sq)
        .collect();

    let w = fill.width as usize;
    let mut data = vec![0.0f32; fill.data.len()];
    data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut grown = 0.0f32;
            let mut shrunk = 1.0f32;
            for &(dx, dy) in &disc {
                let v = fill.at(x as i32 + dx, y as i32 + dy);
                grown = grown.max(v);
                shrunk = shrunk.min(v);
            }
            *out = (grown - shrunk).clamp(0.0, 1.0);
        }
    });

    Coverage {
        data,
        width: fill.width,
        height: fill.height,
        off_x: fill.off_x,
        off_y: fill.off_y,
    }
}

// ============================================================================
// FONT LOOKUP
// ============================================================================

/// Resolves font family names to loaded fonts, caching each family.
///
/// Lookup order: the named system family, the configured fallback file,
/// then the system's default sans-serif.
#[derive(Debug, Default)]
pub struct FontBook {
    families: HashMap<String, Option<FontArc>>,
    fallback_path: Option<PathBuf>,
}

impl FontBook {
    pub fn new(fallback_path: Option<PathBuf>) -> Self {
        Self {
            families: HashMap::new(),
            fallback_path,
        }
    }

    pub fn resolve(&mut self, family: &str) -> Option<FontArc> {
        if let Some(cached) = self.families.get(family) {
            return cached.clone();
        }
        let font = load_system_font(family, 400, false)
            .or_else(|| self.load_fallback_file())
            .or_else(load_default_sans);
        match &font {
            Some(_) => log_info!("Resolved font family '{}'", family),
            None => log_warn!("No font available for family '{}'; text will not paint", family),
        }
        self.families.insert(family.to_string(), font.clone());
        font
    }

    fn load_fallback_file(&self) -> Option<FontArc> {
        let path = self.fallback_path.as_ref()?;
        match std::fs::read(path) {
            Ok(bytes) => FontArc::try_from_vec(bytes).ok(),
            Err(e) => {
                log_warn!("Could not read font file {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Load a font by family name, weight, and style from the system.
/// `weight` is a CSS-style weight value (100=Thin, 400=Regular, 700=Bold, etc.)
/// Returns None if the font cannot be found.
pub fn load_system_font(family: &str, weight: u16, italic: bool) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    load_font_kit(&[FamilyName::Title(family.to_string())], weight, italic)
}

fn load_default_sans() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    load_font_kit(&[FamilyName::SansSerif], 400, false)
}

fn load_font_kit(
    names: &[font_kit::family_name::FamilyName],
    weight: u16,
    italic: bool,
) -> Option<FontArc> {
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);
    if italic {
        props.style = Style::Italic;
    }

    let handle = SystemSource::new().select_best_match(names, &props).ok()?;
    let font_data = handle.load().ok()?;
    let font_data_copy = font_data.copy_font_data()?;
    let bytes: Vec<u8> = (*font_data_copy).clone();
    FontArc::try_from_vec(bytes).ok()
}
