//! Executes compositor paint commands into a bitmap.

use image::RgbaImage;

use crate::compositor::{Frame, PaintCommand, Rect};
use crate::log_warn;
use crate::ops::shapes::{draw_image, paint_coverage, stroke_rect};
use crate::ops::text::{FontBook, measure_text, rasterize_coverage, stroke_band};

#[derive(Debug)]
pub struct Rasterizer {
    fonts: FontBook,
}

impl Rasterizer {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    /// Flatten `frame` into a bitmap of `stage * pixel_ratio` pixels. The
    /// bitmap starts out transparent.
    pub fn rasterize(&mut self, frame: &Frame, pixel_ratio: f32) -> RgbaImage {
        let (w, h) = frame.stage.pixel_size(pixel_ratio);
        let mut target = RgbaImage::new(w, h);
        let s = pixel_ratio;

        for command in &frame.commands {
            match command {
                PaintCommand::Clear(color) => {
                    let px = color.to_rgba();
                    target.pixels_mut().for_each(|p| *p = px);
                }
                PaintCommand::DrawImage { image, rect, .. } => {
                    draw_image(
                        &mut target,
                        &image.pixels,
                        rect.x * s,
                        rect.y * s,
                        rect.width * s,
                        rect.height * s,
                    );
                }
                PaintCommand::StrokeRect { rect, stroke, .. } => {
                    stroke_rect(
                        &mut target,
                        rect.x * s,
                        rect.y * s,
                        rect.width * s,
                        rect.height * s,
                        stroke.width * s,
                        stroke.color.to_rgba(),
                    );
                }
                PaintCommand::DrawText {
                    layer,
                    text,
                    x,
                    y,
                    font_family,
                    font_size,
                    fill,
                    stroke,
                } => {
                    let Some(font) = self.fonts.resolve(font_family) else {
                        log_warn!("Skipping text layer {}: no font for '{}'", layer, font_family);
                        continue;
                    };
                    let stroke_px = stroke.as_ref().map_or(0.0, |o| o.width * s);
                    let pad = (stroke_px * 0.5).ceil() as u32;
                    let coverage =
                        rasterize_coverage(&font, text, font_size * s, x * s, y * s, pad);
                    paint_coverage(&mut target, &coverage, fill.to_rgba());
                    if let Some(outline) = stroke {
                        let band = stroke_band(&coverage, stroke_px);
                        paint_coverage(&mut target, &band, outline.color.to_rgba());
                    }
                }
            }
        }

        target
    }

    /// Box of a text layer in stage coordinates, if its font resolves.
    pub fn text_bounds(
        &mut self,
        font_family: &str,
        font_size: f32,
        text: &str,
        x: f32,
        y: f32,
    ) -> Option<Rect> {
        let font = self.fonts.resolve(font_family)?;
        let (width, height) = measure_text(&font, text, font_size);
        Some(Rect {
            x,
            y,
            width,
            height,
        })
    }
}
