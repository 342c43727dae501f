//! Draw-order and paint-parameter policy.
//!
//! The compositor walks the layer list front to back and turns each layer
//! into paint commands for the rasterizer. It owns no state: the same list,
//! stage and set of decoded images always produce the same [`Frame`].

use std::sync::Arc;

use crate::canvas::{Color, LayerId, LayerKind, LayerList, Outline, Stage};
use crate::io::{DecodedImage, ImageLoader, SourceId};

/// Axis-aligned rectangle in stage coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }
}

#[derive(Clone, Debug)]
pub enum PaintCommand {
    Clear(Color),
    DrawImage {
        layer: LayerId,
        image: Arc<DecodedImage>,
        rect: Rect,
    },
    StrokeRect {
        layer: LayerId,
        rect: Rect,
        stroke: Outline,
    },
    DrawText {
        layer: LayerId,
        text: String,
        x: f32,
        y: f32,
        font_family: String,
        font_size: f32,
        fill: Color,
        stroke: Option<Outline>,
    },
}

impl PaintCommand {
    pub fn layer(&self) -> Option<LayerId> {
        match self {
            PaintCommand::Clear(_) => None,
            PaintCommand::DrawImage { layer, .. }
            | PaintCommand::StrokeRect { layer, .. }
            | PaintCommand::DrawText { layer, .. } => Some(*layer),
        }
    }
}

/// Looks up decoded pixels for image layers.
pub trait ImageSource {
    fn decoded(&self, source: SourceId) -> Option<Arc<DecodedImage>>;
}

impl ImageSource for ImageLoader {
    fn decoded(&self, source: SourceId) -> Option<Arc<DecodedImage>> {
        self.get(source)
    }
}

/// A composed stage: the surface the exporter rasterizes.
#[derive(Clone, Debug)]
pub struct Frame {
    pub stage: Stage,
    pub commands: Vec<PaintCommand>,
}

impl Frame {
    /// Layers that produced at least one command, in paint order.
    pub fn painted_layers(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = Vec::new();
        for id in self.commands.iter().filter_map(PaintCommand::layer) {
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

pub fn render(list: &LayerList, stage: &Stage, images: &dyn ImageSource) -> Frame {
    let mut commands: Vec<PaintCommand> = stage
        .background
        .iter()
        .cloned()
        .map(PaintCommand::Clear)
        .collect();

    for layer in list.iter() {
        match &layer.kind {
            LayerKind::Image {
                source,
                width,
                height,
            } => {
                // Not decoded yet (or never will be): leave it out of this frame.
                let Some(image) = images.decoded(source.id()) else {
                    continue;
                };
                let rect = Rect {
                    x: layer.x,
                    y: layer.y,
                    width: *width,
                    height: *height,
                };
                commands.push(PaintCommand::DrawImage {
                    layer: layer.id,
                    image,
                    rect,
                });
                if let Some(stroke) = visible_stroke(layer.outline.as_ref()) {
                    commands.push(PaintCommand::StrokeRect {
                        layer: layer.id,
                        rect,
                        stroke,
                    });
                }
            }
            LayerKind::Text {
                text,
                font_size,
                font_family,
                fill,
            } => commands.push(PaintCommand::DrawText {
                layer: layer.id,
                text: text.clone(),
                x: layer.x,
                y: layer.y,
                font_family: font_family.clone(),
                font_size: *font_size,
                fill: fill.clone(),
                stroke: visible_stroke(layer.outline.as_ref()),
            }),
        }
    }

    Frame {
        stage: stage.clone(),
        commands,
    }
}

/// An absent outline and a zero-width one paint the same: nothing.
fn visible_stroke(outline: Option<&Outline>) -> Option<Outline> {
    outline.filter(|o| o.width > 0.0).cloned()
}
