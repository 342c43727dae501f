use std::fmt;

use image::Rgba;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;
use crate::io::SourceHandle;

// ============================================================================
// IDENTIFIERS & COLORS
// ============================================================================

/// Opaque layer identifier, assigned once at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(Uuid);

impl LayerId {
    fn fresh() -> Self {
        LayerId(Uuid::new_v4())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RGB hex color as handed over by a color picker (`#rgb` or `#rrggbb`).
///
/// The string is kept verbatim; the parsed value is cached next to it so
/// painting never has to deal with a malformed color.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    hex: String,
    rgba: [u8; 4],
}

impl Color {
    pub fn parse(hex: &str) -> Result<Self, ModelError> {
        let rgba = parse_hex(hex).ok_or_else(|| ModelError::InvalidColor(hex.to_string()))?;
        Ok(Self {
            hex: hex.to_string(),
            rgba,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn to_rgba(&self) -> Rgba<u8> {
        Rgba(self.rgba)
    }
}

impl TryFrom<String> for Color {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.hex
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    let digits = hex.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        3 => {
            let val = u16::from_str_radix(digits, 16).ok()?;
            let expand = |n: u16| ((n & 0xF) as u8) * 17;
            Some([expand(val >> 8), expand(val >> 4), expand(val), 255])
        }
        6 => {
            let val = u32::from_str_radix(digits, 16).ok()?;
            Some([(val >> 16) as u8, (val >> 8) as u8, val as u8, 255])
        }
        _ => None,
    }
}

/// Stroke drawn around a layer's shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub color: Color,
    pub width: f32,
}

impl Default for Outline {
    fn default() -> Self {
        Self {
            color: Color {
                hex: "#ff0000".to_string(),
                rgba: [255, 0, 0, 255],
            },
            width: 4.0,
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    Image {
        source: SourceHandle,
        /// Render box, independent of the source's natural size.
        width: f32,
        height: f32,
    },
    Text {
        text: String,
        font_size: f32,
        font_family: String,
        fill: Color,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub id: LayerId,
    pub x: f32,
    pub y: f32,
    pub outline: Option<Outline>,
    pub kind: LayerKind,
}

/// Styling applied to freshly added text layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub text: String,
    pub font_size: f32,
    pub font_family: String,
    pub fill: Color,
    pub x: f32,
    pub y: f32,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            text: "Hello World".to_string(),
            font_size: 48.0,
            font_family: "Arial".to_string(),
            fill: Color {
                hex: "#ffffff".to_string(),
                rgba: [255, 255, 255, 255],
            },
            x: 20.0,
            y: 20.0,
        }
    }
}

/// Ordered layers; index order is paint order, later entries on top.
///
/// Every mutation returns a new list and leaves `self` untouched, so a list
/// handed to the compositor is a stable snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerList {
    layers: Vec<Layer>,
}

impl LayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_index(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn position(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.position(id).is_some()
    }

    pub fn add_image_layer(
        &self,
        source: SourceHandle,
        width: f32,
        height: f32,
        position: (f32, f32),
    ) -> Result<LayerList, ModelError> {
        self.append_image(source, width, height, position)
            .map(|(list, _)| list)
    }

    pub fn add_text_layer(&self, defaults: &TextDefaults) -> LayerList {
        self.append_text(defaults).0
    }

    /// [`add_image_layer`](Self::add_image_layer), also returning the new id.
    pub(crate) fn append_image(
        &self,
        source: SourceHandle,
        width: f32,
        height: f32,
        position: (f32, f32),
    ) -> Result<(LayerList, LayerId), ModelError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(ModelError::InvalidDimensions { width, height });
        }
        Ok(self.appended(Layer {
            id: LayerId::fresh(),
            x: position.0,
            y: position.1,
            outline: None,
            kind: LayerKind::Image {
                source,
                width,
                height,
            },
        }))
    }

    /// [`add_text_layer`](Self::add_text_layer), also returning the new id.
    pub(crate) fn append_text(&self, defaults: &TextDefaults) -> (LayerList, LayerId) {
        self.appended(Layer {
            id: LayerId::fresh(),
            x: defaults.x,
            y: defaults.y,
            outline: None,
            kind: LayerKind::Text {
                text: defaults.text.clone(),
                font_size: defaults.font_size,
                font_family: defaults.font_family.clone(),
                fill: defaults.fill.clone(),
            },
        })
    }

    pub fn move_layer(&self, id: LayerId, x: f32, y: f32) -> Result<LayerList, ModelError> {
        self.replace_with(id, |layer| {
            Ok(Layer {
                x,
                y,
                ..layer.clone()
            })
        })
    }

    /// Replace the fill of a text layer. Image layers have no fill.
    pub fn set_fill(&self, id: LayerId, color: Color) -> Result<LayerList, ModelError> {
        self.replace_with(id, |layer| match &layer.kind {
            LayerKind::Text {
                text,
                font_size,
                font_family,
                ..
            } => Ok(Layer {
                kind: LayerKind::Text {
                    text: text.clone(),
                    font_size: *font_size,
                    font_family: font_family.clone(),
                    fill: color,
                },
                ..layer.clone()
            }),
            LayerKind::Image { .. } => Err(ModelError::InvalidLayerKind { id, expected: "text" }),
        })
    }

    pub fn set_text(&self, id: LayerId, content: &str) -> Result<LayerList, ModelError> {
        self.replace_with(id, |layer| match &layer.kind {
            LayerKind::Text {
                font_size,
                font_family,
                fill,
                ..
            } => Ok(Layer {
                kind: LayerKind::Text {
                    text: content.to_string(),
                    font_size: *font_size,
                    font_family: font_family.clone(),
                    fill: fill.clone(),
                },
                ..layer.clone()
            }),
            LayerKind::Image { .. } => Err(ModelError::InvalidLayerKind { id, expected: "text" }),
        })
    }

    pub fn set_outline(
        &self,
        id: LayerId,
        outline: Option<Outline>,
    ) -> Result<LayerList, ModelError> {
        self.replace_with(id, |layer| {
            Ok(Layer {
                outline,
                ..layer.clone()
            })
        })
    }

    /// Checkbox form of [`set_outline`](Self::set_outline): on applies
    /// `default_outline`, off clears the stroke.
    pub fn toggle_outline(
        &self,
        id: LayerId,
        enabled: bool,
        default_outline: &Outline,
    ) -> Result<LayerList, ModelError> {
        self.set_outline(id, enabled.then(|| default_outline.clone()))
    }

    fn appended(&self, layer: Layer) -> (LayerList, LayerId) {
        let id = layer.id;
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.extend(self.layers.iter().cloned());
        layers.push(layer);
        (LayerList { layers }, id)
    }

    fn replace_with(
        &self,
        id: LayerId,
        update: impl FnOnce(&Layer) -> Result<Layer, ModelError>,
    ) -> Result<LayerList, ModelError> {
        let idx = self.position(id).ok_or(ModelError::MissingLayer(id))?;
        let replacement = update(&self.layers[idx])?;
        let mut layers = self.layers.clone();
        layers[idx] = replacement;
        Ok(LayerList { layers })
    }
}

// ============================================================================
// STAGE
// ============================================================================

/// Canvas region bounding the composed output.
///
/// Without a background, pixels no layer covers stay transparent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub width: f32,
    pub height: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 400.0,
            background: None,
        }
    }
}

impl Stage {
    pub fn resized(&self, width: f32, height: f32) -> Stage {
        Stage {
            width,
            height,
            background: self.background.clone(),
        }
    }

    /// Bitmap size at the given pixel density.
    pub fn pixel_size(&self, pixel_ratio: f32) -> (u32, u32) {
        let scale = |v: f32| ((v * pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

/// Fit `natural` into `bounds`, preserving aspect ratio and never upscaling.
pub fn fit_within(natural: (u32, u32), bounds: (f32, f32)) -> (f32, f32) {
    let (nw, nh) = (natural.0.max(1) as f64, natural.1.max(1) as f64);
    let ratio = (bounds.0 as f64 / nw).min(bounds.1 as f64 / nh).min(1.0);
    ((nw * ratio) as f32, (nh * ratio) as f32)
}
