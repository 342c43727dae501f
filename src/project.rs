use std::collections::HashMap;
use std::path::Path;

use uuid::Uuid;

use crate::canvas::{Color, LayerId, LayerKind, LayerList, Outline, Stage, fit_within};
use crate::compositor::{self, Frame};
use crate::error::{ExportError, LoadError, ModelError};
use crate::export::{ExportedImage, Exporter};
use crate::io::{ImageLoader, LoadEvent, LoadState, SourceHandle, SourceId};
use crate::ops::raster::Rasterizer;
use crate::ops::text::FontBook;
use crate::selection::{EditableFields, Selection};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

/// What happened to an upload once its decode resolved.
#[derive(Debug)]
pub enum UploadOutcome {
    Placed { layer: LayerId, size: (f32, f32) },
    Failed(LoadError),
    Rejected(ModelError),
}

/// One editing session: the layer list and everything that reads or
/// replaces it.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub is_dirty: bool,
    settings: EditorSettings,
    layers: LayerList,
    selection: Selection,
    stage: Stage,
    loader: ImageLoader,
    /// Uploads waiting on their decode, keyed by source. Each entry places
    /// one layer, so a source uploaded twice is listed twice.
    pending_uploads: HashMap<SourceId, Vec<SourceHandle>>,
    /// Last composed frame; `None` until the first render.
    frame: Option<Frame>,
    rasterizer: Rasterizer,
    exporter: Exporter,
}

impl Session {
    pub fn new(name: impl Into<String>, settings: EditorSettings) -> Self {
        let fonts = FontBook::new(settings.font_path.clone());
        let exporter = Exporter::new(settings.export.file_name.clone());
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_dirty: false,
            stage: settings.stage.clone(),
            settings,
            layers: LayerList::new(),
            selection: Selection::default(),
            loader: ImageLoader::new(),
            pending_uploads: HashMap::new(),
            frame: None,
            rasterizer: Rasterizer::new(fonts),
            exporter,
        }
    }

    pub fn layers(&self) -> &LayerList {
        &self.layers
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn set_stage_size(&mut self, width: f32, height: f32) {
        self.stage = self.stage.resized(width, height);
    }

    pub fn selection(&self) -> Option<LayerId> {
        self.selection.selected()
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Start ingesting an image. The layer appears once the decode resolves
    /// and [`pump`](Self::pump) or [`wait_for_uploads`](Self::wait_for_uploads)
    /// processes it.
    ///
    /// A source that was decoded earlier is placed right away and its
    /// outcome returned.
    pub fn upload(&mut self, handle: SourceHandle) -> Option<UploadOutcome> {
        let source = handle.id();
        log_info!("Upload requested for source {} in '{}'", source, self.name);
        self.loader.request(&handle);
        match self.loader.state(source) {
            Some(LoadState::Pending) | None => {
                self.pending_uploads.entry(source).or_default().push(handle);
                None
            }
            Some(_) => Some(self.settle(handle)),
        }
    }

    /// Process finished decodes without blocking.
    pub fn pump(&mut self) -> Vec<UploadOutcome> {
        let events = self.loader.poll();
        self.place_uploads(events)
    }

    /// Block until every pending upload has resolved.
    pub fn wait_for_uploads(&mut self) -> Vec<UploadOutcome> {
        let mut outcomes = self.pump();
        while let Some(&source) = self.pending_uploads.keys().next() {
            let events = self.loader.wait(source);
            outcomes.extend(self.place_uploads(events));
            // The event for `source` may have been drained by an earlier poll.
            for handle in self.pending_uploads.remove(&source).unwrap_or_default() {
                outcomes.push(self.settle(handle));
            }
        }
        outcomes
    }

    fn place_uploads(&mut self, events: Vec<LoadEvent>) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::new();
        for event in events {
            let source = event.source();
            // Resolutions nobody is waiting on only fill the cache.
            let Some(handles) = self.pending_uploads.remove(&source) else {
                continue;
            };
            for handle in handles {
                outcomes.push(match &event {
                    LoadEvent::Loaded { natural, .. } => self.place_image(handle, *natural),
                    LoadEvent::Failed { error, .. } => {
                        log_warn!("Upload of source {} dropped: {}", source, error);
                        UploadOutcome::Failed(error.clone())
                    }
                });
            }
        }
        outcomes
    }

    /// Resolve one upload against the loader cache.
    fn settle(&mut self, handle: SourceHandle) -> UploadOutcome {
        let source = handle.id();
        match self.loader.get(source) {
            Some(decoded) => self.place_image(handle, decoded.natural_size()),
            None => {
                let error = match self.loader.state(source) {
                    Some(LoadState::Failed(e)) => e.clone(),
                    _ => LoadError::DecodeError {
                        source_id: source,
                        reason: "decode never completed".to_string(),
                    },
                };
                UploadOutcome::Failed(error)
            }
        }
    }

    fn place_image(&mut self, handle: SourceHandle, natural: (u32, u32)) -> UploadOutcome {
        let bounds = self.settings.upload_bounds;
        let (width, height) = fit_within(natural, (bounds.width, bounds.height));
        match self.layers.append_image(handle, width, height, (0.0, 0.0)) {
            Ok((list, layer)) => {
                self.stage = self.stage.resized(width, height);
                self.replace_layers(list);
                log_info!(
                    "Placed image {}x{} (natural {}x{})",
                    width,
                    height,
                    natural.0,
                    natural.1
                );
                UploadOutcome::Placed {
                    layer,
                    size: (width, height),
                }
            }
            Err(e) => {
                log_warn!("Could not place decoded image: {}", e);
                UploadOutcome::Rejected(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Layer edits
    // ------------------------------------------------------------------

    pub fn add_text(&mut self) -> LayerId {
        let (list, id) = self.layers.append_text(&self.settings.text);
        self.replace_layers(list);
        id
    }

    pub fn move_layer(&mut self, id: LayerId, x: f32, y: f32) -> Result<(), ModelError> {
        let result = self.layers.move_layer(id, x, y);
        self.apply(result)
    }

    pub fn set_fill(&mut self, id: LayerId, hex: &str) -> Result<(), ModelError> {
        let color = Color::parse(hex)?;
        let result = self.layers.set_fill(id, color);
        self.apply(result)
    }

    pub fn set_text(&mut self, id: LayerId, text: &str) -> Result<(), ModelError> {
        let result = self.layers.set_text(id, text);
        self.apply(result)
    }

    pub fn set_outline(&mut self, id: LayerId, outline: Option<Outline>) -> Result<(), ModelError> {
        let result = self.layers.set_outline(id, outline);
        self.apply(result)
    }

    pub fn toggle_outline(&mut self, id: LayerId, enabled: bool) -> Result<(), ModelError> {
        let result = self.layers.toggle_outline(id, enabled, &self.settings.outline);
        self.apply(result)
    }

    /// Color picker change on the selected layer. No selection is a no-op.
    pub fn set_fill_selected(&mut self, hex: &str) -> Result<(), ModelError> {
        match self.selection.selected() {
            Some(id) => self.set_fill(id, hex),
            None => Ok(()),
        }
    }

    /// Outline checkbox on the selected layer. No selection is a no-op.
    pub fn toggle_outline_selected(&mut self, enabled: bool) -> Result<(), ModelError> {
        match self.selection.selected() {
            Some(id) => self.toggle_outline(id, enabled),
            None => Ok(()),
        }
    }

    /// Install a new list value. A `MissingLayer` rejection is logged and
    /// swallowed; every other rejection goes back to the caller. Either way
    /// the current list stays as it was.
    fn apply(&mut self, result: Result<LayerList, ModelError>) -> Result<(), ModelError> {
        match result {
            Ok(list) => {
                self.replace_layers(list);
                Ok(())
            }
            Err(ModelError::MissingLayer(id)) => {
                log_warn!("Ignoring edit of missing layer {}", id);
                Ok(())
            }
            Err(e) => {
                log_warn!("Edit rejected: {}", e);
                Err(e)
            }
        }
    }

    fn replace_layers(&mut self, list: LayerList) {
        self.layers = list;
        self.selection.retain_in(&self.layers);
        self.is_dirty = true;
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, id: LayerId) {
        self.selection.select(id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Click at a stage point: select the top-most layer under it, or clear
    /// the selection when the click hits nothing.
    pub fn select_at(&mut self, x: f32, y: f32) -> Option<LayerId> {
        let hit = self.layer_at(x, y);
        match hit {
            Some(id) => self.selection.select(id),
            None => self.selection.clear(),
        }
        hit
    }

    /// Top-most painted layer whose box contains the point.
    pub fn layer_at(&mut self, x: f32, y: f32) -> Option<LayerId> {
        for layer in self.layers.iter().rev() {
            let bounds = match &layer.kind {
                LayerKind::Image {
                    source,
                    width,
                    height,
                } => self.loader.get(source.id()).map(|_| compositor::Rect {
                    x: layer.x,
                    y: layer.y,
                    width: *width,
                    height: *height,
                }),
                LayerKind::Text {
                    text,
                    font_size,
                    font_family,
                    ..
                } => self
                    .rasterizer
                    .text_bounds(font_family, *font_size, text, layer.x, layer.y),
            };
            if bounds.is_some_and(|b| b.contains(x, y)) {
                return Some(layer.id);
            }
        }
        None
    }

    pub fn editable_fields(&self) -> Option<EditableFields<'_>> {
        self.selection.current_editable_fields(&self.layers)
    }

    // ------------------------------------------------------------------
    // Rendering & export
    // ------------------------------------------------------------------

    /// Compose the current list into a fresh frame and mount it.
    pub fn render(&mut self) -> &Frame {
        self.frame
            .insert(compositor::render(&self.layers, &self.stage, &self.loader))
    }

    /// Export the current composition. Fails with `NoSurface` before the
    /// first [`render`](Self::render); afterwards the frame is re-derived
    /// from the current list, so edits made since the last render are
    /// included.
    pub fn export(&mut self) -> Result<ExportedImage, ExportError> {
        if self.frame.is_some() {
            self.render();
        }
        self.exporter.export(self.frame.as_ref(), &mut self.rasterizer)
    }

    /// Render, export and write `thumbnail.png` into `dir`.
    pub fn export_to(&mut self, dir: &Path) -> Result<std::path::PathBuf, ExportError> {
        self.render();
        let image = self.exporter.export(self.frame.as_ref(), &mut self.rasterizer)?;
        let path = self.exporter.deliver(&image, dir)?;
        self.is_dirty = false;
        Ok(path)
    }
}
