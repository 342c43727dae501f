//! Image ingestion, background decoding and PNG encoding.
//!
//! Decodes run on the rayon pool and report back through an `mpsc` channel
//! that the owning thread drains with [`ImageLoader::poll`]. Results are
//! keyed by [`SourceId`], so a decode that resolves late, or for an upload
//! nobody is waiting on any more, is simply cached and otherwise ignored.

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, ImageFormat, RgbaImage};
use uuid::Uuid;

use crate::error::LoadError;
use crate::{log_info, log_warn};

// ============================================================================
// SOURCE HANDLES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Uuid);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
enum SourceOrigin {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

/// Reference to not-yet-decoded image data, the result of ingesting a file.
///
/// Two handles are equal when they came from the same ingestion, regardless
/// of content, the same way two blob URLs for one file are distinct.
#[derive(Clone, Debug)]
pub struct SourceHandle {
    id: SourceId,
    origin: Arc<SourceOrigin>,
}

impl PartialEq for SourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SourceHandle {}

impl SourceHandle {
    /// Ingest an image file. Only the extension is checked here; the bytes
    /// are not touched until the decode runs.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        if !is_image_path(&path) {
            return Err(LoadError::NotAnImage(path));
        }
        Ok(Self::new(SourceOrigin::File(path)))
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(SourceOrigin::Memory(bytes.into()))
    }

    fn new(origin: SourceOrigin) -> Self {
        Self {
            id: SourceId(Uuid::new_v4()),
            origin: Arc::new(origin),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    fn describe(&self) -> String {
        match self.origin.as_ref() {
            SourceOrigin::File(path) => path.display().to_string(),
            SourceOrigin::Memory(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// True when the extension names a raster format the `image` crate knows.
pub fn is_image_path(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

fn decode_source(origin: &SourceOrigin) -> Result<RgbaImage, String> {
    match origin {
        SourceOrigin::File(path) => image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| e.to_string()),
        SourceOrigin::Memory(bytes) => image::load_from_memory(bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| e.to_string()),
    }
}

// ============================================================================
// LOADER
// ============================================================================

#[derive(Debug)]
pub struct DecodedImage {
    pub pixels: RgbaImage,
}

impl DecodedImage {
    pub fn natural_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

#[derive(Clone, Debug)]
pub enum LoadState {
    Pending,
    Ready(Arc<DecodedImage>),
    Failed(LoadError),
}

/// Completion notice handed back to the caller of [`ImageLoader::poll`].
#[derive(Clone, Debug)]
pub enum LoadEvent {
    Loaded { source: SourceId, natural: (u32, u32) },
    Failed { source: SourceId, error: LoadError },
}

impl LoadEvent {
    pub fn source(&self) -> SourceId {
        match self {
            LoadEvent::Loaded { source, .. } | LoadEvent::Failed { source, .. } => *source,
        }
    }
}

#[derive(Debug)]
struct DecodeResult {
    source: SourceId,
    result: Result<RgbaImage, String>,
}

/// Decode cache keyed by source; each source is decoded at most once.
#[derive(Debug)]
pub struct ImageLoader {
    cache: HashMap<SourceId, LoadState>,
    sender: mpsc::Sender<DecodeResult>,
    receiver: mpsc::Receiver<DecodeResult>,
    decodes_started: usize,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            cache: HashMap::new(),
            sender,
            receiver,
            decodes_started: 0,
        }
    }

    /// Start decoding `handle` in the background unless it is already known.
    pub fn request(&mut self, handle: &SourceHandle) {
        if self.cache.contains_key(&handle.id) {
            return;
        }
        self.cache.insert(handle.id, LoadState::Pending);
        self.decodes_started += 1;
        log_info!("Decoding image source {} ({})", handle.id, handle.describe());

        let sender = self.sender.clone();
        let source = handle.id;
        let origin = Arc::clone(&handle.origin);
        rayon::spawn(move || {
            let result = decode_source(&origin);
            let _ = sender.send(DecodeResult { source, result });
        });
    }

    /// Drain finished decodes into the cache. Never blocks.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(done) = self.receiver.try_recv() {
            events.push(self.apply(done));
        }
        events
    }

    /// Block until `source` is no longer pending, collecting every event
    /// that arrives in the meantime.
    pub fn wait(&mut self, source: SourceId) -> Vec<LoadEvent> {
        let mut events = self.poll();
        while matches!(self.cache.get(&source), Some(LoadState::Pending)) {
            match self.receiver.recv() {
                Ok(done) => events.push(self.apply(done)),
                Err(_) => break,
            }
        }
        events
    }

    pub fn state(&self, source: SourceId) -> Option<&LoadState> {
        self.cache.get(&source)
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<DecodedImage>> {
        match self.cache.get(&source) {
            Some(LoadState::Ready(img)) => Some(Arc::clone(img)),
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.cache.values().any(|s| matches!(s, LoadState::Pending))
    }

    /// Number of decode jobs ever started.
    pub fn decodes_started(&self) -> usize {
        self.decodes_started
    }

    fn apply(&mut self, done: DecodeResult) -> LoadEvent {
        let DecodeResult { source, result } = done;
        match result {
            Ok(pixels) => {
                let natural = pixels.dimensions();
                log_info!("Decoded source {} ({}x{})", source, natural.0, natural.1);
                self.cache
                    .insert(source, LoadState::Ready(Arc::new(DecodedImage { pixels })));
                LoadEvent::Loaded { source, natural }
            }
            Err(reason) => {
                log_warn!("Decode failed for source {}: {}", source, reason);
                let error = LoadError::DecodeError {
                    source_id: source,
                    reason,
                };
                self.cache.insert(source, LoadState::Failed(error.clone()));
                LoadEvent::Failed { source, error }
            }
        }
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode an RGBA bitmap as a PNG byte stream.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut out = Cursor::new(Vec::new());
    let encoder = PngEncoder::new(&mut out);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(out.into_inner())
}
