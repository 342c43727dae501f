//! ThumbCraft: compose image and text layers on a fixed-size stage and
//! export the result as a PNG thumbnail.
//!
//! The layer list is an immutable value; every edit returns a new
//! [`canvas::LayerList`]. A [`project::Session`] owns the current list
//! together with the selection, the background image loader and the
//! exporter.

pub mod canvas;
pub mod cli;
pub mod compositor;
pub mod error;
pub mod export;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod script;
pub mod selection;
pub mod settings;
