//! GridPaint: a grid-based raster editor core.
//!
//! A document is a square visible grid (16 to 64 cells) backed by a larger
//! virtual canvas of layers.  Tools, history, transforms, filters, macros
//! and file formats all operate on [`canvas::CanvasState`].

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;
