//! MBTiles tile layer
//!
//! This module provides a tile layer backed by a single MBTiles archive:
//! - Async archive loading from a URL, a byte buffer or a local file
//! - Metadata-driven zoom range, attribution and image format
//! - Synchronous per-tile lookups with top/bottom row inversion
//! - Revocable object URLs for every tile payload

pub mod element;
pub mod events;
pub mod layer;
pub mod resources;
pub mod trait_impl;
pub mod types;

pub use element::{TileElement, TileLoadState};
pub use events::{EventManager, TileEventKind, TileLayerEvent};
pub use layer::MbTilesLayer;
pub use resources::{MemoryUrlFactory, ObjectUrlFactory, ObjectUrlRegistry, TileImage, EMPTY_IMAGE_URL};
pub use types::{ArchiveState, TileDone, TileLayerOptions, TileState};

#[cfg(feature = "wasm")]
pub use resources::BrowserUrlFactory;
