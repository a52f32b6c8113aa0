//! # maplet-mbtiles
//!
//! A maplet tile layer that reads raster tiles out of a single MBTiles
//! archive.
//!
//! The archive is obtained asynchronously (over HTTP, from an in-memory
//! buffer or from a local file), opened with an embedded SQLite engine and
//! queried synchronously for every tile the host asks for. Each tile payload
//! is exposed as a revocable object URL and drives the tile element's
//! load/error lifecycle.

pub mod archive;
pub mod core;
pub mod layers;
pub mod prelude;
pub mod runtime;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::ArchiveLoadingConfig,
    geo::{LatLng, LatLngBounds, TileCoord, TileRange},
};

pub use archive::{
    database::MbTilesDatabase,
    metadata::{MbTilesMetadata, TileFormat},
    source::ArchiveSource,
};

pub use layers::{
    base::LayerTrait,
    tile::{MbTilesLayer, TileElement, TileImage, TileLayerEvent, TileLayerOptions},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Archive failed to load: {0}")]
    Load(std::sync::Arc<MapError>),

    #[error("Invalid archive source: {0}")]
    InvalidSource(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Error type alias for convenience
pub type Error = MapError;

/// Install `env_logger` as the `log` backend, honouring `RUST_LOG`.
///
/// Calling it more than once is harmless.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(cfg!(test))
        .try_init();
}
