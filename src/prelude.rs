//! Prelude module for common maplet-mbtiles types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maplet_mbtiles::prelude::*;`

pub use crate::core::{
    config::ArchiveLoadingConfig,
    geo::{LatLng, LatLngBounds, TileCoord, TileRange},
};

pub use crate::archive::{
    database::MbTilesDatabase,
    fetch::{BlobFetcher, HttpFetcher},
    metadata::{MbTilesMetadata, TileFormat},
    source::ArchiveSource,
};

pub use crate::layers::{
    base::{LayerProperties, LayerTrait, LayerType},
    tile::{
        events::{TileEventKind, TileLayerEvent},
        resources::{MemoryUrlFactory, ObjectUrlFactory, ObjectUrlRegistry, EMPTY_IMAGE_URL},
        MbTilesLayer, TileElement, TileImage, TileLayerOptions, TileLoadState,
    },
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::{Error as MapError, Result};

pub use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
