//! Core data types for tile layer functionality

use serde::{Deserialize, Serialize};

use super::element::TileElement;
use crate::{
    constants::{DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM, TILE_SIZE},
    core::geo::LatLngBounds,
    MapError, Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerOptions {
    pub tile_size: u32,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub attribution: Option<String>,
    pub opacity: f32,
    pub z_index: i32,
    /// Request tile images with an anonymous cross-origin policy.
    pub cross_origin: bool,
    /// Only tiles touching these bounds are considered valid.
    pub bounds: Option<LatLngBounds>,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            attribution: None,
            opacity: 1.0,
            z_index: 1,
            cross_origin: false,
            bounds: None,
        }
    }
}

impl TileLayerOptions {
    /// Parse a (possibly partial) JSON document; missing fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(MapError::Layer("tile_size must be positive".to_string()));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapError::Layer(format!(
                "min_zoom {} is above max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }
}

/// Progress of the archive behind a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Completion callback handed to [`super::MbTilesLayer::create_tile`],
/// called once with the error (if any) and the element.
pub type TileDone = Box<dyn FnOnce(Option<&MapError>, &TileElement) + Send + Sync>;

/// A tile element the host is displaying, and the object URL backing it.
#[derive(Debug, Clone)]
pub struct TileState {
    pub element: TileElement,
    pub url: Option<String>,
}

impl TileState {
    pub fn new(element: TileElement) -> Self {
        Self { element, url: None }
    }
}

pub(crate) struct PendingTile {
    pub element: TileElement,
    pub done: TileDone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TileLayerOptions::default();
        assert_eq!(options.tile_size, 256);
        assert_eq!(options.min_zoom, 0);
        assert_eq!(options.max_zoom, 18);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_json() {
        let options = TileLayerOptions::from_json(
            r#"{"min_zoom": 11, "max_zoom": 15, "attribution": "New OneMap"}"#,
        )
        .unwrap();
        assert_eq!(options.min_zoom, 11);
        assert_eq!(options.max_zoom, 15);
        assert_eq!(options.attribution.as_deref(), Some("New OneMap"));
        assert_eq!(options.tile_size, 256);
    }

    #[test]
    fn test_invalid_options() {
        assert!(TileLayerOptions::from_json(r#"{"min_zoom": 16, "max_zoom": 15}"#).is_err());
        assert!(TileLayerOptions::from_json(r#"{"tile_size": 0}"#).is_err());
    }
}
