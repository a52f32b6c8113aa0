//! Parsing of the MBTiles `metadata` table
//!
//! Every row is optional. An absent or empty value never overrides what the
//! caller configured; a malformed value is logged and skipped.

use serde::{Deserialize, Serialize};

use crate::{
    core::geo::{LatLng, LatLngBounds},
    Result,
};

/// Image encoding of the tiles in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    #[default]
    Png,
    Jpg,
}

impl TileFormat {
    /// Reads the `format` row. Only `png` and `jpg` are recognised; anything
    /// else, including a missing row, means PNG.
    pub fn from_metadata(value: Option<&str>) -> Self {
        match value {
            Some("jpg") => TileFormat::Jpg,
            _ => TileFormat::Png,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for TileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileFormat::Png => write!(f, "png"),
            TileFormat::Jpg => write!(f, "jpg"),
        }
    }
}

/// The recognised rows of an archive's `metadata` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MbTilesMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    /// `overlay` or `baselayer`.
    pub kind: Option<String>,
    pub attribution: Option<String>,
    pub format: TileFormat,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    pub bounds: Option<LatLngBounds>,
    pub center: Option<LatLng>,
    pub center_zoom: Option<u8>,
}

impl MbTilesMetadata {
    /// Builds the metadata from a `name -> value` lookup.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Result<Option<String>>,
    {
        let mut value = |key: &str| -> Result<Option<String>> {
            Ok(lookup(key)?.filter(|v| !v.is_empty()))
        };

        let mut metadata = MbTilesMetadata {
            name: value("name")?,
            description: value("description")?,
            version: value("version")?,
            kind: value("type")?,
            attribution: value("attribution")?,
            format: TileFormat::from_metadata(value("format")?.as_deref()),
            ..Default::default()
        };

        metadata.min_zoom = value("minzoom")?.and_then(|v| parse_zoom("minzoom", &v));
        metadata.max_zoom = value("maxzoom")?.and_then(|v| parse_zoom("maxzoom", &v));
        metadata.bounds = value("bounds")?.and_then(|v| parse_bounds(&v));

        if let Some((center, zoom)) = value("center")?.and_then(|v| parse_center(&v)) {
            metadata.center = Some(center);
            metadata.center_zoom = zoom;
        }

        Ok(metadata)
    }
}

/// Zoom rows are numbers; `"11"` and `"11.0"` both mean zoom 11.
pub(crate) fn parse_zoom(key: &str, value: &str) -> Option<u8> {
    match value.trim().parse::<f64>() {
        Ok(z) if z.is_finite() && z.fract() == 0.0 && (0.0..=u8::MAX as f64).contains(&z) => {
            Some(z as u8)
        }
        _ => {
            log::warn!("ignoring {} metadata value {:?}", key, value);
            None
        }
    }
}

fn parse_numbers(value: &str) -> Option<Vec<f64>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|n| n.is_finite()))
        .collect()
}

/// `bounds` is `west,south,east,north` in degrees.
pub(crate) fn parse_bounds(value: &str) -> Option<LatLngBounds> {
    match parse_numbers(value).as_deref() {
        Some(&[west, south, east, north]) if south <= north && west <= east => {
            Some(LatLngBounds::from_coords(south, west, north, east))
        }
        _ => {
            log::warn!("ignoring bounds metadata value {:?}", value);
            None
        }
    }
}

/// `center` is `longitude,latitude[,zoom]`.
pub(crate) fn parse_center(value: &str) -> Option<(LatLng, Option<u8>)> {
    let numbers = parse_numbers(value);
    let (lng, lat, zoom) = match numbers.as_deref() {
        Some(&[lng, lat]) => (lng, lat, None),
        Some(&[lng, lat, zoom]) => (lng, lat, parse_zoom("center", &zoom.to_string())),
        _ => {
            log::warn!("ignoring center metadata value {:?}", value);
            return None;
        }
    };

    let center = LatLng::new(lat, lng);
    if !center.is_valid() {
        log::warn!("ignoring out of range center {:?}", value);
        return None;
    }
    Some((center, zoom))
}
