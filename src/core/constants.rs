//! Core constants derived from Leaflet defaults and the MBTiles conventions.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Lowest zoom a tile layer accepts unless the archive says otherwise.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Highest zoom a tile layer accepts unless the archive says otherwise.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Point lookup issued for every tile request.
pub const TILE_QUERY: &str =
    "SELECT tile_data FROM tiles WHERE zoom_level = :z AND tile_column = :x AND tile_row = :y";

/// Single metadata row lookup.
pub const METADATA_QUERY: &str = "SELECT value FROM metadata WHERE name = :key";

/// User agent sent when fetching archives over HTTP.
pub const USER_AGENT: &str = "maplet-mbtiles/0.1.0";

/// Scheme prefix of object URLs minted by the in-memory URL factory.
pub const OBJECT_URL_PREFIX: &str = "blob:maplet/";
