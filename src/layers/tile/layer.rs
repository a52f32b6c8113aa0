//! The MBTiles tile layer

use std::{collections::VecDeque, sync::Arc};

use crossbeam_channel::{Receiver, TryRecvError};

use super::{
    element::TileElement,
    events::{EventManager, TileEventKind, TileLayerEvent},
    resources::{ObjectUrlFactory, ObjectUrlRegistry, TileImage},
    types::{ArchiveState, PendingTile, TileDone, TileState},
    TileLayerOptions,
};
use crate::{
    archive::{
        self,
        fetch::{BlobFetcher, HttpFetcher},
        metadata::{MbTilesMetadata, TileFormat},
        source::ArchiveSource,
        MbTilesDatabase,
    },
    core::geo::{TileCoord, TileRange},
    layers::base::{LayerProperties, LayerType},
    prelude::HashMap,
    runtime::{self, AsyncHandle},
    MapError, Result,
};

/// A tile layer whose tiles live in a single MBTiles archive.
///
/// The archive is loaded once, either inline with [`MbTilesLayer::load`] or
/// in the background with [`MbTilesLayer::spawn_load`]. Tiles requested
/// before it is ready are queued and resolved as soon as it opens.
pub struct MbTilesLayer {
    pub(crate) properties: LayerProperties,
    pub(crate) options: TileLayerOptions,
    source: ArchiveSource,
    fetcher: Arc<dyn BlobFetcher>,

    database: Option<MbTilesDatabase>,
    metadata: Option<MbTilesMetadata>,
    format: TileFormat,
    state: ArchiveState,
    load_error: Option<Arc<MapError>>,
    load_rx: Option<Receiver<Result<MbTilesDatabase>>>,
    load_handle: Option<Box<dyn AsyncHandle>>,

    global_tile_range: Option<TileRange>,
    tiles: HashMap<TileCoord, TileState>,
    pending: VecDeque<PendingTile>,
    urls: ObjectUrlRegistry,
    events: EventManager,
}

impl MbTilesLayer {
    /// Create an unloaded layer for the archive at `source`.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<ArchiveSource>,
        options: TileLayerOptions,
    ) -> Result<Self> {
        options.validate()?;

        let mut properties =
            LayerProperties::new(id.into(), "MBTiles Layer".to_string(), LayerType::Tile);
        properties.opacity = options.opacity.clamp(0.0, 1.0);
        properties.z_index = options.z_index;
        properties.interactive = false;

        Ok(Self {
            properties,
            options,
            source: source.into(),
            fetcher: Arc::new(HttpFetcher::new()),
            database: None,
            metadata: None,
            format: TileFormat::default(),
            state: ArchiveState::Idle,
            load_error: None,
            load_rx: None,
            load_handle: None,
            global_tile_range: None,
            tiles: HashMap::default(),
            pending: VecDeque::new(),
            urls: ObjectUrlRegistry::default(),
            events: EventManager::new(),
        })
    }

    /// Use a custom fetcher for URL sources.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn BlobFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Use a custom object URL factory (e.g. the browser's).
    pub fn with_url_factory(mut self, factory: Arc<dyn ObjectUrlFactory>) -> Self {
        self.urls = ObjectUrlRegistry::new(factory);
        self
    }

    /// Register a listener for one kind of layer event.
    pub fn on<F>(&mut self, kind: TileEventKind, callback: F)
    where
        F: Fn(&TileLayerEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback);
    }

    pub fn off(&mut self, kind: TileEventKind) {
        self.events.off(kind);
    }

    pub fn source(&self) -> &ArchiveSource {
        &self.source
    }

    pub fn tile_options(&self) -> &TileLayerOptions {
        &self.options
    }

    /// Replace the options wholesale. The grid is recomputed for the current
    /// zoom when the tile size changes.
    pub fn set_tile_options(&mut self, options: TileLayerOptions) -> Result<()> {
        options.validate()?;
        self.properties.opacity = options.opacity.clamp(0.0, 1.0);
        self.properties.z_index = options.z_index;
        let tile_size_changed = options.tile_size != self.options.tile_size;
        self.options = options;

        if tile_size_changed {
            if let Some(range) = self.global_tile_range {
                self.reset_grid(range.zoom);
            }
        }
        Ok(())
    }

    pub fn attribution(&self) -> Option<&str> {
        self.options.attribution.as_deref()
    }

    pub fn format(&self) -> TileFormat {
        self.format
    }

    pub fn metadata(&self) -> Option<&MbTilesMetadata> {
        self.metadata.as_ref()
    }

    pub fn database(&self) -> Option<&MbTilesDatabase> {
        self.database.as_ref()
    }

    pub fn archive_state(&self) -> ArchiveState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ArchiveState::Loaded
    }

    /// Number of tile requests waiting for the archive.
    pub fn pending_tiles(&self) -> usize {
        self.pending.len()
    }

    /// Number of object URLs handed out and not yet revoked.
    pub fn live_urls(&self) -> usize {
        self.urls.len()
    }

    pub fn tile(&self, coords: &TileCoord) -> Option<&TileState> {
        self.tiles.get(coords)
    }

    /// Fetch and open the archive inline.
    pub async fn load(&mut self) -> Result<()> {
        match self.state {
            ArchiveState::Loaded => return Ok(()),
            ArchiveState::Loading => {
                return Err(MapError::Layer("archive is already loading".to_string()))
            }
            ArchiveState::Idle | ArchiveState::Failed => {}
        }

        self.state = ArchiveState::Loading;
        log::debug!("loading archive {}", self.source.describe());
        let result = archive::open_source(&self.source, self.fetcher.as_ref()).await;
        self.finish_opening(result)
    }

    /// Start loading the archive on the async runtime. The outcome is
    /// applied by [`MbTilesLayer::process_archive_result`], which `update`
    /// calls every frame.
    pub fn spawn_load(&mut self) {
        if matches!(self.state, ArchiveState::Loading | ArchiveState::Loaded) {
            log::debug!("spawn_load ignored, archive is {:?}", self.state);
            return;
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let source = self.source.clone();
        let fetcher = self.fetcher.clone();

        log::debug!("spawning load of archive {}", source.describe());
        let handle = runtime::spawn(async move {
            let result = archive::open_source(&source, fetcher.as_ref()).await;
            let _ = tx.send(result);
        });

        self.state = ArchiveState::Loading;
        self.load_rx = Some(rx);
        self.load_handle = Some(handle);
    }

    /// Applies a finished background load, if there is one. Returns whether
    /// the archive state changed.
    pub fn process_archive_result(&mut self) -> bool {
        let Some(rx) = self.load_rx.as_ref() else {
            return false;
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(MapError::Archive(
                "archive loader stopped without a result".to_string(),
            )),
        };

        self.load_rx = None;
        self.load_handle = None;
        // The outcome is reported through the layer events.
        let _ = self.finish_opening(result);
        true
    }

    fn finish_opening(&mut self, result: Result<MbTilesDatabase>) -> Result<()> {
        let opened = result.and_then(|db| {
            let metadata = db.metadata()?;
            Ok((db, metadata))
        });

        match opened {
            Ok((db, metadata)) => {
                log::info!(
                    "opened archive {} ({:?}, format {})",
                    self.source.describe(),
                    metadata.name.as_deref().unwrap_or("unnamed"),
                    metadata.format
                );
                self.apply_metadata(&metadata);
                self.database = Some(db);
                self.metadata = Some(metadata.clone());
                self.state = ArchiveState::Loaded;
                self.load_error = None;

                self.events.fire(TileLayerEvent::DatabaseLoaded { metadata });
                self.flush_pending();
                Ok(())
            }
            Err(e) => {
                log::warn!("archive {} failed to load: {}", self.source.describe(), e);
                let error = Arc::new(e);
                self.state = ArchiveState::Failed;
                self.load_error = Some(error.clone());

                self.events.fire(TileLayerEvent::DatabaseError {
                    error: error.clone(),
                });
                self.fail_pending(&error);
                Err(MapError::Load(error))
            }
        }
    }

    fn apply_metadata(&mut self, metadata: &MbTilesMetadata) {
        if let Some(attribution) = &metadata.attribution {
            self.options.attribution = Some(attribution.clone());
        }
        if let Some(min_zoom) = metadata.min_zoom {
            self.options.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = metadata.max_zoom {
            self.options.max_zoom = max_zoom;
        }
        if self.options.min_zoom > self.options.max_zoom {
            log::warn!(
                "archive zoom range {}..{} is inverted",
                self.options.min_zoom,
                self.options.max_zoom
            );
        }
        if self.options.bounds.is_none() {
            self.options.bounds = metadata.bounds.clone();
        }
        self.format = metadata.format;
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("resolving {} deferred tiles", self.pending.len());
        }
        while let Some(PendingTile { element, done }) = self.pending.pop_front() {
            self.resolve_tile(element, done);
        }
    }

    fn fail_pending(&mut self, error: &Arc<MapError>) {
        while let Some(PendingTile { element, done }) = self.pending.pop_front() {
            self.tile_failed(element, done, MapError::Load(error.clone()));
        }
    }

    /// Record the global tile range for the zoom the host is showing. Row
    /// inversion uses this range.
    pub fn reset_grid(&mut self, zoom: u8) {
        self.global_tile_range = Some(TileRange::global(zoom, self.options.tile_size));
    }

    pub fn global_tile_range(&self) -> Option<TileRange> {
        self.global_tile_range
    }

    /// Whether the host should request this tile at all: inside the zoom
    /// range and touching the layer bounds.
    pub fn is_valid_tile(&self, coords: &TileCoord) -> bool {
        if coords.z < self.options.min_zoom || coords.z > self.options.max_zoom {
            return false;
        }
        match &self.options.bounds {
            Some(bounds) => bounds.intersects(&coords.bounds()),
            None => true,
        }
    }

    /// Create the element for a tile. Its source is resolved now if the
    /// archive is open, or deferred until it opens; `done` is called once
    /// the element has loaded or failed.
    pub fn create_tile<F>(&mut self, coords: TileCoord, done: F) -> TileElement
    where
        F: FnOnce(Option<&MapError>, &TileElement) + Send + Sync + 'static,
    {
        let element = TileElement::new(coords, self.options.cross_origin);
        let done: TileDone = Box::new(done);

        if let Some(previous) = self.tiles.insert(coords, TileState::new(element.clone())) {
            self.release(&coords, previous);
        }

        match self.state {
            ArchiveState::Loaded => self.resolve_tile(element.clone(), done),
            ArchiveState::Failed => {
                let failure = match &self.load_error {
                    Some(error) => MapError::Load(error.clone()),
                    None => MapError::Layer("archive failed to load".to_string()),
                };
                self.tile_failed(element.clone(), done, failure);
            }
            ArchiveState::Idle | ArchiveState::Loading => {
                log::debug!("deferring tile {} until the archive loads", coords);
                self.pending.push_back(PendingTile {
                    element: element.clone(),
                    done,
                });
            }
        }

        element
    }

    fn resolve_tile(&mut self, element: TileElement, done: TileDone) {
        let coords = element.coords();

        // The host may have dropped the tile while it waited.
        let current = self
            .tiles
            .get(&coords)
            .map_or(false, |state| state.element.same_element(&element));
        if !current {
            log::debug!("skipping stale tile {}", coords);
            return;
        }

        let image = match self.tile_image(coords) {
            Ok(image) => image,
            Err(e) => return self.tile_failed(element, done, e),
        };

        if let (TileImage::Object { url, .. }, Some(state)) = (&image, self.tiles.get_mut(&coords)) {
            state.url = Some(url.clone());
        }

        match element.load(&image) {
            Ok(()) => {
                done(None, &element);
                self.events.fire(TileLayerEvent::TileLoad {
                    coords,
                    url: image.url().to_string(),
                });
            }
            Err(e) => self.tile_failed(element, done, e),
        }
    }

    fn tile_failed(&mut self, element: TileElement, done: TileDone, error: MapError) {
        let coords = element.coords();
        log::warn!("tile {} failed: {}", coords, error);
        element.mark_error(&error);
        done(Some(&error), &element);
        self.events.fire(TileLayerEvent::TileError {
            coords,
            error: Arc::new(error),
        });
    }

    /// Look a tile up and turn its payload into an image resource.
    ///
    /// `coords` use the host's top-origin rows; the archive is queried with
    /// `max_y - y`, taking `max_y` from the tile's own zoom. Missing rows,
    /// empty payloads, rows past the grid and lookups before any grid is
    /// known all give the empty placeholder.
    pub fn tile_image(&mut self, coords: TileCoord) -> Result<TileImage> {
        let Some(db) = self.database.as_ref() else {
            return Err(MapError::Layer("archive is not loaded".to_string()));
        };
        let Some(grid) = self.global_tile_range else {
            return Ok(TileImage::Empty);
        };
        let range = if grid.zoom == coords.z {
            grid
        } else {
            log::debug!(
                "tile {} resolved while the grid is at zoom {}",
                coords,
                grid.zoom
            );
            TileRange::global(coords.z, self.options.tile_size)
        };
        let Some(tms_y) = range.flip_y(coords.y) else {
            log::debug!("tile {} is outside the grid at zoom {}", coords, range.zoom);
            return Ok(TileImage::Empty);
        };

        match db.tile_data(coords.z, coords.x, tms_y)? {
            Some(data) if !data.is_empty() => {
                let mime = self.format.mime_type();
                let url = self.urls.create(&data, mime)?;
                Ok(TileImage::Object {
                    url,
                    mime,
                    data: data.into(),
                })
            }
            _ => Ok(TileImage::Empty),
        }
    }

    /// URL form of [`MbTilesLayer::tile_image`]. Object URLs obtained this
    /// way are not tied to a tile; release them with
    /// [`MbTilesLayer::revoke_url`].
    pub fn get_tile_url(&mut self, coords: TileCoord) -> Result<String> {
        self.tile_image(coords).map(|image| image.url().to_string())
    }

    pub fn revoke_url(&mut self, url: &str) -> bool {
        self.urls.revoke(url)
    }

    /// The host no longer shows this tile: forget it and revoke its URL.
    pub fn unload_tile(&mut self, coords: &TileCoord) -> bool {
        match self.tiles.remove(coords) {
            Some(state) => {
                self.release(coords, state);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, coords: &TileCoord, state: TileState) {
        self.pending
            .retain(|pending| !pending.element.same_element(&state.element));
        if let Some(url) = &state.url {
            self.urls.revoke(url);
        }
        self.events.fire(TileLayerEvent::TileUnload {
            coords: *coords,
            url: state.url,
        });
    }

    /// Unload every tile and revoke every outstanding URL.
    pub fn clear_tiles(&mut self) {
        let coords: Vec<_> = self.tiles.keys().copied().collect();
        for coord in coords {
            self.unload_tile(&coord);
        }
        self.pending.clear();
        let leftover = self.urls.revoke_all();
        if leftover > 0 {
            log::debug!("revoked {} untracked object URLs", leftover);
        }
    }
}

impl Drop for MbTilesLayer {
    fn drop(&mut self) {
        if let Some(handle) = self.load_handle.take() {
            if !handle.is_finished() {
                handle.cancel();
            }
        }
    }
}

impl std::fmt::Debug for MbTilesLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbTilesLayer")
            .field("id", &self.properties.id)
            .field("source", &self.source.describe())
            .field("state", &self.state)
            .field("format", &self.format)
            .field("tiles", &self.tiles.len())
            .field("pending", &self.pending.len())
            .field("live_urls", &self.urls.len())
            .finish()
    }
}
