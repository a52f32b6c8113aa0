//! Events fired by the MBTiles layer and the listener registry behind `on`.

use std::{collections::VecDeque, str::FromStr, sync::Arc};

use crate::{
    archive::metadata::MbTilesMetadata, core::geo::TileCoord, prelude::HashMap, MapError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEventKind {
    DatabaseLoaded,
    DatabaseError,
    TileLoad,
    TileError,
    TileUnload,
}

impl TileEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileEventKind::DatabaseLoaded => "databaseloaded",
            TileEventKind::DatabaseError => "databaseerror",
            TileEventKind::TileLoad => "tileload",
            TileEventKind::TileError => "tileerror",
            TileEventKind::TileUnload => "tileunload",
        }
    }
}

impl std::fmt::Display for TileEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TileEventKind {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "databaseloaded" => Ok(TileEventKind::DatabaseLoaded),
            "databaseerror" => Ok(TileEventKind::DatabaseError),
            "tileload" => Ok(TileEventKind::TileLoad),
            "tileerror" => Ok(TileEventKind::TileError),
            "tileunload" => Ok(TileEventKind::TileUnload),
            other => Err(MapError::ParseError(format!("unknown tile layer event {:?}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TileLayerEvent {
    /// The archive was opened, its metadata applied, and it is ready for
    /// queries.
    DatabaseLoaded { metadata: MbTilesMetadata },
    /// The archive could not be fetched or opened.
    DatabaseError { error: Arc<MapError> },
    TileLoad { coords: TileCoord, url: String },
    TileError { coords: TileCoord, error: Arc<MapError> },
    /// A tile was dropped by the host; `url` was revoked if present.
    TileUnload { coords: TileCoord, url: Option<String> },
}

impl TileLayerEvent {
    pub fn kind(&self) -> TileEventKind {
        match self {
            TileLayerEvent::DatabaseLoaded { .. } => TileEventKind::DatabaseLoaded,
            TileLayerEvent::DatabaseError { .. } => TileEventKind::DatabaseError,
            TileLayerEvent::TileLoad { .. } => TileEventKind::TileLoad,
            TileLayerEvent::TileError { .. } => TileEventKind::TileError,
            TileLayerEvent::TileUnload { .. } => TileEventKind::TileUnload,
        }
    }
}

/// Event listener callback type
pub type EventCallback = Box<dyn Fn(&TileLayerEvent) + Send + Sync>;

/// Listener registry with a dispatch queue
#[derive(Default)]
pub struct EventManager {
    /// Event listeners by event type
    listeners: HashMap<TileEventKind, Vec<EventCallback>>,
    /// Event queue for processing
    event_queue: VecDeque<TileLayerEvent>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event listener
    pub fn on<F>(&mut self, kind: TileEventKind, callback: F)
    where
        F: Fn(&TileLayerEvent) + Send + Sync + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(callback));
    }

    /// Drop every listener of `kind`
    pub fn off(&mut self, kind: TileEventKind) {
        self.listeners.remove(&kind);
    }

    /// Emit an event to the queue
    pub fn emit(&mut self, event: TileLayerEvent) {
        self.event_queue.push_back(event);
    }

    /// Process all queued events
    pub fn process_events(&mut self) -> Vec<TileLayerEvent> {
        let events: Vec<_> = self.event_queue.drain(..).collect();

        for event in &events {
            if let Some(callbacks) = self.listeners.get(&event.kind()) {
                for callback in callbacks {
                    callback(event);
                }
            }
        }

        events
    }

    /// Emit and immediately dispatch
    pub fn fire(&mut self, event: TileLayerEvent) {
        self.emit(event);
        self.process_events();
    }

    pub fn has_listeners(&self, kind: TileEventKind) -> bool {
        self.listeners.get(&kind).map_or(false, |l| !l.is_empty())
    }

    /// Get number of pending events
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            TileEventKind::DatabaseLoaded,
            TileEventKind::DatabaseError,
            TileEventKind::TileLoad,
            TileEventKind::TileError,
            TileEventKind::TileUnload,
        ] {
            assert_eq!(kind.as_str().parse::<TileEventKind>().unwrap(), kind);
        }
        assert!("load".parse::<TileEventKind>().is_err());
    }

    #[test]
    fn test_dispatch_by_kind() {
        let loaded = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let mut manager = EventManager::new();

        let l = loaded.clone();
        manager.on(TileEventKind::DatabaseLoaded, move |_| {
            l.fetch_add(1, Ordering::SeqCst);
        });
        let e = errors.clone();
        manager.on(TileEventKind::DatabaseError, move |event| {
            assert!(matches!(event, TileLayerEvent::DatabaseError { .. }));
            e.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(TileLayerEvent::DatabaseLoaded {
            metadata: MbTilesMetadata::default(),
        });
        assert_eq!(manager.pending_events(), 1);
        assert_eq!(loaded.load(Ordering::SeqCst), 0);

        let processed = manager.process_events();
        assert_eq!(processed.len(), 1);
        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);

        manager.fire(TileLayerEvent::DatabaseError {
            error: Arc::new(MapError::Archive("boom".into())),
        });
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_events(), 0);
    }

    #[test]
    fn test_off() {
        let mut manager = EventManager::new();
        manager.on(TileEventKind::TileLoad, |_| panic!("listener was removed"));
        assert!(manager.has_listeners(TileEventKind::TileLoad));
        manager.off(TileEventKind::TileLoad);
        assert!(!manager.has_listeners(TileEventKind::TileLoad));
        manager.fire(TileLayerEvent::TileLoad {
            coords: TileCoord::new(0, 0, 0),
            url: "blob:maplet/1".into(),
        });
    }
}
