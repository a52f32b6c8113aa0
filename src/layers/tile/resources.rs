//! Object URLs for tile payloads
//!
//! Every non-empty tile becomes an object URL the host can point an image at.
//! The registry remembers which URLs are still live so they can be revoked
//! when their tile is unloaded, and revokes whatever is left when it drops.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use crate::{
    constants::OBJECT_URL_PREFIX,
    prelude::{HashMap, HashSet},
    MapError, Result,
};

/// Transparent 1×1 GIF shown for tiles the archive does not have.
pub const EMPTY_IMAGE_URL: &str = "data:image/gif;base64,R0lGODlhAQABAAD/ACwAAAAAAQABAAACADs=";

/// The image resource a tile resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum TileImage {
    /// No payload: the shared transparent placeholder. Nothing to revoke.
    Empty,
    Object {
        url: String,
        mime: &'static str,
        data: Arc<[u8]>,
    },
}

impl TileImage {
    pub fn url(&self) -> &str {
        match self {
            TileImage::Empty => EMPTY_IMAGE_URL,
            TileImage::Object { url, .. } => url,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TileImage::Empty)
    }
}

/// Mints and revokes object URLs for binary blobs.
pub trait ObjectUrlFactory: Send + Sync {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<String>;

    fn revoke_object_url(&self, url: &str);
}

/// Keeps blobs in process memory under `blob:maplet/<n>` URLs.
#[derive(Debug, Default)]
pub struct MemoryUrlFactory {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, (String, Arc<[u8]>)>>,
}

impl MemoryUrlFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// MIME type and bytes behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<(String, Arc<[u8]>)> {
        self.blobs.lock().ok()?.get(url).cloned()
    }

    /// Number of URLs that have not been revoked.
    pub fn live_count(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }
}

impl ObjectUrlFactory for MemoryUrlFactory {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("{}{}", OBJECT_URL_PREFIX, id);
        self.blobs
            .lock()
            .map_err(|_| MapError::Layer("object URL store poisoned".to_string()))?
            .insert(url.clone(), (mime.to_string(), Arc::from(data)));
        Ok(url)
    }

    fn revoke_object_url(&self, url: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(url);
        }
    }
}

/// `URL.createObjectURL` / `URL.revokeObjectURL` in the browser.
#[cfg(feature = "wasm")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserUrlFactory;

#[cfg(feature = "wasm")]
impl ObjectUrlFactory for BrowserUrlFactory {
    fn create_object_url(&self, data: &[u8], mime: &str) -> Result<String> {
        let parts = js_sys::Array::new();
        parts.push(&js_sys::Uint8Array::from(data));

        let options = web_sys::BlobPropertyBag::new();
        options.set_type(mime);

        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
            .map_err(|e| MapError::Layer(format!("could not create blob: {:?}", e)))?;
        web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|e| MapError::Layer(format!("could not create object URL: {:?}", e)))
    }

    fn revoke_object_url(&self, url: &str) {
        if let Err(e) = web_sys::Url::revoke_object_url(url) {
            log::warn!("could not revoke {}: {:?}", url, e);
        }
    }
}

/// Tracks the URLs a layer has handed out.
pub struct ObjectUrlRegistry {
    factory: Arc<dyn ObjectUrlFactory>,
    live: HashSet<String>,
}

impl ObjectUrlRegistry {
    pub fn new(factory: Arc<dyn ObjectUrlFactory>) -> Self {
        Self {
            factory,
            live: HashSet::default(),
        }
    }

    pub fn factory(&self) -> &Arc<dyn ObjectUrlFactory> {
        &self.factory
    }

    pub fn create(&mut self, data: &[u8], mime: &str) -> Result<String> {
        let url = self.factory.create_object_url(data, mime)?;
        self.live.insert(url.clone());
        Ok(url)
    }

    /// Revokes `url`. Returns false if it was not live (already revoked or
    /// never handed out by this registry).
    pub fn revoke(&mut self, url: &str) -> bool {
        if self.live.remove(url) {
            self.factory.revoke_object_url(url);
            true
        } else {
            false
        }
    }

    pub fn revoke_all(&mut self) -> usize {
        let count = self.live.len();
        for url in self.live.drain() {
            self.factory.revoke_object_url(&url);
        }
        count
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains(url)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new(Arc::new(MemoryUrlFactory::new()))
    }
}

impl Drop for ObjectUrlRegistry {
    fn drop(&mut self) {
        let revoked = self.revoke_all();
        if revoked > 0 {
            log::debug!("revoked {} object URLs on drop", revoked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_factory() {
        let factory = MemoryUrlFactory::new();
        let a = factory.create_object_url(&[1, 2, 3], "image/png").unwrap();
        let b = factory.create_object_url(&[4], "image/jpeg").unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with(OBJECT_URL_PREFIX));
        assert_eq!(factory.live_count(), 2);

        let (mime, data) = factory.resolve(&a).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(&*data, &[1, 2, 3]);

        factory.revoke_object_url(&a);
        assert!(factory.resolve(&a).is_none());
        assert_eq!(factory.live_count(), 1);
    }

    #[test]
    fn test_registry_revokes_once() {
        let factory = Arc::new(MemoryUrlFactory::new());
        let mut registry = ObjectUrlRegistry::new(factory.clone());

        let url = registry.create(&[9, 9], "image/png").unwrap();
        assert!(registry.is_live(&url));
        assert_eq!(factory.live_count(), 1);

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.is_empty());
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_registry_drop_revokes_everything() {
        let factory = Arc::new(MemoryUrlFactory::new());
        {
            let mut registry = ObjectUrlRegistry::new(factory.clone());
            registry.create(&[1], "image/png").unwrap();
            registry.create(&[2], "image/png").unwrap();
            assert_eq!(factory.live_count(), 2);
        }
        assert_eq!(factory.live_count(), 0);
    }

    #[test]
    fn test_tile_image_urls() {
        assert_eq!(TileImage::Empty.url(), EMPTY_IMAGE_URL);
        assert!(TileImage::Empty.is_empty());

        let image = TileImage::Object {
            url: "blob:maplet/7".to_string(),
            mime: "image/png",
            data: Arc::from(&[1u8][..]),
        };
        assert_eq!(image.url(), "blob:maplet/7");
        assert!(!image.is_empty());
    }
}
