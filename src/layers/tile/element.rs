use std::{
    io::Cursor,
    sync::{Arc, Mutex, MutexGuard},
};

use super::resources::TileImage;
use crate::{core::geo::TileCoord, MapError, Result};

/// Load progress of a tile element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileLoadState {
    /// Created, waiting for its source (possibly until the archive opens).
    Pending,
    Loaded { width: u32, height: u32 },
    Error(String),
}

#[derive(Debug)]
struct ElementInner {
    coords: TileCoord,
    src: Option<String>,
    cross_origin: Option<String>,
    state: TileLoadState,
}

/// The image element handed to the host for one tile.
///
/// Cloning yields another handle to the same element, so the host can keep
/// one while the layer fills in the source later.
#[derive(Debug, Clone)]
pub struct TileElement {
    inner: Arc<Mutex<ElementInner>>,
}

impl TileElement {
    pub(crate) fn new(coords: TileCoord, cross_origin: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ElementInner {
                coords,
                src: None,
                cross_origin: cross_origin.then(String::new),
                state: TileLoadState::Pending,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElementInner> {
        // The inner state is plain data; a panic mid-update cannot leave it
        // half written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn coords(&self) -> TileCoord {
        self.lock().coords
    }

    pub fn src(&self) -> Option<String> {
        self.lock().src.clone()
    }

    /// Always empty so screen readers skip the tile.
    pub fn alt(&self) -> &'static str {
        ""
    }

    /// Always `presentation`: tiles are decoration for assistive technology.
    pub fn role(&self) -> &'static str {
        "presentation"
    }

    pub fn cross_origin(&self) -> Option<String> {
        self.lock().cross_origin.clone()
    }

    pub fn state(&self) -> TileLoadState {
        self.lock().state.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TileLoadState::Pending
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state(), TileLoadState::Loaded { .. })
    }

    /// Whether both handles point at the same element.
    pub fn same_element(&self, other: &TileElement) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Points the element at `image` and runs its load step: the placeholder
    /// loads as a 1×1 image, object payloads must decode as an image.
    pub(crate) fn load(&self, image: &TileImage) -> Result<()> {
        self.lock().src = Some(image.url().to_string());

        let dimensions = match image {
            TileImage::Empty => Ok((1, 1)),
            TileImage::Object { data, .. } => image_dimensions(data),
        };

        match dimensions {
            Ok((width, height)) => {
                self.lock().state = TileLoadState::Loaded { width, height };
                Ok(())
            }
            Err(e) => {
                self.mark_error(&e);
                Err(e)
            }
        }
    }

    pub(crate) fn mark_error(&self, error: &MapError) {
        self.lock().state = TileLoadState::Error(error.to_string());
    }
}

fn image_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let reader = image::io::Reader::new(Cursor::new(data)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(MapError::Image(image::ImageError::Unsupported(
            image::error::ImageFormatHint::Unknown.into(),
        )));
    }
    Ok(reader.into_dimensions()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_new_element() {
        let element = TileElement::new(TileCoord::new(1, 2, 3), true);
        assert_eq!(element.coords(), TileCoord::new(1, 2, 3));
        assert_eq!(element.alt(), "");
        assert_eq!(element.role(), "presentation");
        assert_eq!(element.cross_origin().as_deref(), Some(""));
        assert!(element.is_pending());
        assert!(element.src().is_none());

        let plain = TileElement::new(TileCoord::new(0, 0, 0), false);
        assert!(plain.cross_origin().is_none());
    }

    #[test]
    fn test_load_placeholder() {
        let element = TileElement::new(TileCoord::new(0, 0, 0), false);
        element.load(&TileImage::Empty).unwrap();
        assert_eq!(element.state(), TileLoadState::Loaded { width: 1, height: 1 });
        assert_eq!(element.src().as_deref(), Some(super::super::resources::EMPTY_IMAGE_URL));
    }

    #[test]
    fn test_load_png() {
        let element = TileElement::new(TileCoord::new(0, 0, 0), false);
        let image = TileImage::Object {
            url: "blob:maplet/1".into(),
            mime: "image/png",
            data: png_bytes().into(),
        };
        element.load(&image).unwrap();
        assert_eq!(element.state(), TileLoadState::Loaded { width: 4, height: 2 });
    }

    #[test]
    fn test_load_garbage_fails() {
        let element = TileElement::new(TileCoord::new(0, 0, 0), false);
        let clone = element.clone();
        let image = TileImage::Object {
            url: "blob:maplet/2".into(),
            mime: "image/png",
            data: vec![0xDE, 0xAD, 0xBE, 0xEF].into(),
        };

        assert!(element.load(&image).is_err());
        assert!(matches!(clone.state(), TileLoadState::Error(_)));
        assert_eq!(clone.src().as_deref(), Some("blob:maplet/2"));
        assert!(clone.same_element(&element));
    }
}
