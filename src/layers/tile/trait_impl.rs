//! LayerTrait implementation for MbTilesLayer

use super::{MbTilesLayer, TileLayerOptions};
use crate::{core::geo::LatLngBounds, layers::base::LayerTrait, Result};

impl LayerTrait for MbTilesLayer {
    crate::impl_layer_trait!(MbTilesLayer, properties);

    fn bounds(&self) -> Option<LatLngBounds> {
        self.options.bounds.clone()
    }

    fn on_add(&mut self) -> Result<()> {
        if self.archive_state() == super::ArchiveState::Idle {
            self.spawn_load();
        }
        Ok(())
    }

    fn on_remove(&mut self) -> Result<()> {
        self.clear_tiles();
        Ok(())
    }

    fn update(&mut self, _delta_time: f64) -> Result<()> {
        self.process_archive_result();
        Ok(())
    }

    fn options(&self) -> serde_json::Value {
        serde_json::to_value(&self.options).unwrap_or(serde_json::Value::Null)
    }

    fn set_options(&mut self, options: serde_json::Value) -> Result<()> {
        let tile_options = serde_json::from_value::<TileLayerOptions>(options)?;
        self.set_tile_options(tile_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::base::LayerType;

    fn layer() -> MbTilesLayer {
        MbTilesLayer::new("mb", vec![0u8; 4], TileLayerOptions::default()).unwrap()
    }

    #[test]
    fn test_layer_trait_boilerplate() {
        let mut layer = layer();
        assert_eq!(layer.id(), "mb");
        assert_eq!(layer.layer_type(), LayerType::Tile);
        assert_eq!(layer.z_index(), 1);

        layer.set_opacity(1.5);
        assert_eq!(layer.opacity(), 1.0);
        layer.set_visible(false);
        assert!(!layer.is_visible());
        assert!(layer.as_any().downcast_ref::<MbTilesLayer>().is_some());
    }

    #[test]
    fn test_options_json() {
        let mut layer = layer();
        let mut json = layer.options();
        assert_eq!(json["tile_size"], 256);

        json["max_zoom"] = serde_json::json!(15);
        json["attribution"] = serde_json::json!("New OneMap");
        layer.set_options(json).unwrap();
        assert_eq!(layer.tile_options().max_zoom, 15);
        assert_eq!(layer.attribution(), Some("New OneMap"));

        assert!(layer
            .set_options(serde_json::json!({"min_zoom": 20, "max_zoom": 3}))
            .is_err());
        assert!(layer.set_options(serde_json::json!("nonsense")).is_err());
    }

    #[test]
    fn test_bounds_from_options() {
        let options = TileLayerOptions {
            bounds: Some(LatLngBounds::from_coords(1.0, 103.0, 2.0, 104.0)),
            ..Default::default()
        };
        let layer = MbTilesLayer::new("mb", vec![0u8; 4], options).unwrap();
        assert!(layer.intersects_bounds(&LatLngBounds::from_coords(1.5, 103.5, 3.0, 105.0)));
        assert!(!layer.intersects_bounds(&LatLngBounds::from_coords(10.0, 10.0, 11.0, 11.0)));
    }
}
