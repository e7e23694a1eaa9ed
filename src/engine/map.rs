//! The root render context.

use super::color::Color;
use super::error::{Error, Result};
use super::geometry::BBox;
use super::layer::Layer;
use super::projection::{self, DEFAULT_SRS, ProjTransform};
use super::style::Style;
use std::collections::BTreeMap;
use std::path::Path;

/// Smallest accepted canvas side in pixels.
pub const MIN_MAPSIZE: u32 = 16;
/// Largest accepted canvas side in pixels.
pub const MAX_MAPSIZE: u32 = MIN_MAPSIZE << 10;

/// Standardized rendering pixel size (0.28mm) in meters.
const PIXEL_SIZE_METERS: f64 = 0.00028;
/// Meters per degree at the equator of the WGS84 ellipsoid.
const METERS_PER_DEGREE: f64 = 6_378_137.0 * 2.0 * std::f64::consts::PI / 360.0;

/// What to do when the extent's aspect ratio differs from the canvas'.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectFixMode {
    /// Grow the extent's width or height to fill the canvas.
    #[default]
    GrowBBox = 0,
    /// Grow the canvas to fit the extent.
    GrowCanvas = 1,
    /// Shrink the extent's width or height to fit the canvas.
    ShrinkBBox = 2,
    /// Shrink the canvas to fit the extent.
    ShrinkCanvas = 3,
    AdjustBBoxWidth = 4,
    AdjustBBoxHeight = 5,
    AdjustCanvasWidth = 6,
    AdjustCanvasHeight = 7,
    /// Leave extent and canvas alone.
    Respect = 8,
}

impl TryFrom<i32> for AspectFixMode {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        use AspectFixMode::*;
        Ok(match value {
            0 => GrowBBox,
            1 => GrowCanvas,
            2 => ShrinkBBox,
            3 => ShrinkCanvas,
            4 => AdjustBBoxWidth,
            5 => AdjustBBoxHeight,
            6 => AdjustCanvasWidth,
            7 => AdjustCanvasHeight,
            8 => Respect,
            other => return Err(Error::InvalidAspectFixMode(other)),
        })
    }
}

/// Dimensions, projection, extent, styles and layers of a map.
#[derive(Debug, Clone)]
pub struct Map {
    width: u32,
    height: u32,
    srs: String,
    background: Option<Color>,
    buffer_size: i32,
    aspect_fix_mode: AspectFixMode,
    current_extent: BBox,
    maximum_extent: Option<BBox>,
    layers: Vec<Layer>,
    styles: BTreeMap<String, Style>,
}

fn check_size(width: u32, height: u32) -> Result<()> {
    let range = MIN_MAPSIZE..=MAX_MAPSIZE;
    if range.contains(&width) && range.contains(&height) {
        Ok(())
    } else {
        Err(Error::InvalidSize {
            width,
            height,
            min: MIN_MAPSIZE,
            max: MAX_MAPSIZE,
        })
    }
}

impl Map {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_size(width, height)?;
        Ok(Self {
            width,
            height,
            srs: DEFAULT_SRS.to_string(),
            background: None,
            buffer_size: 0,
            aspect_fix_mode: AspectFixMode::default(),
            current_extent: BBox::default(),
            maximum_extent: None,
            layers: Vec::new(),
            styles: BTreeMap::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Change the canvas size, then re-apply the aspect fix.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        check_size(width, height)?;
        self.width = width;
        self.height = height;
        self.fix_aspect_ratio();
        Ok(())
    }

    pub fn srs(&self) -> &str {
        &self.srs
    }

    pub fn set_srs(&mut self, srs: &str) -> Result<()> {
        if srs.trim().is_empty() {
            return Err(Error::InvalidSrs("empty projection string".to_string()));
        }
        self.srs = srs.to_string();
        Ok(())
    }

    pub fn aspect_fix_mode(&self) -> AspectFixMode {
        self.aspect_fix_mode
    }

    pub fn set_aspect_fix_mode(&mut self, mode: AspectFixMode) {
        self.aspect_fix_mode = mode;
    }

    pub fn buffer_size(&self) -> i32 {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, size: i32) {
        self.buffer_size = size;
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
    }

    pub fn current_extent(&self) -> BBox {
        self.current_extent
    }

    pub fn maximum_extent(&self) -> Option<BBox> {
        self.maximum_extent
    }

    pub fn set_maximum_extent(&mut self, extent: BBox) {
        self.maximum_extent = Some(extent);
    }

    pub fn reset_maximum_extent(&mut self) {
        self.maximum_extent = None;
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    pub fn styles(&self) -> &BTreeMap<String, Style> {
        &self.styles
    }

    /// Insert a style, replacing one with the same name.
    pub fn insert_style(&mut self, name: impl Into<String>, style: Style) {
        self.styles.insert(name.into(), style);
    }

    /// Load a stylesheet file. Relative datasource paths resolve against
    /// the stylesheet's directory. On error the map is left unchanged.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        super::xml::load_map(self, path)
    }

    /// Load a stylesheet from memory, resolving relative paths against `base_path`.
    pub fn load_string(&mut self, xml: &str, base_path: &str) -> Result<()> {
        super::xml::load_map_string(self, xml, base_path)
    }

    /// Set the extent, then apply the aspect fix.
    pub fn zoom_to_box(&mut self, bbox: BBox) {
        self.current_extent = bbox;
        self.fix_aspect_ratio();
    }

    /// Zoom to the union of all active layers' extents.
    pub fn zoom_all(&mut self) -> Result<()> {
        if self.layers.is_empty() {
            return Ok(());
        }
        let mut extent: Option<BBox> = None;
        for layer in self.layers.iter().filter(|l| l.active) {
            let Some(env) = layer.envelope() else {
                continue;
            };
            let env = match ProjTransform::new(&layer.srs, &self.srs) {
                Ok(t) => t.bbox(&env),
                Err(e) => {
                    log::warn!("zoom_all: skipping layer '{}': {e}", layer.name);
                    continue;
                }
            };
            match extent.as_mut() {
                Some(ext) => ext.expand_to_include(&env),
                None => extent = Some(env),
            }
        }
        // A single point or an axis-aligned line cannot be scaled to the canvas.
        let extent = extent.filter(|ext| {
            if !ext.is_valid() {
                log::debug!("zoom_all: combined layer extent {ext:?} has no area");
            }
            ext.is_valid()
        });
        match (extent, self.maximum_extent) {
            (Some(mut ext), max) => {
                if let Some(max) = max {
                    ext.clip(&max);
                }
                self.zoom_to_box(ext);
                Ok(())
            }
            (None, Some(max)) => {
                self.zoom_to_box(max);
                Ok(())
            }
            (None, None) => Err(Error::ZoomAll(format!(
                "no active layer has an extent that can be projected into the map srs ({})",
                self.srs
            ))),
        }
    }

    /// Map units per pixel.
    pub fn scale(&self) -> f64 {
        if self.width > 0 {
            self.current_extent.width() / self.width as f64
        } else {
            self.current_extent.width()
        }
    }

    pub fn scale_denominator(&self) -> f64 {
        scale_denominator(self.scale(), projection::is_geographic(&self.srs))
    }

    /// Current extent grown by the buffer size.
    pub fn buffered_extent(&self) -> BBox {
        self.current_extent
            .pad(self.scale() * self.buffer_size as f64)
    }

    fn fix_aspect_ratio(&mut self) {
        let ext = &mut self.current_extent;
        if !(ext.width() > 0.0 && ext.height() > 0.0) {
            return;
        }
        let ratio1 = self.width as f64 / self.height as f64;
        let ratio2 = ext.width() / ext.height();
        if ratio1 == ratio2 {
            return;
        }
        let canvas = |v: f64| (v + 0.5).clamp(MIN_MAPSIZE as f64, MAX_MAPSIZE as f64) as u32;
        match self.aspect_fix_mode {
            AspectFixMode::AdjustBBoxHeight => ext.set_height(ext.width() / ratio1),
            AspectFixMode::AdjustBBoxWidth => ext.set_width(ext.height() * ratio1),
            AspectFixMode::AdjustCanvasHeight => self.height = canvas(self.width as f64 / ratio2),
            AspectFixMode::AdjustCanvasWidth => self.width = canvas(self.height as f64 * ratio2),
            AspectFixMode::GrowBBox => {
                if ratio2 > ratio1 {
                    ext.set_height(ext.width() / ratio1);
                } else {
                    ext.set_width(ext.height() * ratio1);
                }
            }
            AspectFixMode::ShrinkBBox => {
                if ratio2 < ratio1 {
                    ext.set_height(ext.width() / ratio1);
                } else {
                    ext.set_width(ext.height() * ratio1);
                }
            }
            AspectFixMode::GrowCanvas => {
                if ratio2 > ratio1 {
                    self.width = canvas(self.height as f64 * ratio2);
                } else {
                    self.height = canvas(self.width as f64 / ratio2);
                }
            }
            AspectFixMode::ShrinkCanvas => {
                if ratio2 > ratio1 {
                    self.height = canvas(self.width as f64 / ratio2);
                } else {
                    self.width = canvas(self.height as f64 * ratio2);
                }
            }
            AspectFixMode::Respect => {}
        }
    }
}

/// Scale denominator for `scale` map units per pixel.
pub fn scale_denominator(scale: f64, geographic: bool) -> f64 {
    let meters_per_unit = if geographic { METERS_PER_DEGREE } else { 1.0 };
    scale * meters_per_unit / PIXEL_SIZE_METERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::params::Parameters;
    use crate::engine::datasource;

    fn layer_with_extent(name: &str, extent: &str) -> Layer {
        let params: Parameters = [
            ("type", "geojson"),
            ("inline", r#"{"type":"FeatureCollection","features":[]}"#),
            ("extent", extent),
        ]
        .into_iter()
        .collect();
        let mut layer = Layer::new(name, DEFAULT_SRS);
        layer.set_datasource(Some(datasource::create(&params).unwrap()));
        layer
    }

    #[test]
    fn test_size_bounds() {
        assert!(Map::new(0, 600).is_err());
        assert!(Map::new(800, MAX_MAPSIZE + 1).is_err());
        let mut map = Map::new(800, 600).unwrap();
        assert!(map.resize(0, 10).is_err());
        assert_eq!((map.width(), map.height()), (800, 600));
        map.resize(400, 300).unwrap();
        assert_eq!((map.width(), map.height()), (400, 300));
    }

    #[test]
    fn test_defaults() {
        let map = Map::new(800, 600).unwrap();
        assert_eq!(map.srs(), DEFAULT_SRS);
        assert_eq!(map.aspect_fix_mode(), AspectFixMode::GrowBBox);
        assert_eq!(map.background(), None);
        assert!(!map.current_extent().is_valid());
    }

    #[test]
    fn test_aspect_mode_conversion() {
        assert_eq!(AspectFixMode::try_from(8).unwrap(), AspectFixMode::Respect);
        assert!(AspectFixMode::try_from(9).is_err());
        assert!(AspectFixMode::try_from(-1).is_err());
    }

    #[test]
    fn test_grow_bbox() {
        let mut map = Map::new(200, 100).unwrap();
        map.zoom_to_box(BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(map.current_extent(), BBox::new(-5.0, 0.0, 15.0, 10.0));
    }

    #[test]
    fn test_shrink_bbox() {
        let mut map = Map::new(200, 100).unwrap();
        map.set_aspect_fix_mode(AspectFixMode::ShrinkBBox);
        map.zoom_to_box(BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(map.current_extent(), BBox::new(0.0, 2.5, 10.0, 7.5));
    }

    #[test]
    fn test_grow_canvas_and_respect() {
        let mut map = Map::new(200, 100).unwrap();
        map.set_aspect_fix_mode(AspectFixMode::GrowCanvas);
        map.zoom_to_box(BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!((map.width(), map.height()), (200, 200));

        let mut map = Map::new(200, 100).unwrap();
        map.set_aspect_fix_mode(AspectFixMode::Respect);
        map.zoom_to_box(BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(map.current_extent(), BBox::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!((map.width(), map.height()), (200, 100));
    }

    #[test]
    fn test_zoom_all_unions_active_layers() {
        let mut map = Map::new(100, 100).unwrap();
        assert!(map.zoom_all().is_ok());
        map.add_layer(layer_with_extent("a", "0,0,10,10"));
        map.add_layer(layer_with_extent("b", "20,20,30,30"));
        let mut hidden = layer_with_extent("c", "-100,-100,-90,-90");
        hidden.active = false;
        map.add_layer(hidden);
        map.zoom_all().unwrap();
        assert_eq!(map.current_extent(), BBox::new(0.0, 0.0, 30.0, 30.0));
    }

    #[test]
    fn test_zoom_all_respects_maximum_extent() {
        let mut map = Map::new(100, 100).unwrap();
        map.add_layer(layer_with_extent("a", "0,0,100,100"));
        map.set_maximum_extent(BBox::new(0.0, 0.0, 50.0, 50.0));
        map.zoom_all().unwrap();
        assert_eq!(map.current_extent(), BBox::new(0.0, 0.0, 50.0, 50.0));

        let mut map = Map::new(100, 100).unwrap();
        map.add_layer(Layer::new("empty", DEFAULT_SRS));
        assert!(matches!(map.zoom_all(), Err(Error::ZoomAll(_))));
        map.set_maximum_extent(BBox::new(1.0, 1.0, 2.0, 2.0));
        map.zoom_all().unwrap();
        assert_eq!(map.current_extent(), BBox::new(1.0, 1.0, 2.0, 2.0));
    }

    #[test]
    fn test_zoom_all_point_extent() {
        let mut map = Map::new(100, 100).unwrap();
        map.zoom_to_box(BBox::new(0.0, 0.0, 4.0, 4.0));
        map.add_layer(layer_with_extent("pt", "3,3,3,3"));
        assert!(matches!(map.zoom_all(), Err(Error::ZoomAll(_))));
        assert_eq!(map.current_extent(), BBox::new(0.0, 0.0, 4.0, 4.0));

        map.set_maximum_extent(BBox::new(-10.0, -10.0, 10.0, 10.0));
        map.zoom_all().unwrap();
        assert_eq!(map.current_extent(), BBox::new(-10.0, -10.0, 10.0, 10.0));
    }

    #[test]
    fn test_scale_denominator() {
        let mut map = Map::new(256, 256).unwrap();
        map.set_srs("+init=epsg:3857").unwrap();
        let half = 20_037_508.342_789_244;
        map.zoom_to_box(BBox::new(-half, -half, half, half));
        // Zoom level 0 of the web mercator tile pyramid.
        assert!((map.scale_denominator() - 559_082_264.028_717_8).abs() < 1e-3);
        assert!(map.set_srs("  ").is_err());
    }
}
