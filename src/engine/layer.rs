//! Map layers.

use super::datasource::Datasource;
use super::geometry::BBox;
use super::projection::DEFAULT_SRS;
use std::sync::Arc;

/// A named, projected layer drawing one datasource with a list of styles.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub srs: String,
    pub styles: Vec<String>,
    pub datasource: Option<Arc<dyn Datasource>>,
    pub active: bool,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Layer {
    /// Create an active layer. An empty `srs` selects the default geographic SRS.
    pub fn new(name: impl Into<String>, srs: impl Into<String>) -> Self {
        let srs = srs.into();
        Self {
            name: name.into(),
            srs: if srs.trim().is_empty() {
                DEFAULT_SRS.to_string()
            } else {
                srs
            },
            styles: Vec::new(),
            datasource: None,
            active: true,
            min_scale: 0.0,
            max_scale: f64::INFINITY,
        }
    }

    pub fn add_style(&mut self, name: impl Into<String>) {
        self.styles.push(name.into());
    }

    /// Attach a datasource, replacing any previous one.
    pub fn set_datasource(&mut self, datasource: Option<Arc<dyn Datasource>>) {
        self.datasource = datasource;
    }

    /// Datasource extent in the layer's SRS.
    pub fn envelope(&self) -> Option<BBox> {
        self.datasource
            .as_ref()
            .map(|ds| ds.envelope())
            .filter(BBox::is_normalized)
    }

    /// Whether the layer draws at the given scale denominator.
    pub fn visible(&self, scale_denominator: f64) -> bool {
        self.active
            && scale_denominator >= self.min_scale - 1e-6
            && scale_denominator < self.max_scale + 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let layer = Layer::new("roads", "");
        assert_eq!(layer.srs, DEFAULT_SRS);
        assert!(layer.active);
        assert!(layer.envelope().is_none());
        assert!(layer.visible(1e9));
    }

    #[test]
    fn test_scale_visibility() {
        let mut layer = Layer::new("roads", "+init=epsg:3857");
        layer.max_scale = 50_000.0;
        assert!(layer.visible(10_000.0));
        assert!(!layer.visible(100_000.0));
        layer.active = false;
        assert!(!layer.visible(10_000.0));
    }
}
