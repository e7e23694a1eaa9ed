//! Spatial reference recognition and the transforms the renderer needs.
//!
//! Only two reference systems are understood: geographic WGS84 and
//! spherical mercator. Any SRS string compares equal to itself, so layers
//! that share the map's SRS never need to be recognized at all.

use super::error::{Error, Result};
use super::geometry::{BBox, Coord, Geometry};
use std::f64::consts::PI;

/// The default map SRS.
pub const DEFAULT_SRS: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
const ENVELOPE_POINTS: usize = 20;

/// A recognized coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Geographic,
    SphericalMercator,
}

impl Projection {
    /// Recognize a proj4 string or `epsg:` code.
    pub fn parse(srs: &str) -> Option<Self> {
        let s = srs.to_ascii_lowercase();
        if s.contains("epsg:4326") || s.contains("+proj=longlat") || s.contains("+proj=latlong")
        {
            Some(Projection::Geographic)
        } else if s.contains("epsg:3857")
            || s.contains("epsg:900913")
            || s.contains("epsg:3785")
            || s.contains("+proj=merc")
        {
            Some(Projection::SphericalMercator)
        } else {
            None
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::Geographic)
    }
}

/// Whether an SRS string denotes geographic coordinates.
pub fn is_geographic(srs: &str) -> bool {
    Projection::parse(srs).is_some_and(|p| p.is_geographic())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Identity,
    ToMercator,
    ToGeographic,
}

/// Transform between a source and a destination SRS.
#[derive(Debug, Clone, Copy)]
pub struct ProjTransform {
    direction: Direction,
}

impl ProjTransform {
    pub fn new(source: &str, dest: &str) -> Result<Self> {
        if source.trim() == dest.trim() {
            return Ok(Self {
                direction: Direction::Identity,
            });
        }
        let unsupported = || Error::UnsupportedProjection {
            from: source.to_string(),
            to: dest.to_string(),
        };
        let src = Projection::parse(source).ok_or_else(unsupported)?;
        let dst = Projection::parse(dest).ok_or_else(unsupported)?;
        let direction = match (src, dst) {
            (a, b) if a == b => Direction::Identity,
            (Projection::Geographic, Projection::SphericalMercator) => Direction::ToMercator,
            (Projection::SphericalMercator, Projection::Geographic) => Direction::ToGeographic,
            _ => return Err(unsupported()),
        };
        Ok(Self { direction })
    }

    pub fn is_identity(&self) -> bool {
        self.direction == Direction::Identity
    }

    /// The transform going the other way.
    pub fn inverse(&self) -> Self {
        let direction = match self.direction {
            Direction::Identity => Direction::Identity,
            Direction::ToMercator => Direction::ToGeographic,
            Direction::ToGeographic => Direction::ToMercator,
        };
        Self { direction }
    }

    pub fn point(&self, x: f64, y: f64) -> Coord {
        match self.direction {
            Direction::Identity => (x, y),
            Direction::ToMercator => lonlat_to_merc(x, y),
            Direction::ToGeographic => merc_to_lonlat(x, y),
        }
    }

    /// Transform an envelope by sampling along its edges.
    pub fn bbox(&self, b: &BBox) -> BBox {
        if self.is_identity() {
            return *b;
        }
        let (x0, y0) = self.point(b.minx, b.miny);
        let mut out = BBox::new(x0, y0, x0, y0);
        for i in 0..=ENVELOPE_POINTS {
            let t = i as f64 / ENVELOPE_POINTS as f64;
            let x = b.minx + t * b.width();
            let y = b.miny + t * b.height();
            for (px, py) in [(x, b.miny), (x, b.maxy), (b.minx, y), (b.maxx, y)] {
                let (tx, ty) = self.point(px, py);
                out.expand_to_include_point(tx, ty);
            }
        }
        out
    }

    pub fn geometry(&self, g: &Geometry) -> Geometry {
        if self.is_identity() {
            return g.clone();
        }
        g.map_coords(&|x, y| self.point(x, y))
    }
}

fn lonlat_to_merc(lon: f64, lat: f64) -> Coord {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn merc_to_lonlat(x: f64, y: f64) -> Coord {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Projection::parse(DEFAULT_SRS), Some(Projection::Geographic));
        assert_eq!(Projection::parse("+init=epsg:4326"), Some(Projection::Geographic));
        assert_eq!(
            Projection::parse("+init=epsg:3857"),
            Some(Projection::SphericalMercator)
        );
        assert_eq!(Projection::parse("+proj=utm +zone=32"), None);
    }

    #[test]
    fn test_identical_strings_need_no_recognition() {
        let t = ProjTransform::new("+proj=utm +zone=32", "+proj=utm +zone=32").unwrap();
        assert!(t.is_identity());
        assert!(ProjTransform::new("+proj=utm +zone=32", DEFAULT_SRS).is_err());
    }

    #[test]
    fn test_mercator_round_trip() {
        let t = ProjTransform::new("+init=epsg:4326", "+init=epsg:3857").unwrap();
        let (x, y) = t.point(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        let (lon, lat) = t.inverse().point(t.point(13.4, 52.5).0, t.point(13.4, 52.5).1);
        assert!((lon - 13.4).abs() < 1e-9);
        assert!((lat - 52.5).abs() < 1e-9);
    }

    #[test]
    fn test_bbox_transform_contains_corners() {
        let t = ProjTransform::new("epsg:4326", "epsg:3857").unwrap();
        let b = t.bbox(&BBox::new(-10.0, -10.0, 10.0, 10.0));
        let (x, y) = t.point(10.0, 10.0);
        assert!((b.maxx - x).abs() < 1e-6);
        assert!((b.maxy - y).abs() < 1e-6);
        assert!(b.is_valid());
    }
}
