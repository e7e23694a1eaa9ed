//! Envelopes and vector geometries.

/// An axis-aligned bounding box in map units.
///
/// A freshly defaulted box is invalid (`maxx < minx`), which is how a map
/// without a current extent is represented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Default for BBox {
    fn default() -> Self {
        Self {
            minx: 0.0,
            miny: 0.0,
            maxx: -1.0,
            maxy: -1.0,
        }
    }
}

impl BBox {
    /// Create a box from two corners, normalizing so that min <= max.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }

    /// Parse `minx,miny,maxx,maxy` (commas or whitespace).
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .map(|p| p.parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [x0, y0, x1, y1] if parts.iter().all(|v| v.is_finite()) => {
                Some(Self::new(*x0, *y0, *x1, *y1))
            }
            _ => None,
        }
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.minx + self.maxx) * 0.5,
            (self.miny + self.maxy) * 0.5,
        )
    }

    /// True when the box encloses a non-degenerate area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// True when min <= max on both axes (points and lines qualify).
    pub fn is_normalized(&self) -> bool {
        self.minx <= self.maxx && self.miny <= self.maxy
    }

    /// Resize horizontally around the center.
    pub fn set_width(&mut self, w: f64) {
        let (cx, _) = self.center();
        self.minx = cx - w * 0.5;
        self.maxx = cx + w * 0.5;
    }

    /// Resize vertically around the center.
    pub fn set_height(&mut self, h: f64) {
        let (_, cy) = self.center();
        self.miny = cy - h * 0.5;
        self.maxy = cy + h * 0.5;
    }

    pub fn expand_to_include(&mut self, other: &BBox) {
        self.minx = self.minx.min(other.minx);
        self.miny = self.miny.min(other.miny);
        self.maxx = self.maxx.max(other.maxx);
        self.maxy = self.maxy.max(other.maxy);
    }

    pub fn expand_to_include_point(&mut self, x: f64, y: f64) {
        self.minx = self.minx.min(x);
        self.miny = self.miny.min(y);
        self.maxx = self.maxx.max(x);
        self.maxy = self.maxy.max(y);
    }

    /// Intersect in place with `other`. The result may be invalid.
    pub fn clip(&mut self, other: &BBox) {
        self.minx = self.minx.max(other.minx);
        self.miny = self.miny.max(other.miny);
        self.maxx = self.maxx.min(other.maxx);
        self.maxy = self.maxy.min(other.maxy);
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        !(other.minx > self.maxx
            || other.maxx < self.minx
            || other.miny > self.maxy
            || other.maxy < self.miny)
    }

    /// Grow the box by `d` on every side.
    pub fn pad(&self, d: f64) -> Self {
        Self {
            minx: self.minx - d,
            miny: self.miny - d,
            maxx: self.maxx + d,
            maxy: self.maxy + d,
        }
    }

    fn empty() -> Self {
        Self {
            minx: f64::INFINITY,
            miny: f64::INFINITY,
            maxx: f64::NEG_INFINITY,
            maxy: f64::NEG_INFINITY,
        }
    }
}

/// A single position.
pub type Coord = (f64, f64);

/// Vector geometry of a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    /// Exterior ring followed by interior rings.
    Polygon(Vec<Vec<Coord>>),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
    Collection(Vec<Geometry>),
}

impl Geometry {
    /// Envelope of all coordinates, or `None` for an empty geometry.
    pub fn envelope(&self) -> Option<BBox> {
        let mut bbox = BBox::empty();
        self.for_each_coord(&mut |x, y| bbox.expand_to_include_point(x, y));
        bbox.is_normalized().then_some(bbox)
    }

    /// Visit every coordinate.
    pub fn for_each_coord(&self, f: &mut dyn FnMut(f64, f64)) {
        match self {
            Geometry::Point((x, y)) => f(*x, *y),
            Geometry::LineString(line) | Geometry::MultiPoint(line) => {
                line.iter().for_each(|(x, y)| f(*x, *y))
            }
            Geometry::Polygon(rings) | Geometry::MultiLineString(rings) => rings
                .iter()
                .flatten()
                .for_each(|(x, y)| f(*x, *y)),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .flatten()
                .for_each(|(x, y)| f(*x, *y)),
            Geometry::Collection(parts) => parts.iter().for_each(|g| g.for_each_coord(f)),
        }
    }

    /// Return a copy with every coordinate passed through `f`.
    pub fn map_coords(&self, f: &dyn Fn(f64, f64) -> Coord) -> Geometry {
        let line = |l: &Vec<Coord>| l.iter().map(|(x, y)| f(*x, *y)).collect::<Vec<_>>();
        match self {
            Geometry::Point((x, y)) => Geometry::Point(f(*x, *y)),
            Geometry::LineString(l) => Geometry::LineString(line(l)),
            Geometry::MultiPoint(l) => Geometry::MultiPoint(line(l)),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(line).collect()),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(lines.iter().map(line).collect())
            }
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|rings| rings.iter().map(line).collect())
                    .collect(),
            ),
            Geometry::Collection(parts) => {
                Geometry::Collection(parts.iter().map(|g| g.map_coords(f)).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bbox_is_invalid() {
        assert!(!BBox::default().is_valid());
        assert!(!BBox::default().is_normalized());
    }

    #[test]
    fn test_new_normalizes_corners() {
        let b = BBox::new(10.0, 10.0, 0.0, -5.0);
        assert_eq!(b, BBox { minx: 0.0, miny: -5.0, maxx: 10.0, maxy: 10.0 });
    }

    #[test]
    fn test_parse() {
        assert_eq!(BBox::parse("-180,-90,180,90"), Some(BBox::new(-180.0, -90.0, 180.0, 90.0)));
        assert_eq!(BBox::parse("1 2 3 4"), Some(BBox::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(BBox::parse("1,2,3"), None);
        assert_eq!(BBox::parse("a,b,c,d"), None);
    }

    #[test]
    fn test_set_width_keeps_center() {
        let mut b = BBox::new(0.0, 0.0, 10.0, 10.0);
        b.set_width(20.0);
        assert_eq!(b, BBox::new(-5.0, 0.0, 15.0, 10.0));
    }

    #[test]
    fn test_clip_and_intersects() {
        let mut b = BBox::new(0.0, 0.0, 10.0, 10.0);
        let other = BBox::new(5.0, 5.0, 20.0, 20.0);
        assert!(b.intersects(&other));
        b.clip(&other);
        assert_eq!(b, BBox::new(5.0, 5.0, 10.0, 10.0));
        assert!(!b.intersects(&BBox::new(11.0, 11.0, 12.0, 12.0)));
    }

    #[test]
    fn test_geometry_envelope() {
        let g = Geometry::Polygon(vec![vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 0.0)]]);
        assert_eq!(g.envelope(), Some(BBox::new(0.0, 0.0, 4.0, 3.0)));
        assert_eq!(Geometry::MultiPoint(vec![]).envelope(), None);
        let p = Geometry::Point((2.0, 2.0)).envelope().unwrap();
        assert!(p.is_normalized());
        assert!(!p.is_valid());
    }
}
