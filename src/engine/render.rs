//! Rasterization of a map into an [`Image`].

use super::error::{Error, Result};
use super::geometry::{BBox, Coord, Geometry};
use super::image::Image;
use super::map::Map;
use super::projection::ProjTransform;
use super::style::{
    LineCap, LineJoin, LineSymbolizer, MarkerType, MarkersSymbolizer, PolygonSymbolizer,
    Symbolizer,
};
use std::path::Path;
use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform,
};

/// Per-call rendering options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Scale denominator used for layer and rule selection; `None` computes it from the map.
    pub scale_denominator: Option<f64>,
    /// Multiplier for line widths and marker sizes.
    pub scale_factor: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale_denominator: None,
            scale_factor: 1.0,
        }
    }
}

impl RenderOptions {
    /// Options in the form the C API passes them: a `scale` of 0 means "compute".
    pub fn new(scale: f64, scale_factor: f64) -> Self {
        Self {
            scale_denominator: (scale.is_finite() && scale > 0.0).then_some(scale),
            scale_factor,
        }
    }
}

/// World to pixel transform for the current extent. Y grows downwards.
#[derive(Debug, Clone, Copy)]
struct ViewTransform {
    extent: BBox,
    sx: f64,
    sy: f64,
}

impl ViewTransform {
    fn new(width: u32, height: u32, extent: BBox) -> Self {
        Self {
            extent,
            sx: width as f64 / extent.width(),
            sy: height as f64 / extent.height(),
        }
    }

    fn forward(&self, (x, y): Coord) -> (f32, f32) {
        (
            ((x - self.extent.minx) * self.sx) as f32,
            ((self.extent.maxy - y) * self.sy) as f32,
        )
    }
}

/// Render `map` into a new image.
pub fn render(map: &Map, options: &RenderOptions) -> Result<Image> {
    let scale_factor = options.scale_factor;
    if !(scale_factor.is_finite() && scale_factor > 0.0) {
        return Err(Error::InvalidScaleFactor(scale_factor));
    }
    let (width, height) = (map.width(), map.height());
    let mut pixmap = Pixmap::new(width, height).ok_or(Error::Canvas { width, height })?;
    if let Some(bg) = map.background() {
        pixmap.fill(bg.to_skia());
    }

    let extent = map.current_extent();
    if extent.is_valid() {
        let scale_denominator = options
            .scale_denominator
            .unwrap_or_else(|| map.scale_denominator());
        let mut canvas = Canvas {
            pixmap: &mut pixmap,
            view: ViewTransform::new(width, height, extent),
            scale_factor,
        };
        canvas.draw_layers(map, scale_denominator);
    } else {
        log::debug!("map extent is not set, rendering background only");
    }

    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Image::from_rgba(width, height, data)
}

/// Render `map` and write it to `path`. An empty format is guessed from the extension.
pub fn render_to_file(map: &Map, options: &RenderOptions, path: &Path, format: &str) -> Result<()> {
    render(map, options)?.save(path, format)
}

struct Canvas<'a> {
    pixmap: &'a mut Pixmap,
    view: ViewTransform,
    scale_factor: f64,
}

impl Canvas<'_> {
    fn draw_layers(&mut self, map: &Map, scale_denominator: f64) {
        let query = map.buffered_extent();
        for layer in map.layers() {
            if !layer.visible(scale_denominator) {
                continue;
            }
            let Some(ds) = &layer.datasource else {
                log::debug!("layer '{}' has no datasource", layer.name);
                continue;
            };
            let transform = match ProjTransform::new(&layer.srs, map.srs()) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("skipping layer '{}': {e}", layer.name);
                    continue;
                }
            };
            let layer_query = transform.inverse().bbox(&query);
            for style_name in &layer.styles {
                let Some(style) = map.style(style_name) else {
                    log::debug!("layer '{}' references unknown style '{style_name}'", layer.name);
                    continue;
                };
                for feature in ds.features(&layer_query) {
                    let rules = style.matching_rules(feature, scale_denominator);
                    if rules.is_empty() {
                        continue;
                    }
                    let geometry = if transform.is_identity() {
                        feature.geometry.clone()
                    } else {
                        transform.geometry(&feature.geometry)
                    };
                    for sym in rules.iter().flat_map(|r| &r.symbolizers) {
                        self.draw(sym, &geometry);
                    }
                }
            }
        }
    }

    fn draw(&mut self, sym: &Symbolizer, geometry: &Geometry) {
        match sym {
            Symbolizer::Polygon(s) => self.fill_polygons(s, geometry),
            Symbolizer::Line(s) => self.stroke_lines(s, geometry),
            Symbolizer::Markers(s) => self.place_markers(s, geometry),
        }
    }

    fn fill_polygons(&mut self, sym: &PolygonSymbolizer, geometry: &Geometry) {
        let mut pb = PathBuilder::new();
        for_each_polygon(geometry, &mut |rings| {
            for ring in rings {
                self.push_line(&mut pb, ring, true);
            }
        });
        let Some(path) = pb.finish() else { return };
        let paint = paint(sym.fill.with_opacity(sym.fill_opacity).to_skia());
        self.pixmap
            .fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
    }

    fn stroke_lines(&mut self, sym: &LineSymbolizer, geometry: &Geometry) {
        let mut pb = PathBuilder::new();
        for_each_line(geometry, &mut |line, closed| self.push_line(&mut pb, line, closed));
        let Some(path) = pb.finish() else { return };

        let factor = self.scale_factor as f32;
        let dash = if sym.dash_array.is_empty() {
            None
        } else {
            StrokeDash::new(
                sym.dash_array.iter().map(|d| *d as f32 * factor).collect(),
                0.0,
            )
        };
        let stroke = Stroke {
            width: sym.stroke_width as f32 * factor,
            line_join: match sym.line_join {
                LineJoin::Miter => tiny_skia::LineJoin::Miter,
                LineJoin::Round => tiny_skia::LineJoin::Round,
                LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            },
            line_cap: match sym.line_cap {
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            dash,
            ..Stroke::default()
        };
        let paint = paint(sym.stroke.with_opacity(sym.stroke_opacity).to_skia());
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn place_markers(&mut self, sym: &MarkersSymbolizer, geometry: &Geometry) {
        let factor = self.scale_factor as f32;
        let (w, h) = (sym.width as f32 * factor, sym.height as f32 * factor);
        let mut positions = Vec::new();
        for_each_marker_position(geometry, &mut |c| positions.push(self.view.forward(c)));

        let fill = paint(
            sym.fill
                .with_opacity(sym.fill_opacity * sym.opacity)
                .to_skia(),
        );
        let outline = sym.stroke.map(|c| {
            let stroke = Stroke {
                width: sym.stroke_width as f32 * factor,
                ..Stroke::default()
            };
            (paint(c.with_opacity(sym.opacity).to_skia()), stroke)
        });

        for (x, y) in positions {
            let Some(rect) = Rect::from_xywh(x - w / 2.0, y - h / 2.0, w, h) else {
                continue;
            };
            let path = match sym.marker_type {
                MarkerType::Ellipse => PathBuilder::from_oval(rect),
                MarkerType::Rectangle => Some(PathBuilder::from_rect(rect)),
            };
            let Some(path) = path else { continue };
            self.pixmap
                .fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);
            if let Some((paint, stroke)) = &outline {
                self.pixmap
                    .stroke_path(&path, paint, stroke, Transform::identity(), None);
            }
        }
    }

    fn push_line(&self, pb: &mut PathBuilder, line: &[Coord], close: bool) {
        let mut points = line.iter().map(|c| self.view.forward(*c));
        let Some((x, y)) = points.next() else { return };
        pb.move_to(x, y);
        for (x, y) in points {
            pb.line_to(x, y);
        }
        if close {
            pb.close();
        }
    }
}

fn paint(color: tiny_skia::Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

fn for_each_polygon(geometry: &Geometry, f: &mut dyn FnMut(&[Vec<Coord>])) {
    match geometry {
        Geometry::Polygon(rings) => f(rings),
        Geometry::MultiPolygon(polys) => polys.iter().for_each(|p| f(p)),
        Geometry::Collection(parts) => parts.iter().for_each(|g| for_each_polygon(g, f)),
        _ => {}
    }
}

/// Visit line strings and polygon rings; the flag marks closed rings.
fn for_each_line(geometry: &Geometry, f: &mut dyn FnMut(&[Coord], bool)) {
    match geometry {
        Geometry::LineString(line) => f(line, false),
        Geometry::MultiLineString(lines) => lines.iter().for_each(|l| f(l, false)),
        Geometry::Polygon(rings) => rings.iter().for_each(|r| f(r, true)),
        Geometry::MultiPolygon(polys) => polys.iter().flatten().for_each(|r| f(r, true)),
        Geometry::Collection(parts) => parts.iter().for_each(|g| for_each_line(g, f)),
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
    }
}

/// Points place a marker each; lines and polygons place one at their envelope center.
fn for_each_marker_position(geometry: &Geometry, f: &mut dyn FnMut(Coord)) {
    match geometry {
        Geometry::Point(c) => f(*c),
        Geometry::MultiPoint(points) => points.iter().for_each(|c| f(*c)),
        Geometry::Collection(parts) => parts.iter().for_each(|g| for_each_marker_position(g, f)),
        other => {
            if let Some(env) = other.envelope() {
                f(env.center());
            }
        }
    }
}
