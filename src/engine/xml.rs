//! Map stylesheet loading.

use super::color::Color;
use super::datasource;
use super::error::{Error, Result};
use super::filter::Expr;
use super::geometry::BBox;
use super::layer::Layer;
use super::map::Map;
use super::params::{Parameters, parse_bool};
use super::style::{
    FilterMode, LineCap, LineJoin, LineSymbolizer, MarkerType, MarkersSymbolizer,
    PolygonSymbolizer, Rule, RuleFilter, Style, Symbolizer,
};
use roxmltree::Node;
use std::path::Path;

pub(crate) fn load_map(map: &mut Map, path: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(path).map_err(|e| {
        Error::io(format!("failed to read stylesheet '{}'", path.display()), e)
    })?;
    let base = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_map_string(map, &xml, &base)
}

pub(crate) fn load_map_string(map: &mut Map, xml: &str, base_path: &str) -> Result<()> {
    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    let doc = roxmltree::Document::parse_with_options(xml, options)?;
    let root = doc.root_element();
    if root.tag_name().name() != "Map" {
        return Err(Error::stylesheet(format!(
            "root element must be <Map>, found <{}>",
            root.tag_name().name()
        )));
    }

    // Apply to a copy so a failing load leaves the map untouched.
    let mut staged = map.clone();
    let base = apply_map_attributes(&mut staged, root, base_path)?;

    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Style" => {
                let (name, style) = parse_style(child)?;
                staged.insert_style(name, style);
            }
            "Layer" => staged.add_layer(parse_layer(child, &base)?),
            other @ ("Parameters" | "FontSet" | "Include" | "Datasource") => {
                log::debug!("load_map: <{other}> is not supported, skipping");
            }
            other => log::warn!("load_map: unknown element <{other}> in <Map>"),
        }
    }

    log::debug!(
        "load_map: {} styles, {} layers",
        staged.styles().len(),
        staged.layers().len()
    );
    *map = staged;
    Ok(())
}

/// Apply `<Map>` attributes. Returns the effective base path.
fn apply_map_attributes(map: &mut Map, node: Node, base_path: &str) -> Result<String> {
    if let Some(srs) = node.attribute("srs") {
        map.set_srs(srs)?;
    }
    if let Some(color) = attr_color(node, "background-color")? {
        map.set_background(color);
    }
    if let Some(size) = attr_parse::<i32>(node, "buffer-size")? {
        map.set_buffer_size(size);
    }
    if let Some(extent) = node.attribute("maximum-extent") {
        let extent = BBox::parse(extent).ok_or_else(|| Error::InvalidBBox(extent.to_string()))?;
        map.set_maximum_extent(extent);
    }
    Ok(match node.attribute("base") {
        Some(base) => join_base(base_path, base),
        None => base_path.to_string(),
    })
}

fn join_base(base_path: &str, base: &str) -> String {
    if Path::new(base).is_absolute() || base_path.is_empty() {
        base.to_string()
    } else {
        Path::new(base_path).join(base).to_string_lossy().into_owned()
    }
}

fn parse_style(node: Node) -> Result<(String, Style)> {
    let name = node
        .attribute("name")
        .ok_or_else(|| Error::stylesheet("<Style> requires a 'name' attribute"))?;
    let filter_mode = match node.attribute("filter-mode") {
        None | Some("all") => FilterMode::All,
        Some("first") => FilterMode::First,
        Some(other) => {
            return Err(Error::stylesheet(format!(
                "style '{name}': invalid filter-mode '{other}'"
            )));
        }
    };
    let rules = node
        .children()
        .filter(|n| n.has_tag_name("Rule"))
        .map(parse_rule)
        .collect::<Result<Vec<_>>>()?;
    Ok((name.to_string(), Style { filter_mode, rules }))
}

fn parse_rule(node: Node) -> Result<Rule> {
    let mut rule = Rule {
        name: node.attribute("name").map(str::to_string),
        ..Rule::default()
    };
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "Filter" => rule.filter = RuleFilter::Expr(text_of(child).parse::<Expr>()?),
            "ElseFilter" => rule.filter = RuleFilter::Else,
            "MinScaleDenominator" => rule.min_scale = text_f64(child)?,
            "MaxScaleDenominator" => rule.max_scale = text_f64(child)?,
            "PolygonSymbolizer" => rule.symbolizers.push(parse_polygon(child)?),
            "LineSymbolizer" => rule.symbolizers.push(parse_line(child)?),
            "MarkersSymbolizer" => rule.symbolizers.push(parse_markers(child)?),
            other => log::debug!("load_map: <{other}> is not supported, skipping"),
        }
    }
    Ok(rule)
}

fn parse_polygon(node: Node) -> Result<Symbolizer> {
    let mut sym = PolygonSymbolizer::default();
    if let Some(fill) = attr_color(node, "fill")? {
        sym.fill = fill;
    }
    if let Some(opacity) = attr_parse(node, "fill-opacity")? {
        sym.fill_opacity = opacity;
    }
    Ok(Symbolizer::Polygon(sym))
}

fn parse_line(node: Node) -> Result<Symbolizer> {
    let mut sym = LineSymbolizer::default();
    if let Some(stroke) = attr_color(node, "stroke")? {
        sym.stroke = stroke;
    }
    if let Some(width) = attr_parse(node, "stroke-width")? {
        sym.stroke_width = width;
    }
    if let Some(opacity) = attr_parse(node, "stroke-opacity")? {
        sym.stroke_opacity = opacity;
    }
    sym.line_join = match node.attribute("stroke-linejoin") {
        None | Some("miter") => LineJoin::Miter,
        Some("round") => LineJoin::Round,
        Some("bevel") => LineJoin::Bevel,
        Some(other) => return Err(invalid_attr("stroke-linejoin", other)),
    };
    sym.line_cap = match node.attribute("stroke-linecap") {
        None | Some("butt") => LineCap::Butt,
        Some("round") => LineCap::Round,
        Some("square") => LineCap::Square,
        Some(other) => return Err(invalid_attr("stroke-linecap", other)),
    };
    if let Some(dashes) = node.attribute("stroke-dasharray") {
        sym.dash_array = dashes
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid_attr("stroke-dasharray", dashes))?;
    }
    Ok(Symbolizer::Line(sym))
}

fn parse_markers(node: Node) -> Result<Symbolizer> {
    let mut sym = MarkersSymbolizer::default();
    if let Some(fill) = attr_color(node, "fill")? {
        sym.fill = fill;
    }
    if let Some(opacity) = attr_parse(node, "fill-opacity")? {
        sym.fill_opacity = opacity;
    }
    sym.stroke = attr_color(node, "stroke")?;
    if let Some(width) = attr_parse(node, "stroke-width")? {
        sym.stroke_width = width;
    }
    // A single dimension keeps the marker circular.
    match (attr_parse::<f64>(node, "width")?, attr_parse::<f64>(node, "height")?) {
        (Some(w), Some(h)) => (sym.width, sym.height) = (w, h),
        (Some(s), None) | (None, Some(s)) => (sym.width, sym.height) = (s, s),
        (None, None) => {}
    }
    if let Some(opacity) = attr_parse(node, "opacity")? {
        sym.opacity = opacity;
    }
    sym.marker_type = match node.attribute("marker-type") {
        None | Some("ellipse") => MarkerType::Ellipse,
        Some("rectangle") => MarkerType::Rectangle,
        Some(other) => return Err(invalid_attr("marker-type", other)),
    };
    Ok(Symbolizer::Markers(sym))
}

fn parse_layer(node: Node, base: &str) -> Result<Layer> {
    let name = node.attribute("name").unwrap_or("Unnamed");
    let mut layer = Layer::new(name, node.attribute("srs").unwrap_or(""));
    if let Some(status) = node.attribute("status") {
        layer.active = parse_bool(status).ok_or_else(|| invalid_attr("status", status))?;
    }
    if let Some(min) =
        attr_parse::<f64>(node, "minimum-scale-denominator")?.or(attr_parse(node, "minzoom")?)
    {
        layer.min_scale = min;
    }
    if let Some(max) =
        attr_parse::<f64>(node, "maximum-scale-denominator")?.or(attr_parse(node, "maxzoom")?)
    {
        layer.max_scale = max;
    }

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "StyleName" => layer.add_style(text_of(child).trim()),
            "Datasource" => {
                let params = parse_datasource_params(child, base);
                let ds = datasource::create(&params).map_err(|e| {
                    Error::stylesheet(format!(
                        "failed to initialize datasource for layer '{name}': {e}"
                    ))
                })?;
                layer.set_datasource(Some(ds));
            }
            other => log::debug!("load_map: <{other}> in <Layer> is not supported, skipping"),
        }
    }
    Ok(layer)
}

fn parse_datasource_params(node: Node, base: &str) -> Parameters {
    let mut params: Parameters = node
        .children()
        .filter(|n| n.has_tag_name("Parameter"))
        .filter_map(|p| Some((p.attribute("name")?.to_string(), text_of(p))))
        .collect();
    if !params.contains("base") {
        let base = match node.attribute("base") {
            Some(b) => join_base(base, b),
            None => base.to_string(),
        };
        if !base.is_empty() {
            params.set("base", base);
        }
    }
    params
}

/// Concatenated text (including CDATA) below `node`.
fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn text_f64(node: Node) -> Result<f64> {
    let text = text_of(node);
    text.trim()
        .parse()
        .map_err(|_| invalid_attr(node.tag_name().name(), &text))
}

fn attr_parse<T: std::str::FromStr>(node: Node, name: &str) -> Result<Option<T>> {
    match node.attribute(name) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid_attr(name, v)),
    }
}

fn attr_color(node: Node, name: &str) -> Result<Option<Color>> {
    node.attribute(name).map(str::parse::<Color>).transpose()
}

fn invalid_attr(name: &str, value: &str) -> Error {
    Error::stylesheet(format!("invalid value '{value}' for '{name}'"))
}
