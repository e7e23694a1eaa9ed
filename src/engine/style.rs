//! Styles, rules and symbolizers.

use super::color::Color;
use super::datasource::Feature;
use super::filter::Expr;

/// How rules of a style are applied to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Every matching rule draws.
    #[default]
    All,
    /// Only the first matching rule draws.
    First,
}

/// Which features a rule applies to.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RuleFilter {
    /// No filter: every feature.
    #[default]
    Always,
    Expr(Expr),
    /// Only features no regular rule matched.
    Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerType {
    #[default]
    Ellipse,
    Rectangle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSymbolizer {
    pub fill: Color,
    pub fill_opacity: f64,
}

impl Default for PolygonSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::GRAY,
            fill_opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSymbolizer {
    pub stroke: Color,
    pub stroke_width: f64,
    pub stroke_opacity: f64,
    pub line_join: LineJoin,
    pub line_cap: LineCap,
    pub dash_array: Vec<f64>,
}

impl Default for LineSymbolizer {
    fn default() -> Self {
        Self {
            stroke: Color::BLACK,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            line_join: LineJoin::default(),
            line_cap: LineCap::default(),
            dash_array: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkersSymbolizer {
    pub fill: Color,
    pub fill_opacity: f64,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
    pub marker_type: MarkerType,
}

impl Default for MarkersSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::BLUE,
            fill_opacity: 1.0,
            stroke: None,
            stroke_width: 0.5,
            width: 10.0,
            height: 10.0,
            opacity: 1.0,
            marker_type: MarkerType::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbolizer {
    Polygon(PolygonSymbolizer),
    Line(LineSymbolizer),
    Markers(MarkersSymbolizer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: Option<String>,
    pub filter: RuleFilter,
    pub min_scale: f64,
    pub max_scale: f64,
    pub symbolizers: Vec<Symbolizer>,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            name: None,
            filter: RuleFilter::Always,
            min_scale: 0.0,
            max_scale: f64::INFINITY,
            symbolizers: Vec::new(),
        }
    }
}

impl Rule {
    pub fn active_at(&self, scale_denominator: f64) -> bool {
        scale_denominator >= self.min_scale - 1e-6 && scale_denominator < self.max_scale + 1e-6
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    pub filter_mode: FilterMode,
    pub rules: Vec<Rule>,
}

impl Style {
    /// Rules that draw `feature` at the given scale, in order.
    pub fn matching_rules<'a>(&'a self, feature: &Feature, scale_denominator: f64) -> Vec<&'a Rule> {
        let mut matched = Vec::new();
        let mut any_regular = false;
        for rule in self.rules.iter().filter(|r| r.active_at(scale_denominator)) {
            let hit = match &rule.filter {
                RuleFilter::Always => true,
                RuleFilter::Expr(e) => e.matches(feature),
                RuleFilter::Else => continue,
            };
            if hit {
                any_regular = true;
                matched.push(rule);
                if self.filter_mode == FilterMode::First {
                    return matched;
                }
            }
        }
        if !any_regular {
            matched.extend(
                self.rules
                    .iter()
                    .filter(|r| r.filter == RuleFilter::Else && r.active_at(scale_denominator)),
            );
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::datasource::Value;
    use crate::engine::geometry::Geometry;
    use std::collections::BTreeMap;

    fn named(name: &str) -> Feature {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), Value::String(name.to_string()));
        Feature {
            id: 1,
            geometry: Geometry::Point((0.0, 0.0)),
            attributes,
        }
    }

    fn rule(name: &str, filter: RuleFilter) -> Rule {
        Rule {
            name: Some(name.to_string()),
            filter,
            ..Rule::default()
        }
    }

    fn names(rules: Vec<&Rule>) -> Vec<&str> {
        rules.iter().filter_map(|r| r.name.as_deref()).collect()
    }

    #[test]
    fn test_else_rule_only_without_regular_match() {
        let style = Style {
            filter_mode: FilterMode::All,
            rules: vec![
                rule("a", RuleFilter::Expr("[name] = 'a'".parse().unwrap())),
                rule("else", RuleFilter::Else),
            ],
        };
        assert_eq!(names(style.matching_rules(&named("a"), 1.0)), vec!["a"]);
        assert_eq!(names(style.matching_rules(&named("b"), 1.0)), vec!["else"]);
    }

    #[test]
    fn test_first_mode_stops_at_first_match() {
        let style = Style {
            filter_mode: FilterMode::First,
            rules: vec![rule("one", RuleFilter::Always), rule("two", RuleFilter::Always)],
        };
        assert_eq!(names(style.matching_rules(&named("x"), 1.0)), vec!["one"]);
    }

    #[test]
    fn test_scale_range() {
        let r = Rule {
            min_scale: 100.0,
            max_scale: 1000.0,
            ..Rule::default()
        };
        assert!(r.active_at(100.0));
        assert!(r.active_at(999.0));
        assert!(!r.active_at(1000.5));
        assert!(!r.active_at(50.0));
    }
}
