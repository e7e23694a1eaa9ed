//! RGBA colors as written in stylesheets.

use super::error::{Error, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::{alpha1, char, multispace0},
    combinator::{map, map_opt, map_res},
    number::complete::recognize_float,
    sequence::{delimited, preceded, terminated},
};
use std::str::FromStr;

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const GRAY: Color = Color::rgb(128, 128, 128);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Multiply alpha by `opacity` (clamped to 0..=1).
    pub fn with_opacity(self, opacity: f64) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        Self {
            a: (self.a as f64 * opacity).round() as u8,
            ..self
        }
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

const NAMED: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("silver", Color::rgb(192, 192, 192)),
    ("red", Color::rgb(255, 0, 0)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("olive", Color::rgb(128, 128, 0)),
    ("lime", Color::rgb(0, 255, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("aqua", Color::rgb(0, 255, 255)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("teal", Color::rgb(0, 128, 128)),
    ("blue", Color::rgb(0, 0, 255)),
    ("navy", Color::rgb(0, 0, 128)),
    ("fuchsia", Color::rgb(255, 0, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("purple", Color::rgb(128, 0, 128)),
    ("brown", Color::rgb(165, 42, 42)),
    ("beige", Color::rgb(245, 245, 220)),
    ("ivory", Color::rgb(255, 255, 240)),
    ("khaki", Color::rgb(240, 230, 140)),
    ("tan", Color::rgb(210, 180, 140)),
    ("steelblue", Color::rgb(70, 130, 180)),
    ("lightblue", Color::rgb(173, 216, 230)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("transparent", Color::TRANSPARENT),
];

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        match parse_color(input) {
            Ok(("", color)) => Ok(color),
            _ => Err(Error::Color(input.to_string())),
        }
    }
}

// --- Helper Parsers ---

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: nom::error::ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn from_hex(input: &str) -> std::result::Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(input, 16)
}

fn hex_primary(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, is_hex_digit), from_hex).parse(input)
}

/// One hex digit, doubled (`f` is `ff`).
fn hex_short(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(1, 1, is_hex_digit), |s: &str| from_hex(s).map(|v| v * 17)).parse(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, str::parse::<f64>).parse(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    ws(char(',')).parse(input)
}

// --- Color Forms ---

fn hex_color(input: &str) -> IResult<&str, Color> {
    preceded(
        char('#'),
        alt((
            map((hex_primary, hex_primary, hex_primary, hex_primary), |(r, g, b, a)| {
                Color::rgba(r, g, b, a)
            }),
            map((hex_primary, hex_primary, hex_primary), |(r, g, b)| Color::rgb(r, g, b)),
            map((hex_short, hex_short, hex_short, hex_short), |(r, g, b, a)| {
                Color::rgba(r, g, b, a)
            }),
            map((hex_short, hex_short, hex_short), |(r, g, b)| Color::rgb(r, g, b)),
        )),
    )
    .parse(input)
}

/// `0..=255` or a percentage of 255.
fn channel(input: &str) -> IResult<&str, u8> {
    let (input, v) = ws(alt((
        map(terminated(number, char('%')), |pct| pct / 100.0 * 255.0),
        number,
    )))
    .parse(input)?;
    Ok((input, v.round().clamp(0.0, 255.0) as u8))
}

/// Alpha as `0..=1`.
fn alpha(input: &str) -> IResult<&str, u8> {
    map(ws(number), |a| (a.clamp(0.0, 1.0) * 255.0).round() as u8).parse(input)
}

fn rgb_channels(input: &str) -> IResult<&str, (u8, u8, u8)> {
    (channel, preceded(comma, channel), preceded(comma, channel)).parse(input)
}

fn functional_color(input: &str) -> IResult<&str, Color> {
    alt((
        map(
            preceded(
                tag_no_case("rgba"),
                delimited(ws(char('(')), (rgb_channels, preceded(comma, alpha)), char(')')),
            ),
            |((r, g, b), a)| Color::rgba(r, g, b, a),
        ),
        map(
            preceded(tag_no_case("rgb"), delimited(ws(char('(')), rgb_channels, char(')'))),
            |(r, g, b)| Color::rgb(r, g, b),
        ),
    ))
    .parse(input)
}

fn named_color(input: &str) -> IResult<&str, Color> {
    map_opt(alpha1, |name: &str| {
        NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| *c)
    })
    .parse(input)
}

pub fn parse_color(input: &str) -> IResult<&str, Color> {
    alt((hex_color, functional_color, named_color)).parse(input)
}
