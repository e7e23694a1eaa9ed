//! A compact map rendering engine.
//!
//! The engine is a plain Rust API returning [`Result`]; the C surface in
//! the crate root translates it into handles, status codes and last-error
//! strings.

pub mod color;
pub mod datasource;
pub mod error;
pub mod filter;
pub mod fonts;
pub mod geometry;
pub mod image;
pub mod layer;
pub mod map;
pub mod params;
pub mod projection;
pub mod render;
pub mod style;
mod xml;

pub use color::Color;
pub use datasource::{Datasource, DatasourceCache, Feature, Value};
pub use error::{Error, Result};
pub use fonts::FontCache;
pub use geometry::{BBox, Geometry};
pub use self::image::{Image, ImageFormat};
pub use layer::Layer;
pub use map::{AspectFixMode, MAX_MAPSIZE, MIN_MAPSIZE, Map};
pub use params::Parameters;
pub use render::{RenderOptions, render, render_to_file};
pub use style::{Rule, Style, Symbolizer};
