//! Feature providers and the process-wide datasource registry.

mod csv;
mod geojson;

use super::error::{Error, Result};
use super::geometry::{BBox, Geometry};
use super::params::Parameters;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// An attribute value attached to a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    /// Numeric view, parsing strings when they hold a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// A geometry with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub geometry: Geometry,
    pub attributes: BTreeMap<String, Value>,
}

impl Feature {
    pub fn get(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.attributes.get(name).unwrap_or(&NULL)
    }
}

/// A bound data provider.
pub trait Datasource: Send + Sync + fmt::Debug {
    /// The `type` this provider was created for.
    fn kind(&self) -> &'static str;

    /// Extent of all features, in the provider's own SRS.
    fn envelope(&self) -> BBox;

    /// Features whose envelope intersects `query`.
    fn features<'a>(&'a self, query: &BBox) -> Box<dyn Iterator<Item = &'a Feature> + 'a>;
}

/// In-memory feature collection backing the file based providers.
#[derive(Debug)]
pub struct VectorDatasource {
    kind: &'static str,
    features: Vec<(BBox, Feature)>,
    envelope: BBox,
}

impl VectorDatasource {
    /// Index `features`. An `extent` parameter overrides the computed envelope.
    pub fn new(kind: &'static str, features: Vec<Feature>, params: &Parameters) -> Result<Self> {
        let mut envelope: Option<BBox> = None;
        let features: Vec<(BBox, Feature)> = features
            .into_iter()
            .filter_map(|f| {
                let env = f.geometry.envelope()?;
                match envelope.as_mut() {
                    Some(e) => e.expand_to_include(&env),
                    None => envelope = Some(env),
                }
                Some((env, f))
            })
            .collect();
        let envelope = match params.get_bbox("extent")? {
            Some(extent) => extent,
            None => envelope.unwrap_or_default(),
        };
        log::debug!(
            "{kind} datasource: {} features, extent {:?}",
            features.len(),
            envelope
        );
        Ok(Self {
            kind,
            features,
            envelope,
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.features.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Datasource for VectorDatasource {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn envelope(&self) -> BBox {
        self.envelope
    }

    fn features<'a>(&'a self, query: &BBox) -> Box<dyn Iterator<Item = &'a Feature> + 'a> {
        let query = *query;
        Box::new(
            self.features
                .iter()
                .filter(move |(env, _)| env.intersects(&query))
                .map(|(_, f)| f),
        )
    }
}

/// Read the `file` parameter, resolved against `base` when relative.
pub(crate) fn resolve_file(params: &Parameters) -> Option<PathBuf> {
    let file = Path::new(params.get("file")?);
    match params.get("base") {
        Some(base) if file.is_relative() && !base.is_empty() => Some(Path::new(base).join(file)),
        _ => Some(file.to_path_buf()),
    }
}

/// Read the provider's input, from `inline` or from `file`.
pub(crate) fn read_input(kind: &'static str, params: &Parameters) -> Result<String> {
    if let Some(inline) = params.get("inline") {
        return Ok(inline.to_string());
    }
    let path = resolve_file(params).ok_or_else(|| Error::Datasource {
        kind,
        message: "either 'file' or 'inline' parameter is required".to_string(),
    })?;
    std::fs::read_to_string(&path)
        .map_err(|e| Error::io(format!("failed to read '{}'", path.display()), e))
}

type Factory = fn(&Parameters) -> Result<Arc<dyn Datasource>>;

/// Registry of datasource providers.
pub struct DatasourceCache {
    factories: BTreeMap<&'static str, Factory>,
    plugin_dirs: Vec<PathBuf>,
}

static DATASOURCES: LazyLock<RwLock<DatasourceCache>> =
    LazyLock::new(|| RwLock::new(DatasourceCache::with_builtins()));

impl DatasourceCache {
    fn with_builtins() -> Self {
        let mut factories: BTreeMap<&'static str, Factory> = BTreeMap::new();
        factories.insert("geojson", geojson::create);
        factories.insert("csv", csv::create);
        Self {
            factories,
            plugin_dirs: Vec::new(),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static RwLock<DatasourceCache> {
        &DATASOURCES
    }

    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Record a plugin directory. Returns the number of `*.input` entries found.
    ///
    /// Providers are compiled in; the directory only extends the search
    /// path reported in error messages.
    pub fn register_datasources(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::io(
                format!("could not register datasources from '{}'", dir.display()),
                e,
            )
        })?;
        let inputs = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "input"))
            .count();
        if !self.plugin_dirs.iter().any(|d| d == dir) {
            self.plugin_dirs.push(dir.to_path_buf());
        }
        log::debug!(
            "registered datasource directory '{}' ({inputs} plugin files)",
            dir.display()
        );
        Ok(inputs)
    }

    /// Instantiate the provider named by the `type` parameter.
    pub fn create(&self, params: &Parameters) -> Result<Arc<dyn Datasource>> {
        let kind = params.require("type")?;
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| Error::UnknownDatasource {
                kind: kind.to_string(),
                searched: self.plugin_dirs.clone(),
            })?;
        factory(params)
    }
}

/// Create a datasource through the global registry.
pub fn create(params: &Parameters) -> Result<Arc<dyn Datasource>> {
    DatasourceCache::global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .create(params)
}

/// Register a plugin directory with the global registry.
pub fn register_datasources(dir: &Path) -> Result<usize> {
    DatasourceCache::global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_datasources(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_missing_type() {
        let err = create(&Parameters::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter(ref k) if k == "type"));
    }

    #[test]
    fn test_unknown_type() {
        let err = create(&params(&[("type", "shape")])).unwrap_err();
        assert!(err.to_string().contains("'shape'"));
    }

    #[test]
    fn test_register_datasources_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("csv.input"), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();
        let mut cache = DatasourceCache::with_builtins();
        assert_eq!(cache.register_datasources(dir.path()).unwrap(), 1);
        assert_eq!(cache.plugin_dirs(), &[dir.path().to_path_buf()]);
        assert!(cache
            .register_datasources(&dir.path().join("missing"))
            .is_err());
    }

    #[test]
    fn test_query_filters_by_envelope() {
        let features = vec![
            Feature {
                id: 1,
                geometry: Geometry::Point((0.0, 0.0)),
                attributes: BTreeMap::new(),
            },
            Feature {
                id: 2,
                geometry: Geometry::Point((50.0, 50.0)),
                attributes: BTreeMap::new(),
            },
        ];
        let ds = VectorDatasource::new("test", features, &Parameters::new()).unwrap();
        assert_eq!(ds.envelope(), BBox::new(0.0, 0.0, 50.0, 50.0));
        let hits: Vec<u64> = ds
            .features(&BBox::new(-1.0, -1.0, 1.0, 1.0))
            .map(|f| f.id)
            .collect();
        assert_eq!(hits, vec![1]);
    }

    #[test]
    fn test_extent_parameter_overrides_envelope() {
        let ds = VectorDatasource::new("test", Vec::new(), &params(&[("extent", "0,0,10,10")]))
            .unwrap();
        assert_eq!(ds.envelope(), BBox::new(0.0, 0.0, 10.0, 10.0));
        assert!(ds.is_empty());
    }

    #[test]
    fn test_resolve_file_against_base() {
        let p = params(&[("file", "data/a.json"), ("base", "/srv/maps")]);
        assert_eq!(resolve_file(&p), Some(PathBuf::from("/srv/maps/data/a.json")));
        let p = params(&[("file", "/abs/a.json"), ("base", "/srv/maps")]);
        assert_eq!(resolve_file(&p), Some(PathBuf::from("/abs/a.json")));
    }
}
