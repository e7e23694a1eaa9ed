//! Key/value parameters used to configure datasources.

use super::error::{Error, Result};
use super::geometry::BBox;
use std::collections::BTreeMap;

/// Sorted string parameters. Setting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Required string parameter.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::MissingParameter(key.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.parse_with(key, |v| v.trim().parse::<f64>().ok())
    }

    #[cfg(test)]
    pub(crate) fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.parse_with(key, parse_bool)
    }

    pub fn get_bbox(&self, key: &str) -> Result<Option<BBox>> {
        self.parse_with(key, BBox::parse)
    }

    fn parse_with<T>(&self, key: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => parse(v).map(Some).ok_or_else(|| Error::InvalidParameter {
                key: key.to_string(),
                value: v.to_string(),
            }),
        }
    }
}

/// Mapnik-style boolean literal.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}
