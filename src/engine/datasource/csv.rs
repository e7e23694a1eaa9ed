//! Delimited text provider (`type=csv`) for point data.

use super::{Datasource, Feature, Value, VectorDatasource, read_input};
use crate::engine::error::{Error, Result};
use crate::engine::geometry::Geometry;
use crate::engine::params::Parameters;
use std::collections::BTreeMap;
use std::sync::Arc;

const KIND: &str = "csv";

const X_COLUMNS: &[&str] = &["x", "lon", "lng", "long", "longitude"];
const Y_COLUMNS: &[&str] = &["y", "lat", "latitude"];

pub(super) fn create(params: &Parameters) -> Result<Arc<dyn Datasource>> {
    let text = read_input(KIND, params)?;
    let separator = match params.get("separator") {
        None => ',',
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(Error::InvalidParameter {
                        key: "separator".into(),
                        value: s.into(),
                    });
                }
            }
        }
    };
    let features = parse(&text, separator)?;
    Ok(Arc::new(VectorDatasource::new(KIND, features, params)?))
}

fn parse(text: &str, separator: char) -> Result<Vec<Feature>> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(h) => split_record(h, separator),
        None => return Ok(Vec::new()),
    };
    let find = |names: &[&str]| {
        header
            .iter()
            .position(|h| names.contains(&h.trim().to_ascii_lowercase().as_str()))
    };
    let (Some(xi), Some(yi)) = (find(X_COLUMNS), find(Y_COLUMNS)) else {
        return Err(invalid(format!(
            "could not detect coordinate columns in header '{}'",
            header.join(&separator.to_string())
        )));
    };

    let mut features = Vec::new();
    for (row, line) in lines.enumerate() {
        let fields = split_record(line, separator);
        let number = |i: usize| -> Result<f64> {
            fields
                .get(i)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .ok_or_else(|| invalid(format!("row {}: invalid coordinate", row + 2)))
        };
        let (x, y) = (number(xi)?, number(yi)?);
        let attributes = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != xi && *i != yi)
            .map(|(i, name)| {
                let raw = fields.get(i).map(String::as_str).unwrap_or("");
                let value = match raw.trim().parse::<f64>() {
                    Ok(n) => Value::Number(n),
                    Err(_) if raw.is_empty() => Value::Null,
                    Err(_) => Value::String(raw.to_string()),
                };
                (name.trim().to_string(), value)
            })
            .collect::<BTreeMap<_, _>>();
        features.push(Feature {
            id: row as u64 + 1,
            geometry: Geometry::Point((x, y)),
            attributes,
        });
    }
    Ok(features)
}

/// Split one record, honouring double quotes ("" escapes a quote).
fn split_record(line: &str, separator: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == separator && !quoted => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn invalid(message: String) -> Error {
    Error::Datasource {
        kind: KIND,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(
            split_record(r#"1,"a, ""b""",3"#, ','),
            vec!["1", r#"a, "b""#, "3"]
        );
    }

    #[test]
    fn test_parse_points() {
        let features = parse("name,lon,lat\nBerlin,13.4,52.5\nParis,2.35,48.85\n", ',').unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].geometry, Geometry::Point((13.4, 52.5)));
        assert_eq!(features[1].get("name"), &Value::String("Paris".into()));
    }

    #[test]
    fn test_missing_coordinate_columns() {
        assert!(parse("a,b\n1,2\n", ',').is_err());
        assert!(parse("x,y\n1,nope\n", ',').is_err());
    }

    #[test]
    fn test_custom_separator() {
        let params: Parameters = [("type", "csv"), ("inline", "x;y;v\n1;2;3\n"), ("separator", ";")]
            .into_iter()
            .collect();
        let ds = create(&params).unwrap();
        assert_eq!(ds.envelope().minx, 1.0);
    }
}
