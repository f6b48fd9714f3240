//! Request parameters (query string, form body, JSON body)

use serde::Serialize;
use serde_json::{Map, Value};

/// Separator for nested parameter lookups.
pub const PATH_DELIMITER: char = '.';

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self { Self::default() }

    /// Parse an `application/x-www-form-urlencoded` string. Later duplicates win.
    pub fn from_urlencoded(input: &str) -> Self {
        let mut params = Self::new();
        params.add_urlencoded(input);
        params
    }

    pub fn add_urlencoded(&mut self, input: &str) {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(input).unwrap_or_default();
        for (k, v) in pairs {
            self.0.insert(k, Value::String(v));
        }
    }

    /// Merge the keys of a JSON object; other JSON values are ignored.
    pub fn add_json(&mut self, value: Value) {
        if let Value::Object(obj) = value {
            self.0.extend(obj);
        }
    }

    /// Exact key first, then a `.` separated path into nested objects.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(name) {
            return Some(value);
        }
        if !name.contains(PATH_DELIMITER) {
            return None;
        }
        let mut parts = name.split(PATH_DELIMITER);
        let mut value = self.0.get(parts.next()?)?;
        for key in parts {
            value = match value {
                Value::Object(obj) => obj.get(key)?,
                Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> { self.get(name).and_then(Value::as_str) }

    pub fn set(&mut self, name: impl Into<String>, value: Value) { self.0.insert(name.into(), value); }
    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn as_map(&self) -> &Map<String, Value> { &self.0 }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self { Self(map) }
}
