//! Environment variables with the loose coercion used by `.env` files.

use serde::Serialize;
use std::collections::HashMap;

/// A coerced environment value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Bool(bool),
    Str(String),
    Null,
}

impl EnvValue {
    /// Coerce a raw value: `true`/`false`/`empty`/`null` (optionally in
    /// parentheses, any case) become typed values, surrounding double quotes
    /// are stripped.
    pub fn coerce(raw: &str) -> Self {
        let value = raw.trim();
        match value.to_ascii_lowercase().as_str() {
            "true" | "(true)" => return EnvValue::Bool(true),
            "false" | "(false)" => return EnvValue::Bool(false),
            "empty" | "(empty)" => return EnvValue::Str(String::new()),
            "null" | "(null)" => return EnvValue::Null,
            _ => {}
        }
        let unquoted = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            &value[1..value.len() - 1]
        } else {
            value
        };
        EnvValue::Str(unquoted.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Snapshot of environment variables.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, String>,
}

impl Env {
    pub fn from_process() -> Self { Self { vars: std::env::vars().collect() } }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    pub fn get(&self, name: &str) -> Option<EnvValue> { self.vars.get(name).map(|v| EnvValue::coerce(v)) }

    /// String value; typed values other than `empty` are `None`.
    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(EnvValue::Bool(b)) => b,
            Some(EnvValue::Str(s)) => matches!(s.to_ascii_lowercase().as_str(), "1" | "yes" | "on"),
            Some(EnvValue::Null) | None => default,
        }
    }
}
