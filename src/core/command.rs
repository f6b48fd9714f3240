//! Command records and per-scope command maps
//!
//! A command map entry is either a complete [`CommandRecord`] or a sparse set
//! of [`CommandOverrides`] merged over the application's command defaults.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Map file key for the entry used when a request has no action (or an
/// unknown one).
pub const FALLBACK_KEY: &str = "";

/// Map file key that marks a complete record rather than overrides.
pub const FULL_RECORD_KEY: &str = "record";

/// Resolved configuration for one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandRecord {
    /// A session is started for the request.
    pub session: bool,
    /// The user must be authenticated.
    pub authenticate: bool,
    /// Script returning the access level of the current user.
    pub authorize: Option<String>,
    /// Access level required to run the command.
    pub access_level: i64,
    /// Script validating POST requests.
    pub validate: Option<String>,
    /// Script run on a POST request.
    pub post: Option<String>,
    /// Script run on a GET (or failed POST) request.
    pub get: Option<String>,
    /// Page rendered for the command.
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tabgroup: Option<String>,
    /// Keys the map supplies beyond the known fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for CommandRecord {
    fn default() -> Self {
        Self {
            session: true,
            authenticate: true,
            authorize: None,
            access_level: 1,
            validate: None,
            post: None,
            get: None,
            page: None,
            tab: None,
            tabgroup: None,
            extra: BTreeMap::new(),
        }
    }
}

impl CommandRecord {
    pub fn with_session(mut self, required: bool) -> Self { self.session = required; self }
    pub fn with_authenticate(mut self, required: bool) -> Self { self.authenticate = required; self }
    pub fn with_authorize(mut self, script: impl Into<String>) -> Self { self.authorize = Some(script.into()); self }
    pub fn with_access_level(mut self, level: i64) -> Self { self.access_level = level; self }
    pub fn with_validate(mut self, script: impl Into<String>) -> Self { self.validate = Some(script.into()); self }
    pub fn with_post(mut self, script: impl Into<String>) -> Self { self.post = Some(script.into()); self }
    pub fn with_get(mut self, script: impl Into<String>) -> Self { self.get = Some(script.into()); self }
    pub fn with_page(mut self, page: impl Into<String>) -> Self { self.page = Some(page.into()); self }

    /// Look up a field by name. Unknown names and null values are `None`.
    pub fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "session" => Value::Bool(self.session),
            "authenticate" => Value::Bool(self.authenticate),
            "access_level" => Value::from(self.access_level),
            "authorize" => opt_str(&self.authorize),
            "validate" => opt_str(&self.validate),
            "post" => opt_str(&self.post),
            "get" => opt_str(&self.get),
            "page" => opt_str(&self.page),
            "tab" => opt_str(&self.tab),
            "tabgroup" => opt_str(&self.tabgroup),
            other => self.extra.get(other).cloned().unwrap_or(Value::Null),
        };
        (!value.is_null()).then_some(value)
    }

    /// Field value as a string, for script and page names.
    pub fn field_str(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    /// Apply sparse overrides; values present in `overrides` win.
    pub fn merged(mut self, overrides: &CommandOverrides) -> Self {
        if let Some(v) = overrides.session { self.session = v; }
        if let Some(v) = overrides.authenticate { self.authenticate = v; }
        if let Some(v) = overrides.access_level { self.access_level = v; }
        if let Some(v) = &overrides.authorize { self.authorize = v.clone(); }
        if let Some(v) = &overrides.validate { self.validate = v.clone(); }
        if let Some(v) = &overrides.post { self.post = v.clone(); }
        if let Some(v) = &overrides.get { self.get = v.clone(); }
        if let Some(v) = &overrides.page { self.page = v.clone(); }
        if let Some(v) = &overrides.tab { self.tab = v.clone(); }
        if let Some(v) = &overrides.tabgroup { self.tabgroup = v.clone(); }
        for (k, v) in &overrides.extra {
            self.extra.insert(k.clone(), v.clone());
        }
        self
    }
}

fn opt_str(value: &Option<String>) -> Value {
    value.as_ref().map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
}

/// Sparse command entry. For the nullable fields the outer `Option` says
/// whether the key was present, so an explicit `null` clears the default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommandOverrides {
    pub session: Option<bool>,
    pub authenticate: Option<bool>,
    pub access_level: Option<i64>,
    #[serde(deserialize_with = "present")]
    pub authorize: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub validate: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub post: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub get: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub page: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub tab: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub tabgroup: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl CommandOverrides {
    pub fn page(mut self, page: impl Into<String>) -> Self { self.page = Some(Some(page.into())); self }
    pub fn get(mut self, script: impl Into<String>) -> Self { self.get = Some(Some(script.into())); self }
    pub fn post(mut self, script: impl Into<String>) -> Self { self.post = Some(Some(script.into())); self }
    pub fn session(mut self, required: bool) -> Self { self.session = Some(required); self }
    pub fn authenticate(mut self, required: bool) -> Self { self.authenticate = Some(required); self }
    pub fn access_level(mut self, level: i64) -> Self { self.access_level = Some(level); self }
}

/// One command map entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEntry {
    /// Used as-is.
    Full(CommandRecord),
    /// Merged over the command defaults.
    Partial(CommandOverrides),
}

impl CommandEntry {
    pub fn resolve(&self, defaults: &CommandRecord) -> CommandRecord {
        match self {
            CommandEntry::Full(record) => record.clone(),
            CommandEntry::Partial(overrides) => defaults.clone().merged(overrides),
        }
    }
}

impl From<CommandRecord> for CommandEntry {
    fn from(record: CommandRecord) -> Self { Self::Full(record) }
}

impl From<CommandOverrides> for CommandEntry {
    fn from(overrides: CommandOverrides) -> Self { Self::Partial(overrides) }
}

impl<'de> Deserialize<'de> for CommandEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let mut obj = Map::<String, Value>::deserialize(deserializer)?;
        if obj.len() == 1 {
            if let Some(record) = obj.remove(FULL_RECORD_KEY) {
                return serde_json::from_value(record).map(CommandEntry::Full).map_err(D::Error::custom);
            }
        }
        serde_json::from_value(Value::Object(obj)).map(CommandEntry::Partial).map_err(D::Error::custom)
    }
}

/// Commands for one scope, keyed by action name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandMap {
    actions: HashMap<String, CommandEntry>,
    fallback: Option<CommandEntry>,
}

impl CommandMap {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, action: impl Into<String>, entry: impl Into<CommandEntry>) -> Self {
        self.insert(action, entry);
        self
    }

    pub fn with_fallback(mut self, entry: impl Into<CommandEntry>) -> Self {
        self.fallback = Some(entry.into());
        self
    }

    pub fn insert(&mut self, action: impl Into<String>, entry: impl Into<CommandEntry>) {
        let action = action.into();
        if action == FALLBACK_KEY {
            self.fallback = Some(entry.into());
        } else {
            self.actions.insert(action, entry.into());
        }
    }

    /// Entry for the action, else the fallback entry.
    pub fn lookup(&self, action: Option<&str>) -> Option<&CommandEntry> {
        action
            .and_then(|a| self.actions.get(a))
            .or(self.fallback.as_ref())
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> { self.actions.keys().map(String::as_str) }
    pub fn has_fallback(&self) -> bool { self.fallback.is_some() }
    pub fn len(&self) -> usize { self.actions.len() + usize::from(self.fallback.is_some()) }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<'de> Deserialize<'de> for CommandMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<String, CommandEntry>::deserialize(deserializer)?;
        let mut map = CommandMap::new();
        for (action, entry) in entries {
            map.insert(action, entry);
        }
        Ok(map)
    }
}

/// Resolve the command for an action: the action's entry, else the fallback
/// entry, merged over `defaults` when it is sparse.
pub fn resolve_command(map: &CommandMap, action: Option<&str>, defaults: &CommandRecord) -> Option<CommandRecord> {
    let resolved = map.lookup(action).map(|entry| entry.resolve(defaults));
    tracing::debug!(action = action.unwrap_or(""), found = resolved.is_some(), "resolve command");
    resolved
}
