//! Application configuration - built once, shared by every request

use crate::core::{CommandMap, CommandRecord, PathOrder, ScopeList};
use crate::error::{CopeError, CopeResult};
use crate::maps::{discover_scopes, CommandMapSource, JsonMapSource};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::env::Env;

/// Default logon action.
pub const DEFAULT_LOGON_URI: &str = "logon.do";

/// Process-wide settings. Higher layers construct this and hand an
/// `Arc<Application>` to each request.
#[derive(Clone)]
pub struct Application {
    id: Option<String>,
    base_dir: PathBuf,
    map_dir: Option<PathBuf>,
    page_dir: Option<PathBuf>,
    script_dir: Option<PathBuf>,
    logon_uri: String,
    scopes: ScopeList,
    order: PathOrder,
    trust_proxy: bool,
    script_name: String,
    command_defaults: CommandRecord,
    map_source: Option<Arc<dyn CommandMapSource>>,
}

impl Application {
    pub fn new(scopes: ScopeList) -> Self {
        Self {
            id: None,
            base_dir: default_base_dir(),
            map_dir: None,
            page_dir: None,
            script_dir: None,
            logon_uri: DEFAULT_LOGON_URI.into(),
            scopes,
            order: PathOrder::default(),
            trust_proxy: false,
            script_name: String::new(),
            command_defaults: CommandRecord::default(),
            map_source: None,
        }
    }

    /// Build with a `|` separated scope list.
    pub fn with_scope_list(list: &str) -> Self { Self::new(ScopeList::parse(list)) }

    /// Derive the scope list from the map files in `map_dir`.
    pub fn discover(map_dir: impl Into<PathBuf>) -> CopeResult<Self> {
        let map_dir = map_dir.into();
        let scopes = discover_scopes(&map_dir)?;
        tracing::warn!(scopes = %scopes, dir = %map_dir.display(), "scope list derived from map files; configure it explicitly");
        Ok(Self::new(scopes).with_map_dir(map_dir))
    }

    /// Read `COPE_*` settings from the environment.
    pub fn from_env(env: &Env) -> CopeResult<Self> {
        let mut app = match env.string("COPE_SCOPE_LIST").filter(|s| !s.is_empty()) {
            Some(list) => Self::with_scope_list(&list),
            None => {
                let base = env.string("COPE_BASE_DIR").map(PathBuf::from).unwrap_or_else(default_base_dir);
                let map_dir = env.string("COPE_MAP_DIR").map(PathBuf::from).unwrap_or_else(|| base.join("maps"));
                Self::discover(map_dir)?
            }
        };
        if let Some(dir) = env.string("COPE_BASE_DIR") { app = app.with_base_dir(dir); }
        if let Some(dir) = env.string("COPE_MAP_DIR") { app = app.with_map_dir(dir); }
        if let Some(dir) = env.string("COPE_PAGE_DIR") { app = app.with_page_dir(dir); }
        if let Some(dir) = env.string("COPE_SCRIPT_DIR") { app = app.with_script_dir(dir); }
        if let Some(uri) = env.string("COPE_LOGON_URI") { app = app.with_logon_uri(uri); }
        if let Some(id) = env.string("COPE_ID") { app = app.with_id(id); }
        if let Some(name) = env.string("COPE_SCRIPT_NAME") { app = app.with_script_name(name); }
        if let Some(json) = env.string("COPE_COMMAND_DEFAULTS") { app = app.with_command_defaults_json(&json)?; }
        Ok(app
            .with_kiosk_first(env.flag("COPE_KIOSK_FIRST", false))
            .with_trust_proxy(env.flag("COPE_TRUST_PROXY", false)))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self { self.id = Some(id.into()); self }

    /// Changing the base directory resets the map, page and script dirs.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if dir != self.base_dir {
            self.base_dir = dir;
            self.map_dir = None;
            self.page_dir = None;
            self.script_dir = None;
        }
        self
    }

    pub fn with_map_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.map_dir = Some(dir.into()); self }
    pub fn with_page_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.page_dir = Some(dir.into()); self }
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self { self.script_dir = Some(dir.into()); self }
    pub fn with_logon_uri(mut self, uri: impl Into<String>) -> Self { self.logon_uri = uri.into(); self }
    pub fn with_kiosk_first(mut self, kiosk_first: bool) -> Self { self.order = PathOrder::from_kiosk_first(kiosk_first); self }
    pub fn with_order(mut self, order: PathOrder) -> Self { self.order = order; self }
    pub fn with_trust_proxy(mut self, trusted: bool) -> Self { self.trust_proxy = trusted; self }
    /// Script name used when the server does not supply `SCRIPT_NAME`.
    pub fn with_script_name(mut self, name: impl Into<String>) -> Self { self.script_name = name.into(); self }
    pub fn with_command_defaults(mut self, defaults: CommandRecord) -> Self { self.command_defaults = defaults; self }

    pub fn with_command_defaults_json(mut self, json: &str) -> CopeResult<Self> {
        self.command_defaults = serde_json::from_str(json).map_err(CopeError::InvalidDefaults)?;
        Ok(self)
    }

    pub fn with_map_source(mut self, source: impl CommandMapSource + 'static) -> Self {
        self.map_source = Some(Arc::new(source));
        self
    }
}

impl Application {
    /// Explicit id, else a short id derived from the base directory.
    pub fn id(&self) -> String {
        self.id.clone().unwrap_or_else(|| short_id(&self.base_dir))
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }
    pub fn map_dir(&self) -> PathBuf { self.map_dir.clone().unwrap_or_else(|| self.base_dir.join("maps")) }
    pub fn page_dir(&self) -> PathBuf { self.page_dir.clone().unwrap_or_else(|| self.base_dir.join("pages")) }
    pub fn script_dir(&self) -> PathBuf { self.script_dir.clone().unwrap_or_else(|| self.base_dir.join("scripts")) }
    pub fn logon_uri(&self) -> &str { &self.logon_uri }
    pub fn scopes(&self) -> &ScopeList { &self.scopes }
    pub fn order(&self) -> PathOrder { self.order }
    pub fn is_kiosk_first(&self) -> bool { self.order.is_kiosk_first() }
    pub fn trust_proxy(&self) -> bool { self.trust_proxy }
    pub fn script_name(&self) -> &str { &self.script_name }
    pub fn command_defaults(&self) -> &CommandRecord { &self.command_defaults }

    /// Load the command map for a scope from the configured source, or from
    /// `<map_dir>/<scope>.json`.
    pub fn load_map(&self, scope: &str) -> CopeResult<CommandMap> {
        match &self.map_source {
            Some(source) => source.load(scope),
            None => JsonMapSource::new(self.map_dir()).load(scope),
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("id", &self.id())
            .field("base_dir", &self.base_dir)
            .field("map_dir", &self.map_dir())
            .field("scopes", &self.scopes.to_string())
            .field("order", &self.order)
            .field("trust_proxy", &self.trust_proxy)
            .field("custom_map_source", &self.map_source.is_some())
            .finish()
    }
}

/// Parent of the working directory.
fn default_base_dir() -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn short_id(dir: &Path) -> String {
    let digest = blake3::hash(dir.to_string_lossy().as_bytes());
    let bytes = digest.as_bytes();
    let mut n = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    const DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 32) as usize]);
        n /= 32;
        if n == 0 { break; }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
