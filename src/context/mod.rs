//! RequestContext - everything one request needs to know about itself
//!
//! A context is built per request from the shared [`Application`] and the
//! request's server variables. Derived values (base URL, path parameters,
//! the resolved command, ...) are computed on first access and cached until
//! [`RequestContext::reset`].
//!
//! ```text
//! REQUEST_URI ─► path ─► path_params ─► command_map(scope) ─► command(action)
//!      │                     │
//!      └─ scheme/host/port ─►└─► base_url ─► build_url / send_redirect
//! ```

mod parameters;
mod response;
mod server;

pub use parameters::Parameters;
pub use response::{Message, MessageKind, Redirect, MESSAGES_KEY, REDIRECT_STATUSES};
pub use server::{header_key, ServerVars};

use crate::app::Application;
use crate::core::{build_url, parse_path, resolve_command, CommandMap, CommandRecord, PathParams, UrlParams};
use crate::error::{CopeError, CopeResult};
use crate::session::{MemorySession, Session};
use once_cell::unsync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Session attribute holding the CSRF token.
pub const CSRF_KEY: &str = "csrf";

#[derive(Default)]
struct Memo {
    script_name: OnceCell<String>,
    base_path: OnceCell<String>,
    port: OnceCell<u16>,
    scheme: OnceCell<String>,
    host: OnceCell<String>,
    hostname: OnceCell<Option<String>>,
    url_base: OnceCell<String>,
    base_url: OnceCell<String>,
    url: OnceCell<String>,
    path: OnceCell<String>,
    path_params: OnceCell<PathParams>,
    command_map: OnceCell<CommandMap>,
    command: OnceCell<Option<CommandRecord>>,
}

pub struct RequestContext {
    app: Arc<Application>,
    server: ServerVars,
    parameters: Parameters,
    body: Vec<u8>,
    session: Option<Box<dyn Session>>,
    state: Map<String, Value>,
    messages: Option<Vec<Message>>,
    has_error: bool,
    status: u16,
    error_body: Option<String>,
    redirect: Option<Redirect>,
    memo: Memo,
}

impl RequestContext {
    pub fn new(app: Arc<Application>, server: ServerVars) -> Self {
        Self {
            app,
            server,
            parameters: Parameters::new(),
            body: Vec::new(),
            session: None,
            state: Map::new(),
            messages: None,
            has_error: false,
            status: 200,
            error_body: None,
            redirect: None,
            memo: Memo::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self { self.parameters = parameters; self }

    /// Attach the raw body. A JSON body is merged into the parameters.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        if self.is_json() {
            if let Some(json) = self.json_body() {
                self.parameters.add_json(json);
            }
        } else if self.content_type().is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded")) {
            let form = String::from_utf8_lossy(&self.body).into_owned();
            self.parameters.add_urlencoded(&form);
        }
        self
    }

    pub fn with_session(mut self, session: impl Session + 'static) -> Self {
        self.session = Some(Box::new(session));
        self
    }

    /// Build a context for an axum/http request.
    #[cfg(feature = "server")]
    pub fn from_request_parts(app: Arc<Application>, parts: &axum::http::request::Parts, body: &[u8]) -> Self {
        let server = ServerVars::from_parts(parts, app.script_name());
        let parameters = Parameters::from_urlencoded(parts.uri.query().unwrap_or(""));
        Self::new(app, server).with_parameters(parameters).with_body(body.to_vec())
    }

    pub fn app(&self) -> &Application { &self.app }
    pub fn server(&self) -> &ServerVars { &self.server }

    /// Clear every cached value, messages and the response status. The
    /// request inputs (server variables, parameters, body, session) stay.
    pub fn reset(&mut self) {
        self.memo = Memo::default();
        self.messages = None;
        self.has_error = false;
        self.status = 200;
        self.error_body = None;
        self.redirect = None;
    }
}

// =============================================================================
// Request URL
// =============================================================================
impl RequestContext {
    /// `SCRIPT_NAME` without a trailing `PATH_INFO`.
    pub fn script_name(&self) -> &str {
        self.memo.script_name.get_or_init(|| {
            let script = self
                .server
                .get("SCRIPT_NAME")
                .filter(|s| !s.is_empty())
                .unwrap_or(self.app.script_name());
            match self.server.get("PATH_INFO").filter(|p| !p.is_empty()) {
                Some(info) if script.ends_with(info) => script[..script.len() - info.len()].to_string(),
                _ => script.to_string(),
            }
        })
    }

    /// Portion of the URL before the routing segments (the rewrite base).
    pub fn base_path(&self) -> &str {
        self.memo.base_path.get_or_init(|| {
            let script = self.script_name();
            script.rfind('/').map(|i| script[..i].to_string()).unwrap_or_default()
        })
    }

    pub fn port(&self) -> u16 {
        *self.memo.port.get_or_init(|| match self.server.get("SERVER_PORT") {
            Some(port) => port.trim().parse().unwrap_or(0),
            None => 80,
        })
    }

    pub fn scheme(&self) -> &str {
        self.memo.scheme.get_or_init(|| {
            if self.app.trust_proxy() {
                if let Some(proto) = self.server.header("X-Forwarded-Proto") {
                    return proto.to_string();
                }
            }
            let tls = self.server.get("HTTPS").is_some_and(|v| v != "off");
            if tls || matches!(self.port(), 443 | 8443) { "https".into() } else { "http".into() }
        })
    }

    pub fn host(&self) -> &str {
        self.memo.host.get_or_init(|| {
            let forwarded = self
                .app
                .trust_proxy()
                .then(|| self.server.header("X-Forwarded-Host"))
                .flatten()
                .filter(|h| !h.is_empty());
            forwarded
                .or_else(|| self.server.header("Host"))
                .or_else(|| self.server.get("SERVER_NAME"))
                .unwrap_or_default()
                .to_string()
        })
    }

    /// `scheme://host[:port]` followed by the base path.
    pub fn url_base(&self) -> &str {
        self.memo.url_base.get_or_init(|| {
            let port = match self.port() {
                80 | 443 => String::new(),
                p => format!(":{p}"),
            };
            format!("{}://{}{}{}", self.scheme(), self.host(), port, self.base_path())
        })
    }

    /// URL base followed by the base path. The base path appears twice,
    /// since `url_base` already ends with it.
    pub fn base_url(&self) -> &str {
        self.memo.base_url.get_or_init(|| format!("{}{}", self.url_base(), self.base_path()))
    }

    /// Full URL of the request.
    pub fn url(&self) -> &str {
        self.memo.url.get_or_init(|| {
            let mut url = self.url_base().to_string();
            if let Some(uri) = self.server.get("REQUEST_URI") {
                url.push_str(uri);
            }
            url
        })
    }

    /// Request path after the base path.
    pub fn path(&self) -> &str {
        self.memo.path.get_or_init(|| {
            let uri = self.server.get("REQUEST_URI").unwrap_or_default();
            let uri_path = uri.split(['?', '#']).next().unwrap_or_default();
            uri_path.get(self.base_path().len()..).unwrap_or_default().to_string()
        })
    }

    /// Override scheme, host, port and base path from an absolute URL.
    pub fn set_base_url(&mut self, url: &str) -> CopeResult<()> {
        let parsed = url::Url::parse(url).map_err(|source| CopeError::InvalidUrl { url: url.to_string(), source })?;
        let base_path = parsed.path().trim_end_matches('/').to_string();
        let scheme = parsed.scheme().to_string();
        let host = parsed.host_str().map(str::to_string);
        let port = parsed.port();

        let memo = std::mem::take(&mut self.memo);
        self.memo.script_name = memo.script_name;
        self.memo.hostname = memo.hostname;
        let _ = self.memo.scheme.set(scheme);
        let _ = self.memo.base_path.set(base_path);
        match host {
            Some(host) => { let _ = self.memo.host.set(host); }
            None => self.memo.host = memo.host,
        }
        match port {
            Some(port) => { let _ = self.memo.port.set(port); }
            None => self.memo.port = memo.port,
        }
        Ok(())
    }
}

// =============================================================================
// Routing: path parameters and command
// =============================================================================
impl RequestContext {
    pub fn path_params(&self) -> &PathParams {
        self.memo.path_params.get_or_init(|| {
            let params = parse_path(self.path(), self.app.scopes(), self.app.order());
            tracing::debug!(path = self.path(), ?params, "path parameters");
            params
        })
    }

    pub fn kiosk(&self) -> Option<&str> { self.path_params().kiosk.as_deref() }
    pub fn scope(&self) -> Option<&str> { self.path_params().scope.as_deref() }
    pub fn action(&self) -> Option<&str> { self.path_params().action.as_deref() }

    /// Command map for the request scope. A map that cannot be loaded is empty.
    pub fn command_map(&self) -> &CommandMap {
        self.memo.command_map.get_or_init(|| {
            let Some(scope) = self.scope() else {
                tracing::debug!(path = self.path(), "no scope, using an empty command map");
                return CommandMap::new();
            };
            match self.app.load_map(scope) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(scope, error = %e, "could not load command map");
                    CommandMap::new()
                }
            }
        })
    }

    /// Command for the request action, `None` when nothing is configured.
    pub fn command(&self) -> Option<&CommandRecord> {
        self.memo
            .command
            .get_or_init(|| resolve_command(self.command_map(), self.action(), self.app.command_defaults()))
            .as_ref()
    }

    /// Reload the command map and resolve the command again.
    pub fn resolve_command_fresh(&mut self) -> Option<&CommandRecord> {
        self.memo.command_map.take();
        self.memo.command.take();
        self.command()
    }

    /// Command field, `None` for unknown or unset fields or without a command.
    pub fn command_field(&self, name: &str) -> Option<Value> { self.command()?.field(name) }

    pub fn command_field_or(&self, name: &str, default: Value) -> Value {
        self.command_field(name).unwrap_or(default)
    }

    /// `<page_dir>/<scope>/<page>` for the command's page.
    pub fn command_page(&self) -> Option<PathBuf> {
        let page = self.command()?.field_str("page").filter(|p| !p.is_empty())?;
        Some(self.page_path(&page))
    }

    /// `<script_dir>/<scope>/<script>` for a command script field
    /// (`get`, `post`, `validate`, `authorize`).
    pub fn command_script(&self, field: &str) -> Option<PathBuf> {
        let script = self.command()?.field_str(field).filter(|s| !s.is_empty())?;
        Some(self.script_path(&script))
    }

    pub fn page_path(&self, name: &str) -> PathBuf {
        self.app.page_dir().join(self.scope().unwrap_or_default()).join(name)
    }

    pub fn script_path(&self, name: &str) -> PathBuf {
        self.app.script_dir().join(self.scope().unwrap_or_default()).join(name)
    }

    /// Link for an action in the current (or overridden) scope and kiosk.
    pub fn build_url(&self, params: &UrlParams) -> String {
        build_url(self.base_url(), self.path_params(), params, self.app.order())
    }

    pub fn href(&self, params: &UrlParams) -> String { self.build_url(params) }
}

// =============================================================================
// Request data
// =============================================================================
impl RequestContext {
    pub fn method(&self) -> Option<&str> { self.server.get("REQUEST_METHOD") }
    pub fn is_method(&self, method: &str) -> bool { self.method() == Some(method) }
    pub fn content_type(&self) -> Option<&str> { self.server.get("CONTENT_TYPE") }
    pub fn is_json(&self) -> bool { self.content_type().is_some_and(|ct| ct.ends_with("json")) }
    pub fn header(&self, name: &str) -> Option<&str> { self.server.header(name) }
    pub fn remote_addr(&self) -> Option<&str> { self.server.get("REMOTE_ADDR") }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Decoded JSON body when the content type is JSON.
    pub fn json_body(&self) -> Option<Value> {
        if !self.is_json() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    pub fn parameters(&self) -> &Parameters { &self.parameters }
    pub fn parameter(&self, name: &str) -> Option<&Value> { self.parameters.get(name) }
    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) { self.parameters.set(name, value); }

    /// Short name of the host machine.
    pub fn hostname(&self) -> Option<&str> {
        self.memo.hostname.get_or_init(machine_name).as_deref()
    }

    /// Template state value.
    pub fn get(&self, name: &str) -> Option<&Value> { self.state.get(name) }
    pub fn has(&self, name: &str) -> bool { self.state.get(name).is_some_and(|v| !v.is_null()) }
    pub fn set(&mut self, name: impl Into<String>, value: Value) { self.state.insert(name.into(), value); }
    pub fn state(&self) -> &Map<String, Value> { &self.state }
}

fn machine_name() -> Option<String> {
    let name = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())?;
    let name = name.trim();
    let short = match name.find('.') {
        Some(pos) if pos > 1 => &name[..pos],
        _ => name,
    };
    (!short.is_empty()).then(|| short.to_string())
}

// =============================================================================
// Session, messages, CSRF
// =============================================================================
impl RequestContext {
    pub fn session(&self) -> Option<&dyn Session> { self.session.as_deref() }

    /// The request session, started in memory on first use.
    pub fn session_mut(&mut self) -> &mut dyn Session {
        self.session
            .get_or_insert_with(|| Box::new(MemorySession::new()) as Box<dyn Session>)
            .as_mut()
    }

    pub fn has_session(&self) -> bool { self.session.as_ref().is_some_and(|s| s.is_active()) }
    pub fn has_attributes(&self) -> bool { self.session.as_ref().is_some_and(|s| !s.is_empty()) }
    pub fn attribute(&self, name: &str) -> Option<Value> { self.session.as_ref()?.get(name) }
    pub fn set_attribute(&mut self, name: &str, value: Value) { self.session_mut().set(name, value); }

    /// Messages for this request, including any carried over in the session.
    pub fn messages(&mut self) -> &[Message] {
        if self.messages.is_none() {
            let carried = self
                .session
                .as_mut()
                .and_then(|s| s.remove(MESSAGES_KEY))
                .and_then(|v| serde_json::from_value::<Vec<Message>>(v).ok())
                .unwrap_or_default();
            self.messages = Some(carried);
        }
        self.messages.as_deref().unwrap_or_default()
    }

    pub fn has_messages(&self) -> bool { self.messages.as_ref().is_some_and(|m| !m.is_empty()) }
    pub fn has_error(&self) -> bool { self.has_error }

    pub fn send_message(&mut self, text: impl Into<String>, kind: MessageKind, field: Option<&str>) {
        if kind == MessageKind::Error {
            self.has_error = true;
        }
        self.messages();
        let mut message = Message::new(kind, text);
        message.field = field.map(str::to_string);
        self.messages.get_or_insert_with(Vec::new).push(message);
    }

    /// CSRF token for the session, created on first use.
    pub fn token(&mut self) -> String {
        let session = self.session_mut();
        if let Some(Value::String(token)) = session.get(CSRF_KEY) {
            return token;
        }
        let token = hex::encode(rand::random::<[u8; 32]>());
        session.set(CSRF_KEY, Value::String(token.clone()));
        token
    }

    /// Compare a submitted token with the session token in constant time.
    pub fn check_token(&mut self, token: &str) -> bool {
        blake3::hash(self.token().as_bytes()) == blake3::hash(token.as_bytes())
    }
}

// =============================================================================
// Response status and redirects
// =============================================================================
impl RequestContext {
    pub fn status(&self) -> u16 { self.status }
    pub fn redirect(&self) -> Option<&Redirect> { self.redirect.as_ref() }
    pub fn error_body(&self) -> Option<&str> { self.error_body.as_deref() }
    pub fn is_redirect(&self) -> bool { REDIRECT_STATUSES.contains(&self.status) }

    /// True while the status is below 300 or listed in `accept`.
    pub fn is_status_ok(&self, accept: &[u16]) -> bool { self.status < 300 || accept.contains(&self.status) }

    pub fn send_error(&mut self, status: u16, message: Option<&str>) {
        self.status = status;
        self.error_body = message.map(str::to_string);
    }

    /// Redirect the client. Local targets are made absolute against the base
    /// URL; pending messages are saved to the session for the next request.
    pub fn send_redirect(&mut self, to: &str, status: Option<u16>) -> Redirect {
        if self.has_messages() && self.has_session() {
            let messages = serde_json::to_value(self.messages.as_deref().unwrap_or_default()).unwrap_or(Value::Null);
            self.set_attribute(MESSAGES_KEY, messages);
        }

        let location = if to.contains("://") {
            to.to_string()
        } else if to.starts_with('/') {
            format!("{}{}", self.base_url(), to)
        } else {
            format!("{}/{}", self.base_url(), to)
        };
        let status = status.unwrap_or_else(|| Redirect::default_status(self.server.get("SERVER_PROTOCOL").unwrap_or_default()));

        let redirect = Redirect { location, status };
        tracing::debug!(location = %redirect.location, status, "redirect");
        self.status = status;
        self.redirect = Some(redirect.clone());
        redirect
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Every derived value of a context, for logging and debug endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub action: Option<String>,
    pub base_dir: String,
    pub base_path: String,
    pub base_url: String,
    pub command: Option<CommandRecord>,
    pub content_type: Option<String>,
    pub kiosk: Option<String>,
    pub has_error: bool,
    pub host: String,
    pub hostname: Option<String>,
    pub id: String,
    pub is_json: bool,
    pub logon_uri: String,
    pub map_dir: String,
    pub method: Option<String>,
    pub messages: Vec<Message>,
    pub page_dir: String,
    pub parameters: Parameters,
    pub path: String,
    pub path_params: PathParams,
    pub port: u16,
    pub remote_addr: Option<String>,
    pub scope: Option<String>,
    pub scope_list: String,
    pub script_dir: String,
    pub scheme: String,
    pub script_name: String,
    pub status: u16,
}

impl RequestContext {
    pub fn snapshot(&self) -> ContextSnapshot {
        fn owned(s: Option<&str>) -> Option<String> { s.map(str::to_string) }
        ContextSnapshot {
            action: owned(self.action()),
            base_dir: self.app.base_dir().display().to_string(),
            base_path: self.base_path().to_string(),
            base_url: self.base_url().to_string(),
            command: self.command().cloned(),
            content_type: owned(self.content_type()),
            kiosk: owned(self.kiosk()),
            has_error: self.has_error,
            host: self.host().to_string(),
            hostname: owned(self.hostname()),
            id: self.app.id(),
            is_json: self.is_json(),
            logon_uri: self.app.logon_uri().to_string(),
            map_dir: self.app.map_dir().display().to_string(),
            method: owned(self.method()),
            messages: self.messages.clone().unwrap_or_default(),
            page_dir: self.app.page_dir().display().to_string(),
            parameters: self.parameters.clone(),
            path: self.path().to_string(),
            path_params: self.path_params().clone(),
            port: self.port(),
            remote_addr: owned(self.remote_addr()),
            scope: owned(self.scope()),
            scope_list: self.app.scopes().to_string(),
            script_dir: self.app.script_dir().display().to_string(),
            scheme: self.scheme().to_string(),
            script_name: self.script_name().to_string(),
            status: self.status,
        }
    }

    pub fn to_json(&self) -> Value { serde_json::to_value(self.snapshot()).unwrap_or(Value::Null) }
}
