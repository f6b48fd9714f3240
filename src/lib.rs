//! Cope: command-driven request context. One path shape, one command per action.
//!
//! # Architecture
//!
//! ```text
//! Application (built once, Arc-shared)
//!   │   scope list, path order, dirs, command defaults, map source
//!   │
//!   └── RequestContext (one per request)
//!         ├── ServerVars / Parameters / body / Session
//!         ├── path ─► parse_path ─► PathParams { kiosk, scope, action }
//!         ├── scope ─► CommandMapSource ─► CommandMap
//!         ├── action ─► resolve_command ─► CommandRecord
//!         └── base_url ─► build_url / send_redirect
//! ```
//!
//! # Request paths
//!
//! | Order | Shape | Example |
//! |-------|-------|---------|
//! | scope-first (default) | `<scope>/<kiosk>/<action>.do` | `/api/nusbaum/build.do` |
//! | kiosk-first | `<kiosk>/<scope>/<action>.do` | `/nusbaum/api/build.do` |
//!
//! Every segment is optional. A missing scope defaults to the first scope in
//! the list, or the last one when a kiosk is present. Anything left over
//! makes the path malformed and every parameter `None`.
//!
//! # Features
//!
//! - `server` (default) - axum router, tokio runtime, log subscriber, `cope` CLI
//!
//! # Usage
//!
//! ```ignore
//! use cope::{Application, RequestContext, ServerVars, UrlParams};
//! use std::sync::Arc;
//!
//! let app = Arc::new(Application::with_scope_list("api|web|webhook").with_map_dir("maps"));
//! let ctx = RequestContext::new(app, ServerVars::from_pairs([("REQUEST_URI", "/api/nusbaum/build.do")]));
//!
//! assert_eq!(ctx.scope(), Some("api"));
//! let page = ctx.command().and_then(|c| c.page.clone());
//! let next = ctx.build_url(&UrlParams::action("list"));
//! ```

// =============================================================================
// Core modules (no runtime dependencies)
// =============================================================================
pub mod app;
pub mod context;
pub mod core;
pub mod error;
pub mod maps;
pub mod session;

// =============================================================================
// Server modules (axum, tokio, tracing-subscriber)
// =============================================================================
#[cfg(feature = "server")]
pub mod logging;
#[cfg(feature = "server")]
pub mod runtime;
#[cfg(feature = "server")]
pub mod server;

// =============================================================================
// Re-exports
// =============================================================================
pub use app::{Application, Env, EnvValue, DEFAULT_LOGON_URI};
pub use context::{ContextSnapshot, Message, MessageKind, Parameters, Redirect, RequestContext, ServerVars};
pub use core::{
    build_url, parse_path, resolve_command, CommandEntry, CommandMap, CommandOverrides, CommandRecord, PathOrder,
    PathParams, ScopeList, UrlParams,
};
pub use error::{CopeError, CopeResult};
pub use maps::{discover_scopes, CommandMapSource, JsonMapSource, StaticMapSource};
pub use session::{MemorySession, Session};

#[cfg(feature = "server")]
pub use runtime::{install_signal_handlers, Shutdown};
#[cfg(feature = "server")]
pub use server::{create_router, create_router_with_name};
