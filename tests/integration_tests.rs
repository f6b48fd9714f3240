//! Integration Tests: map files, environment configuration, request flow
//!
//! These tests verify:
//! 1. Command maps load from `<map_dir>/<scope>.json`
//! 2. Scope lists are discovered from map files
//! 3. `COPE_*` variables configure the application
//! 4. A request resolves its command and builds links end to end

use cope::{Application, CopeError, Env, RequestContext, ServerVars, UrlParams};
use once_cell::sync::Lazy;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

fn write_map(dir: &Path, scope: &str, map: serde_json::Value) {
    std::fs::write(dir.join(format!("{scope}.json")), map.to_string()).expect("write map");
}

/// Base dir with `maps/api.json` and `maps/web.json`.
fn fixture() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let maps = dir.path().join("maps");
    std::fs::create_dir(&maps).expect("maps dir");
    write_map(&maps, "api", json!({
        "": { "page": "home.php" },
        "build": { "page": "build.php", "post": "build_post.php", "authenticate": false },
        "status": { "record": { "get": "status.php", "session": false } },
        "open": { "validate": null, "access_level": 0 }
    }));
    write_map(&maps, "web", json!({
        "home": { "page": "home.php" }
    }));
    dir
}

fn request(app: &Arc<Application>, uri: &str) -> RequestContext {
    RequestContext::new(app.clone(), ServerVars::from_pairs([("REQUEST_URI", uri), ("SCRIPT_NAME", "/index")]))
}

/// Test: Sparse, full and fallback entries resolve from a map file
#[test]
fn map_file_resolution() {
    let dir = fixture();
    let defaults = json!({ "validate": "check.php", "access_level": 5 }).to_string();
    let app = Application::with_scope_list("api|web|webhook")
        .with_base_dir(dir.path())
        .with_command_defaults_json(&defaults)
        .expect("defaults");
    let app = Arc::new(app);

    // Sparse entry merged over the application defaults
    let ctx = request(&app, "/api/nusbaum/build.do");
    let cmd = ctx.command().expect("build");
    assert_eq!(cmd.page.as_deref(), Some("build.php"));
    assert!(!cmd.authenticate);
    assert_eq!(cmd.validate.as_deref(), Some("check.php"));
    assert_eq!(cmd.access_level, 5);
    assert_eq!(ctx.command_page(), Some(dir.path().join("pages").join("api").join("build.php")));

    // Full record ignores the application defaults
    let ctx = request(&app, "/api/status.do");
    let cmd = ctx.command().expect("status");
    assert!(!cmd.session);
    assert_eq!(cmd.validate, None);
    assert_eq!(cmd.access_level, 1);

    // Explicit null clears a default
    let ctx = request(&app, "/api/open.do");
    let cmd = ctx.command().expect("open");
    assert_eq!(cmd.validate, None);
    assert_eq!(cmd.access_level, 0);

    // Unknown action falls back to the "" entry
    let ctx = request(&app, "/api/unknown.do");
    assert_eq!(ctx.command().and_then(|c| c.page.as_deref()), Some("home.php"));

    // No fallback in web, no map at all for webhook
    assert!(request(&app, "/web/unknown.do").command().is_none());
    assert!(request(&app, "/webhook/ping.do").command().is_none());
}

/// Test: A broken map file degrades to "no command"
#[test]
fn broken_map_file() {
    let dir = fixture();
    std::fs::write(dir.path().join("maps").join("web.json"), "{ not json").expect("write");
    let app = Application::with_scope_list("api|web").with_base_dir(dir.path());

    match app.load_map("web") {
        Err(CopeError::MapParse { path, .. }) => assert!(path.ends_with("web.json")),
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(matches!(app.load_map("missing"), Err(CopeError::MapNotFound(_))));

    let app = Arc::new(app);
    let ctx = request(&app, "/web/home.do");
    assert_eq!(ctx.scope(), Some("web"));
    assert!(ctx.command().is_none());
}

/// Test: Scope list discovered from map file names
#[test]
fn discovered_scope_list() {
    let dir = fixture();
    let app = Application::discover(dir.path().join("maps")).expect("discover");
    assert_eq!(app.scopes().to_string(), "api|web");

    let empty = TempDir::new().expect("tempdir");
    assert!(matches!(Application::discover(empty.path()), Err(CopeError::EmptyScopeList)));
}

/// Test: COPE_* environment variables configure the application
#[test]
fn application_from_process_env() {
    let _guard = lock_env();
    let dir = fixture();
    std::env::set_var("COPE_SCOPE_LIST", "api | web");
    std::env::set_var("COPE_BASE_DIR", dir.path());
    std::env::set_var("COPE_KIOSK_FIRST", "(true)");
    std::env::set_var("COPE_TRUST_PROXY", "yes");
    std::env::set_var("COPE_LOGON_URI", "\"signin.do\"");

    let app = Application::from_env(&Env::from_process()).expect("app");

    for key in ["COPE_SCOPE_LIST", "COPE_BASE_DIR", "COPE_KIOSK_FIRST", "COPE_TRUST_PROXY", "COPE_LOGON_URI"] {
        std::env::remove_var(key);
    }

    assert_eq!(app.scopes().to_string(), "api|web");
    assert!(app.is_kiosk_first());
    assert!(app.trust_proxy());
    assert_eq!(app.logon_uri(), "signin.do");
    assert_eq!(app.map_dir(), dir.path().join("maps"));
    assert!((1..=7).contains(&app.id().len()));
}

/// Test: Without a scope list the map directory supplies one
#[test]
fn application_from_env_discovers_scopes() {
    let dir = fixture();
    let env = Env::from_pairs([("COPE_BASE_DIR", dir.path().display().to_string())]);
    let app = Application::from_env(&env).expect("app");
    assert_eq!(app.scopes().to_string(), "api|web");
    assert!(!app.is_kiosk_first());

    let bad = Env::from_pairs([("COPE_SCOPE_LIST", "api"), ("COPE_COMMAND_DEFAULTS", "[1, 2]")]);
    assert!(matches!(Application::from_env(&bad), Err(CopeError::InvalidDefaults(_))));
}

/// Test: A request flows from path to command to links and redirects
#[test]
fn request_flow_end_to_end() {
    let dir = fixture();
    let app = Arc::new(Application::with_scope_list("api|web|webhook").with_base_dir(dir.path()));

    let server = ServerVars::from_pairs([
        ("REQUEST_URI", "/shop/api/nusbaum/build.do?item=7"),
        ("SCRIPT_NAME", "/shop/index.php"),
        ("HTTP_HOST", "example.com"),
        ("SERVER_PORT", "8080"),
    ]);
    let mut ctx = RequestContext::new(app, server);

    assert_eq!(ctx.path(), "/api/nusbaum/build.do");
    assert_eq!((ctx.scope(), ctx.kiosk(), ctx.action()), (Some("api"), Some("nusbaum"), Some("build")));
    assert_eq!(ctx.command_field("post"), Some(json!("build_post.php")));
    assert_eq!(ctx.url_base(), "http://example.com:8080/shop");

    let next = ctx.build_url(&UrlParams::action("status").with_query("from", "build"));
    assert_eq!(next, "http://example.com:8080/shop/shop/api/nusbaum/status.do?from=build");

    let redirect = ctx.send_redirect("web/home.do", None);
    assert_eq!(redirect.location, "http://example.com:8080/shop/shop/web/home.do");
    assert_eq!(redirect.status, 303);
}

/// Test: Kiosk-first links parse back under kiosk-first order only
#[test]
fn kiosk_first_round_trip() {
    let app = Arc::new(Application::with_scope_list("api|web|webhook").with_kiosk_first(true));
    let ctx = request(&app, "/nusbaum/web/home.do");
    assert_eq!((ctx.kiosk(), ctx.scope(), ctx.action()), (Some("nusbaum"), Some("web"), Some("home")));

    let link = ctx.build_url(&UrlParams::new().with_base_url("").with_scope("api"));
    assert_eq!(link, "/nusbaum/api/home.do");

    let kiosk_first = request(&app, &link);
    assert_eq!(kiosk_first.scope(), Some("api"));

    let scope_first = Arc::new(Application::with_scope_list("api|web|webhook"));
    assert!(request(&scope_first, &link).path_params().is_empty());
}
