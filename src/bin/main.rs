//! Cope CLI - inspect routing and serve requests
//!
//!   cope parse <path>              → Kiosk, scope and action for a path
//!   cope resolve <path>            → Command resolved for a path
//!   cope href <path> [k=v ...]     → Link built from a path plus overrides
//!   cope snapshot <uri>            → Every derived value of a request context
//!   cope serve                     → HTTP server answering with snapshots
//!
//! Configuration (flags win over COPE_* variables, which may come from .env):
//!   --scopes <a|b|c>   COPE_SCOPE_LIST    (else derived from map files)
//!   --kiosk-first      COPE_KIOSK_FIRST
//!   --trust-proxy      COPE_TRUST_PROXY
//!   --map-dir <dir>    COPE_MAP_DIR
//!   --base-dir <dir>   COPE_BASE_DIR
//!   --base-url <url>   (href, snapshot)
//!   --port <port>      COPE_PORT (serve, default 8080)
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use anyhow::{anyhow, bail, Context as _, Result};
use cope::logging::init_logging;
use cope::{parse_path, Application, Env, RequestContext, ServerVars, UrlParams};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_PORT: u16 = 8080;

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("cope {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("parse") => cmd_parse(&opts),
        Some("resolve") => cmd_resolve(&opts),
        Some("href") | Some("url") => cmd_href(&opts),
        Some("snapshot") => cmd_snapshot(&opts),
        Some("serve") => cmd_serve(&opts),
        Some(cmd) => Err(anyhow!("Unknown command: {cmd}")),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = !opts.json && (opts.pretty || std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{e:#}")}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    path: Option<String>,
    pairs: Vec<(String, String)>,
    // Application options
    scopes: Option<String>,
    kiosk_first: bool,
    trust_proxy: bool,
    map_dir: Option<String>,
    base_dir: Option<String>,
    base_url: Option<String>,
    // Server options
    port: Option<u16>,
    // Output options
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv(".env");

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--kiosk-first" => opts.kiosk_first = true,
                "--trust-proxy" => opts.trust_proxy = true,
                "--scopes" | "-s" => {
                    opts.scopes = value;
                    i += 1;
                }
                "--map-dir" | "-m" => {
                    opts.map_dir = value;
                    i += 1;
                }
                "--base-dir" | "-d" => {
                    opts.base_dir = value;
                    i += 1;
                }
                "--base-url" | "-b" => {
                    opts.base_url = value;
                    i += 1;
                }
                "--port" | "-p" => {
                    opts.port = value.and_then(|v| v.parse().ok());
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // First positional is the command, second the path, the rest k=v pairs
        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.path = positional.next();
        opts.pairs = positional
            .filter_map(|p| p.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect();

        if opts.port.is_none() {
            opts.port = env::var("COPE_PORT").ok().and_then(|p| p.parse().ok());
        }
        opts
    }

    /// Process environment with the command line flags layered on top.
    fn env(&self) -> Env {
        let mut vars: Vec<(String, String)> = env::vars().collect();
        let mut set = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                vars.push((key.to_string(), value.to_string()));
            }
        };
        set("COPE_SCOPE_LIST", self.scopes.as_deref());
        set("COPE_MAP_DIR", self.map_dir.as_deref());
        set("COPE_BASE_DIR", self.base_dir.as_deref());
        set("COPE_KIOSK_FIRST", self.kiosk_first.then_some("true"));
        set("COPE_TRUST_PROXY", self.trust_proxy.then_some("true"));
        Env::from_pairs(vars)
    }

    fn application(&self) -> Result<Application> {
        let app = Application::from_env(&self.env()).context("Failed to configure application")?;
        debug!(?app, "application");
        Ok(app)
    }

    fn require_path(&self) -> Result<&str> {
        self.path.as_deref().ok_or_else(|| anyhow!("Missing path argument"))
    }
}

/// Set variables from a `.env` file without overriding the environment.
fn load_dotenv(file: &str) {
    let Ok(contents) = std::fs::read_to_string(file) else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() && env::var(key).is_err() {
                env::set_var(key, value.trim());
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"cope - command-driven request routing

USAGE:
    cope <COMMAND> [OPTIONS]

COMMANDS:
    parse <path>             Parse kiosk, scope and action from a path
    resolve <path>           Resolve the command for a path
    href <path> [k=v ...]    Build a link (keys: scope, kiosk, action, baseUrl; others become the query)
    snapshot <uri>           Show every derived value of a request context
    serve                    Start the HTTP server

OPTIONS:
    -s, --scopes <list>      Scope list, e.g. "api|web|webhook" (COPE_SCOPE_LIST)
        --kiosk-first        Paths are <kiosk>/<scope>/<action>.do (COPE_KIOSK_FIRST)
        --trust-proxy        Honor X-Forwarded-Proto/Host (COPE_TRUST_PROXY)
    -m, --map-dir <dir>      Command map directory (COPE_MAP_DIR)
    -d, --base-dir <dir>     Application base directory (COPE_BASE_DIR)
    -b, --base-url <url>     Base URL for href and snapshot
    -p, --port <port>        Server port (COPE_PORT, default 8080)
    --json                   Output raw JSON
    --pretty                 Pretty-print JSON
    -h, --help               Show this help
    -V, --version            Show version

EXAMPLES:
    cope parse /api/nusbaum/build.do --scopes "api|web|webhook"
    cope resolve /web/home.do --map-dir ./maps
    cope href /api/nusbaum/build.do action=list page=2
    cope serve --port 8080 --trust-proxy"#
    );
}

/// Context for a request URI as seen by the CLI.
fn context_for(opts: &ParsedArgs, app: Application, uri: &str) -> Result<RequestContext> {
    let query = uri.split_once('?').map(|(_, q)| q).unwrap_or_default();
    let server = ServerVars::from_pairs([("REQUEST_URI", uri), ("QUERY_STRING", query), ("REQUEST_METHOD", "GET")]);
    let mut ctx = RequestContext::new(Arc::new(app), server).with_parameters(cope::Parameters::from_urlencoded(query));
    if let Some(base_url) = opts.base_url.as_deref() {
        ctx.set_base_url(base_url)?;
    }
    Ok(ctx)
}

fn cmd_parse(opts: &ParsedArgs) -> Result<Value> {
    let path = opts.require_path()?;
    let app = opts.application()?;
    let params = parse_path(path, app.scopes(), app.order());
    Ok(json!({
        "path": path,
        "order": app.order().as_str(),
        "scopes": app.scopes().to_string(),
        "kiosk": params.kiosk,
        "scope": params.scope,
        "action": params.action,
        "malformed": params.is_empty(),
    }))
}

fn cmd_resolve(opts: &ParsedArgs) -> Result<Value> {
    let path = opts.require_path()?;
    let app = opts.application()?;
    let ctx = context_for(opts, app, path)?;
    Ok(json!({
        "pathParams": ctx.path_params(),
        "command": ctx.command(),
        "page": ctx.command_page(),
    }))
}

fn cmd_href(opts: &ParsedArgs) -> Result<Value> {
    let path = opts.require_path()?;
    let app = opts.application()?;
    let ctx = context_for(opts, app, path)?;
    let params = UrlParams::from_pairs(opts.pairs.iter().cloned());
    Ok(json!({ "url": ctx.build_url(&params) }))
}

fn cmd_snapshot(opts: &ParsedArgs) -> Result<Value> {
    let uri = opts.require_path()?;
    let app = opts.application()?;
    Ok(context_for(opts, app, uri)?.to_json())
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Value> {
    use cope::{create_router, install_signal_handlers};

    let port = opts.port.unwrap_or(DEFAULT_PORT);
    let app = Arc::new(opts.application()?);
    if app.scopes().is_empty() {
        bail!("No scopes configured; pass --scopes or set COPE_SCOPE_LIST");
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(async {
        let shutdown = install_signal_handlers();

        let addr = format!("0.0.0.0:{port}");
        info!(scopes = %app.scopes(), order = app.order().as_str(), "Cope server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /health                     - Health check");
        info!("  ANY  /<scope>/<kiosk>/<action>.do - Request context snapshot");

        let router = create_router(app.clone());
        let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {addr}"))?;

        let signal = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.wait().await })
            .await
            .context("Server error")?;
        info!("Server stopped");
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(json!({"status": "stopped"}))
}
