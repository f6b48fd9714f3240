//! CGI-style server variables and request headers

use std::collections::HashMap;

/// Headers stored without the `HTTP_` prefix.
const UNPREFIXED_HEADERS: &[&str] = &["CONTENT_TYPE", "CONTENT_LENGTH", "CONTENT_MD5"];

/// Server variables for one request, seeded with local defaults.
#[derive(Debug, Clone)]
pub struct ServerVars {
    vars: HashMap<String, String>,
}

impl Default for ServerVars {
    fn default() -> Self { Self::new() }
}

impl ServerVars {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let defaults = [
            ("SERVER_NAME", "localhost".to_string()),
            ("SERVER_PORT", "80".to_string()),
            ("HTTP_HOST", "localhost".to_string()),
            ("HTTP_USER_AGENT", "Cope".to_string()),
            ("REMOTE_ADDR", "127.0.0.1".to_string()),
            ("SCRIPT_NAME", String::new()),
            ("SERVER_PROTOCOL", "HTTP/1.1".to_string()),
            ("REQUEST_TIME", now.timestamp().to_string()),
            ("REQUEST_TIME_FLOAT", format!("{:.3}", now.timestamp_millis() as f64 / 1000.0)),
        ];
        Self { vars: defaults.into_iter().map(|(k, v)| (k.to_string(), v)).collect() }
    }

    /// Defaults overlaid with `pairs`.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut server = Self::new();
        server.vars.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        server
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> { self.vars.get(name).map(String::as_str) }

    /// Request header by its HTTP name (`Content-Type`, `X-Forwarded-Host`).
    pub fn header(&self, name: &str) -> Option<&str> {
        let key = header_key(name)?;
        self.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Server variable name for an HTTP header name.
pub fn header_key(name: &str) -> Option<String> {
    let key = name.replace('-', "_").to_ascii_uppercase();
    if key.is_empty() {
        return None;
    }
    if UNPREFIXED_HEADERS.contains(&key.as_str()) {
        Some(key)
    } else {
        Some(format!("HTTP_{key}"))
    }
}

#[cfg(feature = "server")]
impl ServerVars {
    /// Variables for an incoming axum/http request.
    pub fn from_parts(parts: &axum::http::request::Parts, script_name: &str) -> Self {
        let mut server = Self::new()
            .with("REQUEST_METHOD", parts.method.as_str())
            .with("REQUEST_URI", parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"))
            .with("QUERY_STRING", parts.uri.query().unwrap_or(""))
            .with("SERVER_PROTOCOL", format!("{:?}", parts.version))
            .with("SCRIPT_NAME", script_name);

        for (name, value) in &parts.headers {
            if let (Some(key), Ok(value)) = (header_key(name.as_str()), value.to_str()) {
                server.vars.insert(key, value.to_string());
            }
        }

        let authority = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| server.header("Host").map(str::to_string));
        if let Some(authority) = authority {
            let (name, port) = match authority.rsplit_once(':') {
                Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => (name.to_string(), Some(port.to_string())),
                _ => (authority.clone(), None),
            };
            server.vars.insert("SERVER_NAME".into(), name);
            if let Some(port) = port {
                server.vars.insert("SERVER_PORT".into(), port);
            }
        }

        if parts.uri.scheme_str() == Some("https") {
            server.vars.insert("HTTPS".into(), "on".into());
            if parts.uri.port_u16().is_none() && !server.vars.get("HTTP_HOST").is_some_and(|h| h.contains(':')) {
                server.vars.insert("SERVER_PORT".into(), "443".into());
            }
        }
        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = ServerVars::from_pairs([("SERVER_NAME", "nohost")]);
        assert_eq!(server.get("SERVER_NAME"), Some("nohost"));
        assert_eq!(server.get("SERVER_PORT"), Some("80"));
        assert_eq!(server.get("SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert!(server.get("REQUEST_TIME").is_some());
    }

    #[test]
    fn test_header_names() {
        let server = ServerVars::new()
            .with("CONTENT_TYPE", "application/json")
            .with("HTTP_X_FORWARDED_HOST", "proxy.example.com");
        assert_eq!(server.header("content-type"), Some("application/json"));
        assert_eq!(server.header("X-Forwarded-Host"), Some("proxy.example.com"));
        assert_eq!(server.header("Host"), Some("localhost"));
        assert_eq!(server.header(""), None);
        assert_eq!(header_key("Content-Length").as_deref(), Some("CONTENT_LENGTH"));
    }

    #[cfg(feature = "server")]
    #[test]
    fn test_from_parts() {
        use axum::http::Request;

        let (parts, _) = Request::builder()
            .method("POST")
            .uri("/app/api/build.do?x=1")
            .header("Host", "example.com:8080")
            .header("Content-Type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let server = ServerVars::from_parts(&parts, "/app/index");
        assert_eq!(server.get("REQUEST_METHOD"), Some("POST"));
        assert_eq!(server.get("REQUEST_URI"), Some("/app/api/build.do?x=1"));
        assert_eq!(server.get("QUERY_STRING"), Some("x=1"));
        assert_eq!(server.get("SERVER_NAME"), Some("example.com"));
        assert_eq!(server.get("SERVER_PORT"), Some("8080"));
        assert_eq!(server.get("SCRIPT_NAME"), Some("/app/index"));
        assert_eq!(server.header("Content-Type"), Some("application/json"));
        assert_eq!(server.header("Host"), Some("example.com:8080"));
    }
}
