//! URL building for `<scope>/<kiosk>/<action>.do` links

use super::paths::{PathOrder, PathParams, ACTION_SUFFIX};

/// Overrides for [`build_url`]. Unset fields come from the current request;
/// `query` pairs become the query string in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams {
    pub base_url: Option<String>,
    pub kiosk: Option<String>,
    pub scope: Option<String>,
    pub action: Option<String>,
    pub query: Vec<(String, String)>,
}

impl UrlParams {
    pub fn new() -> Self { Self::default() }

    pub fn action(action: impl Into<String>) -> Self {
        Self { action: Some(action.into()), ..Default::default() }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self { self.base_url = Some(url.into()); self }
    pub fn with_kiosk(mut self, kiosk: impl Into<String>) -> Self { self.kiosk = Some(kiosk.into()); self }
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self { self.scope = Some(scope.into()); self }
    pub fn with_action(mut self, action: impl Into<String>) -> Self { self.action = Some(action.into()); self }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Split `key=value` pairs, routing `baseUrl`, `kiosk`, `scope` and
    /// `action` to their fields and everything else to the query.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            match k.as_str() {
                "baseUrl" => params.base_url = Some(v),
                "kiosk" => params.kiosk = Some(v),
                "scope" => params.scope = Some(v),
                "action" => params.action = Some(v),
                _ => params.query.push((k, v)),
            }
        }
        params
    }
}

/// Build a link from the base URL and the current path parameters, with the
/// segment order matching the parser's.
pub fn build_url(base_url: &str, current: &PathParams, params: &UrlParams, order: PathOrder) -> String {
    let mut url = params.base_url.clone().unwrap_or_else(|| base_url.to_string());

    let kiosk = params.kiosk.as_deref().or(current.kiosk.as_deref()).filter(|k| !k.is_empty());
    let scope = params.scope.as_deref().or(current.scope.as_deref());
    let action = params.action.as_deref().or(current.action.as_deref());

    let segments: [Option<&str>; 2] = match order {
        PathOrder::KioskFirst => [kiosk, scope],
        PathOrder::ScopeFirst => [scope, kiosk],
    };
    for segment in segments.into_iter().flatten() {
        url.push('/');
        url.push_str(segment);
    }

    if let Some(action) = action {
        url.push('/');
        url.push_str(action);
        url.push_str(ACTION_SUFFIX);
    }

    if !params.query.is_empty() {
        url.push('?');
        url.push_str(&serde_urlencoded::to_string(&params.query).unwrap_or_default());
    }
    url
}
