//! Request path parsing: `<scope>/<kiosk>/<action>.do` or `<kiosk>/<scope>/<action>.do`
//!
//! The parser is a pure function over the path, the scope list and the
//! segment order. A path that leaves unrecognized segments behind parses to
//! an all-`None` [`PathParams`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix that marks the action segment.
pub const ACTION_SUFFIX: &str = ".do";

/// Separator between scope names in a scope list string.
pub const SCOPE_SEPARATOR: char = '|';

/// Characters trimmed from both ends of a request path.
const PATH_TRIM: &[char] = &['/', ' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Characters trimmed from a kiosk segment.
const KIOSK_TRIM: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Order of the scope and kiosk segments in a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathOrder {
    /// `<scope>/<kiosk>/<action>.do`
    #[default]
    ScopeFirst,
    /// `<kiosk>/<scope>/<action>.do`
    KioskFirst,
}

impl PathOrder {
    pub fn from_kiosk_first(kiosk_first: bool) -> Self {
        if kiosk_first { Self::KioskFirst } else { Self::ScopeFirst }
    }

    pub fn is_kiosk_first(&self) -> bool { matches!(self, Self::KioskFirst) }

    pub fn as_str(&self) -> &'static str {
        match self {
            PathOrder::ScopeFirst => "scope-first",
            PathOrder::KioskFirst => "kiosk-first",
        }
    }
}

/// Ordered list of valid scope names.
///
/// The first entry is the default scope. The last entry is the default when
/// the path names a kiosk but no scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeList(Vec<String>);

impl ScopeList {
    /// Parse a `|` separated list. Spaces are removed and empty names dropped.
    pub fn parse(list: &str) -> Self {
        let compact: String = list.chars().filter(|c| *c != ' ').collect();
        Self(
            compact
                .split(SCOPE_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect())
    }

    pub fn contains(&self, name: &str) -> bool { self.0.iter().any(|s| s == name) }
    pub fn first(&self) -> Option<&str> { self.0.first().map(String::as_str) }
    pub fn last(&self) -> Option<&str> { self.0.last().map(String::as_str) }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.0.iter().map(String::as_str) }
}

impl fmt::Display for ScopeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Kiosk, scope and action parsed from a request path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParams {
    pub kiosk: Option<String>,
    pub scope: Option<String>,
    pub action: Option<String>,
}

impl PathParams {
    pub fn new(kiosk: Option<&str>, scope: Option<&str>, action: Option<&str>) -> Self {
        Self {
            kiosk: kiosk.map(str::to_string),
            scope: scope.map(str::to_string),
            action: action.map(str::to_string),
        }
    }

    /// True when no field is set, which is how a malformed path parses.
    pub fn is_empty(&self) -> bool {
        self.kiosk.is_none() && self.scope.is_none() && self.action.is_none()
    }
}

/// Parse a request path into kiosk, scope and action.
pub fn parse_path(path: &str, scopes: &ScopeList, order: PathOrder) -> PathParams {
    let mut parts: Vec<&str> = path.trim_matches(PATH_TRIM).split('/').collect();
    let mut params = PathParams::default();

    if let Some(last) = parts.last() {
        if last.len() > ACTION_SUFFIX.len() && last.ends_with(ACTION_SUFFIX) {
            let segment = parts.pop().unwrap_or_default();
            params.action = Some(segment[..segment.len() - ACTION_SUFFIX.len()].to_string());
        }
    }

    match order {
        PathOrder::KioskFirst => {
            if parts.last().is_some_and(|s| scopes.contains(s)) {
                params.scope = parts.pop().map(str::to_string);
            }
        }
        PathOrder::ScopeFirst => {
            if parts.first().is_some_and(|s| scopes.contains(s)) {
                params.scope = Some(parts.remove(0).to_string());
            }
        }
    }

    if parts.len() == 1 {
        params.kiosk = parts
            .pop()
            .map(|s| s.trim_matches(KIOSK_TRIM))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    if !parts.is_empty() {
        tracing::debug!(path, leftover = parts.len(), "malformed request path");
        return PathParams::default();
    }

    if params.scope.is_none() {
        let fallback = if params.kiosk.is_some() { scopes.last() } else { scopes.first() };
        params.scope = fallback.map(str::to_string);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> ScopeList { ScopeList::parse("api|web|webhook") }

    fn parse(path: &str) -> PathParams { parse_path(path, &scopes(), PathOrder::ScopeFirst) }

    #[test]
    fn test_scope_list_parse() {
        let list = ScopeList::parse(" api | web|webhook ");
        assert_eq!(list.len(), 3);
        assert_eq!(list.first(), Some("api"));
        assert_eq!(list.last(), Some("webhook"));
        assert!(list.contains("web"));
        assert!(!list.contains("we"));
        assert_eq!(list.to_string(), "api|web|webhook");
        assert!(ScopeList::parse("").is_empty());
    }

    #[test]
    fn test_scope_first_full_path() {
        assert_eq!(parse("api/nusbaum/build.do"), PathParams::new(Some("nusbaum"), Some("api"), Some("build")));
    }

    #[test]
    fn test_scope_first_no_scope() {
        assert_eq!(parse("nusbaum/build.do"), PathParams::new(Some("nusbaum"), Some("webhook"), Some("build")));
    }

    #[test]
    fn test_scope_first_no_kiosk() {
        assert_eq!(parse("webhook/build.do"), PathParams::new(None, Some("webhook"), Some("build")));
    }

    #[test]
    fn test_scope_first_action_only() {
        assert_eq!(parse("build.do"), PathParams::new(None, Some("api"), Some("build")));
    }

    #[test]
    fn test_scope_first_kiosk_only() {
        assert_eq!(parse("nusbaum"), PathParams::new(Some("nusbaum"), Some("webhook"), None));
    }

    #[test]
    fn test_too_many_segments() {
        assert!(parse("api/smurf/nusbaum/build.do").is_empty());
        assert!(parse("api/extra/kiosk/action.do").is_empty());
    }

    #[test]
    fn test_empty_and_root_paths() {
        let expected = PathParams::new(None, Some("api"), None);
        assert_eq!(parse(""), expected);
        assert_eq!(parse("/"), expected);
        assert_eq!(parse(" //\t\n"), expected);
    }

    #[test]
    fn test_trims_slashes_and_whitespace() {
        assert_eq!(parse("/api/nusbaum/build.do/\n"), PathParams::new(Some("nusbaum"), Some("api"), Some("build")));
    }

    #[test]
    fn test_action_suffix_rules() {
        // ".do" alone is not an action; it is left as a kiosk.
        assert_eq!(parse(".do"), PathParams::new(Some(".do"), Some("webhook"), None));
        // Case-sensitive suffix.
        assert_eq!(parse("build.DO"), PathParams::new(Some("build.DO"), Some("webhook"), None));
        assert_eq!(parse("a.do"), PathParams::new(None, Some("api"), Some("a")));
    }

    #[test]
    fn test_empty_kiosk_segment_is_none() {
        assert_eq!(parse("api//build.do"), PathParams::new(None, Some("api"), Some("build")));
    }

    #[test]
    fn test_kiosk_first() {
        let s = scopes();
        let kf = |p: &str| parse_path(p, &s, PathOrder::KioskFirst);
        assert_eq!(kf("nusbaum/api/build.do"), PathParams::new(Some("nusbaum"), Some("api"), Some("build")));
        assert_eq!(kf("web/build.do"), PathParams::new(None, Some("web"), Some("build")));
        assert_eq!(kf("nusbaum/build.do"), PathParams::new(Some("nusbaum"), Some("webhook"), Some("build")));
        assert!(kf("api/nusbaum/build.do").is_empty());
    }

    #[test]
    fn test_order_mismatch_fails_closed() {
        // Built kiosk-first, parsed scope-first.
        assert!(parse("nusbaum/api/build.do").is_empty());
    }

    #[test]
    fn test_empty_scope_list() {
        let params = parse_path("build.do", &ScopeList::default(), PathOrder::ScopeFirst);
        assert_eq!(params, PathParams::new(None, None, Some("build")));
    }

    #[test]
    fn test_path_order() {
        assert_eq!(PathOrder::from_kiosk_first(true), PathOrder::KioskFirst);
        assert_eq!(PathOrder::default(), PathOrder::ScopeFirst);
        assert!(!PathOrder::ScopeFirst.is_kiosk_first());
        assert_eq!(PathOrder::KioskFirst.as_str(), "kiosk-first");
    }
}
