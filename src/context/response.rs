//! User messages and redirects recorded on a request

use serde::{Deserialize, Serialize};

/// Session attribute that carries messages across a redirect.
pub const MESSAGES_KEY: &str = "MESSAGES";

/// Statuses that count as a redirect.
pub const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Success,
    Notice,
    Warning,
    Error,
}

/// A message for the user page, optionally tied to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Message {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), field: None }
    }

    pub fn for_field(mut self, field: impl Into<String>) -> Self { self.field = Some(field.into()); self }
}

/// Redirect to send to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub location: String,
    pub status: u16,
}

impl Redirect {
    /// 303 for HTTP/1.1 clients, 302 otherwise.
    pub fn default_status(protocol: &str) -> u16 {
        if protocol.find("1.1").is_some_and(|pos| pos > 0) { 303 } else { 302 }
    }
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for Redirect {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{header, StatusCode};
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::SEE_OTHER);
        (status, [(header::LOCATION, self.location)]).into_response()
    }
}
