//! Routing core: path parsing and command resolution.
//!
//! Both halves are pure; the per-request memoization lives in
//! [`crate::context::RequestContext`].

pub mod command;
pub mod paths;
pub mod href;

pub use command::{resolve_command, CommandEntry, CommandMap, CommandOverrides, CommandRecord};
pub use paths::{parse_path, PathOrder, PathParams, ScopeList};
pub use href::{build_url, UrlParams};
