//! HTTP adapter: serves `<scope>/<kiosk>/<action>.do` requests through a
//! [`RequestContext`](crate::context::RequestContext) per request.

pub mod routes;

pub use routes::{create_router, create_router_with_name, dispatch, AppState};
