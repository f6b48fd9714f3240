//! Application - process-wide configuration shared by every request

mod config;
pub mod env;

pub use config::{Application, DEFAULT_LOGON_URI};
pub use env::{Env, EnvValue};
