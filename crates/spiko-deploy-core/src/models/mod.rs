//! Data models for deploy configuration, secrets and routes

pub mod config;
pub mod route;
pub mod secret;

pub use config::{ConfigLayer, DeployConfig, ProjectRef};
pub use route::{HttpMethod, Route, ROUTES};
pub use secret::{ResolvedSecret, SecretKey, SecretSet, SecretSource, SecretValue};
