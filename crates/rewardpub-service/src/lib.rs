//! Process entry point support: configuration, component wiring and shutdown signals.

pub mod config;
pub mod app;
pub mod shutdown;

pub use config::ServiceConfig;
