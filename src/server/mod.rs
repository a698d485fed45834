//! Server module

pub mod config;
pub mod hyper_server;

pub use config::{ConfigError, ServerConfig};
pub use hyper_server::HttpServer;
