//! Application configuration

mod app_config;

pub use app_config::{DatabaseConfig, LogFormat, LoggingConfig, RegistryConfig};
