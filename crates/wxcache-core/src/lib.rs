pub mod config;
pub mod error;

pub use config::{Config, NetworkConfig, StorageConfig, ValidationResult, WeatherConfig};
pub use error::ConfigError;

/// Initialize logging for a wxcache process.
///
/// Reads the filter from `RUST_LOG`, falling back to `info`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("wxcache core initialized");
}
