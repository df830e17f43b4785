//! Logging setup on top of `tracing-subscriber`.
//!
//! The engine only emits `tracing` events; installing a subscriber is up to
//! the application. [`init_logging`] is the stock way to do it.

pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use formatter::build_formatter;
use topicbus_error::LoggingError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

/// Устанавливает глобальный subscriber по конфигурации.
///
/// Повторная инициализация возвращает `LoggingError::AlreadyInitialized`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_filter_from_config(config)?;
    let fmt_layer = build_formatter::<Registry>(config);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized {
            reason: e.to_string(),
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        directive = %config.build_filter_directive(),
        format = ?config.format,
        "Logging system initialized"
    );
    Ok(())
}
