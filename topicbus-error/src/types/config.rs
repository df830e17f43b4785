use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки создания движка из конфигурации.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Ёмкость очереди доставки должна быть не меньше 1.
    #[error("invalid queue capacity {capacity}: must be at least 1")]
    InvalidCapacity { capacity: usize },

    /// Не удалось собрать или десериализовать конфигурацию.
    #[error("failed to load configuration: {reason}")]
    Load { reason: String },
}

/// Ошибки инициализации логирования.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingError {
    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("global tracing subscriber already installed: {reason}")]
    AlreadyInitialized { reason: String },
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCapacity { .. } => StatusCode::InvalidConfig,
            Self::Load { .. } => StatusCode::ConfigLoadFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        StatusCode::LoggingInitFailed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
