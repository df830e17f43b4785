use std::any::Any;

use thiserror::Error;

use crate::{ConfigError, ErrorExt, StatusCode};

/// Ошибка создания движка.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Сериализатору нужен запущенный рантайм Tokio.
    #[error("no tokio runtime available: {reason}")]
    NoRuntime { reason: String },
}

/// Ошибка ожидания сообщения из очереди доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvError {
    /// Очередь закрыта движком и вычитана до конца.
    #[error("delivery queue is closed")]
    Closed,
    /// Сообщение не пришло за отведённое время.
    #[error("operation exceeded the specified timeout")]
    Timeout,
}

/// Ошибка неблокирующего чтения из очереди доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no messages available")]
    Empty,

    #[error("delivery queue is closed")]
    Closed,
}

impl ErrorExt for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig(inner) => inner.status_code(),
            Self::NoRuntime { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for RecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed => StatusCode::QueueClosed,
            Self::Timeout => StatusCode::Timeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for TryRecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Empty => StatusCode::QueueEmpty,
            Self::Closed => StatusCode::QueueClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// === Преобразования ===

#[cfg(feature = "tokio")]
impl From<tokio::sync::mpsc::error::TryRecvError> for TryRecvError {
    fn from(err: tokio::sync::mpsc::error::TryRecvError) -> Self {
        match err {
            tokio::sync::mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            tokio::sync::mpsc::error::TryRecvError::Disconnected => TryRecvError::Closed,
        }
    }
}

#[cfg(feature = "tokio")]
impl From<tokio::time::error::Elapsed> for RecvError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RecvError::Timeout
    }
}
