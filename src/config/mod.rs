//! Engine configuration.

pub mod settings;

pub use settings::{EngineConfig, EngineConfigBuilder, DEFAULT_CAPACITY};
