use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use topicbus_error::ConfigError;

/// Ёмкость очереди доставки по умолчанию.
pub const DEFAULT_CAPACITY: usize = 64;

/// Префикс переменных окружения.
const ENV_PREFIX: &str = "TOPICBUS";

/// Параметры движка.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ёмкость каждой очереди доставки, выданной движком (не меньше 1).
    pub capacity: usize,
}

#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    capacity: Option<usize>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl EngineConfig {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Проверяет параметры.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Загружает конфигурацию: значения по умолчанию, поверх них
    /// переменные окружения с префиксом `TOPICBUS_`.
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("capacity", DEFAULT_CAPACITY as i64)
            .map_err(load_error)?
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(load_error)?;

        let settings: Self = cfg.try_deserialize().map_err(load_error)?;
        settings.validate()?;
        Ok(settings)
    }
}

impl EngineConfigBuilder {
    pub fn capacity(
        mut self,
        capacity: usize,
    ) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn build(self) -> EngineConfig {
        let default = EngineConfig::default();
        EngineConfig {
            capacity: self.capacity.unwrap_or(default.capacity),
        }
    }
}

fn load_error(err: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
