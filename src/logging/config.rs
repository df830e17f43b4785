use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Формат вывода логов.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Уровни для отдельных целей, например `topicbus::pubsub = "trace"`.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
    #[serde(default)]
    pub format: LogFormat,
    /// ANSI-цвета в выводе.
    #[serde(default = "default_true")]
    pub ansi: bool,
    /// Печатать цель события (`target`).
    #[serde(default = "default_true")]
    pub with_target: bool,
}

impl LoggingConfig {
    /// Собирает директиву для `EnvFilter`: базовый уровень и уровни
    /// целей через запятую.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![self.level.clone()];
        parts.extend(
            self.targets
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        parts.join(",")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            targets: BTreeMap::new(),
            format: LogFormat::default(),
            ansi: true,
            with_target: true,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
