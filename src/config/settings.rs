use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Имя необязательного файла конфигурации (без расширения).
pub const CONFIG_FILE: &str = "topicbus";

/// Настройки транспорта и endpoint'ов.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Число I/O потоков контекста ZeroMQ.
    pub io_threads: i32,
    /// Сколько publisher ждёт подтверждения закрытия сокета.
    pub close_timeout_ms: u64,
    /// Сколько subscriber ждёт ответа потока приёма на команду фильтра.
    pub command_timeout_ms: u64,
    /// Хост, на котором publisher делает bind.
    pub bind_host: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            io_threads: 1,
            close_timeout_ms: 1000,
            command_timeout_ms: 1000,
            bind_host: "*".to_string(),
        }
    }
}

impl Settings {
    /// Значения по умолчанию, затем `topicbus.toml` (если есть), затем
    /// переменные окружения с префиксом `TOPICBUS_`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    /// То же, что [`Settings::load`], но с явным путём к файлу.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let path = path.as_ref().to_string_lossy().into_owned();

        let cfg = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("io_threads", defaults.io_threads)?
            .set_default("close_timeout_ms", defaults.close_timeout_ms)?
            .set_default("command_timeout_ms", defaults.command_timeout_ms)?
            .set_default("bind_host", defaults.bind_host)?
            .add_source(File::with_name(&path).required(false))
            // Добавляем переменные окружения с префиксом TOPICBUS_
            .add_source(Environment::with_prefix("TOPICBUS").try_parsing(true))
            .build()?;

        cfg.try_deserialize()
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
