use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub monitor: MonitorConfig,
    pub activation: ActivationConfig,
    pub shortcut: ShortcutConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Параметры адаптивного цикла удержания окна
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Интервал тика в состоянии ACTIVE
    pub fast_interval_ms: u64,
    /// Интервал тика в состоянии IDLE
    pub slow_interval_ms: u64,
    /// Сколько должно пройти без смены активного приложения до перехода в IDLE
    pub idle_threshold_ms: u64,
    /// Подряд неудачных raise до автоматического открепления (0 - никогда)
    pub auto_unpin_after_failures: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivationConfig {
    pub detection_mode: String,
    pub polling_interval_ms: u64,
}

/// Глобальное сочетание клавиш. Регистрация выполняется внешним слоем,
/// здесь только его описание для справки в логах и команде `status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub trigger: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 50,
            slow_interval_ms: 200,
            idle_threshold_ms: 2000,
            auto_unpin_after_failures: 40,
        }
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            detection_mode: "polling".to_string(),
            polling_interval_ms: 25,
        }
    }
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            trigger: "ctrl+super+t".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn fast_interval(&self) -> Duration {
        Duration::from_millis(self.fast_interval_ms)
    }

    pub fn slow_interval(&self) -> Duration {
        Duration::from_millis(self.slow_interval_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("PINTOP_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "pretty" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация интервалов мониторинга
        let monitor = &self.monitor;
        if !(10..=50).contains(&monitor.fast_interval_ms) {
            anyhow::bail!(
                "fast_interval_ms должно быть в диапазоне 10..=50, получено {}",
                monitor.fast_interval_ms
            );
        }

        if monitor.slow_interval_ms <= monitor.fast_interval_ms {
            anyhow::bail!(
                "slow_interval_ms ({}) должно быть больше fast_interval_ms ({})",
                monitor.slow_interval_ms,
                monitor.fast_interval_ms
            );
        }

        if monitor.idle_threshold_ms < monitor.slow_interval_ms {
            anyhow::bail!(
                "idle_threshold_ms ({}) должно быть не меньше slow_interval_ms ({})",
                monitor.idle_threshold_ms,
                monitor.slow_interval_ms
            );
        }

        // Валидация отслеживания активации
        match self.activation.detection_mode.as_str() {
            "polling" | "disabled" => {}
            _ => anyhow::bail!(
                "Неверный режим отслеживания активации: {}",
                self.activation.detection_mode
            ),
        }

        if self.activation.polling_interval_ms == 0 {
            anyhow::bail!("activation.polling_interval_ms должно быть больше 0");
        }

        if self.shortcut.trigger.trim().is_empty() {
            anyhow::bail!("shortcut.trigger не может быть пустым");
        }

        Ok(())
    }

    pub fn activation_enabled(&self) -> bool {
        self.activation.detection_mode == "polling"
    }
}
