use crate::config::Config;
use crate::error::Result;
use crate::events::{ActivationEvent, ProcessId};
use crate::services::window_system::WindowSystem;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::r#trait::ActivationSourceTrait;

/// Сколько неудачных опросов подряд терпим, прежде чем предупредить в лог
const FAILURE_WARN_THRESHOLD: u32 = 200;

/// Источник событий активации на основе опроса активного процесса
pub struct PollingActivationWatcher {
    config: Arc<Config>,
    windows: Arc<dyn WindowSystem>,
    current: Option<ProcessId>,
}

impl PollingActivationWatcher {
    pub fn new(config: Arc<Config>, windows: Arc<dyn WindowSystem>) -> Self {
        info!("Инициализация PollingActivationWatcher");
        Self {
            config,
            windows,
            current: None,
        }
    }

    /// Запомнить наблюдение, вернуть событие при смене процесса
    fn observe(&mut self, pid: ProcessId) -> Option<ActivationEvent> {
        if self.current == Some(pid) {
            return None;
        }

        let previous = self.current.replace(pid);
        // Самое первое наблюдение - не смена приложения
        previous.map(|previous| ActivationEvent::new(pid, Some(previous)))
    }

    async fn run_impl(mut self, events: mpsc::Sender<ActivationEvent>) -> Result<()> {
        let period = Duration::from_millis(self.config.activation.polling_interval_ms);
        info!("Опрос активного приложения каждые {}мс", period.as_millis());

        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            interval.tick().await;

            match self.windows.frontmost_process() {
                Ok(pid) => {
                    failures = 0;
                    if let Some(event) = self.observe(pid) {
                        debug!("Смена активного приложения: {}", event);
                        if events.send(event).await.is_err() {
                            info!("Получатель событий активации закрыт, остановка опроса");
                            return Ok(());
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    if failures == FAILURE_WARN_THRESHOLD {
                        warn!("Не удаётся определить активное приложение уже {} раз: {}", failures, e);
                    }
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl ActivationSourceTrait for PollingActivationWatcher {
    async fn run(self: Box<Self>, events: mpsc::Sender<ActivationEvent>) -> Result<()> {
        (*self).run_impl(events).await
    }
}
