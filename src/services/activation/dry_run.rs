use crate::error::Result;
use crate::events::ActivationEvent;
use crate::services::window_system::DryRunDesktop;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::ActivationSourceTrait;

/// Эмулирует пользователя, переключающего приложения на эмулированном столе
pub struct DryRunActivationSource {
    desktop: Arc<DryRunDesktop>,
    period: Duration,
}

impl DryRunActivationSource {
    pub fn new(desktop: Arc<DryRunDesktop>) -> Self {
        Self {
            desktop,
            period: Duration::from_secs(10),
        }
    }

    async fn run_impl(self, events: mpsc::Sender<ActivationEvent>) -> Result<()> {
        info!("Dry-run режим - переключение приложений эмулируется каждые {}с", self.period.as_secs());

        let mut index = 0;
        let mut interval = interval(self.period);
        // Первый тик interval срабатывает сразу
        interval.tick().await;

        loop {
            interval.tick().await;

            let pids = self.desktop.pids();
            if pids.is_empty() {
                continue;
            }
            let pid = pids[index % pids.len()];
            index += 1;

            let previous = self.desktop.frontmost();
            self.desktop.set_frontmost(pid);
            info!("Dry-run: эмулируем активацию pid {}", pid);

            if events.send(ActivationEvent::new(pid, previous)).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl ActivationSourceTrait for DryRunActivationSource {
    async fn run(self: Box<Self>, events: mpsc::Sender<ActivationEvent>) -> Result<()> {
        (*self).run_impl(events).await
    }
}
