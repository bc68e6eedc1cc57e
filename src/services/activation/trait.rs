use crate::config::Config;
use crate::error::Result;
use crate::events::ActivationEvent;
use crate::services::window_system::Backend;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use super::dry_run::DryRunActivationSource;
use super::polling::PollingActivationWatcher;

/// Trait for sources of "frontmost application changed" events
#[async_trait::async_trait]
pub trait ActivationSourceTrait {
    /// Run the source until the receiving side is closed
    async fn run(self: Box<Self>, events: mpsc::Sender<ActivationEvent>) -> Result<()>;
}

/// Factory function to create an activation source based on the config and the dry_run flag.
///
/// Returns `None` when activation tracking is disabled in the config; the
/// monitoring timers then remain the only compensating path.
pub fn create_activation_source(
    config: Arc<Config>,
    backend: &Backend,
    dry_run: bool,
) -> Result<Option<Box<dyn ActivationSourceTrait + Send>>> {
    if !config.activation_enabled() {
        info!("Отслеживание активации приложений отключено в конфигурации");
        return Ok(None);
    }

    match (&backend.simulated, dry_run) {
        (Some(desktop), true) => Ok(Some(Box::new(DryRunActivationSource::new(desktop.clone())))),
        _ => Ok(Some(Box::new(PollingActivationWatcher::new(
            config,
            backend.windows.clone(),
        )))),
    }
}
