use crate::error::Result;
use crate::events::{ProcessId, WindowHandle, WindowId, WindowInfo};
use std::sync::Arc;
use tracing::info;

use super::dry_run::DryRunDesktop;
use super::x11::X11WindowSystem;

/// Доступ к оконной системе хоста.
///
/// Все вызовы синхронные и должны укладываться в ограниченное время:
/// супервизор выполняет их под своей блокировкой.
pub trait WindowSystem: Send + Sync {
    /// Проверить, что у процесса есть права перечислять и поднимать окна
    fn check_access(&self) -> Result<()>;

    /// Окна процесса, включая невидимые и служебные
    fn list_windows(&self, pid: ProcessId) -> Result<Vec<WindowInfo>>;

    /// Все окна рабочего стола
    fn all_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Окно процесса, находящееся в фокусе, если процесс его сообщает
    fn focused_window(&self, pid: ProcessId) -> Result<Option<WindowId>>;

    /// Процесс, владеющий активным окном
    fn frontmost_process(&self) -> Result<ProcessId>;

    /// Поднять окно поверх остальных. Запрос best-effort: ОС может его проигнорировать.
    fn raise(&self, handle: &WindowHandle) -> Result<()>;

    /// Человекочитаемое имя процесса
    fn process_name(&self, pid: ProcessId) -> Option<String>;
}

/// Запрос на вывод окон процесса на передний план
pub trait ProcessActivator: Send + Sync {
    fn activate(&self, pid: ProcessId) -> Result<()>;
}

/// Набор бэкендов, с которыми работает супервизор
#[derive(Clone)]
pub struct Backend {
    pub windows: Arc<dyn WindowSystem>,
    pub activator: Arc<dyn ProcessActivator>,
    /// Эмулированный рабочий стол в режиме сухого запуска
    pub simulated: Option<Arc<DryRunDesktop>>,
}

impl Backend {
    pub fn simulated(desktop: Arc<DryRunDesktop>) -> Self {
        Self {
            windows: desktop.clone(),
            activator: desktop.clone(),
            simulated: Some(desktop),
        }
    }
}

/// Factory function to create the window system backend based on the dry_run flag
pub fn create_window_system(dry_run: bool) -> Result<Backend> {
    if dry_run {
        info!("Используется эмулированный рабочий стол (dry-run)");
        Ok(Backend::simulated(Arc::new(DryRunDesktop::with_demo_processes())))
    } else {
        let x11 = Arc::new(X11WindowSystem::new());
        Ok(Backend {
            windows: x11.clone(),
            activator: x11,
            simulated: None,
        })
    }
}
