use crate::error::{PinError, Result};
use crate::events::{ProcessId, WindowHandle, WindowId, WindowInfo};
use crate::pin_error;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use super::r#trait::{ProcessActivator, WindowSystem};

/// Вызов, который эмулированный рабочий стол получил от ядра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DesktopCall {
    Raise(WindowId),
    Activate(ProcessId),
}

#[derive(Debug, Clone)]
struct SimulatedProcess {
    name: String,
    windows: Vec<WindowInfo>,
    focused: Option<WindowId>,
}

/// Рабочий стол в памяти: процессы, окна, активный процесс и журнал вызовов.
///
/// Используется в режиме `--dry-run` и в тестах вместо настоящей оконной системы.
/// Активация процесса делает его frontmost, как и на настоящем столе.
pub struct DryRunDesktop {
    processes: DashMap<ProcessId, SimulatedProcess>,
    frontmost: Mutex<Option<ProcessId>>,
    access_granted: AtomicBool,
    calls: Mutex<Vec<DesktopCall>>,
}

impl Default for DryRunDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunDesktop {
    pub fn new() -> Self {
        Self {
            processes: DashMap::new(),
            frontmost: Mutex::new(None),
            access_granted: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Несколько приложений для демонстрационного запуска
    pub fn with_demo_processes() -> Self {
        let desktop = Self::new();
        desktop.add_process(1001, "terminal", &[0x1001]);
        desktop.add_process(1002, "browser", &[0x2001, 0x2002]);
        desktop.add_process(1003, "editor", &[0x3001]);
        desktop.add_process(1004, "player", &[0x4001]);
        desktop.set_frontmost(1001);
        desktop
    }

    pub fn handle_for(id: WindowId) -> WindowHandle {
        WindowHandle::new(id.to_string())
    }

    /// Добавить процесс с обычными видимыми окнами; первое окно в фокусе
    pub fn add_process(&self, pid: ProcessId, name: &str, window_ids: &[u64]) {
        let windows: Vec<WindowInfo> = window_ids
            .iter()
            .map(|&raw| {
                let id = WindowId::new(raw);
                WindowInfo::new(id, pid, Self::handle_for(id)).with_title(format!("{} {}", name, id))
            })
            .collect();
        let focused = windows.first().map(|window| window.id);

        self.processes.insert(
            pid,
            SimulatedProcess {
                name: name.to_string(),
                windows,
                focused,
            },
        );
    }

    pub fn set_frontmost(&self, pid: ProcessId) {
        *self.frontmost.lock() = Some(pid);
    }

    pub fn frontmost(&self) -> Option<ProcessId> {
        *self.frontmost.lock()
    }

    pub fn pids(&self) -> Vec<ProcessId> {
        let mut pids: Vec<ProcessId> = self.processes.iter().map(|entry| *entry.key()).collect();
        pids.sort_unstable();
        pids
    }

    fn window_exists(&self, id: WindowId) -> bool {
        self.processes
            .iter()
            .any(|process| process.windows.iter().any(|window| window.id == id))
    }
}

// Управление эмуляцией из тестов
#[allow(dead_code)]
impl DryRunDesktop {
    /// Добавить произвольное окно существующему процессу
    pub fn add_window(&self, window: WindowInfo) {
        if let Some(mut process) = self.processes.get_mut(&window.pid) {
            process.windows.push(window);
        }
    }

    pub fn set_focused(&self, pid: ProcessId, window: Option<WindowId>) {
        if let Some(mut process) = self.processes.get_mut(&pid) {
            process.focused = window;
        }
    }

    pub fn remove_process(&self, pid: ProcessId) {
        self.processes.remove(&pid);
        let mut frontmost = self.frontmost.lock();
        if *frontmost == Some(pid) {
            *frontmost = None;
        }
    }

    pub fn close_window(&self, id: WindowId) {
        for mut process in self.processes.iter_mut() {
            process.windows.retain(|window| window.id != id);
            if process.focused == Some(id) {
                process.focused = None;
            }
        }
    }

    pub fn set_access_granted(&self, granted: bool) {
        self.access_granted.store(granted, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DesktopCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn raises_of(&self, id: WindowId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == DesktopCall::Raise(id))
            .count()
    }

    pub fn activations_of(&self, pid: ProcessId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| **call == DesktopCall::Activate(pid))
            .count()
    }
}

impl WindowSystem for DryRunDesktop {
    fn check_access(&self) -> Result<()> {
        if self.access_granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(pin_error!(access_denied, "доступ отозван в эмулированном рабочем столе"))
        }
    }

    fn list_windows(&self, pid: ProcessId) -> Result<Vec<WindowInfo>> {
        self.processes
            .get(&pid)
            .map(|process| process.windows.clone())
            .ok_or(PinError::ProcessGone(pid))
    }

    fn all_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self
            .processes
            .iter()
            .flat_map(|process| process.windows.clone())
            .collect())
    }

    fn focused_window(&self, pid: ProcessId) -> Result<Option<WindowId>> {
        self.processes
            .get(&pid)
            .map(|process| process.focused)
            .ok_or(PinError::ProcessGone(pid))
    }

    fn frontmost_process(&self) -> Result<ProcessId> {
        self.frontmost()
            .ok_or_else(|| pin_error!(service_unavailable, "нет активного приложения"))
    }

    fn raise(&self, handle: &WindowHandle) -> Result<()> {
        let id = WindowId::parse(handle.as_str())
            .ok_or_else(|| pin_error!(internal, "некорректный дескриптор окна: {}", handle))?;
        self.calls.lock().push(DesktopCall::Raise(id));

        if self.window_exists(id) {
            Ok(())
        } else {
            Err(PinError::WindowGone(id))
        }
    }

    fn process_name(&self, pid: ProcessId) -> Option<String> {
        self.processes.get(&pid).map(|process| process.name.clone())
    }
}

impl ProcessActivator for DryRunDesktop {
    fn activate(&self, pid: ProcessId) -> Result<()> {
        self.calls.lock().push(DesktopCall::Activate(pid));

        if !self.processes.contains_key(&pid) {
            return Err(PinError::ProcessGone(pid));
        }

        let mut frontmost = self.frontmost.lock();
        if *frontmost != Some(pid) {
            info!("[DRY RUN] Активирован процесс {}", pid);
            *frontmost = Some(pid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_changes_frontmost_and_logs_call() {
        let desktop = DryRunDesktop::with_demo_processes();
        assert_eq!(desktop.frontmost_process().unwrap(), 1001);

        desktop.activate(1003).unwrap();
        assert_eq!(desktop.frontmost_process().unwrap(), 1003);
        assert_eq!(desktop.calls(), vec![DesktopCall::Activate(1003)]);
    }

    #[test]
    fn test_raise_of_closed_window_fails() {
        let desktop = DryRunDesktop::with_demo_processes();
        let id = WindowId::new(0x2001);
        let handle = DryRunDesktop::handle_for(id);

        assert!(desktop.raise(&handle).is_ok());
        desktop.close_window(id);
        assert!(matches!(desktop.raise(&handle), Err(PinError::WindowGone(gone)) if gone == id));
        assert_eq!(desktop.raises_of(id), 2);
    }

    #[test]
    fn test_removed_process_is_gone() {
        let desktop = DryRunDesktop::with_demo_processes();
        desktop.remove_process(1001);

        assert!(matches!(desktop.list_windows(1001), Err(PinError::ProcessGone(1001))));
        assert!(matches!(desktop.activate(1001), Err(PinError::ProcessGone(1001))));
        assert!(desktop.frontmost_process().is_err());
    }

    #[test]
    fn test_access_can_be_revoked() {
        let desktop = DryRunDesktop::new();
        assert!(desktop.check_access().is_ok());

        desktop.set_access_granted(false);
        assert!(matches!(desktop.check_access(), Err(PinError::AccessibilityDenied(_))));
    }
}
