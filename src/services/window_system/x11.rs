use crate::error::{PinError, Result};
use crate::events::{ProcessId, WindowHandle, WindowId, WindowInfo};
use crate::pin_error;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

use super::r#trait::{ProcessActivator, WindowSystem};
use super::wmctrl::WmctrlClient;
use super::xdotool::XdotoolClient;

/// Оконная система X11 поверх утилит xdotool и wmctrl
pub struct X11WindowSystem {
    xdotool: XdotoolClient,
    wmctrl: WmctrlClient,
}

impl Default for X11WindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl X11WindowSystem {
    pub fn new() -> Self {
        Self {
            xdotool: XdotoolClient::new(),
            wmctrl: WmctrlClient::new(),
        }
    }

    fn process_alive(pid: ProcessId) -> bool {
        Path::new(&format!("/proc/{}", pid)).exists()
    }

    /// Дескриптор окна для xdotool: десятичный X11 id
    pub fn handle_for(id: WindowId) -> WindowHandle {
        WindowHandle::new(id.value().to_string())
    }
}

impl WindowSystem for X11WindowSystem {
    fn check_access(&self) -> Result<()> {
        if std::env::var_os("DISPLAY").is_none() {
            return Err(pin_error!(
                access_denied,
                "переменная DISPLAY не задана, X-сервер недоступен (на чистом Wayland поднимать чужие окна нельзя)"
            ));
        }

        self.xdotool
            .test()
            .map_err(|e| pin_error!(access_denied, "xdotool недоступен: {}", e))?;
        self.wmctrl
            .test()
            .map_err(|e| pin_error!(access_denied, "wmctrl недоступен: {}", e))?;

        Ok(())
    }

    fn list_windows(&self, pid: ProcessId) -> Result<Vec<WindowInfo>> {
        if !Self::process_alive(pid) {
            return Err(PinError::ProcessGone(pid));
        }

        let windows = self
            .wmctrl
            .list_windows()?
            .into_iter()
            .filter(|window| window.pid == pid)
            .collect::<Vec<_>>();

        debug!("wmctrl: у процесса {} найдено {} окон", pid, windows.len());
        Ok(windows)
    }

    fn all_windows(&self) -> Result<Vec<WindowInfo>> {
        self.wmctrl.list_windows()
    }

    fn focused_window(&self, pid: ProcessId) -> Result<Option<WindowId>> {
        let active = self.xdotool.active_window()?;
        let owner = self.xdotool.window_pid(active)?;
        Ok((owner == pid).then_some(active))
    }

    fn frontmost_process(&self) -> Result<ProcessId> {
        self.xdotool.active_window_pid()
    }

    fn raise(&self, handle: &WindowHandle) -> Result<()> {
        self.xdotool.raise(handle)
    }

    fn process_name(&self, pid: ProcessId) -> Option<String> {
        std::fs::read_to_string(format!("/proc/{}/comm", pid))
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

impl ProcessActivator for X11WindowSystem {
    fn activate(&self, pid: ProcessId) -> Result<()> {
        let windows = self.list_windows(pid)?;
        let target = windows
            .iter()
            .find(|window| window.is_pinnable())
            .ok_or(PinError::WindowNotFound(pid))?;

        self.wmctrl.activate(target.id)
    }
}

/// Переменные окружения пользователя сессии, если процесс запущен через sudo
fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = Command::new("id").args(["-u", &sudo_user]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let uid = uid_str.trim();
                    debug!("Подставляем окружение пользователя {}: uid={}", sudo_user, uid);
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), format!("/run/user/{}", uid));
                    env_vars.insert("XAUTHORITY".to_string(), format!("/home/{}/.Xauthority", sudo_user));
                }
            }
        }
    }

    if let Ok(display_var) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display_var);
    }

    env_vars
}

/// Запустить утилиту и вернуть stdout при успехе
pub(super) fn run_tool(program: &str, args: &[&str]) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    for (key, value) in build_env_overrides() {
        cmd.env(key, value);
    }

    let output: Output = cmd.output().map_err(|e| {
        debug!("{} не найден или не работает: {}", program, e);
        pin_error!(service_unavailable, "{} не найден: {}", program, e)
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(pin_error!(internal, "{} {} вернул ошибку: {}", program, args.join(" "), stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
