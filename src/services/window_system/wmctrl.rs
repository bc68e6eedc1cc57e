use crate::error::Result;
use crate::events::{WindowId, WindowInfo};
use tracing::debug;

use super::x11::{run_tool, X11WindowSystem};

pub struct WmctrlClient;

impl WmctrlClient {
    pub fn new() -> Self {
        Self
    }

    pub fn test(&self) -> Result<()> {
        run_tool("wmctrl", &["-m"]).map(|_| ())
    }

    /// Все окна, которыми управляет оконный менеджер
    pub fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let current_desktop = run_tool("wmctrl", &["-d"])
            .ok()
            .and_then(|desktops| parse_current_desktop(&desktops));
        let stdout = run_tool("wmctrl", &["-l", "-p"])?;
        Ok(parse_window_list(&stdout, current_desktop))
    }

    pub fn activate(&self, window: WindowId) -> Result<()> {
        let id = window.to_string();
        debug!("wmctrl: активируем окно {}", id);
        run_tool("wmctrl", &["-i", "-a", &id]).map(|_| ())
    }
}

/// Номер текущего рабочего стола из вывода `wmctrl -d` (строка со звёздочкой)
fn parse_current_desktop(stdout: &str) -> Option<i64> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let number = fields.next()?.parse().ok()?;
        (fields.next()? == "*").then_some(number)
    })
}

/// Разбор `wmctrl -l -p`: `<id> <desktop> <pid> <host> <title...>`.
///
/// Окна с desktop `-1` закреплены на всех столах (панели, рабочий стол) и
/// получают ненулевой слой.
fn parse_window_list(stdout: &str, current_desktop: Option<i64>) -> Vec<WindowInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = WindowId::parse(fields.next()?)?;
            let desktop: i64 = fields.next()?.parse().ok()?;
            let pid = fields.next()?.parse().ok()?;
            let _host = fields.next();
            let title = fields.collect::<Vec<_>>().join(" ");

            let layer = if desktop < 0 { 1 } else { 0 };
            let on_screen = desktop < 0 || current_desktop.map_or(true, |current| current == desktop);

            Some(
                WindowInfo::new(id, pid, X11WindowSystem::handle_for(id))
                    .with_title(title)
                    .with_layer(layer)
                    .with_on_screen(on_screen),
            )
        })
        .collect()
}
