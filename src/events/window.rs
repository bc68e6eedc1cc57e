use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Идентификатор процесса-владельца окна
pub type ProcessId = u32;

/// Идентификатор окна, назначенный оконной системой.
///
/// Уникален только пока окно существует: после закрытия тот же номер может
/// получить новое окно.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Разбор идентификатора в виде `0x03a00003` или десятичного числа
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let raw = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok()?,
            None => s.parse().ok()?,
        };
        Some(Self(raw))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Непрозрачный дескриптор окна, через который бэкенд выполняет raise.
///
/// Ядро никогда не заглядывает внутрь: это токен, выданный конкретной
/// оконной системой вместе с [`WindowInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(Arc<str>);

impl WindowHandle {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Информация об окне
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowInfo {
    pub id: WindowId,
    pub pid: ProcessId,
    pub title: String,
    /// 0 для обычных окон, иное для рабочего стола, панелей и прочего
    pub layer: i32,
    pub on_screen: bool,
    pub handle: WindowHandle,
}

impl WindowInfo {
    pub fn new(id: WindowId, pid: ProcessId, handle: WindowHandle) -> Self {
        Self {
            id,
            pid,
            title: String::new(),
            layer: 0,
            on_screen: true,
            handle,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_on_screen(mut self, on_screen: bool) -> Self {
        self.on_screen = on_screen;
        self
    }

    /// Окно можно закреплять: видимое обычное окно
    pub fn is_pinnable(&self) -> bool {
        self.on_screen && self.layer == 0
    }
}

impl fmt::Display for WindowInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{} (pid {})", self.id, self.pid)
        } else {
            write!(f, "{} \"{}\" (pid {})", self.id, self.title, self.pid)
        }
    }
}

/// Окно, выбранное для закрепления
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRef {
    pub id: WindowId,
    pub pid: ProcessId,
    pub handle: WindowHandle,
    pub title: String,
}

impl From<WindowInfo> for WindowRef {
    fn from(info: WindowInfo) -> Self {
        Self {
            id: info.id,
            pid: info.pid,
            handle: info.handle,
            title: info.title,
        }
    }
}

/// Запись реестра о закреплённом окне
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedWindow {
    pub id: WindowId,
    pub owner: ProcessId,
    pub display_name: String,
    pub handle: WindowHandle,
    pub last_activity: Instant,
}

impl PinnedWindow {
    pub fn new(window: WindowRef, display_name: String, now: Instant) -> Self {
        Self {
            id: window.id,
            owner: window.pid,
            display_name,
            handle: window.handle,
            last_activity: now,
        }
    }
}

impl fmt::Display for PinnedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (pid {})", self.id, self.display_name, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_id_parse() {
        assert_eq!(WindowId::parse("0x03a00003"), Some(WindowId::new(0x3a00003)));
        assert_eq!(WindowId::parse(" 42 "), Some(WindowId::new(42)));
        assert_eq!(WindowId::parse("окно"), None);
        assert_eq!(WindowId::new(0x3a00003).to_string(), "0x03a00003");
    }

    #[test]
    fn test_pinnable_windows() {
        let handle = WindowHandle::new("0x1");
        let normal = WindowInfo::new(WindowId::new(1), 10, handle.clone());
        assert!(normal.is_pinnable());

        let sticky = normal.clone().with_layer(1);
        assert!(!sticky.is_pinnable());

        let hidden = normal.with_on_screen(false);
        assert!(!hidden.is_pinnable());
    }

    #[test]
    fn test_window_info_display() {
        let window = WindowInfo::new(WindowId::new(0x10), 77, WindowHandle::new("0x10"))
            .with_title("Terminal");

        assert_eq!(window.to_string(), "0x00000010 \"Terminal\" (pid 77)");
    }
}
