use crate::error::{PinError, Result};
use crate::events::{ProcessId, WindowHandle, WindowId};
use crate::pin_error;
use tracing::debug;

use super::x11::run_tool;

pub struct XdotoolClient;

impl XdotoolClient {
    pub fn new() -> Self {
        Self
    }

    pub fn test(&self) -> Result<()> {
        run_tool("xdotool", &["version"]).map(|_| ())
    }

    pub fn active_window(&self) -> Result<WindowId> {
        let stdout = run_tool("xdotool", &["getactivewindow"])?;
        parse_window_id(&stdout)
    }

    pub fn window_pid(&self, window: WindowId) -> Result<ProcessId> {
        let id = window.value().to_string();
        let stdout = run_tool("xdotool", &["getwindowpid", &id])?;
        parse_pid(&stdout)
    }

    pub fn active_window_pid(&self) -> Result<ProcessId> {
        let stdout = run_tool("xdotool", &["getactivewindow", "getwindowpid"])?;
        parse_pid(&stdout)
    }

    pub fn raise(&self, handle: &WindowHandle) -> Result<()> {
        match run_tool("xdotool", &["windowraise", handle.as_str()]) {
            Ok(_) => Ok(()),
            Err(PinError::Internal(msg)) if msg.contains("BadWindow") => {
                debug!("xdotool: окно {} больше не существует", handle);
                let id = handle
                    .as_str()
                    .parse()
                    .map(WindowId::new)
                    .map_err(|_| pin_error!(internal, "некорректный дескриптор окна: {}", handle))?;
                Err(PinError::WindowGone(id))
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_window_id(stdout: &str) -> Result<WindowId> {
    stdout
        .trim()
        .parse::<u64>()
        .map(WindowId::new)
        .map_err(|_| pin_error!(internal, "xdotool вернул некорректный id окна: '{}'", stdout))
}

fn parse_pid(stdout: &str) -> Result<ProcessId> {
    stdout
        .trim()
        .parse::<ProcessId>()
        .map_err(|_| pin_error!(internal, "xdotool вернул некорректный pid: '{}'", stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_id() {
        assert_eq!(parse_window_id("60817411\n").unwrap(), WindowId::new(60817411));
        assert!(parse_window_id("").is_err());
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid(" 4242 ").unwrap(), 4242);
        assert!(parse_pid("XGetWindowProperty failed").is_err());
    }
}
