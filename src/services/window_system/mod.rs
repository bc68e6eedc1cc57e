//! WindowSystem service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for talking to the host
//! window system: enumerating windows of a process, reporting the frontmost
//! process, raising a window and activating a process. They MUST NOT decide
//! which windows are pinned or when to raise them; that belongs to the
//! supervisor and the monitoring scheduler.

mod dry_run;
mod wmctrl;
mod x11;
mod xdotool;
mod r#trait;

pub use self::dry_run::{DesktopCall, DryRunDesktop};
pub use self::r#trait::{create_window_system, Backend, ProcessActivator, WindowSystem};
