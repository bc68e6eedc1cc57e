pub mod activation;
pub mod window;

pub use activation::ActivationEvent;
pub use window::{PinnedWindow, ProcessId, WindowHandle, WindowId, WindowInfo, WindowRef};
