pub mod activation;
pub mod control;
pub mod monitor;
pub mod pin_registry;
pub mod supervisor;
pub mod window_system;

pub use activation::create_activation_source;
pub use control::{ControlChannel, ControlExit};
pub use supervisor::PinSupervisor;
pub use window_system::create_window_system;
