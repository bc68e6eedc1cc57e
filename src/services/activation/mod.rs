//! Activation event bus: reports every change of the frontmost application.
//!
//! Sources only observe and forward events into a channel; reacting to them
//! is the supervisor's job.

mod dry_run;
mod polling;
mod r#trait;

pub use self::r#trait::{create_activation_source, ActivationSourceTrait};
