use super::ProcessId;
use std::fmt;
use tokio::time::Instant;

/// Событие смены активного (frontmost) приложения
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEvent {
    pub pid: ProcessId,
    pub previous: Option<ProcessId>,
    pub timestamp: Instant,
}

impl ActivationEvent {
    pub fn new(pid: ProcessId, previous: Option<ProcessId>) -> Self {
        Self {
            pid,
            previous,
            timestamp: Instant::now(),
        }
    }
}

impl fmt::Display for ActivationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.previous {
            Some(previous) => write!(
                f,
                "pid {} -> pid {} ({}ms ago)",
                previous,
                self.pid,
                self.timestamp.elapsed().as_millis()
            ),
            None => write!(f, "pid {} ({}ms ago)", self.pid, self.timestamp.elapsed().as_millis()),
        }
    }
}
