use crate::events::{ProcessId, WindowId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PinError {
    #[error("Не найдено подходящее окно для процесса {0}")]
    WindowNotFound(ProcessId),

    #[error("Нет доступа к оконной системе: {0}")]
    AccessibilityDenied(String),

    #[error("Процесс {0} больше не существует")]
    ProcessGone(ProcessId),

    #[error("Окно {0} больше не существует")]
    WindowGone(WindowId),

    #[error("Нельзя закрепить окно самого pintop")]
    SelfTarget,

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl PinError {
    pub fn window_not_found<T>(pid: ProcessId) -> Result<T> {
        Err(PinError::WindowNotFound(pid))
    }

    /// Ошибки, которые внутри тика считаются временными и не поднимаются выше
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PinError::ProcessGone(_) | PinError::WindowGone(_) | PinError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PinError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! pin_error {
    (access_denied, $($arg:tt)*) => {
        $crate::error::PinError::AccessibilityDenied(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::PinError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::PinError::Internal(format!($($arg)*))
    };
}
