use crate::error::Result;
use crate::services::window_system::WindowSystem;
use tracing::{info, warn};

/// Проверить окружение и права на управление окнами.
///
/// Ошибка не фатальна: супервизор отказывает в закреплении, пока доступ не появится.
pub fn check_permissions(windows: &dyn WindowSystem) -> Result<()> {
    info!("Проверка прав доступа...");

    log_session();
    check_not_root();

    match windows.check_access() {
        Ok(()) => {
            info!("Доступ к оконной системе подтверждён");
            Ok(())
        }
        Err(e) => {
            warn!("Нет доступа к оконной системе: {}", e);
            for line in get_setup_commands() {
                warn!("   {}", line);
            }
            Err(e)
        }
    }
}

fn log_session() {
    let session = std::env::var("XDG_SESSION_TYPE").unwrap_or_else(|_| "unknown".to_string());
    let display_var = std::env::var("DISPLAY").unwrap_or_else(|_| "-".to_string());
    info!("Тип сессии: {}, DISPLAY: {}", session, display_var);

    if session == "wayland" {
        warn!("Сессия Wayland: поднимать можно только окна XWayland-приложений");
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Доступ к X-серверу пользователя может отсутствовать,");
            warn!("   запускайте pintop от имени пользователя сессии");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

/// Получить рекомендуемые команды для настройки окружения
pub fn get_setup_commands() -> Vec<String> {
    vec![
        "# Установить утилиты управления окнами:".to_string(),
        "sudo apt install xdotool wmctrl".to_string(),
        "".to_string(),
        "# Убедиться, что доступен X-сервер (или XWayland):".to_string(),
        "echo $DISPLAY".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PinError;
    use crate::services::window_system::DryRunDesktop;

    #[test]
    fn test_setup_commands() {
        let commands = get_setup_commands();
        assert!(!commands.is_empty());
        assert!(commands.iter().any(|cmd| cmd.contains("xdotool")));
        assert!(commands.iter().any(|cmd| cmd.contains("DISPLAY")));
    }

    #[test]
    fn test_log_session_tolerates_any_environment() {
        log_session();
        check_not_root();
    }

    #[test]
    fn test_check_permissions_reports_denial() {
        let desktop = DryRunDesktop::new();
        assert!(check_permissions(&desktop).is_ok());

        desktop.set_access_granted(false);
        assert!(matches!(check_permissions(&desktop), Err(PinError::AccessibilityDenied(_))));
    }
}
