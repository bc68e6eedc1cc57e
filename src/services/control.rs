use crate::config::Config;
use crate::events::{PinnedWindow, ProcessId, WindowId};
use crate::services::monitor::ActivityMode;
use crate::services::PinSupervisor;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Команда управляющего канала. Заменяет меню и глобальное сочетание клавиш.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pin(ProcessId),
    Unpin(WindowId),
    /// Без pid - активное приложение, как по сочетанию клавиш
    Toggle(Option<ProcessId>),
    List,
    /// Приложения, которые можно закрепить
    Apps,
    Status,
    Help,
    Quit,
}

/// Чем закончилось чтение команд
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlExit {
    Quit,
    Eof,
}

const HELP: &str = "\
команды:
  pin <pid>          закрепить окно процесса (повторно - открепить)
  unpin <window-id>  открепить окно
  toggle [<pid>]     переключить закрепление (без pid - активное приложение)
  list               закреплённые окна
  apps               приложения, которые можно закрепить
  status             состояние доступа и конфигурация
  quit               выход";

impl ControlCommand {
    /// Разобрать строку. Пустая строка - `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("слишком много аргументов: {}", line.trim()));
        }

        let parse_pid = |value: &str| {
            value
                .parse::<ProcessId>()
                .map_err(|_| format!("некорректный pid: {}", value))
        };

        let command = match (name.to_lowercase().as_str(), arg) {
            ("pin", Some(pid)) => ControlCommand::Pin(parse_pid(pid)?),
            ("unpin", Some(id)) => ControlCommand::Unpin(
                WindowId::parse(id).ok_or_else(|| format!("некорректный id окна: {}", id))?,
            ),
            ("toggle", pid) => ControlCommand::Toggle(pid.map(parse_pid).transpose()?),
            ("list" | "ls", None) => ControlCommand::List,
            ("apps", None) => ControlCommand::Apps,
            ("status", None) => ControlCommand::Status,
            ("help" | "?", None) => ControlCommand::Help,
            ("quit" | "exit", None) => ControlCommand::Quit,
            ("pin" | "unpin", None) => return Err(format!("{}: не хватает аргумента", name)),
            _ => return Err(format!("неизвестная команда: {}", line.trim())),
        };

        Ok(Some(command))
    }
}

/// Текстовое представление закреплённых окон. `monitor` возвращает режим и
/// текущий интервал задачи мониторинга окна, если она есть.
pub fn render_snapshot<F>(windows: &[PinnedWindow], monitor: F) -> String
where
    F: Fn(WindowId) -> Option<(ActivityMode, Duration)>,
{
    if windows.is_empty() {
        return "нет закреплённых окон".to_string();
    }

    let mut out = format!("закреплено окон: {}", windows.len());
    for window in windows {
        let _ = write!(out, "\n  ✓ {} {} (pid {})", window.id, window.display_name, window.owner);
        if let Some((mode, interval)) = monitor(window.id) {
            let _ = write!(out, " [{} {}мс]", mode, interval.as_millis());
        }
    }
    out
}

pub fn render_apps(apps: &[(ProcessId, String)]) -> String {
    if apps.is_empty() {
        return "нет приложений для закрепления".to_string();
    }

    let mut out = format!("можно закрепить: {}", apps.len());
    for (pid, name) in apps {
        let _ = write!(out, "\n  {} {}", pid, name);
    }
    out
}

/// Управляющий канал поверх построчного ввода
pub struct ControlChannel {
    config: Arc<Config>,
    supervisor: PinSupervisor,
}

impl ControlChannel {
    pub fn new(config: Arc<Config>, supervisor: PinSupervisor) -> Self {
        Self { config, supervisor }
    }

    /// Выполнить команду и вернуть ответ для пользователя
    pub fn execute(&self, command: ControlCommand) -> String {
        debug!("Команда управления: {:?}", command);

        let result = match command {
            ControlCommand::Pin(pid) => self.supervisor.pin(pid).map(|outcome| outcome.to_string()),
            ControlCommand::Toggle(Some(pid)) => self.supervisor.toggle(pid).map(|outcome| outcome.to_string()),
            ControlCommand::Toggle(None) => self.supervisor.toggle_frontmost().map(|outcome| outcome.to_string()),
            ControlCommand::Unpin(id) => Ok(match self.supervisor.unpin(id) {
                Some(window) => format!("{}: откреплено", window.display_name),
                None => format!("окно {} не закреплено", id),
            }),
            ControlCommand::List => Ok(render_snapshot(&self.supervisor.snapshot(), |id| {
                self.supervisor
                    .monitor_mode(id)
                    .zip(self.supervisor.monitor_interval(id))
            })),
            ControlCommand::Apps => self.supervisor.pinnable_apps().map(|apps| render_apps(&apps)),
            ControlCommand::Status => Ok(self.status()),
            ControlCommand::Help => Ok(HELP.to_string()),
            ControlCommand::Quit => Ok("завершение работы".to_string()),
        };

        result.unwrap_or_else(|e| {
            warn!("Команда {:?} не выполнена: {}", command, e);
            format!("ошибка: {}", e)
        })
    }

    fn status(&self) -> String {
        let access = if self.supervisor.accessibility_granted() {
            "есть"
        } else {
            "нет"
        };
        format!(
            "доступ к окнам: {}\nзакреплено окон: {}, задач мониторинга: {}\nинтервалы: {}мс / {}мс, простой через {}мс\nсочетание клавиш: {}",
            access,
            self.supervisor.snapshot().len(),
            self.supervisor.task_count(),
            self.config.monitor.fast_interval_ms,
            self.config.monitor.slow_interval_ms,
            self.config.monitor.idle_threshold_ms,
            self.config.shortcut.trigger,
        )
    }

    /// Читать команды построчно до `quit` или конца ввода
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<ControlExit>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Управляющий канал готов, введите 'help' для списка команд");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let reply = match ControlCommand::parse(&line) {
                Ok(None) => continue,
                Ok(Some(ControlCommand::Quit)) => {
                    writer.write_all(b"bye\n").await?;
                    writer.flush().await?;
                    return Ok(ControlExit::Quit);
                }
                Ok(Some(command)) => self.execute(command),
                Err(message) => format!("ошибка: {}\n{}", message, HELP),
            };

            writer.write_all(reply.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        Ok(ControlExit::Eof)
    }
}
