//! Monitoring scheduler: one adaptive timer per pinned window.
//!
//! The decision of every tick is a pure function of the task state, the
//! observed frontmost process and the current instant ([`MonitorState::tick`]).
//! Executing the resulting actions against the window system and keeping the
//! timer alive is left to [`TickDriver`] and [`spawn_monitor`].

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::events::{PinnedWindow, ProcessId, WindowId};
use crate::services::window_system::{ProcessActivator, WindowSystem};
use crate::{debug_if_enabled, trace_if_enabled};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// Классификатор активности задачи мониторинга
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityMode {
    Active,
    Idle,
}

impl fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityMode::Active => f.write_str("ACTIVE"),
            ActivityMode::Idle => f.write_str("IDLE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickAction {
    /// Поднять закреплённое окно
    Raise,
    /// Активировать процесс-владелец
    Activate,
}

pub type TickActions = SmallVec<[TickAction; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorTiming {
    pub fast: Duration,
    pub slow: Duration,
    pub idle_threshold: Duration,
}

impl From<&MonitorConfig> for MonitorTiming {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            fast: config.fast_interval(),
            slow: config.slow_interval(),
            idle_threshold: config.idle_threshold(),
        }
    }
}

/// Результат одного тика
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub actions: TickActions,
    pub next_interval: Duration,
    /// Новый режим, если на этом тике произошёл переход
    pub transition: Option<ActivityMode>,
    /// Зафиксирована смена frontmost-приложения
    pub activity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub mode: ActivityMode,
    pub last_activity: Instant,
    pub last_frontmost: Option<ProcessId>,
    pub consecutive_failures: u32,
}

impl MonitorState {
    pub fn new(now: Instant) -> Self {
        Self {
            mode: ActivityMode::Active,
            last_activity: now,
            last_frontmost: None,
            consecutive_failures: 0,
        }
    }

    pub fn interval(&self, timing: &MonitorTiming) -> Duration {
        match self.mode {
            ActivityMode::Active => timing.fast,
            ActivityMode::Idle => timing.slow,
        }
    }

    /// Один тик конечного автомата.
    ///
    /// `observed` равен `None`, если оконная система не смогла сообщить
    /// активный процесс; такой тик не считается сменой frontmost.
    /// `peers` - владельцы других закреплённых окон: их выход на передний
    /// план не повод активировать своего владельца.
    pub fn tick(
        self,
        observed: Option<ProcessId>,
        owner: ProcessId,
        peers: &BTreeSet<ProcessId>,
        now: Instant,
        timing: &MonitorTiming,
    ) -> (Self, TickOutcome) {
        let mut next = self;
        let mut actions = TickActions::new();
        let mut transition = None;

        let changed = observed.is_some() && observed != self.last_frontmost;
        if observed.is_some() {
            next.last_frontmost = observed;
        }
        let foreign_front = observed.map_or(false, |pid| pid != owner && !peers.contains(&pid));

        match self.mode {
            ActivityMode::Active => {
                if foreign_front {
                    actions.push(TickAction::Activate);
                }
                actions.push(TickAction::Raise);
                if changed {
                    next.last_activity = now;
                }
                if now.saturating_duration_since(next.last_activity) >= timing.idle_threshold {
                    next.mode = ActivityMode::Idle;
                    transition = Some(ActivityMode::Idle);
                }
            }
            ActivityMode::Idle => {
                if changed {
                    // Кто-то снова борется за передний план: сразу в ACTIVE
                    next.mode = ActivityMode::Active;
                    next.last_activity = now;
                    transition = Some(ActivityMode::Active);
                    if foreign_front {
                        actions.push(TickAction::Activate);
                    }
                    actions.push(TickAction::Raise);
                } else if observed != Some(owner) {
                    actions.push(TickAction::Raise);
                }
            }
        }

        let outcome = TickOutcome {
            actions,
            next_interval: next.interval(timing),
            transition,
            activity: changed,
        };
        (next, outcome)
    }

    /// Учесть результат выполнения действий тика, вернуть счётчик неудач подряд
    pub fn record_result(&mut self, succeeded: bool) -> u32 {
        if succeeded {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.consecutive_failures
    }
}

/// Выполнить действия тика. Ошибки не поднимаются выше тика.
///
/// Активация идёт раньше подъёма: активатор выводит вперёд окна процесса,
/// а закреплённое окно должно оказаться поверх них. Возвращает результат
/// подъёма, если он был среди действий; неудачная активация окно не теряет.
pub fn execute_actions(
    actions: &[TickAction],
    window: &PinnedWindow,
    windows: &dyn WindowSystem,
    activator: &dyn ProcessActivator,
) -> Option<bool> {
    let mut raised = None;
    for action in actions {
        let result: Result<()> = match action {
            TickAction::Raise => windows.raise(&window.handle),
            TickAction::Activate => activator.activate(window.owner),
        };
        if let Err(e) = &result {
            if e.is_transient() {
                trace_if_enabled!("{:?} для {} не удался: {}", action, window.id, e);
            } else {
                debug_if_enabled!("{:?} для {} не удался: {}", action, window.id, e);
            }
        }
        if *action == TickAction::Raise {
            raised = Some(result.is_ok());
        }
    }
    raised
}

/// Задача мониторинга, принадлежащая планировщику
#[derive(Debug)]
pub struct MonitorTask {
    pub state: MonitorState,
    pub generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl MonitorTask {
    pub fn new(state: MonitorState, generation: u64) -> Self {
        Self {
            state,
            generation,
            handle: None,
        }
    }

    pub fn attach(&mut self, handle: JoinHandle<()>) {
        self.handle = Some(handle);
    }

    /// Остановить таймер. Тик, уже ожидающий общую блокировку, после неё
    /// не найдёт свою запись и завершится сам.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Сторона, выполняющая тики под общей блокировкой реестра
pub trait TickDriver: Send + Sync + 'static {
    /// Выполнить один тик для окна. `None` означает, что задача должна завершиться.
    fn run_tick(&self, window: WindowId, generation: u64) -> Option<Duration>;
}

/// Запустить таймер окна. Задача держит только слабую ссылку на драйвер,
/// чтобы не продлевать жизнь супервизора.
pub fn spawn_monitor<D: TickDriver>(
    driver: Weak<D>,
    window: WindowId,
    generation: u64,
    first_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut next = first_interval;
        let mut ticks: u64 = 0;
        loop {
            sleep(next).await;

            let Some(driver) = driver.upgrade() else {
                break;
            };

            match driver.run_tick(window, generation) {
                Some(interval) => {
                    ticks += 1;
                    next = interval;
                }
                None => break,
            }
        }

        trace_if_enabled!("Таймер окна {} остановлен после {} тиков", window, ticks);
    })
}
