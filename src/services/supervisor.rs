use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::{PinError, Result};
use crate::events::{ActivationEvent, PinnedWindow, ProcessId, WindowId, WindowRef};
use crate::services::monitor::{
    execute_actions, spawn_monitor, ActivityMode, MonitorState, MonitorTask, MonitorTiming, TickDriver,
};
use crate::services::pin_registry::PinRegistry;
use crate::services::window_system::{ProcessActivator, WindowSystem};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Результат pin/toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    Pinned(PinnedWindow),
    Unpinned(PinnedWindow),
}

impl PinOutcome {
    pub fn window(&self) -> &PinnedWindow {
        match self {
            PinOutcome::Pinned(window) | PinOutcome::Unpinned(window) => window,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, PinOutcome::Pinned(_))
    }
}

impl fmt::Display for PinOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinOutcome::Pinned(window) => write!(f, "{}: закреплено ✓", window.display_name),
            PinOutcome::Unpinned(window) => write!(f, "{}: откреплено", window.display_name),
        }
    }
}

/// Реестр и все задачи мониторинга под одной блокировкой
#[derive(Debug, Default)]
struct PinTable {
    registry: PinRegistry,
    tasks: HashMap<WindowId, MonitorTask>,
    next_generation: u64,
}

impl PinTable {
    /// Снять закрепление. Идемпотентно.
    fn unpin(&mut self, id: WindowId) -> Option<PinnedWindow> {
        if let Some(task) = self.tasks.remove(&id) {
            task.cancel();
        }
        self.registry.remove(id)
    }
}

struct SupervisorInner {
    table: Mutex<PinTable>,
    windows: Arc<dyn WindowSystem>,
    activator: Arc<dyn ProcessActivator>,
    timing: MonitorTiming,
    auto_unpin_after: u32,
    own_pid: ProcessId,
}

/// Оркестратор закрепления окон.
///
/// Все изменения реестра, все тики таймеров и обработчик активации проходят
/// через одну блокировку `table`; вызовы оконной системы внутри тика тоже
/// выполняются под ней, поэтому после возврата из [`PinSupervisor::unpin`]
/// ни один тик для этого окна уже не выполнится.
#[derive(Clone)]
pub struct PinSupervisor {
    inner: Arc<SupervisorInner>,
}

impl PinSupervisor {
    pub fn new(
        config: Arc<Config>,
        windows: Arc<dyn WindowSystem>,
        activator: Arc<dyn ProcessActivator>,
    ) -> Self {
        info!(
            "Инициализация PinSupervisor (fast: {}мс, slow: {}мс, idle: {}мс)",
            config.monitor.fast_interval_ms, config.monitor.slow_interval_ms, config.monitor.idle_threshold_ms
        );

        Self {
            inner: Arc::new(SupervisorInner {
                table: Mutex::new(PinTable::default()),
                windows,
                activator,
                timing: MonitorTiming::from(&config.monitor),
                auto_unpin_after: config.monitor.auto_unpin_after_failures,
                own_pid: std::process::id(),
            }),
        }
    }

    /// Есть ли у процесса права на управление окнами
    pub fn accessibility_granted(&self) -> bool {
        self.inner.windows.check_access().is_ok()
    }

    /// Выбрать окно процесса: сфокусированное, если оно подходит, иначе первое видимое обычное
    pub fn resolve_window(&self, pid: ProcessId) -> Result<WindowRef> {
        let eligible: Vec<_> = self
            .inner
            .windows
            .list_windows(pid)?
            .into_iter()
            .filter(|window| window.is_pinnable())
            .collect();

        if eligible.is_empty() {
            return PinError::window_not_found(pid);
        }

        let focused = match self.inner.windows.focused_window(pid) {
            Ok(focused) => focused,
            Err(e) => {
                debug!("Не удалось получить окно в фокусе для pid {}: {}", pid, e);
                None
            }
        };

        let chosen = focused
            .and_then(|id| eligible.iter().position(|window| window.id == id))
            .unwrap_or(0);

        let window = eligible.into_iter().nth(chosen).ok_or(PinError::WindowNotFound(pid))?;
        debug!("Для pid {} выбрано окно {}", pid, window);
        Ok(window.into())
    }

    /// Закрепить окно процесса. Если оно уже закреплено, вызов снимает закрепление.
    pub fn pin(&self, pid: ProcessId) -> Result<PinOutcome> {
        self.inner.windows.check_access()?;

        let window = self.resolve_window(pid)?;
        let display_name = self
            .inner
            .windows
            .process_name(pid)
            .or_else(|| (!window.title.is_empty()).then(|| window.title.clone()))
            .unwrap_or_else(|| "Окно".to_string());

        let mut table = self.inner.table.lock();

        if table.registry.contains(window.id) {
            let removed = table
                .unpin(window.id)
                .ok_or_else(|| PinError::Internal(format!("окно {} исчезло из реестра", window.id)))?;
            info!("Окно {} уже закреплено, снимаем закрепление", removed);
            return Ok(PinOutcome::Unpinned(removed));
        }

        let now = Instant::now();
        let pinned = PinnedWindow::new(window, display_name, now);
        table.registry.insert(pinned.clone());

        // Первый подъём сразу, не дожидаясь таймера
        if let Err(e) = self.inner.activator.activate(pinned.owner) {
            debug!("Начальная активация pid {} не удалась: {}", pinned.owner, e);
        }
        if let Err(e) = self.inner.windows.raise(&pinned.handle) {
            debug!("Начальный raise для {} не удался: {}", pinned.id, e);
        }

        let generation = table.next_generation;
        table.next_generation += 1;

        let mut task = MonitorTask::new(MonitorState::new(now), generation);
        task.attach(spawn_monitor(
            Arc::downgrade(&self.inner),
            pinned.id,
            generation,
            self.inner.timing.fast,
        ));
        table.tasks.insert(pinned.id, task);

        info!("Окно {} закреплено поверх остальных", pinned);
        Ok(PinOutcome::Pinned(pinned))
    }

    /// Снять закрепление. Неизвестный id - не ошибка.
    pub fn unpin(&self, id: WindowId) -> Option<PinnedWindow> {
        let removed = self.inner.table.lock().unpin(id);
        match &removed {
            Some(window) => info!("Окно {} откреплено", window),
            None => debug!("Окно {} не было закреплено", id),
        }
        removed
    }

    pub fn toggle(&self, pid: ProcessId) -> Result<PinOutcome> {
        debug_if_enabled!("Переключение закрепления для pid {}", pid);
        self.pin(pid)
    }

    /// Действие глобального сочетания клавиш: переключить активное приложение
    pub fn toggle_frontmost(&self) -> Result<PinOutcome> {
        self.inner.windows.check_access()?;

        let pid = self.inner.windows.frontmost_process()?;
        if pid == self.inner.own_pid {
            return Err(PinError::SelfTarget);
        }

        self.toggle(pid)
    }

    /// Быстрый путь: активировалось другое приложение, сразу поднимаем все закреплённые окна.
    ///
    /// Владельцы активируются, только если frontmost стал посторонний процесс:
    /// иначе два закреплённых владельца перехватывали бы фокус друг у друга бесконечно.
    /// Тики мониторинга следуют тому же правилу. Активация идёт до подъёма,
    /// чтобы соседние окна владельца не легли поверх закреплённого.
    /// Возвращает число поднятых окон.
    pub fn on_activation_changed(&self, event: &ActivationEvent) -> usize {
        let table = self.inner.table.lock();
        if table.registry.is_empty() {
            return 0;
        }

        debug!("Смена активного приложения ({}), поднимаем закреплённые окна", event);

        let owners = table.registry.owners();
        if !owners.contains(&event.pid) {
            for owner in owners {
                if let Err(e) = self.inner.activator.activate(owner) {
                    debug!("Активация pid {} не удалась: {}", owner, e);
                }
            }
        }

        let windows = table.registry.iter_snapshot();
        for window in &windows {
            if let Err(e) = self.inner.windows.raise(&window.handle) {
                debug!("raise для {} не удался: {}", window.id, e);
            }
        }

        windows.len()
    }

    /// Читать события активации, пока канал открыт
    pub async fn run_activation_loop(self, mut events: mpsc::Receiver<ActivationEvent>) {
        info!("Обработчик событий активации запущен");
        while let Some(event) = events.recv().await {
            self.on_activation_changed(&event);
        }
        info!("Канал событий активации закрыт");
    }

    /// Запущенные приложения, которые можно закрепить: у процесса есть обычное
    /// видимое окно, он ещё не закреплён и это не сам pintop
    pub fn pinnable_apps(&self) -> Result<Vec<(ProcessId, String)>> {
        self.inner.windows.check_access()?;

        let pinned = self.inner.table.lock().registry.owners();
        let pids: BTreeSet<ProcessId> = self
            .inner
            .windows
            .all_windows()?
            .into_iter()
            .filter(|window| window.is_pinnable())
            .map(|window| window.pid)
            .filter(|pid| *pid != self.inner.own_pid && !pinned.contains(pid))
            .collect();

        Ok(pids
            .into_iter()
            .map(|pid| {
                let name = self
                    .inner
                    .windows
                    .process_name(pid)
                    .unwrap_or_else(|| format!("pid {}", pid));
                (pid, name)
            })
            .collect())
    }

    /// Закреплённые окна для отображения в меню
    pub fn snapshot(&self) -> Vec<PinnedWindow> {
        self.inner.table.lock().registry.iter_snapshot()
    }

    #[allow(dead_code)]
    pub fn is_pinned(&self, id: WindowId) -> bool {
        self.inner.table.lock().registry.contains(id)
    }

    pub fn monitor_mode(&self, id: WindowId) -> Option<ActivityMode> {
        self.inner.table.lock().tasks.get(&id).map(|task| task.state.mode)
    }

    pub fn monitor_interval(&self, id: WindowId) -> Option<Duration> {
        let table = self.inner.table.lock();
        table.tasks.get(&id).map(|task| task.state.interval(&self.inner.timing))
    }

    pub fn task_count(&self) -> usize {
        self.inner.table.lock().tasks.len()
    }

    /// Остановить все таймеры и очистить реестр
    pub fn shutdown(&self) -> usize {
        let mut table = self.inner.table.lock();
        let ids = table.registry.ids();
        for id in &ids {
            table.unpin(*id);
        }
        // Задачи без записи в реестре быть не должно, но таймеры гасим все
        for (_, task) in table.tasks.drain() {
            task.cancel();
        }
        table.registry.clear();

        if !ids.is_empty() {
            info!("Остановлено {} задач мониторинга", ids.len());
        }
        ids.len()
    }
}

impl TickDriver for SupervisorInner {
    fn run_tick(&self, id: WindowId, generation: u64) -> Option<Duration> {
        let mut guard = self.table.lock();
        let table = &mut *guard;

        // Окно откреплено, пока таймер спал
        let window = table.registry.get(id)?.clone();
        let task = table.tasks.get_mut(&id)?;
        if task.generation != generation {
            return None;
        }

        let observed = match self.windows.frontmost_process() {
            Ok(pid) => Some(pid),
            Err(e) => {
                debug_if_enabled!("Не удалось узнать активный процесс: {}", e);
                None
            }
        };

        let mut peers = table.registry.owners();
        peers.remove(&window.owner);

        let now = Instant::now();
        let (state, outcome) = task.state.tick(observed, window.owner, &peers, now, &self.timing);
        task.state = state;

        if let Some(mode) = outcome.transition {
            debug!("Мониторинг окна {} перешёл в {}", window.id, mode);
        }

        // К откреплению ведут только неудачные подъёмы
        let failures =
            match execute_actions(&outcome.actions, &window, self.windows.as_ref(), self.activator.as_ref()) {
                Some(raised) => task.state.record_result(raised),
                None => task.state.consecutive_failures,
            };

        if outcome.activity {
            table.registry.touch(id, now);
        }

        if self.auto_unpin_after > 0 && failures >= self.auto_unpin_after {
            warn!(
                "Окно {} не удаётся поднять {} тиков подряд, снимаем закрепление",
                window, failures
            );
            table.unpin(id);
            return None;
        }

        Some(outcome.next_interval)
    }
}

impl Drop for SupervisorInner {
    fn drop(&mut self) {
        for (_, task) in self.table.get_mut().tasks.drain() {
            task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::window_system::{DesktopCall, DryRunDesktop};
    use crate::events::{WindowHandle, WindowInfo};
    use tokio::time::{advance, sleep};

    /// Активатор, которому оконная система всегда отказывает
    struct RefusingActivator;

    impl ProcessActivator for RefusingActivator {
        fn activate(&self, pid: ProcessId) -> Result<()> {
            PinError::window_not_found(pid)
        }
    }

    const P: ProcessId = 1001;
    const Q: ProcessId = 1002;
    const W1: WindowId = WindowId::new(0x1001);

    fn setup() -> (PinSupervisor, Arc<DryRunDesktop>) {
        setup_with(Config::default())
    }

    fn setup_with(config: Config) -> (PinSupervisor, Arc<DryRunDesktop>) {
        let desktop = Arc::new(DryRunDesktop::with_demo_processes());
        let supervisor = PinSupervisor::new(Arc::new(config), desktop.clone(), desktop.clone());
        (supervisor, desktop)
    }

    /// Дать таймерам отработать на остановленных часах
    async fn run_for(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_registers_and_raises_immediately() {
        let (supervisor, desktop) = setup();

        let outcome = supervisor.pin(P).unwrap();
        assert!(outcome.is_pinned());
        assert_eq!(outcome.window().id, W1);
        assert_eq!(outcome.window().display_name, "terminal");
        assert_eq!(outcome.to_string(), "terminal: закреплено ✓");

        assert!(supervisor.is_pinned(W1));
        assert_eq!(supervisor.task_count(), 1);
        assert_eq!(supervisor.monitor_mode(W1), Some(ActivityMode::Active));
        assert_eq!(desktop.raises_of(W1), 1);
        assert_eq!(desktop.activations_of(P), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_prefers_focused_window() {
        let (supervisor, desktop) = setup();
        desktop.set_focused(Q, Some(WindowId::new(0x2002)));

        let window = supervisor.resolve_window(Q).unwrap();
        assert_eq!(window.id, WindowId::new(0x2002));

        desktop.set_focused(Q, None);
        let window = supervisor.resolve_window(Q).unwrap();
        assert_eq!(window.id, WindowId::new(0x2001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_skips_non_normal_windows() {
        let (supervisor, desktop) = setup();
        desktop.add_process(2000, "panel", &[]);
        let id = WindowId::new(0x9001);
        desktop.add_window(WindowInfo::new(id, 2000, WindowHandle::new(id.to_string())).with_layer(1));
        desktop.set_focused(2000, Some(id));

        assert!(matches!(supervisor.resolve_window(2000), Err(PinError::WindowNotFound(2000))));
        assert!(matches!(supervisor.pin(2000), Err(PinError::WindowNotFound(2000))));
        assert!(supervisor.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpin_is_idempotent() {
        let (supervisor, _desktop) = setup();
        supervisor.pin(P).unwrap();

        assert!(supervisor.unpin(W1).is_some());
        let after_first = supervisor.snapshot();
        assert!(supervisor.unpin(W1).is_none());

        assert_eq!(supervisor.snapshot(), after_first);
        assert!(after_first.is_empty());
        assert_eq!(supervisor.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_twice_restores_state() {
        let (supervisor, _desktop) = setup();

        let first = supervisor.toggle(P).unwrap();
        assert!(first.is_pinned());
        let second = supervisor.toggle(P).unwrap();
        assert!(!second.is_pinned());
        assert_eq!(second.to_string(), "terminal: откреплено");

        assert!(supervisor.snapshot().is_empty());
        assert_eq!(supervisor.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_twice_acts_as_toggle_and_never_duplicates_tasks() {
        let (supervisor, _desktop) = setup();

        supervisor.pin(P).unwrap();
        assert_eq!(supervisor.task_count(), 1);

        supervisor.pin(P).unwrap();
        assert!(supervisor.snapshot().is_empty());
        assert_eq!(supervisor.task_count(), 0);

        for _ in 0..5 {
            supervisor.pin(P).unwrap();
            assert!(supervisor.task_count() <= 1);
            run_for(60).await;
        }
        assert_eq!(supervisor.task_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_calls_after_unpin() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        desktop.set_frontmost(Q);
        run_for(500).await;
        assert!(desktop.raises_of(W1) > 1);

        supervisor.unpin(W1);
        desktop.clear_calls();
        desktop.set_frontmost(Q);

        for _ in 0..20 {
            run_for(50).await;
            desktop.set_frontmost(Q);
        }

        assert_eq!(desktop.raises_of(W1), 0);
        assert_eq!(desktop.activations_of(P), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contention_idle_and_unpin_scenario() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        let ids: Vec<WindowId> = supervisor.snapshot().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![W1]);

        // Другое приложение выходит на передний план
        desktop.clear_calls();
        desktop.set_frontmost(Q);
        run_for(60).await;

        let calls = desktop.calls();
        assert!(calls.contains(&DesktopCall::Raise(W1)));
        assert!(calls.contains(&DesktopCall::Activate(P)));
        assert_eq!(desktop.frontmost(), Some(P));

        // 3 секунды без переключений
        run_for(3000).await;
        assert_eq!(supervisor.monitor_mode(W1), Some(ActivityMode::Idle));
        assert_eq!(supervisor.monitor_interval(W1), Some(Duration::from_millis(200)));

        supervisor.unpin(W1);
        assert!(supervisor.snapshot().is_empty());
        assert_eq!(supervisor.monitor_mode(W1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_task_wakes_up_on_frontmost_change() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        run_for(2500).await;
        assert_eq!(supervisor.monitor_mode(W1), Some(ActivityMode::Idle));

        let before = supervisor.snapshot()[0].last_activity;
        desktop.set_frontmost(Q);
        // Не дольше одного медленного интервала
        run_for(210).await;

        assert_eq!(supervisor.monitor_mode(W1), Some(ActivityMode::Active));
        assert!(supervisor.snapshot()[0].last_activity > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_event_raises_all_pinned() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        supervisor.pin(1003).unwrap();
        desktop.clear_calls();

        let raised = supervisor.on_activation_changed(&ActivationEvent::new(1004, Some(1003)));

        assert_eq!(raised, 2);
        assert_eq!(desktop.raises_of(W1), 1);
        assert_eq!(desktop.raises_of(WindowId::new(0x3001)), 1);
        assert_eq!(desktop.activations_of(P), 1);
        assert_eq!(desktop.activations_of(1003), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_by_pinned_owner_does_not_reactivate() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        supervisor.pin(1003).unwrap();
        desktop.clear_calls();

        supervisor.on_activation_changed(&ActivationEvent::new(1003, Some(P)));

        assert_eq!(desktop.raises_of(W1), 1);
        assert_eq!(desktop.activations_of(P), 0);
        assert_eq!(desktop.activations_of(1003), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_with_empty_registry_is_noop() {
        let (supervisor, desktop) = setup();
        desktop.clear_calls();

        assert_eq!(supervisor.on_activation_changed(&ActivationEvent::new(Q, Some(P))), 0);
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_denied_refuses_pin() {
        let (supervisor, desktop) = setup();
        desktop.set_access_granted(false);

        assert!(!supervisor.accessibility_granted());
        assert!(matches!(supervisor.pin(P), Err(PinError::AccessibilityDenied(_))));
        assert!(matches!(supervisor.toggle_frontmost(), Err(PinError::AccessibilityDenied(_))));
        assert_eq!(supervisor.task_count(), 0);

        desktop.set_access_granted(true);
        assert!(supervisor.pin(P).unwrap().is_pinned());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_frontmost() {
        let (supervisor, desktop) = setup();
        desktop.set_frontmost(1003);

        let outcome = supervisor.toggle_frontmost().unwrap();
        assert_eq!(outcome.window().owner, 1003);
        assert!(outcome.is_pinned());

        let outcome = supervisor.toggle_frontmost().unwrap();
        assert!(!outcome.is_pinned());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_frontmost_refuses_own_process() {
        let (supervisor, desktop) = setup();
        let own = std::process::id();
        desktop.add_process(own, "pintop", &[0xfff1]);
        desktop.set_frontmost(own);

        assert!(matches!(supervisor.toggle_frontmost(), Err(PinError::SelfTarget)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_process_is_tolerated_then_auto_unpinned() {
        let mut config = Config::default();
        config.monitor.auto_unpin_after_failures = 5;
        let (supervisor, desktop) = setup_with(config);

        supervisor.pin(P).unwrap();
        desktop.remove_process(P);

        // Пара тиков неудачна, но окно ещё закреплено
        run_for(60).await;
        assert!(supervisor.is_pinned(W1));

        run_for(1000).await;
        assert!(!supervisor.is_pinned(W1));
        assert_eq!(supervisor.task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_activation_does_not_auto_unpin_live_window() {
        let mut config = Config::default();
        config.monitor.auto_unpin_after_failures = 5;
        let desktop = Arc::new(DryRunDesktop::with_demo_processes());
        let supervisor = PinSupervisor::new(Arc::new(config), desktop.clone(), Arc::new(RefusingActivator));

        supervisor.pin(P).unwrap();
        desktop.set_frontmost(Q);
        run_for(2100).await;

        // Q так и остался впереди: каждый тик активирует безуспешно, но raise проходит
        assert!(supervisor.is_pinned(W1));
        assert_eq!(supervisor.task_count(), 1);
        assert!(desktop.raises_of(W1) > 40);

        run_for(3000).await;
        assert!(supervisor.is_pinned(W1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_pinned_owners_do_not_fight_for_focus() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        supervisor.pin(1003).unwrap();
        assert_eq!(desktop.frontmost(), Some(1003));
        desktop.clear_calls();

        run_for(3000).await;
        assert_eq!(desktop.activations_of(P), 0);
        assert_eq!(desktop.activations_of(1003), 0);
        assert_eq!(supervisor.monitor_mode(W1), Some(ActivityMode::Idle));
        assert_eq!(supervisor.monitor_mode(WindowId::new(0x3001)), Some(ActivityMode::Idle));

        // Постороннее приложение: один из владельцев возвращает фокус, и всё стихает
        desktop.set_frontmost(1004);
        run_for(3000).await;
        let activations = desktop.activations_of(P) + desktop.activations_of(1003);
        assert!((1..=2).contains(&activations), "activations: {}", activations);
        assert!(matches!(desktop.frontmost(), Some(P) | Some(1003)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_event_activates_before_raising() {
        let (supervisor, desktop) = setup();
        supervisor.pin(Q).unwrap();
        desktop.clear_calls();

        supervisor.on_activation_changed(&ActivationEvent::new(1004, Some(Q)));

        assert_eq!(
            desktop.calls(),
            vec![DesktopCall::Activate(Q), DesktopCall::Raise(WindowId::new(0x2001))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pinnable_apps_skip_pinned_self_and_windowless() {
        let (supervisor, desktop) = setup();
        let own = std::process::id();
        desktop.add_process(own, "pintop", &[0xfff1]);
        desktop.add_process(2000, "panel", &[]);
        let id = WindowId::new(0x9001);
        desktop.add_window(WindowInfo::new(id, 2000, WindowHandle::new(id.to_string())).with_layer(1));
        supervisor.pin(Q).unwrap();

        let apps = supervisor.pinnable_apps().unwrap();
        assert_eq!(
            apps,
            vec![
                (P, "terminal".to_string()),
                (1003, "editor".to_string()),
                (1004, "player".to_string()),
            ]
        );

        desktop.set_access_granted(false);
        assert!(matches!(supervisor.pinnable_apps(), Err(PinError::AccessibilityDenied(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_unpin_disabled_keeps_entry() {
        let mut config = Config::default();
        config.monitor.auto_unpin_after_failures = 0;
        let (supervisor, desktop) = setup_with(config);

        supervisor.pin(P).unwrap();
        desktop.close_window(W1);
        run_for(5000).await;

        assert!(supervisor.is_pinned(W1));
        assert_eq!(supervisor.task_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        supervisor.pin(Q).unwrap();

        assert_eq!(supervisor.shutdown(), 2);
        assert!(supervisor.snapshot().is_empty());
        assert_eq!(supervisor.task_count(), 0);

        desktop.clear_calls();
        advance(Duration::from_millis(1000)).await;
        run_for(10).await;
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_loop_consumes_channel() {
        let (supervisor, desktop) = setup();
        supervisor.pin(P).unwrap();
        desktop.clear_calls();

        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(supervisor.clone().run_activation_loop(rx));
        tx.send(ActivationEvent::new(Q, Some(P))).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(desktop.raises_of(W1) >= 1);
        assert!(desktop.activations_of(P) >= 1);
    }
}
