use crate::events::{PinnedWindow, ProcessId, WindowId};
use std::collections::{BTreeSet, HashMap};
use tokio::time::Instant;

/// Реестр закреплённых окон: единственный источник истины о том, закреплено ли окно.
///
/// Сам по себе не синхронизирован. Живёт внутри общей блокировки
/// супервизора вместе с состоянием задач мониторинга.
#[derive(Debug, Default)]
pub struct PinRegistry {
    windows: HashMap<WindowId, PinnedWindow>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить окно. Повторная вставка того же id заменяет запись.
    pub fn insert(&mut self, window: PinnedWindow) -> Option<PinnedWindow> {
        self.windows.insert(window.id, window)
    }

    pub fn remove(&mut self, id: WindowId) -> Option<PinnedWindow> {
        self.windows.remove(&id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(&id)
    }

    pub fn get(&self, id: WindowId) -> Option<&PinnedWindow> {
        self.windows.get(&id)
    }

    /// Отметить активность (смену frontmost) для окна
    pub fn touch(&mut self, id: WindowId, at: Instant) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.last_activity = at;
        }
    }

    /// Снимок реестра, отсортированный по id окна
    pub fn iter_snapshot(&self) -> Vec<PinnedWindow> {
        let mut windows: Vec<PinnedWindow> = self.windows.values().cloned().collect();
        windows.sort_by_key(|window| window.id);
        windows
    }

    pub fn owners(&self) -> BTreeSet<ProcessId> {
        self.windows.values().map(|window| window.owner).collect()
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{WindowHandle, WindowRef};

    fn pinned(id: u64, owner: ProcessId) -> PinnedWindow {
        let window = WindowRef {
            id: WindowId::new(id),
            pid: owner,
            handle: WindowHandle::new(format!("{:#x}", id)),
            title: String::new(),
        };
        PinnedWindow::new(window, format!("app-{}", owner), Instant::now())
    }

    #[test]
    fn test_insert_contains_remove() {
        let mut registry = PinRegistry::new();
        assert!(registry.is_empty());

        registry.insert(pinned(1, 100));
        assert!(registry.contains(WindowId::new(1)));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(WindowId::new(1));
        assert_eq!(removed.map(|w| w.owner), Some(100));
        assert!(!registry.contains(WindowId::new(1)));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = PinRegistry::new();
        registry.insert(pinned(1, 100));

        assert!(registry.remove(WindowId::new(2)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_one_entry_per_window_id() {
        let mut registry = PinRegistry::new();
        registry.insert(pinned(5, 100));
        let previous = registry.insert(pinned(5, 100));

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_sorted_and_owners() {
        let mut registry = PinRegistry::new();
        registry.insert(pinned(9, 300));
        registry.insert(pinned(3, 100));
        registry.insert(pinned(4, 100));

        let ids: Vec<u64> = registry.iter_snapshot().iter().map(|w| w.id.value()).collect();
        assert_eq!(ids, vec![3, 4, 9]);

        let owners: Vec<ProcessId> = registry.owners().into_iter().collect();
        assert_eq!(owners, vec![100, 300]);
    }

    #[test]
    fn test_touch_updates_last_activity() {
        let mut registry = PinRegistry::new();
        let window = pinned(1, 100);
        let created = window.last_activity;
        registry.insert(window);

        let later = created + std::time::Duration::from_millis(500);
        registry.touch(WindowId::new(1), later);
        assert_eq!(registry.get(WindowId::new(1)).map(|w| w.last_activity), Some(later));

        // touch несуществующего окна ничего не делает
        registry.touch(WindowId::new(2), later);
        assert_eq!(registry.len(), 1);
    }
}
