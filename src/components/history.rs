use std::collections::VecDeque;

use image::RgbaImage;

use crate::canvas::RasterSurface;

/// Default number of snapshots kept (baseline included).
pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// Immutable full-buffer snapshot plus the dimensions it was taken at.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pixels: RgbaImage,
    description: String,
}

impl HistoryEntry {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len() + self.description.len() + std::mem::size_of::<Self>()
    }
}

/// What the surrounding UI needs to enable its undo/redo controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Callback fired after every history change.
pub type HistoryListener = Box<dyn FnMut(HistoryStatus) + Send>;

// ============================================================================
// HISTORY MANAGER
// ============================================================================

/// Linear snapshot history with a movable cursor.
///
/// `entries[current]` always mirrors the surface after `snapshot`, `undo`
/// and `redo`. Entries past the cursor are the redo branch and are dropped by
/// the next snapshot.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    current: Option<usize>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across all entries.
    total_memory: usize,
    listeners: Vec<HistoryListener>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("len", &self.entries.len())
            .field("current", &self.current)
            .field("max_history_size", &self.max_history_size)
            .field("max_memory_bytes", &self.max_memory_bytes)
            .field("total_memory", &self.total_memory)
            .finish()
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            current: None,
            max_history_size: max_history_size.max(1),
            max_memory_bytes: None,
            total_memory: 0,
            listeners: Vec::new(),
        }
    }

    /// Also prune by total snapshot memory. The current entry is never pruned.
    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Register a change observer; it receives the status on every change.
    pub fn subscribe(&mut self, listener: HistoryListener) {
        self.listeners.push(listener);
    }

    /// Drop every entry (image switch). Listeners are kept.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.current = None;
        self.total_memory = 0;
        self.notify();
    }

    /// Capture the surface as a new entry, discarding any redo branch.
    pub fn snapshot(&mut self, surface: &RasterSurface, description: impl Into<String>) {
        if let Some(cur) = self.current {
            for dropped in self.entries.drain(cur + 1..) {
                self.total_memory = self.total_memory.saturating_sub(dropped.memory_size());
            }
        } else {
            self.entries.clear();
            self.total_memory = 0;
        }

        let entry = HistoryEntry {
            pixels: surface.snapshot(),
            description: description.into(),
        };
        self.total_memory += entry.memory_size();
        self.entries.push_back(entry);
        self.current = Some(self.entries.len() - 1);
        self.prune();
        self.notify();
    }

    /// Step back one entry. Returns the description of the undone step.
    pub fn undo(&mut self, surface: &mut RasterSurface) -> Option<String> {
        let cur = self.current.filter(|&c| c > 0)?;
        let undone = self.entries[cur].description.clone();
        self.current = Some(cur - 1);
        surface.restore(&self.entries[cur - 1].pixels);
        self.notify();
        Some(undone)
    }

    /// Step forward one entry. Returns the description of the redone step.
    pub fn redo(&mut self, surface: &mut RasterSurface) -> Option<String> {
        let cur = self.current?;
        if cur + 1 >= self.entries.len() {
            return None;
        }
        self.current = Some(cur + 1);
        surface.restore(&self.entries[cur + 1].pixels);
        self.notify();
        Some(self.entries[cur + 1].description.clone())
    }

    /// Undo `steps` times (0 = stay on the current entry). Returns how many happened.
    pub fn undo_to(&mut self, steps: usize, surface: &mut RasterSurface) -> usize {
        let mut done = 0;
        while done < steps && self.undo(surface).is_some() {
            done += 1;
        }
        done
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.current, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.current, Some(c) if c + 1 < self.entries.len())
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Descriptions of every entry, newest first (baseline last).
    pub fn descriptions(&self) -> Vec<String> {
        self.entries.iter().rev().map(|e| e.description.clone()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        // Prune by count
        while self.entries.len() > self.max_history_size {
            self.evict_oldest();
        }

        // Prune by memory if limit is set
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && matches!(self.current, Some(c) if c > 0) {
                self.evict_oldest();
            }
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(removed) = self.entries.pop_front() {
            self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            self.current = match self.current {
                Some(c) if c > 0 => Some(c - 1),
                _ if self.entries.is_empty() => None,
                _ => Some(0),
            };
        }
    }

    fn notify(&mut self) {
        let status = self.status();
        for listener in &mut self.listeners {
            listener(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::{Arc, Mutex};

    fn surface_with(value: u8) -> RasterSurface {
        RasterSurface::new_filled(4, 4, Rgba([value, value, value, 255]))
    }

    fn paint(surface: &mut RasterSurface, value: u8) {
        *surface = RasterSurface::new_filled(surface.width(), surface.height(), Rgba([value, value, value, 255]));
    }

    #[test]
    fn empty_history_cannot_move() {
        let mut history = HistoryManager::default();
        let mut surface = surface_with(0);
        assert_eq!(history.status(), HistoryStatus::default());
        assert!(history.undo(&mut surface).is_none());
        assert!(history.redo(&mut surface).is_none());
        assert_eq!(history.current_index(), None);
    }

    #[test]
    fn n_snapshots_then_k_undos_lands_on_snapshot_n_minus_k() {
        let n = 8u8;
        for k in 0..n {
            let mut history = HistoryManager::default();
            let mut surface = surface_with(0);
            for i in 1..=n {
                paint(&mut surface, i * 10);
                history.snapshot(&surface, format!("step {i}"));
            }
            for _ in 0..k {
                assert!(history.undo(&mut surface).is_some());
            }
            let expected = surface_with((n - k) * 10);
            assert_eq!(surface.as_raw(), expected.as_raw(), "k = {k}");
        }
    }

    #[test]
    fn undo_redo_round_trip_is_byte_identical() {
        let mut history = HistoryManager::default();
        let mut surface = surface_with(1);
        history.snapshot(&surface, "Open Image");
        surface.pixels_mut().put_pixel(2, 2, Rgba([9, 8, 7, 6]));
        history.snapshot(&surface, "Brush");
        let mutated = surface.snapshot();

        history.undo(&mut surface);
        assert_eq!(surface.as_raw(), surface_with(1).as_raw());
        history.redo(&mut surface);
        assert_eq!(surface.as_raw(), mutated.as_raw());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut history = HistoryManager::new(5);
        let mut surface = surface_with(0);
        for i in 0..12u8 {
            paint(&mut surface, i);
            history.snapshot(&surface, format!("{i}"));
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.current_index(), Some(4));
        assert_eq!(history.undo_to(100, &mut surface), 4);
        assert!(!history.can_undo());
        // Oldest reachable state is snapshot #7.
        assert_eq!(surface.as_raw(), surface_with(7).as_raw());
    }

    #[test]
    fn new_snapshot_after_undo_truncates_redo() {
        let mut history = HistoryManager::default();
        let mut surface = surface_with(0);
        history.snapshot(&surface, "base");
        paint(&mut surface, 50);
        history.snapshot(&surface, "a");
        history.undo(&mut surface);
        assert!(history.can_redo());
        paint(&mut surface, 90);
        history.snapshot(&surface, "b");
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert!(history.redo(&mut surface).is_none());
        assert_eq!(history.descriptions(), vec!["b".to_string(), "base".to_string()]);
    }

    #[test]
    fn undo_restores_previous_dimensions() {
        let mut history = HistoryManager::default();
        let mut surface = RasterSurface::new(10, 6);
        history.snapshot(&surface, "base");
        surface.replace(RgbaImage::new(3, 2));
        history.snapshot(&surface, "Crop");
        history.undo(&mut surface);
        assert_eq!(surface.dimensions(), (10, 6));
        history.redo(&mut surface);
        assert_eq!(surface.dimensions(), (3, 2));
    }

    #[test]
    fn listeners_see_every_change() {
        let seen: Arc<Mutex<Vec<HistoryStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut history = HistoryManager::default();
        history.subscribe(Box::new(move |s| sink.lock().unwrap().push(s)));
        let mut surface = surface_with(0);
        history.snapshot(&surface, "base");
        history.snapshot(&surface, "edit");
        history.undo(&mut surface);
        history.redo(&mut surface);
        let seen = seen.lock().unwrap();
        let flags: Vec<(bool, bool)> = seen.iter().map(|s| (s.can_undo, s.can_redo)).collect();
        assert_eq!(flags, vec![(false, false), (true, false), (false, true), (true, false)]);
    }

    #[test]
    fn memory_cap_never_drops_current() {
        let surface = RasterSurface::new(16, 16);
        let one = surface.memory_bytes();
        let mut history = HistoryManager::new(50).with_memory_limit(Some(one * 2));
        for i in 0..6 {
            history.snapshot(&surface, format!("{i}"));
        }
        assert!(history.len() >= 1);
        assert!(history.len() <= 2);
        assert!(history.memory_usage() <= one * 2);
        assert_eq!(history.current_index(), Some(history.len() - 1));
    }
}
