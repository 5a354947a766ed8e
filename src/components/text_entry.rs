use std::collections::VecDeque;

use egui::Pos2;
use uuid::Uuid;

use crate::components::tools::TextStyle;

/// Number of recently committed texts remembered by default.
pub const DEFAULT_TEXT_MEMORY_SLOTS: usize = 3;

// ============================================================================
// RECENT TEXT MEMORY
// ============================================================================

/// A previously committed string with the style it was drawn in.
#[derive(Clone, Debug, PartialEq)]
pub struct TextMemory {
    pub id: Uuid,
    pub text: String,
    pub style: TextStyle,
}

/// Newest-first recency list with a fixed number of slots.
#[derive(Clone, Debug)]
pub struct TextMemoryList {
    entries: VecDeque<TextMemory>,
    capacity: usize,
}

impl Default for TextMemoryList {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_MEMORY_SLOTS)
    }
}

impl TextMemoryList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Remember a committed text. Re-committing the same text and style moves
    /// the existing entry to the front instead of adding a duplicate.
    pub fn record(&mut self, text: &str, style: TextStyle) -> Option<&TextMemory> {
        if self.capacity == 0 {
            return None;
        }
        let existing = self
            .entries
            .iter()
            .position(|m| m.text == text && m.style == style);
        let entry = match existing.and_then(|i| self.entries.remove(i)) {
            Some(entry) => entry,
            None => TextMemory {
                id: Uuid::new_v4(),
                text: text.to_string(),
                style,
            },
        };
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        self.entries.front()
    }

    pub fn get(&self, slot: usize) -> Option<&TextMemory> {
        self.entries.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextMemory> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TEXT EDIT STATE MACHINE
// ============================================================================

/// An open, uncommitted text region.
#[derive(Clone, Debug, PartialEq)]
pub struct TextEdit {
    /// Top-left of the first line in raster pixels.
    pub anchor: Pos2,
    pub text: String,
}

impl TextEdit {
    /// Whitespace-only edits close without drawing anything.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Keyboard input the text region understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKey {
    Char(char),
    Backspace,
    Enter { shift: bool },
    Escape,
}

/// Result of feeding a key to the text region.
#[derive(Clone, Debug, PartialEq)]
pub enum TextOutcome {
    /// No edit was open.
    Ignored,
    /// Still editing.
    Editing,
    /// The edit closed and should be drawn.
    Commit(TextEdit),
    /// The edit was thrown away.
    Discarded,
}

/// `Idle ⇄ Editing` text-entry state with the one-shot prefill slot.
#[derive(Clone, Debug, Default)]
pub struct TextEntry {
    edit: Option<TextEdit>,
    prefill: Option<String>,
}

impl TextEntry {
    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn current(&self) -> Option<&TextEdit> {
        self.edit.as_ref()
    }

    /// Seed the next opened region with `text`.
    pub fn set_prefill(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.prefill = if text.is_empty() { None } else { Some(text) };
    }

    pub fn prefill(&self) -> Option<&str> {
        self.prefill.as_deref()
    }

    /// Open a region at `anchor`, consuming the prefill. Returns the edit that
    /// was open before, which the caller must commit first.
    pub fn open(&mut self, anchor: Pos2) -> Option<TextEdit> {
        let previous = self.edit.take();
        self.edit = Some(TextEdit {
            anchor,
            text: self.prefill.take().unwrap_or_default(),
        });
        previous
    }

    pub fn insert_str(&mut self, s: &str) -> bool {
        match &mut self.edit {
            Some(edit) => {
                edit.text.push_str(s);
                true
            }
            None => false,
        }
    }

    pub fn key(&mut self, key: TextKey) -> TextOutcome {
        let Some(edit) = &mut self.edit else {
            return TextOutcome::Ignored;
        };
        match key {
            TextKey::Char(c) => {
                edit.text.push(c);
                TextOutcome::Editing
            }
            TextKey::Backspace => {
                edit.text.pop();
                TextOutcome::Editing
            }
            TextKey::Enter { shift: true } => {
                edit.text.push('\n');
                TextOutcome::Editing
            }
            TextKey::Enter { shift: false } => match self.edit.take() {
                Some(edit) => TextOutcome::Commit(edit),
                None => TextOutcome::Ignored,
            },
            TextKey::Escape => {
                self.edit = None;
                TextOutcome::Discarded
            }
        }
    }

    /// Focus left the region: it commits.
    pub fn blur(&mut self) -> Option<TextEdit> {
        self.edit.take()
    }

    /// Drop the open region and prefill without committing (image replaced).
    pub fn clear(&mut self) {
        self.edit = None;
        self.prefill = None;
    }
}
