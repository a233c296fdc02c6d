//! Bounded, navigable history of sent commands.

use std::collections::VecDeque;

/// Maximum number of commands kept.
pub const HISTORY_CAPACITY: usize = 50;

/// Command history with a shell-style cursor.
///
/// The cursor lies in `[0, len]`; `len` means "past the newest entry", i.e. a
/// fresh editing line.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    cursor: usize,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    /// Creates an empty history holding up to [`HISTORY_CAPACITY`] commands.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Creates an empty history with a custom capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Records a successfully sent command.
    ///
    /// Blank commands and immediate repeats are not stored. The cursor is
    /// reset past the newest entry either way.
    pub fn record(&mut self, command: &str) {
        if !command.trim().is_empty() && self.entries.back().is_none_or(|last| last != command) {
            self.entries.push_back(command.to_owned());
            while self.entries.len() > self.capacity {
                self.entries.pop_front();
            }
        }
        self.cursor = self.entries.len();
    }

    /// Steps back to the previous command.
    ///
    /// Returns `None` when already at the oldest entry.
    pub fn back(&mut self) -> Option<String> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Steps forward to the next command.
    ///
    /// Moving past the newest entry returns `None` (an empty editing line).
    pub fn forward(&mut self) -> Option<String> {
        let len = self.entries.len();
        if self.cursor + 1 < len {
            self.cursor += 1;
            self.entries.get(self.cursor).cloned()
        } else {
            self.cursor = len;
            None
        }
    }

    /// Returns the cursor position.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the number of stored commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no commands are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the stored commands, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skips_blank_and_repeats() {
        let mut history = CommandHistory::new();
        history.record("");
        history.record("   ");
        history.record("/stats");
        history.record("/stats");
        history.record("/info");
        history.record("/stats");
        assert_eq!(history.entries().collect::<Vec<_>>(), ["/stats", "/info", "/stats"]);
        assert_eq!(history.cursor(), 3);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = CommandHistory::new();
        for i in 0..=HISTORY_CAPACITY {
            history.record(&format!("/ping host{i}"));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.entries().next(), Some("/ping host1"));
        assert_eq!(history.entries().last(), Some("/ping host50"));
        assert_eq!(history.cursor(), HISTORY_CAPACITY);
    }

    #[test]
    fn test_navigation() {
        let mut history = CommandHistory::new();
        history.record("/ls /");
        history.record("/stats");
        history.record("/info");

        assert_eq!(history.back().as_deref(), Some("/info"));
        assert_eq!(history.back().as_deref(), Some("/stats"));
        assert_eq!(history.back().as_deref(), Some("/ls /"));
        assert_eq!(history.back(), None);
        assert_eq!(history.cursor(), 0);

        assert_eq!(history.forward().as_deref(), Some("/stats"));
        assert_eq!(history.forward().as_deref(), Some("/info"));
        assert_eq!(history.forward(), None);
        assert_eq!(history.cursor(), 3);
        assert_eq!(history.forward(), None);
        assert_eq!(history.cursor(), 3);
    }

    #[test]
    fn test_blank_command_resets_cursor() {
        let mut history = CommandHistory::new();
        history.record("/stats");
        history.record("/info");
        history.back();
        history.back();
        history.record("");
        assert_eq!(history.cursor(), 2);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_empty_history_navigation() {
        let mut history = CommandHistory::new();
        assert_eq!(history.back(), None);
        assert_eq!(history.forward(), None);
        assert_eq!(history.cursor(), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut history = CommandHistory::with_capacity(3);
        for cmd in ["/a", "/b", "/c", "/d"] {
            history.record(cmd);
        }
        for step in 0..20 {
            if step % 3 == 0 {
                history.forward();
            } else {
                history.back();
            }
            assert!(history.cursor() <= history.len());
        }
    }
}
