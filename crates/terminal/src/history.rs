//! Submitted-command history with arrow-key style recall.

/// The last `limit` submitted inputs, oldest first, plus a recall cursor.
///
/// The cursor is `None` while the user is typing fresh input. `up` walks
/// toward older entries and stops at the oldest; `down` walks back toward
/// the newest and, once past it, returns to fresh (empty) input.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<String>,
    limit: usize,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        Self::from_entries(Vec::new(), limit)
    }

    /// Restore persisted entries, keeping only the newest `limit`.
    pub fn from_entries(mut entries: Vec<String>, limit: usize) -> Self {
        let limit = limit.max(1);
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Self {
            entries,
            limit,
            cursor: None,
        }
    }

    /// Record a submitted input verbatim. Blank input is not recorded. Always
    /// resets the cursor.
    pub fn push(&mut self, input: &str) {
        self.cursor = None;
        if input.trim().is_empty() {
            return;
        }
        self.entries.push(input.to_string());
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
    }

    /// Move to the next older entry. `None` leaves the input unchanged.
    pub fn up(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(index);
        Some(&self.entries[index])
    }

    /// Move to the next newer entry; past the newest the input becomes
    /// empty. `None` (not recalling) leaves the input unchanged.
    pub fn down(&mut self) -> Option<&str> {
        let current = self.cursor?;
        if current + 1 >= self.entries.len() {
            self.cursor = None;
            return Some("");
        }
        self.cursor = Some(current + 1);
        Some(&self.entries[current + 1])
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
