//! Rolling conversational memory.

use std::collections::VecDeque;

use crate::completion::ChatMessage;

/// Default capacity: five request/response pairs
pub const MEMORY_WINDOW: usize = 10;

/// Bounded window of prior turns, oldest evicted first
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    entries: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for MemoryWindow {
    fn default() -> Self {
        Self::with_capacity(MEMORY_WINDOW)
    }
}

impl MemoryWindow {
    /// Window with the default capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Window holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one exchange (incoming message and the reply to it)
    pub fn record_exchange(&mut self, request: ChatMessage, response: ChatMessage) {
        self.push(request);
        self.push(response);
    }

    fn push(&mut self, entry: ChatMessage) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
