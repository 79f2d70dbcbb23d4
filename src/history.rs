//! Bounded conversation history.
//!
//! The pipeline keeps a rolling transcript of user utterances and the
//! actions resolved for them. The buffer is capped so long sessions do not
//! grow prompts without bound; only a small recent window is injected into
//! each completion request.

use std::collections::VecDeque;

use crate::llm::ChatMessage;

/// Maximum number of messages retained.
pub const DEFAULT_CAPACITY: usize = 20;

/// Number of trailing messages included in each prompt.
pub const DEFAULT_WINDOW: usize = 5;

/// Rolling conversation buffer. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<ChatMessage>,
    capacity: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest entry when full.
    pub fn push(&mut self, message: ChatMessage) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// The trailing `window` messages, oldest first.
    pub fn recent(&self, window: usize) -> Vec<ChatMessage> {
        let skip = self.entries.len().saturating_sub(window);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
