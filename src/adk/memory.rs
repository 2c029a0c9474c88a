// SPDX-License-Identifier: MIT

//! Conversation memory for agents

use crate::adk::model::Content;

/// Storage for the messages of a conversation
pub trait Memory: Send + Sync {
    fn add(&mut self, message: Content);

    fn messages(&self) -> Vec<Content>;

    fn reset(&mut self);

    fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }
}

/// Keeps every message
#[derive(Debug, Clone, Default)]
pub struct UnconstrainedMemory {
    messages: Vec<Content>,
}

impl UnconstrainedMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Memory for UnconstrainedMemory {
    fn add(&mut self, message: Content) {
        self.messages.push(message);
    }

    fn messages(&self) -> Vec<Content> {
        self.messages.clone()
    }

    fn reset(&mut self) {
        self.messages.clear();
    }
}

/// Keeps only the newest `size` messages
#[derive(Debug, Clone)]
pub struct SlidingMemory {
    size: usize,
    messages: Vec<Content>,
}

impl SlidingMemory {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            messages: Vec::with_capacity(size),
        }
    }
}

impl Memory for SlidingMemory {
    fn add(&mut self, message: Content) {
        self.messages.push(message);
        if self.messages.len() > self.size {
            let excess = self.messages.len() - self.size;
            self.messages.drain(..excess);
        }
    }

    fn messages(&self) -> Vec<Content> {
        self.messages.clone()
    }

    fn reset(&mut self) {
        self.messages.clear();
    }
}
