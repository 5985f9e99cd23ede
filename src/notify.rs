//! Typed notification channel
//!
//! Replaces a process-wide event emitter: components hold a [`Broadcaster`]
//! and observers subscribe for a `crossbeam_channel::Receiver`. Subscribers
//! whose receiver was dropped are pruned on the next send.

use crate::layers::base::LayerId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug)]
pub struct Broadcaster<T: Clone> {
    subscribers: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> Broadcaster<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    pub fn send(&self, message: T) {
        self.lock().retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<T>>> {
        // A panicking subscriber cannot leave the list half-updated.
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A toast-equivalent message for the user
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub layer: Option<LayerId>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            layer: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            layer: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            layer: None,
        }
    }

    pub fn for_layer(mut self, layer: LayerId) -> Self {
        self.layer = Some(layer);
        self
    }
}
