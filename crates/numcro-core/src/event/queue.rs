// Numcro Event Queue
// Bounded multi-producer queue feeding the dispatch loop

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::command::EngineCommand;
use crate::input::InputEvent;

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Everything the dispatch loop consumes
#[derive(Debug)]
pub enum EngineMessage {
    Input(InputEvent),
    Command(EngineCommand),
}

impl From<InputEvent> for EngineMessage {
    fn from(event: InputEvent) -> Self {
        EngineMessage::Input(event)
    }
}

impl From<EngineCommand> for EngineMessage {
    fn from(command: EngineCommand) -> Self {
        EngineMessage::Command(command)
    }
}

/// The queue has no consumer (or no producer) left
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Event queue closed")]
pub struct QueueClosed;

/// Cloneable producer handle
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<EngineMessage>,
}

impl EventSender {
    /// Enqueue a message, blocking while the queue is full
    pub fn push(&self, message: impl Into<EngineMessage>) -> Result<(), QueueClosed> {
        self.tx.send(message.into()).map_err(|_| QueueClosed)
    }

    pub fn push_input(&self, event: InputEvent) -> Result<(), QueueClosed> {
        self.push(EngineMessage::Input(event))
    }

    pub fn push_command(&self, command: EngineCommand) -> Result<(), QueueClosed> {
        self.push(EngineMessage::Command(command))
    }
}

/// Bounded MPSC queue; the consumer side is owned by the dispatch loop
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<EngineMessage>,
    rx: Receiver<EngineMessage>,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    /// Create a queue; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Wait up to `timeout` for a message; `Ok(None)` on timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineMessage>, QueueClosed> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueClosed),
        }
    }

    /// Take a message without waiting; `Ok(None)` when empty
    pub fn try_recv(&self) -> Result<Option<EngineMessage>, QueueClosed> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(QueueClosed),
        }
    }
}
