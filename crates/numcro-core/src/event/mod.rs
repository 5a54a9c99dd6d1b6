// Numcro Event Handling
// Queue, commands and the dispatch loop that consumes them

mod capture;
mod command;
pub mod r#loop;
mod queue;

pub use capture::{KeyCapture, DEFAULT_CAPTURE_TIMEOUT};
pub use command::EngineCommand;
pub use queue::{EngineMessage, EventQueue, EventSender, QueueClosed, DEFAULT_QUEUE_CAPACITY};
pub use r#loop::{
    DispatchError, DispatchLoop, DispatchResult, Disposition, EngineContext, POLL_INTERVAL,
};
