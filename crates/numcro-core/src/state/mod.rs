// Numcro Press/Release State
// Per-key press tracking and the turbo tasks it drives

mod press;
mod turbo;

pub use press::{PressKey, PressTracker};
pub use turbo::{TurboTable, TurboTask};
