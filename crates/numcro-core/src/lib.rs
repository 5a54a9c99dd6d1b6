// Numcro Core Library
// Event-driven dispatch engine mapping input keys to virtual buttons and macros

pub mod action;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod event;
pub mod input;
pub mod key;
pub mod macros;
pub mod mapping;
pub mod notify;
pub mod output;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod transport;

pub use action::Action;
pub use cancel::CancelToken;
pub use config::{Layout, LayoutError};
pub use engine::{Engine, EngineError};
pub use event::{
    DispatchError, DispatchLoop, Disposition, EngineCommand, EngineContext, EngineMessage,
    EventQueue, EventSender,
};
pub use input::{DeviceIdentity, EventSource, InputEvent};
pub use key::{normalize_key_name, ABORT_KEY};
pub use macros::{MacroDefinition, MacroError, MacroPlayer, MacroRecorder, MacroStore, Step};
pub use mapping::{ButtonId, ButtonTable, GridRect, MappingError, VirtualButton};
pub use notify::{LogNotifier, Notification, NotificationSink};
pub use output::{KeySink, LogSink, OutputError, RecordingSink};
pub use resolver::{resolve, Matches};
pub use settings::{Settings, SettingsError};
pub use transport::{TransportError, TransportResult, WireError};
