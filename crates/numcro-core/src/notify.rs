// Numcro Notifications
// Fire-and-forget outcome reports from the dispatch loop

use std::fmt;

use crossbeam_channel::{Sender, TrySendError};
use uuid::Uuid;

use crate::input::DeviceIdentity;
use crate::macros::MacroDefinition;
use crate::mapping::ButtonId;

/// Message shown when a key capture times out
pub const CAPTURE_CANCELLED_MESSAGE: &str = "No key pressed. Mapping cancelled.";

/// Something the engine wants a front end to know about
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A mapped button went down (`on`) or up
    Highlight { button: ButtonId, on: bool },
    /// A macro was started for a button
    MacroTriggered { button: ButtonId, macro_id: Uuid },
    TurboStarted { button: ButtonId, key: String },
    TurboStopped { button: ButtonId, key: String },
    /// The engine is waiting for the next key press to map onto `button`
    CaptureStarted { button: ButtonId },
    /// A captured key was mapped onto `button`
    KeyMapped {
        button: ButtonId,
        key: String,
        device: Option<DeviceIdentity>,
    },
    CaptureCancelled { button: ButtonId, message: String },
    RecordingStarted { name: String },
    /// A finished recording, already added to the engine's macro store
    MacroRecorded(MacroDefinition),
    CommandApplied { command: &'static str },
    CommandRejected { command: &'static str, reason: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Highlight { button, on } => {
                write!(f, "Button {} {}", button, if *on { "down" } else { "up" })
            }
            Notification::MacroTriggered { button, macro_id } => {
                write!(f, "Button {} triggered macro {}", button, macro_id)
            }
            Notification::TurboStarted { button, key } => {
                write!(f, "Turbo started on {} ({})", button, key)
            }
            Notification::TurboStopped { button, key } => {
                write!(f, "Turbo stopped on {} ({})", button, key)
            }
            Notification::CaptureStarted { button } => {
                write!(f, "Press a key to map onto {}", button)
            }
            Notification::KeyMapped { button, key, device } => match device {
                Some(device) => write!(f, "Mapped {} from {} to {}", key, device, button),
                None => write!(f, "Mapped {} to {}", key, button),
            },
            Notification::CaptureCancelled { message, .. } => f.write_str(message),
            Notification::RecordingStarted { name } => {
                write!(f, "Recording '{}' (press esc to stop)", name)
            }
            Notification::MacroRecorded(def) => {
                write!(f, "Macro '{}' recorded ({} steps)", def.name, def.steps.len())
            }
            Notification::CommandApplied { command } => write!(f, "{} applied", command),
            Notification::CommandRejected { command, reason } => {
                write!(f, "{} rejected: {}", command, reason)
            }
        }
    }
}

/// Receiver of engine notifications; must never block the caller
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl NotificationSink for Sender<Notification> {
    fn notify(&self, notification: Notification) {
        match self.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => log::debug!("Notification dropped (full): {}", n),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Writes every notification to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Highlight { .. } => log::debug!("{}", notification),
            Notification::CommandRejected { .. } | Notification::CaptureCancelled { .. } => {
                log::warn!("{}", notification)
            }
            _ => log::info!("{}", notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.notify(Notification::CaptureStarted {
            button: ButtonId::new(0, 1),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::CaptureStarted {
                button: ButtonId::new(0, 1)
            }
        );
    }

    #[test]
    fn test_channel_sink_never_blocks() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.notify(Notification::RecordingStarted { name: "a".into() });
        tx.notify(Notification::RecordingStarted { name: "b".into() });
        assert_eq!(rx.len(), 1);

        drop(rx);
        tx.notify(Notification::RecordingStarted { name: "c".into() });
    }

    #[test]
    fn test_display() {
        let n = Notification::CaptureCancelled {
            button: ButtonId::new(0, 0),
            message: CAPTURE_CANCELLED_MESSAGE.to_string(),
        };
        assert_eq!(n.to_string(), "No key pressed. Mapping cancelled.");
        let n = Notification::Highlight {
            button: ButtonId::new(1, 2),
            on: true,
        };
        assert_eq!(n.to_string(), "Button (1, 2) down");
    }
}
