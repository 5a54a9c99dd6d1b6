// Numcro Output Layer - Key Sinks
// Destinations for synthesized key presses

use std::time::Instant;

use parking_lot::Mutex;

use super::state::PressedKeyState;
use super::OutputError;
use crate::Action;

/// Synthesizes key presses and releases.
///
/// Implementations are shared between the dispatch loop, turbo tasks and
/// macro player threads, so they must be usable through `&self`.
pub trait KeySink: Send + Sync {
    fn press(&self, key: &str) -> Result<(), OutputError>;

    fn release(&self, key: &str) -> Result<(), OutputError>;

    /// Emit a single action
    fn emit(&self, key: &str, action: Action) -> Result<(), OutputError> {
        match action {
            Action::Press => self.press(key),
            Action::Release => self.release(key),
        }
    }
}

/// Sink that only logs what it would have sent
#[derive(Debug, Default)]
pub struct LogSink;

impl KeySink for LogSink {
    fn press(&self, key: &str) -> Result<(), OutputError> {
        log::info!("[OUTPUT] press {}", key);
        Ok(())
    }

    fn release(&self, key: &str) -> Result<(), OutputError> {
        log::info!("[OUTPUT] release {}", key);
        Ok(())
    }
}

/// One action captured by a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedKey {
    pub key: String,
    pub action: Action,
    pub at: Instant,
}

/// Sink that keeps every emitted action in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    emitted: Mutex<Vec<EmittedKey>>,
    pressed: Mutex<PressedKeyState>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn emitted(&self) -> Vec<EmittedKey> {
        self.emitted.lock().clone()
    }

    /// Emitted `(key, action)` pairs without timing
    pub fn actions(&self) -> Vec<(String, Action)> {
        self.emitted
            .lock()
            .iter()
            .map(|e| (e.key.clone(), e.action))
            .collect()
    }

    /// Number of presses emitted for `key`
    pub fn press_count(&self, key: &str) -> usize {
        self.emitted
            .lock()
            .iter()
            .filter(|e| e.key == key && e.action.is_pressed())
            .count()
    }

    /// Keys pressed and not yet released
    pub fn held_keys(&self) -> Vec<String> {
        self.pressed.lock().get_all()
    }

    pub fn clear(&self) {
        self.emitted.lock().clear();
        self.pressed.lock().clear();
    }

    fn record(&self, key: &str, action: Action) {
        self.emitted.lock().push(EmittedKey {
            key: key.to_string(),
            action,
            at: Instant::now(),
        });
        let mut pressed = self.pressed.lock();
        match action {
            Action::Press => pressed.add(key),
            Action::Release => pressed.remove(key),
        }
    }
}

impl KeySink for RecordingSink {
    fn press(&self, key: &str) -> Result<(), OutputError> {
        self.record(key, Action::Press);
        Ok(())
    }

    fn release(&self, key: &str) -> Result<(), OutputError> {
        self.record(key, Action::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_tracks_held_keys() {
        let sink = RecordingSink::new();
        sink.press("a").unwrap();
        sink.emit("b", Action::Press).unwrap();
        sink.release("a").unwrap();

        assert_eq!(sink.held_keys(), vec!["b".to_string()]);
        assert_eq!(sink.press_count("a"), 1);
        assert_eq!(
            sink.actions(),
            vec![
                ("a".to_string(), Action::Press),
                ("b".to_string(), Action::Press),
                ("a".to_string(), Action::Release),
            ]
        );

        sink.clear();
        assert!(sink.emitted().is_empty());
        assert!(sink.held_keys().is_empty());
    }

    #[test]
    fn test_log_sink_never_fails() {
        let sink = LogSink;
        assert!(sink.press("a").is_ok());
        assert!(sink.emit("a", Action::Release).is_ok());
    }
}
