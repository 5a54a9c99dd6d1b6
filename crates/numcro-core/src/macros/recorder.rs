// Numcro Macro Recorder
// Turns a stream of raw key events into a timed MacroDefinition

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use super::{round_ms, MacroDefinition, Step};
use crate::input::{is_abort_key, InputEvent};

/// Whether the recorder wants more events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordProgress {
    Recording,
    Finished,
}

/// Records key events into macro steps.
///
/// Timing comes from each event's own timestamp, so the result does not
/// depend on how long the event spent in the queue.
#[derive(Debug)]
pub struct MacroRecorder {
    name: String,
    abort_key: String,
    steps: Vec<Step>,
    last_press: Option<Instant>,
    // key -> (index of its open step, press time)
    open: HashMap<String, (usize, Instant)>,
    finished: bool,
}

impl MacroRecorder {
    pub fn new(name: impl Into<String>, abort_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abort_key: abort_key.into(),
            steps: Vec::new(),
            last_press: None,
            open: HashMap::new(),
            finished: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one event
    pub fn handle(&mut self, event: &InputEvent) -> RecordProgress {
        if self.finished {
            return RecordProgress::Finished;
        }

        if is_abort_key(event, &self.abort_key) {
            log::debug!("Recording of '{}' stopped by {}", self.name, event.key);
            self.finished = true;
            return RecordProgress::Finished;
        }

        if event.action.is_pressed() {
            self.on_press(event);
        } else {
            self.on_release(event);
        }
        RecordProgress::Recording
    }

    fn on_press(&mut self, event: &InputEvent) {
        if self.open.contains_key(&event.key) {
            // Auto-repeat of a key still held
            return;
        }

        let delay_ms = match self.last_press {
            Some(last) => round_ms(millis_between(last, event.timestamp)),
            None => 0.0,
        };
        self.last_press = Some(event.timestamp);

        self.open
            .insert(event.key.clone(), (self.steps.len(), event.timestamp));
        self.steps.push(Step::new(event.key.clone(), delay_ms, None));
    }

    fn on_release(&mut self, event: &InputEvent) {
        if let Some((index, pressed_at)) = self.open.remove(&event.key) {
            if let Some(step) = self.steps.get_mut(index) {
                step.duration_ms = Some(round_ms(millis_between(pressed_at, event.timestamp)));
            }
        }
    }

    /// Stop recording and build the macro under a fresh id
    pub fn finish(self) -> MacroDefinition {
        MacroDefinition::new(Uuid::new_v4(), self.name, self.steps)
    }
}

fn millis_between(earlier: Instant, later: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn press(key: &str, at: Instant) -> InputEvent {
        InputEvent::press(key).with_timestamp(at)
    }

    fn release(key: &str, at: Instant) -> InputEvent {
        InputEvent::release(key).with_timestamp(at)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_records_delays_and_durations() {
        let t0 = Instant::now();
        let mut recorder = MacroRecorder::new("m", "esc");

        assert_eq!(recorder.handle(&press("a", t0)), RecordProgress::Recording);
        recorder.handle(&release("a", t0 + ms(50)));
        recorder.handle(&press("b", t0 + ms(200)));
        recorder.handle(&release("b", t0 + ms(230)));

        let def = recorder.finish();
        assert_eq!(def.name, "m");
        assert_eq!(
            def.steps,
            vec![Step::new("a", 0.0, Some(50.0)), Step::new("b", 200.0, Some(30.0))]
        );
    }

    #[test]
    fn test_abort_key_ends_recording_without_step() {
        let t0 = Instant::now();
        let mut recorder = MacroRecorder::new("m", "esc");

        recorder.handle(&press("a", t0));
        assert_eq!(
            recorder.handle(&press("Escape", t0 + ms(10))),
            RecordProgress::Finished
        );
        assert_eq!(recorder.handle(&press("b", t0 + ms(20))), RecordProgress::Finished);

        let def = recorder.finish();
        assert_eq!(def.steps, vec![Step::new("a", 0.0, None)]);
    }

    #[test]
    fn test_auto_repeat_is_coalesced() {
        let t0 = Instant::now();
        let mut recorder = MacroRecorder::new("m", "esc");

        recorder.handle(&press("a", t0));
        recorder.handle(&press("a", t0 + ms(30)));
        recorder.handle(&press("a", t0 + ms(60)));
        recorder.handle(&release("a", t0 + ms(100)));
        assert_eq!(recorder.step_count(), 1);

        recorder.handle(&press("a", t0 + ms(150)));
        let def = recorder.finish();
        assert_eq!(
            def.steps,
            vec![Step::new("a", 0.0, Some(100.0)), Step::new("a", 150.0, None)]
        );
    }

    #[test]
    fn test_overlapping_keys() {
        let t0 = Instant::now();
        let mut recorder = MacroRecorder::new("m", "esc");

        recorder.handle(&press("shift", t0));
        recorder.handle(&press("a", t0 + ms(20)));
        recorder.handle(&release("a", t0 + ms(40)));
        recorder.handle(&release("shift", t0 + ms(60)));
        // Release without press is ignored
        recorder.handle(&release("z", t0 + ms(70)));

        let def = recorder.finish();
        assert_eq!(
            def.steps,
            vec![Step::new("shift", 0.0, Some(60.0)), Step::new("a", 20.0, Some(20.0))]
        );
    }

    #[test]
    fn test_finish_assigns_fresh_ids() {
        let a = MacroRecorder::new("m", "esc").finish();
        let b = MacroRecorder::new("m", "esc").finish();
        assert_ne!(a.id, b.id);
        assert!(a.steps.is_empty());
    }
}
