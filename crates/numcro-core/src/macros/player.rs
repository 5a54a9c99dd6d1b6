// Numcro Macro Player
// Absolute-timeline scheduling and playback of macro steps

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{MacroDefinition, MacroError};
use crate::output::KeySink;
use crate::Action;

/// One press or release at an offset from playback start
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAction {
    pub at: Duration,
    pub action: Action,
    pub key: String,
}

/// Build the absolute timeline of a macro.
///
/// Press times accumulate the step delays; each release lands at its press
/// plus the step duration. The sort is stable, so equal instants keep step
/// order with a step's press ahead of its release.
pub fn schedule(def: &MacroDefinition) -> Vec<ScheduledAction> {
    let mut actions = Vec::with_capacity(def.steps.len() * 2);
    let mut press_ms = 0.0_f64;

    for step in &def.steps {
        press_ms += step.delay_ms.max(0.0);
        if step.key.is_empty() {
            continue;
        }
        let release_ms = press_ms + step.duration_ms.unwrap_or(0.0).max(0.0);

        actions.push(ScheduledAction {
            at: ms_to_duration(press_ms),
            action: Action::Press,
            key: step.key.clone(),
        });
        actions.push(ScheduledAction {
            at: ms_to_duration(release_ms),
            action: Action::Release,
            key: step.key.clone(),
        });
    }

    actions.sort_by_key(|a| a.at);
    actions
}

fn ms_to_duration(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        return Duration::ZERO;
    }
    let nanos = (ms * 1_000_000.0).round();
    if nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }
    Duration::from_nanos(nanos as u64)
}

/// Plays macros on a key sink, one thread per playback
#[derive(Clone)]
pub struct MacroPlayer {
    sink: Arc<dyn KeySink>,
}

impl MacroPlayer {
    pub fn new(sink: Arc<dyn KeySink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn KeySink> {
        &self.sink
    }

    /// Start playing a macro on its own thread.
    ///
    /// The timeline is anchored when this is called, not when the thread
    /// starts running.
    pub fn play(&self, def: &MacroDefinition) -> Result<JoinHandle<()>, MacroError> {
        let start = Instant::now();
        let actions = schedule(def);
        let name = def.name.clone();
        let player = self.clone();

        let handle = thread::Builder::new()
            .name(format!("macro-{}", def.id))
            .spawn(move || {
                player.execute(&actions, start);
                log::info!("Macro '{}' executed", name);
            })?;
        Ok(handle)
    }

    /// Run a timeline on the current thread.
    ///
    /// Instants already in the past fire immediately. A failed emit is logged
    /// and playback moves on to the next action.
    pub fn execute(&self, actions: &[ScheduledAction], start: Instant) {
        for scheduled in actions {
            let due = start + scheduled.at;
            let wait = due.saturating_duration_since(Instant::now());
            if !wait.is_zero() {
                thread::sleep(wait);
            }

            if let Err(e) = self.sink.emit(&scheduled.key, scheduled.action) {
                log::warn!(
                    "Macro output failed ({} {}): {}",
                    scheduled.action,
                    scheduled.key,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::Step;
    use crate::output::{OutputError, RecordingSink};
    use uuid::Uuid;

    fn def(steps: Vec<Step>) -> MacroDefinition {
        MacroDefinition::new(Uuid::new_v4(), "m", steps)
    }

    fn timeline(actions: &[ScheduledAction]) -> Vec<(u128, Action, &str)> {
        actions
            .iter()
            .map(|a| (a.at.as_millis(), a.action, a.key.as_str()))
            .collect()
    }

    #[test]
    fn test_schedule_accumulates_delays() {
        let actions = schedule(&def(vec![
            Step::new("a", 0.0, Some(50.0)),
            Step::new("b", 100.0, Some(20.0)),
            Step::new("c", 30.0, None),
        ]));

        assert_eq!(
            timeline(&actions),
            vec![
                (0, Action::Press, "a"),
                (50, Action::Release, "a"),
                (100, Action::Press, "b"),
                (120, Action::Release, "b"),
                (130, Action::Press, "c"),
                (130, Action::Release, "c"),
            ]
        );
    }

    #[test]
    fn test_schedule_interleaves_overlapping_steps() {
        let actions = schedule(&def(vec![
            Step::new("shift", 0.0, Some(100.0)),
            Step::new("a", 20.0, Some(10.0)),
        ]));

        assert_eq!(
            timeline(&actions),
            vec![
                (0, Action::Press, "shift"),
                (20, Action::Press, "a"),
                (30, Action::Release, "a"),
                (100, Action::Release, "shift"),
            ]
        );
    }

    #[test]
    fn test_schedule_skips_empty_keys() {
        let actions = schedule(&def(vec![
            Step::new("", 40.0, Some(5.0)),
            Step::new("a", 10.0, Some(5.0)),
        ]));
        assert_eq!(
            timeline(&actions),
            vec![(50, Action::Press, "a"), (55, Action::Release, "a")]
        );
    }

    #[test]
    fn test_execute_past_due_runs_immediately() {
        let sink = Arc::new(RecordingSink::new());
        let player = MacroPlayer::new(sink.clone());
        let actions = schedule(&def(vec![Step::new("a", 0.0, Some(10.0))]));

        let start = Instant::now() - Duration::from_secs(1);
        let before = Instant::now();
        player.execute(&actions, start);
        assert!(before.elapsed() < Duration::from_millis(500));
        assert_eq!(
            sink.actions(),
            vec![("a".to_string(), Action::Press), ("a".to_string(), Action::Release)]
        );
    }

    #[test]
    fn test_play_respects_timing() {
        let sink = Arc::new(RecordingSink::new());
        let player = MacroPlayer::new(sink.clone());
        let macro_def = def(vec![Step::new("a", 0.0, Some(20.0)), Step::new("b", 80.0, Some(0.0))]);

        let start = Instant::now();
        player.play(&macro_def).unwrap().join().unwrap();

        let emitted = sink.emitted();
        assert_eq!(emitted.len(), 4);
        let b_press = emitted[2].at.duration_since(start);
        assert!(b_press >= Duration::from_millis(80));
        assert!(b_press < Duration::from_millis(1000));
    }

    struct FailingSink;

    impl KeySink for FailingSink {
        fn press(&self, key: &str) -> Result<(), OutputError> {
            Err(OutputError::UnknownKey(key.to_string()))
        }

        fn release(&self, _key: &str) -> Result<(), OutputError> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_errors_do_not_stop_playback() {
        let player = MacroPlayer::new(Arc::new(FailingSink));
        let actions = schedule(&def(vec![Step::new("a", 0.0, None), Step::new("b", 0.0, None)]));
        // Returns normally despite every press failing
        player.execute(&actions, Instant::now());
    }
}
