// Numcro Macros
// Macro definitions plus the recorder, player and store built on them

mod player;
mod recorder;
mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use player::{schedule, MacroPlayer, ScheduledAction};
pub use recorder::{MacroRecorder, RecordProgress};
pub use store::MacroStore;

/// Errors from macro storage and playback
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid macro JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Macro {0} does not exist")]
    NotFound(Uuid),
}

/// One key of a macro.
///
/// `delay_ms` is measured from the previous step's key-down (0 for the first
/// step). `duration_ms` is `None` when no release was observed while
/// recording; playback treats it as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepRecord")]
pub struct Step {
    pub key: String,
    pub delay_ms: f64,
    pub duration_ms: Option<f64>,
}

impl Step {
    pub fn new(key: impl Into<String>, delay_ms: f64, duration_ms: Option<f64>) -> Self {
        Self {
            key: key.into(),
            delay_ms,
            duration_ms,
        }
    }
}

/// On-disk step: current millisecond fields or legacy second fields
#[derive(Deserialize)]
struct StepRecord {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    delay_ms: Option<f64>,
    #[serde(default)]
    duration_ms: Option<f64>,
    #[serde(default)]
    delay: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

impl TryFrom<StepRecord> for Step {
    type Error = String;

    fn try_from(record: StepRecord) -> Result<Self, Self::Error> {
        let delay_ms = record
            .delay_ms
            .or(record.delay.map(|s| round_ms(s * 1000.0)))
            .unwrap_or(0.0);
        let duration_ms = record
            .duration_ms
            .or(record.duration.map(|s| round_ms(s * 1000.0)));

        if !delay_ms.is_finite() || delay_ms < 0.0 {
            return Err(format!("delay must be a non-negative number, got {}", delay_ms));
        }
        if let Some(duration) = duration_ms {
            if !duration.is_finite() || duration < 0.0 {
                return Err(format!(
                    "duration must be a non-negative number, got {}",
                    duration
                ));
            }
        }

        Ok(Step {
            key: record.key.unwrap_or_default(),
            delay_ms,
            duration_ms,
        })
    }
}

/// A named, ordered list of timed key steps
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    pub id: Uuid,
    pub name: String,
    pub steps: Vec<Step>,
}

impl MacroDefinition {
    pub fn new(id: Uuid, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id,
            name: name.into(),
            steps,
        }
    }

    /// Total playback length: last release relative to the first press
    pub fn total_duration_ms(&self) -> f64 {
        schedule(self)
            .last()
            .map(|action| action.at.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Round a millisecond value to whole microseconds
pub(crate) fn round_ms(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_reads_millisecond_fields() {
        let step: Step =
            serde_json::from_str(r#"{"key": "a", "delay_ms": 12.5, "duration_ms": null}"#).unwrap();
        assert_eq!(step, Step::new("a", 12.5, None));
    }

    #[test]
    fn test_step_converts_legacy_seconds() {
        let step: Step =
            serde_json::from_str(r#"{"key": "a", "delay": 0.25, "duration": 0.1}"#).unwrap();
        assert_eq!(step, Step::new("a", 250.0, Some(100.0)));
    }

    #[test]
    fn test_step_rejects_negative_delay() {
        let result: Result<Step, _> = serde_json::from_str(r#"{"key": "a", "delay_ms": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_step_serializes_millisecond_fields() {
        let json = serde_json::to_value(Step::new("a", 5.0, Some(1.0))).unwrap();
        assert_eq!(json["delay_ms"], 5.0);
        assert_eq!(json["duration_ms"], 1.0);
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(1.23456), 1.235);
        assert_eq!(round_ms(0.0), 0.0);
    }

    #[test]
    fn test_total_duration() {
        let def = MacroDefinition::new(
            Uuid::new_v4(),
            "m",
            vec![Step::new("a", 0.0, Some(50.0)), Step::new("b", 100.0, Some(20.0))],
        );
        assert!((def.total_duration_ms() - 120.0).abs() < 1e-6);
    }
}
