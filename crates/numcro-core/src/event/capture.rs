// Numcro Key Capture
// One-shot "press a key to map it" state

use std::time::{Duration, Instant};

use crate::mapping::ButtonId;

/// Default time to wait for a key during capture
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
struct PendingCapture {
    button: ButtonId,
    deadline: Instant,
}

/// At most one armed capture at a time
#[derive(Debug, Default)]
pub struct KeyCapture {
    pending: Option<PendingCapture>,
}

impl KeyCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a capture for `button`, replacing any previous one.
    ///
    /// Returns the target of the replaced capture.
    pub fn arm(&mut self, button: ButtonId, timeout: Duration, now: Instant) -> Option<ButtonId> {
        let previous = self.pending.take().map(|p| p.button);
        self.pending = Some(PendingCapture {
            button,
            deadline: now + timeout,
        });
        previous
    }

    pub fn target(&self) -> Option<ButtonId> {
        self.pending.map(|p| p.button)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Disarm and return the target if the deadline has passed
    pub fn take_expired(&mut self, now: Instant) -> Option<ButtonId> {
        match self.pending {
            Some(p) if now >= p.deadline => {
                self.pending = None;
                Some(p.button)
            }
            _ => None,
        }
    }

    /// Disarm and return the target of a live capture
    pub fn take(&mut self) -> Option<ButtonId> {
        self.pending.take().map(|p| p.button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_expires_at_deadline() {
        let now = Instant::now();
        let mut capture = KeyCapture::new();
        capture.arm(ButtonId::new(0, 0), Duration::from_millis(100), now);

        assert!(capture.take_expired(now + Duration::from_millis(99)).is_none());
        assert!(capture.is_armed());
        assert_eq!(
            capture.take_expired(now + Duration::from_millis(100)),
            Some(ButtonId::new(0, 0))
        );
        assert!(!capture.is_armed());
    }

    #[test]
    fn test_arm_replaces_previous() {
        let now = Instant::now();
        let mut capture = KeyCapture::new();
        assert!(capture.arm(ButtonId::new(0, 0), DEFAULT_CAPTURE_TIMEOUT, now).is_none());
        assert_eq!(
            capture.arm(ButtonId::new(1, 1), DEFAULT_CAPTURE_TIMEOUT, now),
            Some(ButtonId::new(0, 0))
        );
        assert_eq!(capture.take(), Some(ButtonId::new(1, 1)));
        assert!(capture.take().is_none());
    }
}
