// Numcro Turbo Tasks
// Repeating macro playback while a mapped key is held

use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::press::PressKey;
use crate::cancel::CancelToken;
use crate::macros::{MacroDefinition, MacroPlayer};
use crate::mapping::ButtonId;

/// A running turbo repetition for one held key
#[derive(Debug)]
pub struct TurboTask {
    key: PressKey,
    button: ButtonId,
    delay: Duration,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl TurboTask {
    /// Start repeating `def`: once immediately, then every `delay_ms`
    /// until cancelled.
    pub fn spawn(
        key: PressKey,
        button: ButtonId,
        delay_ms: u64,
        def: MacroDefinition,
        player: MacroPlayer,
        parent: &CancelToken,
    ) -> std::io::Result<Self> {
        let token = parent.child();
        let delay = Duration::from_millis(delay_ms);

        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("turbo-{}", key))
            .spawn(move || {
                log::debug!("[TURBO] start macro '{}' every {:?}", def.name, delay);
                while !worker_token.is_cancelled() {
                    if let Err(e) = player.play(&def) {
                        log::error!("[TURBO] failed to start macro '{}': {}", def.name, e);
                    }
                    if worker_token.wait_timeout(delay) {
                        break;
                    }
                }
                log::debug!("[TURBO] stop macro '{}'", def.name);
            })?;

        Ok(Self {
            key,
            button,
            delay,
            token,
            handle: Some(handle),
        })
    }

    pub fn key(&self) -> &PressKey {
        &self.key
    }

    pub fn button(&self) -> ButtonId {
        self.button
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel and wait for the repeat thread to exit
    pub fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[TURBO] task for {} panicked", self.key);
            }
        }
    }
}

impl Drop for TurboTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// At most one turbo task per held key
#[derive(Debug, Default)]
pub struct TurboTable {
    tasks: HashMap<PressKey, TurboTask>,
}

impl TurboTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, stopping any previous task for the same key
    pub fn insert(&mut self, task: TurboTask) {
        if let Some(old) = self.tasks.insert(task.key.clone(), task) {
            old.stop();
        }
    }

    pub fn is_running(&self, key: &PressKey) -> bool {
        self.tasks.contains_key(key)
    }

    /// Button driving the task for a key, if any
    pub fn button_for(&self, key: &PressKey) -> Option<ButtonId> {
        self.tasks.get(key).map(|t| t.button)
    }

    /// Stop the task for a key; returns the button it was driving
    pub fn stop_key(&mut self, key: &PressKey) -> Option<ButtonId> {
        let task = self.tasks.remove(key)?;
        let button = task.button;
        task.stop();
        Some(button)
    }

    /// Stop every task driven by a button; returns the keys that were stopped
    pub fn stop_button(&mut self, button: ButtonId) -> Vec<PressKey> {
        let keys: Vec<PressKey> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.button == button)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.stop_key(key);
        }
        keys
    }

    /// Stop everything; returns `(key, button)` for each stopped task
    pub fn stop_all(&mut self) -> Vec<(PressKey, ButtonId)> {
        let mut stopped = Vec::with_capacity(self.tasks.len());
        for (key, task) in self.tasks.drain() {
            stopped.push((key, task.button));
            task.stop();
        }
        stopped
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
