// Numcro Dispatch Loop
// Single consumer of the event queue; owns all engine state

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::capture::{KeyCapture, DEFAULT_CAPTURE_TIMEOUT};
use super::command::EngineCommand;
use super::queue::{EngineMessage, EventQueue, QueueClosed};
use crate::cancel::CancelToken;
use crate::input::{EventSource, InputEvent};
use crate::key::ABORT_KEY;
use crate::macros::{MacroDefinition, MacroError, MacroPlayer, MacroRecorder, MacroStore, RecordProgress};
use crate::mapping::{ButtonId, ButtonTable, MappingError};
use crate::notify::{Notification, NotificationSink, CAPTURE_CANCELLED_MESSAGE};
use crate::resolver::{resolve, Matches};
use crate::state::{PressKey, PressTracker, TurboTable, TurboTask};

/// How long the loop blocks on the queue before re-checking deadlines
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while handling one message
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error("Macro {0} does not exist")]
    UnknownMacro(Uuid),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Failed to start thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What happened to an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// At least one button (or the capture/recorder) used the event
    Consumed,
    /// Nothing used the event
    Passthrough,
}

/// Engine state owned by the dispatch loop
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub buttons: ButtonTable,
    pub macros: MacroStore,
    pub device_filtering: bool,
    pub capture_timeout: Duration,
    pub abort_key: String,
    /// Re-emit unused local events on the key sink (for grabbed devices)
    pub passthrough: bool,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::new(ButtonTable::default(), MacroStore::new())
    }
}

impl EngineContext {
    pub fn new(buttons: ButtonTable, macros: MacroStore) -> Self {
        Self {
            buttons,
            macros,
            device_filtering: false,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            abort_key: ABORT_KEY.to_string(),
            passthrough: false,
        }
    }

    pub fn with_device_filtering(mut self, enabled: bool) -> Self {
        self.device_filtering = enabled;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    pub fn with_abort_key(mut self, key: impl Into<String>) -> Self {
        self.abort_key = key.into();
        self
    }

    pub fn with_passthrough(mut self, enabled: bool) -> Self {
        self.passthrough = enabled;
        self
    }

    /// Macro assigned to a button, if both exist
    fn macro_for(&self, id: ButtonId) -> Option<&MacroDefinition> {
        let macro_id = self.buttons.get(id)?.assigned_macro_id?;
        let def = self.macros.get(macro_id);
        if def.is_none() {
            log::warn!("Button {} refers to missing macro {}", id, macro_id);
        }
        def
    }
}

/// The single consumer of the event queue
pub struct DispatchLoop {
    ctx: EngineContext,
    queue: EventQueue,
    player: MacroPlayer,
    notifier: Arc<dyn NotificationSink>,
    presses: PressTracker,
    turbo: TurboTable,
    turbo_root: CancelToken,
    capture: KeyCapture,
    recorder: Option<MacroRecorder>,
}

impl DispatchLoop {
    pub fn new(
        ctx: EngineContext,
        queue: EventQueue,
        player: MacroPlayer,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ctx,
            queue,
            player,
            notifier,
            presses: PressTracker::new(),
            turbo: TurboTable::new(),
            turbo_root: CancelToken::new(),
            capture: KeyCapture::new(),
            recorder: None,
        }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn turbo_count(&self) -> usize {
        self.turbo.len()
    }

    /// Run until `token` is cancelled, then hand back the final state.
    ///
    /// Messages already queued at shutdown are still processed before every
    /// turbo task is stopped.
    pub fn run(mut self, token: &CancelToken) -> EngineContext {
        log::info!("Dispatch loop started");
        while !token.is_cancelled() {
            match self.queue.recv_timeout(POLL_INTERVAL) {
                Ok(Some(message)) => self.process(message),
                Ok(None) => {}
                Err(QueueClosed) => break,
            }
            self.tick(Instant::now());
        }

        while let Ok(Some(message)) = self.queue.try_recv() {
            self.process(message);
        }
        self.shutdown();
        log::info!("Dispatch loop stopped");
        self.ctx
    }

    /// Stop every turbo task and drop all press state
    pub fn shutdown(&mut self) {
        self.reset_presses();
    }

    /// Time-driven work: capture deadline
    pub fn tick(&mut self, now: Instant) {
        if let Some(button) = self.capture.take_expired(now) {
            log::info!("Key capture for {} timed out", button);
            self.notify(Notification::CaptureCancelled {
                button,
                message: CAPTURE_CANCELLED_MESSAGE.to_string(),
            });
        }
    }

    /// Handle one message, containing any failure to that message
    pub fn process(&mut self, message: EngineMessage) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match message {
            EngineMessage::Input(event) => self.dispatch_input(&event),
            EngineMessage::Command(command) => {
                self.apply_command(command);
                Ok(())
            }
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("Error handling input: {}", e),
            Err(_) => log::error!("Panic while handling message; continuing"),
        }
    }

    fn dispatch_input(&mut self, event: &InputEvent) -> DispatchResult<()> {
        let disposition = self.handle_input(event)?;
        if disposition == Disposition::Passthrough
            && self.ctx.passthrough
            && event.source == EventSource::Local
        {
            if let Err(e) = self.player.sink().emit(&event.key, event.action) {
                log::warn!("Passthrough of {} failed: {}", event, e);
            }
        }
        Ok(())
    }

    /// Run one input event through recording, capture and resolution
    pub fn handle_input(&mut self, event: &InputEvent) -> DispatchResult<Disposition> {
        self.tick(Instant::now());
        log::trace!("[INPUT] {}", event);

        if self.recorder.is_some() {
            return Ok(self.record(event));
        }

        if event.action.is_pressed() {
            if let Some(target) = self.capture.take() {
                self.complete_capture(target, event);
                return Ok(Disposition::Consumed);
            }
            self.on_press(event)
        } else {
            Ok(self.on_release(event))
        }
    }

    fn record(&mut self, event: &InputEvent) -> Disposition {
        let finished = match self.recorder.as_mut() {
            Some(recorder) => recorder.handle(event) == RecordProgress::Finished,
            None => false,
        };
        if finished {
            self.finish_recording();
        }
        Disposition::Passthrough
    }

    fn finish_recording(&mut self) -> Option<Uuid> {
        let recorder = self.recorder.take()?;
        let def = recorder.finish();
        let id = def.id;
        log::info!("Recorded macro '{}' ({} steps)", def.name, def.steps.len());
        self.ctx.macros.insert(def.clone());
        self.notify(Notification::MacroRecorded(def));
        Some(id)
    }

    fn complete_capture(&mut self, target: ButtonId, event: &InputEvent) {
        if !self.ctx.buttons.contains(target) {
            log::warn!("Capture target {} no longer exists", target);
            self.notify(Notification::CaptureCancelled {
                button: target,
                message: CAPTURE_CANCELLED_MESSAGE.to_string(),
            });
            return;
        }

        self.stop_turbo_for(target);
        if let Ok(button) = self.ctx.buttons.get_mut(target) {
            button.map_key(&event.key, event.device.clone());
        }
        log::info!("Mapped {} to {}", event, target);
        self.notify(Notification::KeyMapped {
            button: target,
            key: event.key.clone(),
            device: event.device.clone(),
        });
    }

    fn on_press(&mut self, event: &InputEvent) -> DispatchResult<Disposition> {
        let key = PressKey::for_event(event, self.ctx.device_filtering);

        if let Some(held) = self.presses.held_matches(&key) {
            // Repeat while down
            return Ok(disposition_for(held));
        }

        let matches = resolve(&self.ctx.buttons, event, self.ctx.device_filtering);
        self.presses.press(key.clone(), matches.clone());

        for id in &matches {
            self.notify(Notification::Highlight { button: *id, on: true });
        }

        let mut turbo_claimed = false;
        for id in &matches {
            let Some(button) = self.ctx.buttons.get(*id) else {
                continue;
            };
            let turbo_enabled = button.turbo_enabled;
            let delay_ms = button.turbo_delay_ms();
            let Some(def) = self.ctx.macro_for(*id).cloned() else {
                continue;
            };

            if turbo_enabled && !turbo_claimed {
                turbo_claimed = true;
                let task = TurboTask::spawn(
                    key.clone(),
                    *id,
                    delay_ms,
                    def,
                    self.player.clone(),
                    &self.turbo_root,
                )?;
                self.turbo.insert(task);
                self.notify(Notification::TurboStarted {
                    button: *id,
                    key: key.key.clone(),
                });
            } else {
                let macro_id = def.id;
                self.player.play(&def)?;
                self.notify(Notification::MacroTriggered {
                    button: *id,
                    macro_id,
                });
            }
        }

        Ok(disposition_for(&matches))
    }

    fn on_release(&mut self, event: &InputEvent) -> Disposition {
        let key = PressKey::for_event(event, self.ctx.device_filtering);

        let Some(held) = self.presses.release(&key) else {
            let matches = resolve(&self.ctx.buttons, event, self.ctx.device_filtering);
            return disposition_for(&matches);
        };

        for id in &held {
            self.notify(Notification::Highlight { button: *id, on: false });
        }
        if let Some(button) = self.turbo.stop_key(&key) {
            self.notify(Notification::TurboStopped {
                button,
                key: key.key.clone(),
            });
        }
        disposition_for(&held)
    }

    fn stop_turbo_for(&mut self, button: ButtonId) {
        for key in self.turbo.stop_button(button) {
            self.notify(Notification::TurboStopped {
                button,
                key: key.key,
            });
        }
    }

    /// Stop turbo on every button playing the given macro
    fn stop_turbo_for_macro(&mut self, macro_id: Uuid) {
        let buttons: Vec<ButtonId> = self
            .ctx
            .buttons
            .iter()
            .filter(|b| b.assigned_macro_id == Some(macro_id))
            .map(|b| b.id())
            .collect();
        for id in buttons {
            self.stop_turbo_for(id);
        }
    }

    /// Release all held keys, e.g. when press identity changes
    fn reset_presses(&mut self) {
        self.turbo_root.cancel();
        for (key, button) in self.turbo.stop_all() {
            self.notify(Notification::TurboStopped {
                button,
                key: key.key,
            });
        }
        self.turbo_root = CancelToken::new();
        self.presses.clear();
    }

    fn apply_command(&mut self, command: EngineCommand) {
        let name = command.name();
        match self.execute_command(command) {
            Ok(()) => {
                log::debug!("[COMMAND] {} applied", name);
                self.notify(Notification::CommandApplied { command: name });
            }
            Err(e) => {
                log::error!("[COMMAND] {} rejected: {}", name, e);
                self.notify(Notification::CommandRejected {
                    command: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn execute_command(&mut self, command: EngineCommand) -> DispatchResult<()> {
        match command {
            EngineCommand::InsertButton(button) => {
                self.ctx.buttons.insert(button)?;
            }
            EngineCommand::RemoveButton(id) => {
                self.ctx.buttons.remove(id)?;
                self.stop_turbo_for(id);
                self.presses.forget_button(id);
            }
            EngineCommand::ResizeGrid { rows, cols } => {
                let removed = self.ctx.buttons.resize(rows, cols)?;
                for button in removed {
                    log::info!("Button '{}' dropped by resize to {}x{}", button.name, rows, cols);
                    self.stop_turbo_for(button.id());
                    self.presses.forget_button(button.id());
                }
            }
            EngineCommand::MapKey {
                button,
                key,
                device,
            } => {
                self.ctx.buttons.get_mut(button)?.map_key(&key, device);
                self.stop_turbo_for(button);
            }
            EngineCommand::UnmapKey(button) => {
                self.ctx.buttons.get_mut(button)?.unmap();
                self.stop_turbo_for(button);
            }
            EngineCommand::AssignMacro { button, macro_id } => {
                if let Some(id) = macro_id {
                    if !self.ctx.macros.contains(id) {
                        return Err(DispatchError::UnknownMacro(id));
                    }
                }
                self.ctx.buttons.get_mut(button)?.assigned_macro_id = macro_id;
                self.stop_turbo_for(button);
            }
            EngineCommand::SetTurbo {
                button,
                enabled,
                delay_ms,
            } => {
                let target = self.ctx.buttons.get_mut(button)?;
                target.turbo_enabled = enabled;
                if let Some(delay_ms) = delay_ms {
                    target.set_turbo_delay_ms(delay_ms);
                }
                if !enabled {
                    self.stop_turbo_for(button);
                }
            }
            EngineCommand::SetDeviceFiltering(enabled) => {
                if self.ctx.device_filtering != enabled {
                    self.reset_presses();
                    self.ctx.device_filtering = enabled;
                }
            }
            EngineCommand::BeginCapture { button, timeout } => {
                if !self.ctx.buttons.contains(button) {
                    return Err(MappingError::NotFound(button).into());
                }
                let timeout = timeout.unwrap_or(self.ctx.capture_timeout);
                if let Some(previous) = self.capture.arm(button, timeout, Instant::now()) {
                    self.notify(Notification::CaptureCancelled {
                        button: previous,
                        message: CAPTURE_CANCELLED_MESSAGE.to_string(),
                    });
                }
                self.notify(Notification::CaptureStarted { button });
            }
            EngineCommand::UpsertMacro(def) => {
                self.stop_turbo_for_macro(def.id);
                self.ctx.macros.insert(def);
            }
            EngineCommand::EditMacro { id, json } => {
                self.ctx.macros.replace_from_json(id, &json)?;
                self.stop_turbo_for_macro(id);
            }
            EngineCommand::RemoveMacro(id) => {
                if self.ctx.macros.remove(id).is_none() {
                    return Err(DispatchError::UnknownMacro(id));
                }
                self.stop_turbo_for_macro(id);
                let assigned: Vec<ButtonId> = self
                    .ctx
                    .buttons
                    .iter()
                    .filter(|b| b.assigned_macro_id == Some(id))
                    .map(|b| b.id())
                    .collect();
                for button in assigned {
                    if let Ok(b) = self.ctx.buttons.get_mut(button) {
                        b.assigned_macro_id = None;
                    }
                }
            }
            EngineCommand::StartRecording { name } => {
                if self.recorder.is_some() {
                    return Err(DispatchError::AlreadyRecording);
                }
                log::info!("Recording macro '{}'", name);
                self.recorder = Some(MacroRecorder::new(name.clone(), self.ctx.abort_key.clone()));
                self.notify(Notification::RecordingStarted { name });
            }
            EngineCommand::StopRecording => {
                self.finish_recording().ok_or(DispatchError::NotRecording)?;
            }
            EngineCommand::ReplaceLayout(table) => {
                self.reset_presses();
                if let Some(target) = self.capture.take() {
                    self.notify(Notification::CaptureCancelled {
                        button: target,
                        message: CAPTURE_CANCELLED_MESSAGE.to_string(),
                    });
                }
                self.ctx.buttons = table;
            }
        }
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

fn disposition_for(matches: &Matches) -> Disposition {
    if matches.is_empty() {
        Disposition::Passthrough
    } else {
        Disposition::Consumed
    }
}
