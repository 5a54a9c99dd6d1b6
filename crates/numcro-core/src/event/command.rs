// Numcro Engine Commands
// External edits, applied in order by the dispatch loop

use std::time::Duration;

use uuid::Uuid;

use crate::input::DeviceIdentity;
use crate::macros::MacroDefinition;
use crate::mapping::{ButtonId, ButtonTable, VirtualButton};

/// A mutation of engine state requested from outside the dispatch loop
#[derive(Debug, Clone)]
pub enum EngineCommand {
    InsertButton(VirtualButton),
    RemoveButton(ButtonId),
    ResizeGrid {
        rows: usize,
        cols: usize,
    },
    MapKey {
        button: ButtonId,
        key: String,
        device: Option<DeviceIdentity>,
    },
    UnmapKey(ButtonId),
    /// `None` clears the assignment
    AssignMacro {
        button: ButtonId,
        macro_id: Option<Uuid>,
    },
    /// `delay_ms: None` keeps the current interval
    SetTurbo {
        button: ButtonId,
        enabled: bool,
        delay_ms: Option<u64>,
    },
    SetDeviceFiltering(bool),
    /// Map the next pressed key onto `button`; `None` uses the configured timeout
    BeginCapture {
        button: ButtonId,
        timeout: Option<Duration>,
    },
    UpsertMacro(MacroDefinition),
    /// Replace a macro from its edited JSON body
    EditMacro {
        id: Uuid,
        json: String,
    },
    RemoveMacro(Uuid),
    StartRecording {
        name: String,
    },
    StopRecording,
    ReplaceLayout(ButtonTable),
}

impl EngineCommand {
    /// Short name used in notifications and logs
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::InsertButton(_) => "InsertButton",
            EngineCommand::RemoveButton(_) => "RemoveButton",
            EngineCommand::ResizeGrid { .. } => "ResizeGrid",
            EngineCommand::MapKey { .. } => "MapKey",
            EngineCommand::UnmapKey(_) => "UnmapKey",
            EngineCommand::AssignMacro { .. } => "AssignMacro",
            EngineCommand::SetTurbo { .. } => "SetTurbo",
            EngineCommand::SetDeviceFiltering(_) => "SetDeviceFiltering",
            EngineCommand::BeginCapture { .. } => "BeginCapture",
            EngineCommand::UpsertMacro(_) => "UpsertMacro",
            EngineCommand::EditMacro { .. } => "EditMacro",
            EngineCommand::RemoveMacro(_) => "RemoveMacro",
            EngineCommand::StartRecording { .. } => "StartRecording",
            EngineCommand::StopRecording => "StopRecording",
            EngineCommand::ReplaceLayout(_) => "ReplaceLayout",
        }
    }
}
