// Numcro Layout Files
// JSON persistence of the virtual grid and its buttons

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LayoutError;
use crate::input::DeviceIdentity;
use crate::macros::MacroStore;
use crate::mapping::{ButtonTable, GridRect, VirtualButton, DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TURBO_DELAY_MS};

/// Layout file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_cols")]
    pub cols: usize,
    #[serde(default)]
    pub virtual_buttons: Vec<ButtonRecord>,
}

fn default_rows() -> usize {
    DEFAULT_ROWS
}

fn default_cols() -> usize {
    DEFAULT_COLS
}

fn default_span() -> usize {
    1
}

fn default_turbo_delay() -> u64 {
    DEFAULT_TURBO_DELAY_MS
}

/// One button as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonRecord {
    #[serde(default)]
    pub name: String,
    pub start_row: usize,
    pub start_col: usize,
    #[serde(default = "default_span")]
    pub row_span: usize,
    #[serde(default = "default_span")]
    pub col_span: usize,
    #[serde(default)]
    pub mapped_key: Option<String>,
    #[serde(default)]
    pub mapped_device: Option<MappedDevice>,
    #[serde(default)]
    pub device_path: Option<String>,
    /// Kept as text so a bad id does not reject the whole layout
    #[serde(default)]
    pub assigned_macro_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_macro_name: Option<String>,
    #[serde(default)]
    pub turbo_enabled: bool,
    #[serde(default = "default_turbo_delay")]
    pub turbo_delay_ms: u64,
}

/// Stored device: older files keep only a display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappedDevice {
    Name(String),
    Identity(DeviceIdentity),
}

impl ButtonRecord {
    fn from_button(button: &VirtualButton, macros: Option<&MacroStore>) -> Self {
        let rect = button.grid_rect;
        Self {
            name: button.name.clone(),
            start_row: rect.row,
            start_col: rect.col,
            row_span: rect.row_span,
            col_span: rect.col_span,
            mapped_key: button.mapped_key.clone(),
            mapped_device: button.mapped_device.clone().map(MappedDevice::Identity),
            device_path: button
                .mapped_device
                .as_ref()
                .map(|d| d.serial_or_path.clone())
                .filter(|p| !p.is_empty()),
            assigned_macro_id: button.assigned_macro_id.map(|id| id.to_string()),
            assigned_macro_name: button
                .assigned_macro_id
                .and_then(|id| macros.and_then(|m| m.get(id)))
                .map(|def| def.name.clone()),
            turbo_enabled: button.turbo_enabled,
            turbo_delay_ms: button.turbo_delay_ms(),
        }
    }

    fn device(&self) -> Option<DeviceIdentity> {
        let mut device = match &self.mapped_device {
            Some(MappedDevice::Identity(identity)) => identity.clone(),
            Some(MappedDevice::Name(name)) => DeviceIdentity::new("", name.clone()),
            None => DeviceIdentity::default(),
        };
        if let Some(path) = self.device_path.as_ref().filter(|p| !p.is_empty()) {
            device.serial_or_path = path.clone();
        }
        // Same fallback as networked records without a path
        if device.serial_or_path.is_empty() && !device.display_name.is_empty() {
            device.serial_or_path = device.display_name.clone();
        }
        Some(device).filter(|d| !d.is_empty())
    }

    fn into_button(self) -> VirtualButton {
        let device = self.device();
        let mut button = VirtualButton::new(
            self.name,
            GridRect::new(self.start_row, self.start_col, self.row_span, self.col_span),
        )
        .with_turbo(self.turbo_enabled, self.turbo_delay_ms);

        if let Some(key) = self.mapped_key.filter(|k| !k.trim().is_empty()) {
            button.map_key(&key, device);
        }

        button.assigned_macro_id = match self.assigned_macro_id.as_deref() {
            None | Some("") => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!("Ignoring bad macro id '{}' on '{}': {}", raw, button.name, e);
                    None
                }
            },
        };
        button
    }
}

impl Layout {
    /// Snapshot a table; `macros` fills in the informational macro names
    pub fn from_table(table: &ButtonTable, macros: Option<&MacroStore>) -> Self {
        Self {
            rows: table.rows(),
            cols: table.cols(),
            virtual_buttons: table
                .iter()
                .map(|b| ButtonRecord::from_button(b, macros))
                .collect(),
        }
    }

    /// Build the button table.
    ///
    /// Buttons outside the grid are dropped. Overlapping buttons are kept,
    /// except ones sharing a top-left cell with an earlier button.
    pub fn into_table(self) -> Result<ButtonTable, LayoutError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(LayoutError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.rows, self.cols
            )));
        }

        let mut table = ButtonTable::new(self.rows, self.cols);
        for record in self.virtual_buttons {
            let button = record.into_button();
            let name = button.name.clone();
            let rect = button.grid_rect;
            if let Some(existing) = table.iter().find(|b| b.grid_rect.overlaps(&rect)) {
                log::warn!("Button '{}' {} overlaps '{}'", name, rect, existing.name);
            }
            if let Err(e) = table.insert_overlapping(button) {
                log::warn!("Dropping button '{}': {}", name, e);
            }
        }
        Ok(table)
    }

    pub fn from_json(content: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String, LayoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LayoutError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LayoutError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroDefinition;
    use crate::mapping::ButtonId;

    #[test]
    fn test_legacy_layout() {
        let json = r#"{
            "rows": 4, "cols": 4,
            "virtual_buttons": [
                {"name": "Btn 1", "start_row": 0, "start_col": 0, "row_span": 2, "col_span": 1,
                 "mapped_key": "Num 1", "mapped_device": "Keypad", "device_path": "\\\\?\\HID#1",
                 "assigned_macro_id": "not-a-uuid", "assigned_macro_name": "x",
                 "turbo_enabled": true, "turbo_delay_ms": 5},
                {"name": "Btn 2", "start_row": 3, "start_col": 3},
                {"name": "Btn 3", "start_row": 2, "start_col": 2, "mapped_key": "a",
                 "mapped_device": "Remote pad"}
            ]
        }"#;

        let table = Layout::from_json(json).unwrap().into_table().unwrap();
        assert_eq!(table.len(), 3);

        let b3 = table.get(ButtonId::new(2, 2)).unwrap();
        assert_eq!(b3.mapped_device.as_ref().unwrap().serial_or_path, "Remote pad");

        let b1 = table.get(ButtonId::new(0, 0)).unwrap();
        assert_eq!(b1.grid_rect, GridRect::new(0, 0, 2, 1));
        assert_eq!(b1.mapped_key.as_deref(), Some("num 1"));
        let device = b1.mapped_device.as_ref().unwrap();
        assert_eq!(device.serial_or_path, "\\\\?\\HID#1");
        assert_eq!(device.display_name, "Keypad");
        assert!(b1.assigned_macro_id.is_none());
        assert!(b1.turbo_enabled);
        assert_eq!(b1.turbo_delay_ms(), 10);

        let b2 = table.get(ButtonId::new(3, 3)).unwrap();
        assert!(b2.mapped_key.is_none());
        assert_eq!(b2.turbo_delay_ms(), 100);
    }

    #[test]
    fn test_defaults_and_out_of_grid() {
        let json = r#"{"virtual_buttons": [
            {"name": "in", "start_row": 5, "start_col": 4},
            {"name": "out", "start_row": 6, "start_col": 0}
        ]}"#;
        let table = Layout::from_json(json).unwrap().into_table().unwrap();
        assert_eq!((table.rows(), table.cols()), (6, 5));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_huge_coordinates_are_dropped() {
        let json = r#"{"rows": 4, "cols": 4, "virtual_buttons": [
            {"name": "far row", "start_row": 18446744073709551615, "start_col": 0},
            {"name": "far span", "start_row": 1, "start_col": 1, "col_span": 18446744073709551615},
            {"name": "ok", "start_row": 0, "start_col": 0}
        ]}"#;
        let table = Layout::from_json(json).unwrap().into_table().unwrap();
        let names: Vec<&str> = table.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn test_zero_grid_rejected() {
        let layout = Layout::from_json(r#"{"rows": 0, "cols": 3}"#).unwrap();
        assert!(matches!(layout.into_table(), Err(LayoutError::Invalid(_))));
    }

    #[test]
    fn test_round_trip_through_file() {
        let def = MacroDefinition::new(Uuid::new_v4(), "combo", vec![]);
        let mut macros = MacroStore::new();
        macros.insert(def.clone());

        let mut table = ButtonTable::new(3, 3);
        table
            .insert(
                VirtualButton::new("a", GridRect::new(0, 0, 1, 2))
                    .with_key("num 1", Some(DeviceIdentity::new("pad-1", "Pad").with_vendor_id(7)))
                    .with_macro(def.id)
                    .with_turbo(true, 50),
            )
            .unwrap();
        table.insert(VirtualButton::new("b", GridRect::cell(2, 2))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layouts").join("main.json");
        let layout = Layout::from_table(&table, Some(&macros));
        assert_eq!(
            layout.virtual_buttons[0].assigned_macro_name.as_deref(),
            Some("combo")
        );
        layout.save(&path).unwrap();

        let loaded = Layout::load(&path).unwrap().into_table().unwrap();
        let a = loaded.get(ButtonId::new(0, 0)).unwrap();
        let original = table.get(ButtonId::new(0, 0)).unwrap();
        assert_eq!(a, original);
        assert_eq!(a.mapped_device.as_ref().unwrap().vendor_id, Some(7));
        assert_eq!(loaded.len(), 2);
    }
}
