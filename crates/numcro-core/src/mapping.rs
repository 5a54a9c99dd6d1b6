// Numcro Mapping Structures
// VirtualButton, GridRect and the ButtonTable they live in

use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::input::DeviceIdentity;
use crate::key::normalize_key_name;

/// Lower bound for the turbo repeat interval
pub const MIN_TURBO_DELAY_MS: u64 = 10;

/// Turbo repeat interval for new buttons
pub const DEFAULT_TURBO_DELAY_MS: u64 = 100;

pub const DEFAULT_ROWS: usize = 6;
pub const DEFAULT_COLS: usize = 5;

/// Errors from edits to the button table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("Button {0} does not exist")]
    NotFound(ButtonId),

    #[error("Rectangle {rect} does not fit in a {rows}x{cols} grid")]
    OutOfGrid { rect: GridRect, rows: usize, cols: usize },

    #[error("Rectangle {rect} overlaps button {existing}")]
    Overlap { rect: GridRect, existing: ButtonId },

    #[error("Grid must have at least one row and one column (got {rows}x{cols})")]
    InvalidGrid { rows: usize, cols: usize },
}

/// Identifies a button by the grid cell of its top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ButtonId {
    pub row: usize,
    pub col: usize,
}

impl ButtonId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Rectangle of grid cells covered by a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridRect {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
}

impl GridRect {
    /// Spans below one are raised to one
    pub fn new(row: usize, col: usize, row_span: usize, col_span: usize) -> Self {
        Self {
            row,
            col,
            row_span: row_span.max(1),
            col_span: col_span.max(1),
        }
    }

    /// Single-cell rectangle
    pub fn cell(row: usize, col: usize) -> Self {
        Self::new(row, col, 1, 1)
    }

    /// One past the last row; `None` if it would overflow
    fn row_end(&self) -> Option<usize> {
        self.row.checked_add(self.row_span)
    }

    /// One past the last column; `None` if it would overflow
    fn col_end(&self) -> Option<usize> {
        self.col.checked_add(self.col_span)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        let row_end = self.row_end().unwrap_or(usize::MAX);
        let col_end = self.col_end().unwrap_or(usize::MAX);
        row >= self.row && row < row_end && col >= self.col && col < col_end
    }

    pub fn overlaps(&self, other: &GridRect) -> bool {
        let end = |v: Option<usize>| v.unwrap_or(usize::MAX);
        self.row < end(other.row_end())
            && other.row < end(self.row_end())
            && self.col < end(other.col_end())
            && other.col < end(self.col_end())
    }

    /// True if the rectangle lies fully inside a `rows` x `cols` grid
    pub fn fits(&self, rows: usize, cols: usize) -> bool {
        matches!(self.row_end(), Some(end) if end <= rows)
            && matches!(self.col_end(), Some(end) if end <= cols)
    }
}

impl fmt::Display for GridRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{} {}x{}]",
            self.row, self.col, self.row_span, self.col_span
        )
    }
}

/// A user-defined cell (or merged rectangle) of the virtual grid
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualButton {
    pub name: String,
    pub grid_rect: GridRect,
    pub mapped_key: Option<String>,
    pub mapped_device: Option<DeviceIdentity>,
    pub assigned_macro_id: Option<Uuid>,
    pub turbo_enabled: bool,
    turbo_delay_ms: u64,
}

impl VirtualButton {
    pub fn new(name: impl Into<String>, grid_rect: GridRect) -> Self {
        Self {
            name: name.into(),
            grid_rect,
            mapped_key: None,
            mapped_device: None,
            assigned_macro_id: None,
            turbo_enabled: false,
            turbo_delay_ms: DEFAULT_TURBO_DELAY_MS,
        }
    }

    /// Map a physical key (normalized) and optional device
    pub fn with_key(mut self, key: &str, device: Option<DeviceIdentity>) -> Self {
        self.map_key(key, device);
        self
    }

    pub fn with_macro(mut self, macro_id: Uuid) -> Self {
        self.assigned_macro_id = Some(macro_id);
        self
    }

    pub fn with_turbo(mut self, enabled: bool, delay_ms: u64) -> Self {
        self.turbo_enabled = enabled;
        self.set_turbo_delay_ms(delay_ms);
        self
    }

    pub fn id(&self) -> ButtonId {
        ButtonId::new(self.grid_rect.row, self.grid_rect.col)
    }

    pub fn map_key(&mut self, key: &str, device: Option<DeviceIdentity>) {
        self.mapped_key = Some(normalize_key_name(key));
        self.mapped_device = device.filter(|d| !d.is_empty());
    }

    pub fn unmap(&mut self) {
        self.mapped_key = None;
        self.mapped_device = None;
    }

    pub fn turbo_delay_ms(&self) -> u64 {
        self.turbo_delay_ms
    }

    /// Set the turbo interval, clamped to [`MIN_TURBO_DELAY_MS`]
    pub fn set_turbo_delay_ms(&mut self, delay_ms: u64) {
        self.turbo_delay_ms = delay_ms.max(MIN_TURBO_DELAY_MS);
    }
}

/// Ordered table of the grid's buttons.
///
/// Iteration follows insertion order, which is also resolution order.
#[derive(Debug, Clone)]
pub struct ButtonTable {
    rows: usize,
    cols: usize,
    buttons: IndexMap<ButtonId, VirtualButton>,
}

impl Default for ButtonTable {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl ButtonTable {
    /// Create an empty table; dimensions below one are raised to one
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
            buttons: IndexMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Insert a button, rejecting rectangles that leave the grid or overlap
    pub fn insert(&mut self, button: VirtualButton) -> Result<ButtonId, MappingError> {
        let rect = button.grid_rect;
        if !rect.fits(self.rows, self.cols) {
            return Err(MappingError::OutOfGrid {
                rect,
                rows: self.rows,
                cols: self.cols,
            });
        }
        if let Some(existing) = self.find_overlap(&rect) {
            return Err(MappingError::Overlap { rect, existing });
        }

        let id = button.id();
        self.buttons.insert(id, button);
        Ok(id)
    }

    /// Insert without the overlap check, for tables loaded from disk.
    ///
    /// A button whose top-left cell is already taken replaces nothing and is
    /// returned as an error.
    pub(crate) fn insert_overlapping(&mut self, button: VirtualButton) -> Result<ButtonId, MappingError> {
        let rect = button.grid_rect;
        if !rect.fits(self.rows, self.cols) {
            return Err(MappingError::OutOfGrid {
                rect,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let id = button.id();
        if self.buttons.contains_key(&id) {
            return Err(MappingError::Overlap { rect, existing: id });
        }
        self.buttons.insert(id, button);
        Ok(id)
    }

    pub fn remove(&mut self, id: ButtonId) -> Result<VirtualButton, MappingError> {
        self.buttons
            .shift_remove(&id)
            .ok_or(MappingError::NotFound(id))
    }

    pub fn get(&self, id: ButtonId) -> Option<&VirtualButton> {
        self.buttons.get(&id)
    }

    pub fn get_mut(&mut self, id: ButtonId) -> Result<&mut VirtualButton, MappingError> {
        self.buttons.get_mut(&id).ok_or(MappingError::NotFound(id))
    }

    pub fn contains(&self, id: ButtonId) -> bool {
        self.buttons.contains_key(&id)
    }

    /// Buttons in table order
    pub fn iter(&self) -> impl Iterator<Item = &VirtualButton> {
        self.buttons.values()
    }

    /// Button covering a grid cell, if any
    pub fn button_at(&self, row: usize, col: usize) -> Option<ButtonId> {
        self.buttons
            .iter()
            .find(|(_, b)| b.grid_rect.contains(row, col))
            .map(|(id, _)| *id)
    }

    fn find_overlap(&self, rect: &GridRect) -> Option<ButtonId> {
        self.buttons
            .iter()
            .find(|(_, b)| b.grid_rect.overlaps(rect))
            .map(|(id, _)| *id)
    }

    /// Change grid dimensions, dropping every button that no longer fits.
    ///
    /// Returns the removed buttons in table order.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<Vec<VirtualButton>, MappingError> {
        if rows == 0 || cols == 0 {
            return Err(MappingError::InvalidGrid { rows, cols });
        }

        self.rows = rows;
        self.cols = cols;

        let mut removed = Vec::new();
        self.buttons.retain(|_, button| {
            if button.grid_rect.fits(rows, cols) {
                true
            } else {
                removed.push(button.clone());
                false
            }
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_overlap() {
        let a = GridRect::new(0, 0, 2, 2);
        assert!(a.overlaps(&GridRect::cell(1, 1)));
        assert!(!a.overlaps(&GridRect::cell(2, 0)));
        assert!(!a.overlaps(&GridRect::cell(0, 2)));
        assert!(a.contains(1, 0));
        assert!(!a.contains(2, 2));
    }

    #[test]
    fn test_rect_at_usize_limit_never_fits() {
        let far = GridRect::new(usize::MAX, 0, 1, 1);
        assert!(!far.fits(6, 5));
        assert!(!far.fits(usize::MAX, usize::MAX));
        assert!(!far.contains(0, 0));
        assert!(!far.overlaps(&GridRect::cell(0, 0)));

        let mut table = ButtonTable::new(3, 3);
        assert!(matches!(
            table.insert(VirtualButton::new("far", GridRect::new(0, usize::MAX, 1, 2))),
            Err(MappingError::OutOfGrid { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_zero_span_is_raised() {
        let rect = GridRect::new(1, 1, 0, 0);
        assert_eq!(rect.row_span, 1);
        assert_eq!(rect.col_span, 1);
    }

    #[test]
    fn test_turbo_delay_clamped() {
        let button = VirtualButton::new("b", GridRect::cell(0, 0)).with_turbo(true, 1);
        assert_eq!(button.turbo_delay_ms(), MIN_TURBO_DELAY_MS);
        assert_eq!(
            VirtualButton::new("b", GridRect::cell(0, 0)).turbo_delay_ms(),
            DEFAULT_TURBO_DELAY_MS
        );
    }

    #[test]
    fn test_map_key_normalizes() {
        let mut button = VirtualButton::new("b", GridRect::cell(0, 0));
        button.map_key("Num 1", Some(DeviceIdentity::default()));
        assert_eq!(button.mapped_key.as_deref(), Some("num 1"));
        assert!(button.mapped_device.is_none());

        button.unmap();
        assert!(button.mapped_key.is_none());
    }

    #[test]
    fn test_insert_rejects_overlap_and_out_of_grid() {
        let mut table = ButtonTable::new(3, 3);
        let id = table
            .insert(VirtualButton::new("big", GridRect::new(0, 0, 2, 2)))
            .unwrap();
        assert_eq!(id, ButtonId::new(0, 0));

        let err = table
            .insert(VirtualButton::new("x", GridRect::cell(1, 1)))
            .unwrap_err();
        assert_eq!(
            err,
            MappingError::Overlap {
                rect: GridRect::cell(1, 1),
                existing: id
            }
        );

        assert!(matches!(
            table.insert(VirtualButton::new("x", GridRect::new(2, 2, 1, 2))),
            Err(MappingError::OutOfGrid { .. })
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(table.button_at(1, 1), Some(id));
    }

    #[test]
    fn test_table_order_is_insertion_order() {
        let mut table = ButtonTable::new(2, 2);
        table.insert(VirtualButton::new("b", GridRect::cell(1, 1))).unwrap();
        table.insert(VirtualButton::new("a", GridRect::cell(0, 0))).unwrap();
        table.insert(VirtualButton::new("c", GridRect::cell(0, 1))).unwrap();
        table.remove(ButtonId::new(0, 0)).unwrap();

        let names: Vec<&str> = table.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(
            table.remove(ButtonId::new(0, 0)),
            Err(MappingError::NotFound(ButtonId::new(0, 0)))
        );
    }

    #[test]
    fn test_resize_drops_buttons_outside_grid() {
        let mut table = ButtonTable::new(4, 4);
        table.insert(VirtualButton::new("keep", GridRect::cell(0, 0))).unwrap();
        table.insert(VirtualButton::new("wide", GridRect::new(1, 0, 1, 3))).unwrap();
        table.insert(VirtualButton::new("far", GridRect::cell(3, 3))).unwrap();

        let removed = table.resize(2, 2).unwrap();
        let removed: Vec<&str> = removed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(removed, vec!["wide", "far"]);
        assert_eq!(table.len(), 1);
        assert_eq!((table.rows(), table.cols()), (2, 2));

        assert!(table.resize(0, 3).is_err());
        assert_eq!(table.rows(), 2);
    }

    #[test]
    fn test_insert_overlapping_allows_overlap() {
        let mut table = ButtonTable::new(3, 3);
        table
            .insert_overlapping(VirtualButton::new("a", GridRect::new(0, 0, 2, 2)))
            .unwrap();
        table
            .insert_overlapping(VirtualButton::new("b", GridRect::cell(1, 1)))
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table
            .insert_overlapping(VirtualButton::new("c", GridRect::cell(0, 0)))
            .is_err());
    }
}
