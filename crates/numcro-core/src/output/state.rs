// Numcro Pressed Key State Management
// HashSet-based O(1) lookup of keys currently held down by an output sink

use std::collections::HashSet;

/// Tracks pressed keys with O(1) lookup performance
#[derive(Debug, Clone, Default)]
pub struct PressedKeyState {
    pressed: HashSet<String>,
}

impl PressedKeyState {
    /// Create a new empty pressed key state
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to the pressed state
    pub fn add(&mut self, key: &str) {
        self.pressed.insert(key.to_string());
    }

    /// Remove a key from the pressed state
    pub fn remove(&mut self, key: &str) {
        self.pressed.remove(key);
    }

    /// Check if a key is currently pressed
    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(key)
    }

    /// Get all pressed keys, sorted
    pub fn get_all(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pressed.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Remove and return every pressed key
    pub fn drain(&mut self) -> Vec<String> {
        let keys = self.get_all();
        self.pressed.clear();
        keys
    }

    /// Clear all pressed keys
    pub fn clear(&mut self) {
        self.pressed.clear();
    }

    pub fn len(&self) -> usize {
        self.pressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }
}
