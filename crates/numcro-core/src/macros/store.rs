// Numcro Macro Store
// Insertion-ordered macro table with JSON load/save

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MacroDefinition, MacroError, Step};

/// JSON body of one macro; the id is the enclosing object's key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MacroBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    steps: Vec<Step>,
}

/// All known macros, keyed by id
#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    macros: IndexMap<Uuid, MacroDefinition>,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a JSON file; a missing file yields an empty store
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MacroError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No macro file at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write the store as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MacroError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(content: &str) -> Result<Self, MacroError> {
        let bodies: IndexMap<Uuid, MacroBody> = serde_json::from_str(content)?;
        let macros = bodies
            .into_iter()
            .map(|(id, body)| (id, MacroDefinition::new(id, body.name, body.steps)))
            .collect();
        Ok(Self { macros })
    }

    pub fn to_json(&self) -> Result<String, MacroError> {
        let bodies: IndexMap<Uuid, MacroBody> = self
            .macros
            .iter()
            .map(|(id, def)| {
                (
                    *id,
                    MacroBody {
                        name: def.name.clone(),
                        steps: def.steps.clone(),
                    },
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&bodies)?)
    }

    /// Insert or replace a macro, returning the previous definition
    pub fn insert(&mut self, def: MacroDefinition) -> Option<MacroDefinition> {
        self.macros.insert(def.id, def)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<MacroDefinition> {
        self.macros.shift_remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&MacroDefinition> {
        self.macros.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.macros.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.macros.values()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Replace one macro from an edited JSON body (`{"name", "steps"}`).
    ///
    /// The store is untouched if the macro is unknown or the JSON is invalid.
    pub fn replace_from_json(&mut self, id: Uuid, json: &str) -> Result<(), MacroError> {
        if !self.contains(id) {
            return Err(MacroError::NotFound(id));
        }
        let body: MacroBody = serde_json::from_str(json)?;
        self.macros
            .insert(id, MacroDefinition::new(id, body.name, body.steps));
        Ok(())
    }

    /// Pretty JSON body of one macro, as accepted by [`Self::replace_from_json`]
    pub fn body_json(&self, id: Uuid) -> Result<String, MacroError> {
        let def = self.get(id).ok_or(MacroError::NotFound(id))?;
        let body = MacroBody {
            name: def.name.clone(),
            steps: def.steps.clone(),
        };
        Ok(serde_json::to_string_pretty(&body)?)
    }
}
