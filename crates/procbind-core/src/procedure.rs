//! Stored-procedure names used by an entity manager

use serde::{Deserialize, Serialize};

/// The four procedures an entity manager calls
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcedureNames {
    /// Inserts or updates one entity
    pub save: String,
    /// Deletes one entity, or the entities matching a filter
    pub delete: String,
    /// Returns the single entity matching a filter
    pub get: String,
    /// Returns every entity matching a filter
    pub list: String,
}

impl ProcedureNames {
    pub fn new(
        save: impl Into<String>,
        delete: impl Into<String>,
        get: impl Into<String>,
        list: impl Into<String>,
    ) -> Self {
        Self {
            save: save.into(),
            delete: delete.into(),
            get: get.into(),
            list: list.into(),
        }
    }

    /// Names of procedures left blank
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("save", &self.save),
            ("delete", &self.delete),
            ("get", &self.get),
            ("list", &self.list),
        ]
        .into_iter()
        .filter(|(_, name)| name.trim().is_empty())
        .map(|(role, _)| role)
        .collect()
    }
}
