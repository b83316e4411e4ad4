//! The record exercised by every compatibility check.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An asset as stored by the service under test.
///
/// `id` is stable across versions. `source` is the field the migration
/// stages rewrite, so it is the one most likely to drift between versions.
///
/// Decoding is strict on the three fields: each must be present and a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub source: String,
}

impl Asset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create an asset with a fresh random id.
    pub fn generate(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name, source)
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{id: {}, name: {}, source: {}}}",
            self.id, self.name, self.source
        )
    }
}
