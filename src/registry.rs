//! Named schemas collected during one generation run.
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::schema::Schema;

#[derive(Debug, Clone)]
struct Entry {
    /// Type expression the schema was derived from.
    origin: String,
    schema: Schema,
}

/// Component name → schema, each remembering the type that produced it so a
/// second, distinct type normalizing to the same name is caught instead of
/// silently sharing the first one's schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, Entry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.entries.get(name).map(|e| &e.schema)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.entries.get_mut(name).map(|e| &mut e.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn origin(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.origin.as_str())
    }

    /// Cached schema for `name`, provided it was registered from `origin`.
    pub fn lookup(&self, name: &str, origin: &str) -> Result<Option<&Schema>> {
        match self.entries.get(name) {
            None => Ok(None),
            Some(entry) if entry.origin == origin => Ok(Some(&entry.schema)),
            Some(entry) => Err(collision(name, &entry.origin, origin)),
        }
    }

    /// Insert unless the name is taken. Returns whether an entry was added;
    /// an existing entry from the same origin is left untouched.
    pub fn register(&mut self, name: &str, origin: &str, schema: Schema) -> Result<bool> {
        if let Some(entry) = self.entries.get(name) {
            if entry.origin != origin {
                return Err(collision(name, &entry.origin, origin));
            }
            return Ok(false);
        }
        tracing::debug!(name, origin, "registered component schema");
        self.entries.insert(name.to_string(), Entry { origin: origin.to_string(), schema });
        Ok(true)
    }

    /// Remove an entry, e.g. once an embedded struct has been flattened.
    pub fn retract(&mut self, name: &str) -> Option<Schema> {
        let entry = self.entries.remove(name)?;
        tracing::debug!(name, origin = %entry.origin, "retracted component schema");
        Some(entry.schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), &e.schema))
    }

    pub fn to_components(&self) -> BTreeMap<String, Schema> {
        self.iter().map(|(name, schema)| (name.to_string(), schema.clone())).collect()
    }
}

fn collision(name: &str, existing: &str, incoming: &str) -> Error {
    Error::ComponentCollision {
        name: name.to_string(),
        existing: existing.to_string(),
        incoming: incoming.to_string(),
    }
}
