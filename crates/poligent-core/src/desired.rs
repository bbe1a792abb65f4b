//! Desired-state document
//!
//! The document is a JSON object mapping unit names to unit specifications.
//! The mapping key is authoritative: after loading, every unit's `name`
//! attribute equals its key.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::DesiredStateError;
use crate::types::{Unit, NAME_FIELD};

/// Validated, name-normalized desired configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    units: BTreeMap<String, Unit>,
}

/// A unit whose embedded name disagreed with its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOverride {
    /// Mapping key, now the unit's name
    pub key: String,
    /// Name the document declared
    pub declared: Value,
}

impl DesiredState {
    /// Empty desired state (every unit on a peer is surplus)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse and normalize a JSON document
    pub fn from_json_str(data: &str) -> Result<Self, DesiredStateError> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_value(value)
    }

    /// Validate and normalize an already-parsed document
    pub fn from_value(value: Value) -> Result<Self, DesiredStateError> {
        let Value::Object(entries) = value else {
            return Err(DesiredStateError::NotAMapping);
        };

        let mut units = BTreeMap::new();
        for (key, unit) in entries {
            match unit {
                Value::Object(unit) => {
                    units.insert(key, unit);
                }
                _ => return Err(DesiredStateError::InvalidUnit(key)),
            }
        }

        ensure_name(&mut units);
        Ok(Self { units })
    }

    /// Read, parse and normalize the document at `path`
    pub async fn load(path: &Path) -> Result<Self, DesiredStateError> {
        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DesiredStateError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&data)
    }

    /// Specification for a unit
    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// Whether a unit is desired
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Units in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Unit)> {
        self.units.iter()
    }

    /// Number of desired units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if no units are desired
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// JSON rendering, used for logging
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.units
                .iter()
                .map(|(k, v)| (k.clone(), Value::Object(v.clone())))
                .collect(),
        )
    }
}

/// Force every unit's `name` to equal its mapping key.
///
/// Missing names are filled in silently. A conflicting name is overwritten
/// and logged as a warning; the overrides are returned.
pub fn ensure_name(units: &mut BTreeMap<String, Unit>) -> Vec<NameOverride> {
    let mut overrides = Vec::new();

    for (key, unit) in units.iter_mut() {
        let wanted = Value::String(key.clone());
        match unit.insert(NAME_FIELD.to_string(), wanted.clone()) {
            Some(declared) if declared != wanted => {
                tracing::warn!("Overriding name {} with key {}", declared, key);
                overrides.push(NameOverride {
                    key: key.clone(),
                    declared,
                });
            }
            _ => {}
        }
    }

    overrides
}
