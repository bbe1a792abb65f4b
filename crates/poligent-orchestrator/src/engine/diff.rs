//! Diffing desired against actual state

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use poligent_core::types::unit_name;
use poligent_core::{fields_match, DesiredState, Unit};
use poligent_protocol::Operation;

/// Observed units indexed by name
pub type ActualState = BTreeMap<String, Unit>;

/// Kind of corrective operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    /// Management operation carrying out this change
    pub fn operation(&self) -> Operation {
        match self {
            ChangeKind::Create => Operation::Create,
            ChangeKind::Update => Operation::Update,
            ChangeKind::Delete => Operation::Delete,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "creating"),
            ChangeKind::Update => write!(f, "updating"),
            ChangeKind::Delete => write!(f, "deleting"),
        }
    }
}

/// One scheduled corrective operation
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Unit name
    pub name: String,
    /// Desired specification for create/update, observed record for delete
    pub unit: Unit,
}

/// Index a fetched snapshot by unit name.
///
/// Records without a string name cannot be addressed and are skipped.
pub fn index_by_name(records: Vec<Unit>) -> ActualState {
    let mut actual = ActualState::new();
    for record in records {
        match unit_name(&record) {
            Some(name) => {
                actual.insert(name.to_string(), record);
            }
            None => {
                let record = Value::Object(record);
                tracing::warn!("Ignoring unnamed unit {}", record);
            }
        }
    }
    actual
}

/// Corrective operations that move `actual` toward `desired`.
///
/// Creates and updates come first in name order, then deletes.
pub fn plan(desired: &DesiredState, actual: &ActualState) -> Vec<Change> {
    let mut changes = Vec::new();

    for (name, spec) in desired.iter() {
        let kind = match actual.get(name) {
            None => ChangeKind::Create,
            Some(record) if !fields_match(spec, record) => ChangeKind::Update,
            Some(_) => continue,
        };
        changes.push(Change {
            kind,
            name: name.clone(),
            unit: spec.clone(),
        });
    }

    for (name, record) in actual {
        if !desired.contains(name) {
            changes.push(Change {
                kind: ChangeKind::Delete,
                name: name.clone(),
                unit: record.clone(),
            });
        }
    }

    changes
}
