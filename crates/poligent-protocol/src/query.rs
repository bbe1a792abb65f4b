//! QUERY response bodies
//!
//! Routers answer a QUERY with a column-oriented table: a list of attribute
//! names and one row of values per entity. Peers may also answer with a
//! plain list of objects; both shapes are turned into records here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Tabular QUERY result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub attribute_names: Vec<String>,
    pub results: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Build a table from records, taking the union of their attributes
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut attribute_names: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !attribute_names.contains(key) {
                    attribute_names.push(key.clone());
                }
            }
        }

        let results = records
            .iter()
            .map(|record| {
                attribute_names
                    .iter()
                    .map(|name| record.get(name).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self {
            attribute_names,
            results,
        }
    }

    /// Zip each row with the attribute names
    ///
    /// Null cells are kept, so a table and a list of the same records read
    /// back identically.
    pub fn into_records(self) -> Result<Vec<Map<String, Value>>, ProtocolError> {
        let width = self.attribute_names.len();
        self.results
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() != width {
                    return Err(ProtocolError::InvalidQueryResult(format!(
                        "row {} has {} values for {} attributes",
                        i,
                        row.len(),
                        width
                    )));
                }
                Ok(self
                    .attribute_names
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect())
            })
            .collect()
    }
}

/// Convert a QUERY response body into records
pub fn records_from_body(body: Value) -> Result<Vec<Map<String, Value>>, ProtocolError> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(ProtocolError::InvalidQueryResult(format!(
                    "expected an object, got {}",
                    other
                ))),
            })
            .collect(),
        body @ Value::Object(_) => {
            let table: QueryResult = serde_json::from_value(body)?;
            table.into_records()
        }
        other => Err(ProtocolError::InvalidQueryResult(format!(
            "unexpected body {}",
            other
        ))),
    }
}
