//! In-memory router peer for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Barrier;

use poligent_core::types::unit_name;
use poligent_core::{ManagementClient, ManagementError, Unit};
use poligent_protocol::{records_from_body, Operation, QueryResult};

/// Router that keeps its units in memory and records every call
#[derive(Default)]
pub struct MemoryRouter {
    units: Mutex<BTreeMap<String, Unit>>,
    calls: Mutex<Vec<(Operation, String)>>,
    fail: Mutex<Option<(Operation, String)>>,
    fail_list: Mutex<bool>,
    /// Attributes the router adds to every stored unit
    defaults: Unit,
    /// Attribute dropped from the next writes
    dropped: Mutex<Option<(String, u32)>>,
    /// Every snapshot gets a fresh value for this attribute
    churn: Option<String>,
    lists: AtomicU32,
    /// Answer snapshots as an attribute table instead of a list
    tabular: bool,
    /// Every write waits here until the whole batch has arrived
    gate: Option<Arc<Barrier>>,
}

impl MemoryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router already holding `units`
    pub fn with_units(units: Vec<Value>) -> Self {
        let router = Self::new();
        for unit in units {
            router.insert(serde_json::from_value(unit).unwrap());
        }
        router
    }

    /// Router that adds `defaults` to everything it stores
    pub fn with_defaults(defaults: Value) -> Self {
        Self {
            defaults: serde_json::from_value(defaults).unwrap(),
            ..Self::default()
        }
    }

    /// Router whose snapshots never stabilize on `field`
    pub fn churning(field: &str) -> Self {
        Self {
            churn: Some(field.to_string()),
            ..Self::default()
        }
    }

    /// Report snapshots the way a router does, as a QUERY table
    pub fn tabular(mut self) -> Self {
        self.tabular = true;
        self
    }

    /// Hold every write until `writes` of them are in flight at once
    pub fn gated(mut self, writes: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(writes)));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn insert(&self, unit: Unit) {
        let name = unit_name(&unit).unwrap().to_string();
        self.units.lock().unwrap().insert(name, unit);
    }

    /// Fail the given operation on the given unit
    pub fn fail_on(&self, operation: Operation, name: &str) {
        *self.fail.lock().unwrap() = Some((operation, name.to_string()));
    }

    /// Fail every snapshot request
    pub fn fail_list(&self) {
        *self.fail_list.lock().unwrap() = true;
    }

    /// Silently drop `field` from the next `times` writes
    pub fn drop_field(&self, field: &str, times: u32) {
        *self.dropped.lock().unwrap() = Some((field.to_string(), times));
    }

    pub fn units(&self) -> BTreeMap<String, Unit> {
        self.units.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Mutating calls only
    pub fn writes(&self) -> Vec<(Operation, String)> {
        self.calls()
            .into_iter()
            .filter(|(op, _)| *op != Operation::Query)
            .collect()
    }

    pub fn list_count(&self) -> u32 {
        self.lists.load(Ordering::SeqCst)
    }

    fn record(&self, operation: Operation, unit: &Unit) -> Result<String, ManagementError> {
        let name = unit_name(unit)
            .ok_or(ManagementError::UnnamedUnit)?
            .to_string();
        self.calls.lock().unwrap().push((operation, name.clone()));

        let fail = self.fail.lock().unwrap().clone();
        if fail == Some((operation, name.clone())) {
            return Err(ManagementError::Rejected {
                operation,
                name,
                status_code: 500,
                description: "injected failure".to_string(),
            });
        }
        Ok(name)
    }

    async fn wait_for_batch(&self) {
        match &self.gate {
            Some(gate) => {
                gate.wait().await;
            }
            None => tokio::task::yield_now().await,
        }
    }

    fn store(&self, name: String, spec: &Unit, merge: bool) {
        let mut units = self.units.lock().unwrap();
        let mut stored = if merge {
            units.get(&name).cloned().unwrap_or_default()
        } else {
            self.defaults.clone()
        };
        for (k, v) in spec {
            stored.insert(k.clone(), v.clone());
        }

        let mut dropped = self.dropped.lock().unwrap();
        if let Some((field, remaining)) = dropped.as_mut() {
            if *remaining > 0 {
                stored.remove(field.as_str());
                *remaining -= 1;
            }
        }

        units.insert(name, stored);
    }
}

#[async_trait]
impl ManagementClient for MemoryRouter {
    async fn list_units(&self) -> Result<Vec<Unit>, ManagementError> {
        let n = self.lists.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((Operation::Query, String::new()));
        tokio::task::yield_now().await;

        if *self.fail_list.lock().unwrap() {
            return Err(ManagementError::ConnectionClosed);
        }

        let mut units: Vec<Unit> = self.units.lock().unwrap().values().cloned().collect();
        if let Some(field) = &self.churn {
            for unit in &mut units {
                unit.insert(field.clone(), Value::from(n));
            }
        }
        if self.tabular {
            let table = serde_json::to_value(QueryResult::from_records(&units)).unwrap();
            units = records_from_body(table).unwrap();
        }
        Ok(units)
    }

    async fn create(&self, spec: &Unit) -> Result<(), ManagementError> {
        let name = self.record(Operation::Create, spec)?;
        self.wait_for_batch().await;
        self.store(name, spec, false);
        Ok(())
    }

    async fn update(&self, spec: &Unit) -> Result<(), ManagementError> {
        let name = self.record(Operation::Update, spec)?;
        self.wait_for_batch().await;
        self.store(name, spec, true);
        Ok(())
    }

    async fn delete(&self, record: &Unit) -> Result<(), ManagementError> {
        let name = self.record(Operation::Delete, record)?;
        self.wait_for_batch().await;
        self.units.lock().unwrap().remove(&name);
        Ok(())
    }
}
