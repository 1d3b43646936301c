use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record_store::{compare_values, Direction, Filter, Query, RecordStore, Table};
use crate::error::{PortalError, Result};

/// In-process table store used for offline development and tests.
///
/// Counter updates here are as unsynchronised as against the hosted store:
/// `update_one` overwrites whatever the caller read earlier.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    failing: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().extend(rows);
    }

    /// Snapshot of a table, for inspection in tests.
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .read()
            .await
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// While set, every call is rejected as if the hosted store were down.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            Err(PortalError::query("record store unavailable"))
        } else {
            Ok(())
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        self.check_available()?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            rows.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right).unwrap_or(Ordering::Equal);
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        self.check_available()?;

        let tables = self.tables.read().await;
        let count = tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| matches_all(row, filters)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn update_one(&self, table: Table, id: &str, fields: Value) -> Result<Value> {
        self.check_available()?;

        let Value::Object(fields) = fields else {
            return Err(PortalError::query("update payload must be a JSON object"));
        };

        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| PortalError::not_found(format!("{} row '{}'", table.as_str(), id)))?;

        if let Value::Object(existing) = row {
            for (key, value) in fields {
                existing.insert(key, value);
            }
            existing.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        Ok(row.clone())
    }

    async fn insert_one(&self, table: Table, fields: Value) -> Result<Value> {
        self.check_available()?;

        let Value::Object(mut row) = fields else {
            return Err(PortalError::query("insert payload must be a JSON object"));
        };

        let now = Value::String(Utc::now().to_rfc3339());
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert(now);

        let row = Value::Object(row);
        self.tables
            .write()
            .await
            .entry(table)
            .or_default()
            .push(row.clone());
        Ok(row)
    }
}
