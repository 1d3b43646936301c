//! The table-store seam.
//!
//! The portal only needs four primitives from its hosted datastore: select
//! with equality/ordering predicates, count, update one row, insert one row.
//! Rows travel as JSON objects; typed access goes through the helpers at the
//! bottom of this module, which also record store metrics.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::error::{PortalError, Result};
use crate::metrics::track_store_operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Papers,
    MockTests,
    UserSessions,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Papers => "papers",
            Table::MockTests => "mock_tests",
            Table::UserSessions => "user_sessions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    NotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn new(column: &str, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.to_string(),
            op,
            value,
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value.into())
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte, value.into())
    }

    pub fn not_null(column: &str) -> Self {
        Self::new(column, FilterOp::NotNull, Value::Null)
    }

    /// Evaluates the predicate against a row held in memory.
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::NotNull => !field.is_null(),
            FilterOp::Eq => compare_values(field, &self.value) == Some(Ordering::Equal),
            FilterOp::Gte => matches!(
                compare_values(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Numbers compare numerically, RFC 3339 timestamps by instant, other strings
/// lexically, booleans by value. Mixed or null operands are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>>;

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64>;

    /// Merges `fields` into the row with the given id and returns the stored row.
    async fn update_one(&self, table: Table, id: &str, fields: Value) -> Result<Value>;

    /// Inserts a row and returns it as stored, including generated columns.
    async fn insert_one(&self, table: Table, fields: Value) -> Result<Value>;
}

pub async fn select_as<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    query: &Query,
) -> Result<Vec<T>> {
    track_store_operation("select", table.as_str(), async {
        let rows = store.select(table, query).await?;
        rows.into_iter().map(|row| decode_row(table, row)).collect()
    })
    .await
}

pub async fn find_by_id<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    id: &str,
) -> Result<T> {
    let query = Query::new().filter(Filter::eq("id", id)).limit(1);
    select_as::<T>(store, table, &query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PortalError::not_found(format!("{} row '{}'", table.as_str(), id)))
}

pub async fn count_rows(store: &dyn RecordStore, table: Table, filters: &[Filter]) -> Result<u64> {
    track_store_operation("count", table.as_str(), store.count(table, filters)).await
}

pub async fn update_as<T: DeserializeOwned>(
    store: &dyn RecordStore,
    table: Table,
    id: &str,
    fields: Value,
) -> Result<T> {
    track_store_operation("update", table.as_str(), async {
        let row = store.update_one(table, id, fields).await?;
        decode_row(table, row)
    })
    .await
}

pub async fn insert_as<T: DeserializeOwned, P: Serialize>(
    store: &dyn RecordStore,
    table: Table,
    payload: &P,
) -> Result<T> {
    let fields = serde_json::to_value(payload)
        .map_err(|e| PortalError::query(format!("Failed to encode {} row: {}", table.as_str(), e)))?;

    track_store_operation("insert", table.as_str(), async {
        let row = store.insert_one(table, fields).await?;
        decode_row(table, row)
    })
    .await
}

fn decode_row<T: DeserializeOwned>(table: Table, row: Value) -> Result<T> {
    serde_json::from_value(row)
        .map_err(|e| PortalError::query(format!("Malformed {} row: {}", table.as_str(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_eq_on_strings_and_numbers() {
        let row = json!({ "branch": "Civil Engineering", "semester": 4 });

        assert!(Filter::eq("branch", "Civil Engineering").matches(&row));
        assert!(!Filter::eq("branch", "civil engineering").matches(&row));
        assert!(Filter::eq("semester", 4).matches(&row));
        assert!(Filter::eq("semester", 4.0).matches(&row));
        assert!(!Filter::eq("semester", "4").matches(&row));
    }

    #[test]
    fn test_filter_ordering_predicates() {
        let row = json!({ "year": 2022, "upload_date": "2024-01-10T08:00:00Z" });

        assert!(Filter::gte("year", 2022).matches(&row));
        assert!(Filter::gte("year", 2021).matches(&row));
        assert!(!Filter::gte("year", 2023).matches(&row));
        assert!(Filter::gte("upload_date", "2024-01-01T00:00:00Z").matches(&row));
        assert!(Filter::gte("upload_date", "2024-01-10T08:00:00+00:00").matches(&row));
        assert!(!Filter::gte("upload_date", "2024-01-10T08:00:00.5Z").matches(&row));
    }

    #[test]
    fn test_timestamps_compare_by_instant() {
        let whole = json!("2024-05-01T10:00:05Z");
        let fraction = json!("2024-05-01T10:00:05.5Z");
        let offset = json!("2024-05-01T12:00:05+02:00");

        assert_eq!(compare_values(&fraction, &whole), Some(Ordering::Greater));
        assert_eq!(compare_values(&whole, &offset), Some(Ordering::Equal));
        assert_eq!(
            compare_values(&json!("Civil"), &json!("Computer")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_filter_not_null_and_missing_columns() {
        let with = json!({ "solution_url": "https://cdn.example/s.pdf" });
        let without = json!({ "solution_url": null });
        let absent = json!({});

        assert!(Filter::not_null("solution_url").matches(&with));
        assert!(!Filter::not_null("solution_url").matches(&without));
        assert!(!Filter::not_null("solution_url").matches(&absent));
        assert!(!Filter::eq("solution_url", "x").matches(&absent));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .filter(Filter::eq("branch", "Civil Engineering"))
            .order_by("download_count", Direction::Desc)
            .limit(6);

        assert_eq!(query.filters.len(), 1);
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                column: "download_count".into(),
                direction: Direction::Desc
            })
        );
        assert_eq!(query.limit, Some(6));
    }
}
