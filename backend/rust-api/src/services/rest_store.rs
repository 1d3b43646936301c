use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::record_store::{Direction, Filter, FilterOp, Query, RecordStore, Table};
use crate::config::RecordStoreSettings;
use crate::error::{PortalError, Result};

/// Record store backed by a hosted PostgREST-style table API
/// (`{url}/rest/v1/{table}`), authenticated with the project's public key.
#[derive(Debug, Clone)]
pub struct RestRecordStore {
    client: Client,
    base: Url,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(settings: &RecordStoreSettings) -> anyhow::Result<Self> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Record store URL is not configured"))?;
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Record store API key is not configured"))?;

        let base = Url::parse(&format!("{}/rest/v1/", url.trim_end_matches('/')))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    fn table_url(&self, table: Table) -> Result<Url> {
        self.base
            .join(table.as_str())
            .map_err(|e| PortalError::query(format!("Invalid table URL: {}", e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, operation: &str, table: Table, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            PortalError::query(format!("{} {} failed: {}", operation, table.as_str(), e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PortalError::query(format!(
            "{} {} returned {}: {}",
            operation,
            table.as_str(),
            status,
            body
        )))
    }

    async fn rows(operation: &str, table: Table, response: Response) -> Result<Vec<Value>> {
        response.json::<Vec<Value>>().await.map_err(|e| {
            PortalError::query(format!(
                "{} {} returned an unreadable body: {}",
                operation,
                table.as_str(),
                e
            ))
        })
    }
}

/// Renders a filter as a `(column, "op.value")` query pair.
pub(crate) fn filter_pair(filter: &Filter) -> (String, String) {
    let op = match filter.op {
        FilterOp::Eq => "eq",
        FilterOp::Gte => "gte",
        FilterOp::NotNull => return (filter.column.clone(), "not.is.null".to_string()),
    };
    (filter.column.clone(), format!("{}.{}", op, literal(&filter.value)))
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    pairs.extend(query.filters.iter().map(filter_pair));

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }

    if let Some(limit) = query.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }

    pairs
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub(crate) fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl RecordStore for RestRecordStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().extend_pairs(query_pairs(query));

        tracing::debug!(table = table.as_str(), url = %url, "Selecting rows");
        let response = self
            .send("select", table, self.request(Method::GET, url))
            .await?;
        Self::rows("select", table, response).await
    }

    async fn count(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .extend_pairs(filters.iter().map(filter_pair));

        let response = self
            .send(
                "count",
                table,
                self.request(Method::HEAD, url)
                    .header("Prefer", "count=exact")
                    .header(header::RANGE, "0-0"),
            )
            .await?;

        response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| {
                PortalError::query(format!(
                    "count {} response is missing a Content-Range total",
                    table.as_str()
                ))
            })
    }

    async fn update_one(&self, table: Table, id: &str, fields: Value) -> Result<Value> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id));

        let response = self
            .send(
                "update",
                table,
                self.request(Method::PATCH, url)
                    .header("Prefer", "return=representation")
                    .json(&fields),
            )
            .await?;

        Self::rows("update", table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::not_found(format!("{} row '{}'", table.as_str(), id)))
    }

    async fn insert_one(&self, table: Table, fields: Value) -> Result<Value> {
        let url = self.table_url(table)?;

        let response = self
            .send(
                "insert",
                table,
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(&fields),
            )
            .await?;

        Self::rows("insert", table, response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortalError::query(format!("insert {} returned no row", table.as_str()))
            })
    }
}
