use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::error::{PortalError, Result};
use crate::models::mock_test::{MockTest, MockTestFilter, MockTestSummary};
use crate::services::{mock_test_service::MockTestService, AppState};

pub async fn list_mock_tests(
    State(state): State<Arc<AppState>>,
    filter: std::result::Result<Query<MockTestFilter>, QueryRejection>,
) -> Result<Json<Vec<MockTestSummary>>> {
    let Query(filter) = filter.map_err(|e| PortalError::validation(e.body_text()))?;

    let tests = MockTestService::new(state.records.clone())
        .list(&filter)
        .await?;
    Ok(Json(tests.iter().map(MockTestSummary::from).collect()))
}

pub async fn get_mock_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MockTest>> {
    let test = MockTestService::new(state.records.clone()).get(&id).await?;
    Ok(Json(test))
}

/// Counts an attempt and returns the full test, questions included.
pub async fn start_mock_test(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MockTest>> {
    let test = MockTestService::new(state.records.clone())
        .start(&id)
        .await?;
    Ok(Json(test))
}
