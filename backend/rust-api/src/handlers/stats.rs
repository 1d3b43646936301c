use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::error::Result;
use crate::models::stats::DashboardSummary;
use crate::services::{analytics_service::AnalyticsService, AppState};

pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardSummary>> {
    let summary = AnalyticsService::new(state.records.clone())
        .summary(Utc::now())
        .await?;
    Ok(Json(summary))
}
