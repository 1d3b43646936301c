use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;

use super::aggregation::compute_stats;
use super::record_store::{count_rows, select_as, Filter, Query, RecordStore, Table};
use crate::error::Result;
use crate::models::{mock_test::MockTest, paper::Paper, stats::DashboardSummary};

pub const RECENT_UPLOAD_WINDOW_DAYS: i64 = 7;

pub struct AnalyticsService {
    records: Arc<dyn RecordStore>,
}

impl AnalyticsService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Reads all papers, all mock tests, the session count and the recent
    /// upload count in parallel, then folds them into the dashboard summary.
    pub async fn summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary> {
        let store = self.records.as_ref();
        let all = Query::new();

        let since = (now - Duration::days(RECENT_UPLOAD_WINDOW_DAYS))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let recent_filter = [Filter::gte("upload_date", since)];

        let (papers, tests, sessions, recent) = futures::try_join!(
            select_as::<Paper>(store, Table::Papers, &all),
            select_as::<MockTest>(store, Table::MockTests, &all),
            count_rows(store, Table::UserSessions, &[]),
            count_rows(store, Table::Papers, &recent_filter),
        )?;

        let stats = compute_stats(&papers, &tests, sessions);

        tracing::debug!(
            total_papers = stats.total_papers,
            total_mock_tests = stats.total_mock_tests,
            recent_uploads = recent,
            "Dashboard summary computed"
        );

        Ok(DashboardSummary {
            stats,
            recent_uploads: recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;
    use crate::services::memory_store::MemoryRecordStore;
    use serde_json::json;

    fn paper(id: &str, subject: &str, downloads: u64, uploaded: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": id,
            "subject": subject,
            "branch": "Computer Engineering",
            "semester": 3,
            "year": 2023,
            "exam_type": "External",
            "question_paper_url": "https://cdn.example/x.pdf",
            "upload_date": uploaded,
            "download_count": downloads
        })
    }

    #[tokio::test]
    async fn test_summary_combines_all_tables() {
        let records = Arc::new(MemoryRecordStore::new());
        records
            .seed(
                Table::Papers,
                vec![
                    paper("a", "DSA", 10, "2024-03-09T00:00:00Z"),
                    paper("b", "DSA", 5, "2024-01-01T00:00:00Z"),
                    paper("c", "CN", 5, "2024-03-05T00:00:00Z"),
                ],
            )
            .await;
        records
            .seed(
                Table::UserSessions,
                vec![json!({ "id": "s1" }), json!({ "id": "s2" })],
            )
            .await;

        let now = DateTime::parse_from_rfc3339("2024-03-10T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let summary = AnalyticsService::new(records).summary(now).await.unwrap();

        assert_eq!(summary.stats.total_papers, 3);
        assert_eq!(summary.stats.total_downloads, 20);
        assert_eq!(summary.stats.active_students, 2);
        assert_eq!(summary.stats.total_mock_tests, 0);
        assert_eq!(summary.stats.per_subject[0].subject, "DSA");
        assert_eq!(summary.stats.per_subject[0].percentage, 75.0);
        assert_eq!(summary.recent_uploads, 2);
    }

    #[tokio::test]
    async fn test_summary_propagates_store_failure() {
        let records = Arc::new(MemoryRecordStore::new());
        records.set_failing(true);

        let err = AnalyticsService::new(records)
            .summary(Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Query(_)));
    }
}
