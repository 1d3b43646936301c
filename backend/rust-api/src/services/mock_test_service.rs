use serde_json::json;
use std::sync::Arc;

use super::aggregation::increment_attempt;
use super::record_store::{
    find_by_id, select_as, update_as, Direction, Filter, Query, RecordStore, Table,
};
use crate::error::Result;
use crate::metrics::TEST_ATTEMPTS_TOTAL;
use crate::models::mock_test::{MockTest, MockTestFilter};

pub struct MockTestService {
    records: Arc<dyn RecordStore>,
}

impl MockTestService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn list(&self, filter: &MockTestFilter) -> Result<Vec<MockTest>> {
        let mut query = Query::new().order_by("created_date", Direction::Desc);

        if let Some(branch) = filter.branch() {
            query = query.filter(Filter::eq("branch", branch));
        }
        if let Some(subject) = filter.subject() {
            query = query.filter(Filter::eq("subject", subject));
        }
        if let Some(semester) = filter.semester {
            query = query.filter(Filter::eq("semester", semester));
        }
        if let Some(difficulty) = filter.difficulty {
            query = query.filter(Filter::eq("difficulty", difficulty.as_str()));
        }

        select_as(self.records.as_ref(), Table::MockTests, &query).await
    }

    pub async fn get(&self, id: &str) -> Result<MockTest> {
        find_by_id(self.records.as_ref(), Table::MockTests, id).await
    }

    /// Records one attempt and returns the test with its questions.
    pub async fn start(&self, id: &str) -> Result<MockTest> {
        let test = self.get(id).await?;
        let next = increment_attempt(&test);

        let updated: MockTest = update_as(
            self.records.as_ref(),
            Table::MockTests,
            id,
            json!({ "attempt_count": next.attempt_count }),
        )
        .await?;

        TEST_ATTEMPTS_TOTAL.inc();
        tracing::info!(
            test_id = %id,
            attempt_count = updated.attempt_count,
            "Mock test attempt recorded"
        );
        Ok(updated)
    }
}
