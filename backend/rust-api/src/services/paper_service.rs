use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::aggregation::increment_download;
use super::blob_store::{object_path, BlobStore};
use super::record_store::{
    find_by_id, insert_as, select_as, update_as, Direction, Filter, Query,
    RecordStore, Table,
};
use crate::error::{PortalError, Result};
use crate::metrics::{BLOB_UPLOADS_TOTAL, PAPERS_UPLOADED_TOTAL, PAPER_DOWNLOADS_TOTAL};
use crate::models::paper::{parse_list, NewPaper, Paper, PaperFilter, PaperUploadForm, UploadedFile};

pub const FEATURED_LIMIT: usize = 6;

const QUESTION_PAPER_FOLDER: &str = "papers";
const SOLUTION_FOLDER: &str = "solutions";

pub struct PaperService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    bucket: String,
}

impl PaperService {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>, bucket: String) -> Self {
        Self {
            records,
            blobs,
            bucket,
        }
    }

    /// Gallery listing, newest upload first. Equality filters run in the
    /// record store; the free-text search runs over the returned rows.
    pub async fn list(&self, filter: &PaperFilter) -> Result<Vec<Paper>> {
        let mut query = Query::new().order_by("upload_date", Direction::Desc);

        if let Some(branch) = filter.branch() {
            query = query.filter(Filter::eq("branch", branch));
        }
        if let Some(subject) = filter.subject() {
            query = query.filter(Filter::eq("subject", subject));
        }
        if let Some(semester) = filter.semester {
            query = query.filter(Filter::eq("semester", semester));
        }
        if let Some(year) = filter.year {
            query = query.filter(Filter::eq("year", year));
        }
        if let Some(exam_type) = filter.exam_type() {
            query = query.filter(Filter::eq("exam_type", exam_type));
        }
        if filter.solutions_only {
            query = query.filter(Filter::not_null("solution_url"));
        }

        let papers: Vec<Paper> = select_as(self.records.as_ref(), Table::Papers, &query).await?;
        let papers: Vec<Paper> = papers
            .into_iter()
            .filter(|paper| filter.matches_search(paper))
            .collect();

        tracing::debug!(count = papers.len(), "Listed papers");
        Ok(papers)
    }

    /// Most downloaded papers.
    pub async fn featured(&self) -> Result<Vec<Paper>> {
        let query = Query::new()
            .order_by("download_count", Direction::Desc)
            .limit(FEATURED_LIMIT);
        select_as(self.records.as_ref(), Table::Papers, &query).await
    }

    pub async fn get(&self, id: &str) -> Result<Paper> {
        find_by_id(self.records.as_ref(), Table::Papers, id).await
    }

    /// Reads the paper, bumps its counter and writes the new value back.
    /// Two concurrent downloads may both write the same value.
    pub async fn record_download(&self, id: &str) -> Result<Paper> {
        let paper = self.get(id).await?;
        let next = increment_download(&paper);

        let updated: Paper = update_as(
            self.records.as_ref(),
            Table::Papers,
            id,
            json!({ "download_count": next.download_count }),
        )
        .await?;

        PAPER_DOWNLOADS_TOTAL.inc();
        tracing::info!(
            paper_id = %id,
            download_count = updated.download_count,
            "Paper download recorded"
        );
        Ok(updated)
    }

    /// Stores the files, then inserts the paper row. Any blob failure aborts
    /// before the row is written.
    pub async fn upload(
        &self,
        form: PaperUploadForm,
        question_paper: UploadedFile,
        solution: Option<UploadedFile>,
    ) -> Result<Paper> {
        form.validate()?;

        if question_paper.bytes.is_empty() {
            return Err(PortalError::validation("Question paper file is empty"));
        }

        let question_paper_url = self
            .store_file(QUESTION_PAPER_FOLDER, "question_paper", question_paper)
            .await?;

        let solution_url = match solution.filter(|file| !file.bytes.is_empty()) {
            Some(file) => Some(self.store_file(SOLUTION_FOLDER, "solution", file).await?),
            None => None,
        };

        let new_paper = NewPaper {
            title: form.title.trim().to_string(),
            subject: form.subject.trim().to_string(),
            branch: form.branch,
            semester: form.semester,
            year: form.year,
            exam_type: form.exam_type,
            difficulty: form.difficulty,
            question_paper_url,
            solution_url,
            tags: parse_list(&form.tags),
            chapters: parse_list(&form.chapters),
            upload_date: Utc::now(),
            download_count: 0,
            verified: true,
            rating: 0.0,
        };

        let paper: Paper = insert_as(self.records.as_ref(), Table::Papers, &new_paper).await?;

        PAPERS_UPLOADED_TOTAL.inc();
        tracing::info!(paper_id = %paper.id, title = %paper.title, "Paper uploaded");
        Ok(paper)
    }

    async fn store_file(&self, folder: &str, kind: &str, file: UploadedFile) -> Result<String> {
        let path = object_path(folder, &file.file_name, Utc::now());

        let result = self
            .blobs
            .upload(&self.bucket, &path, file.bytes, &file.content_type)
            .await;

        let status = if result.is_ok() { "success" } else { "error" };
        BLOB_UPLOADS_TOTAL.with_label_values(&[kind, status]).inc();
        result?;

        Ok(self.blobs.public_url(&self.bucket, &path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::paper::Difficulty;
    use crate::services::blob_store::MemoryBlobStore;
    use crate::services::memory_store::MemoryRecordStore;

    fn paper_row(id: &str, title: &str, downloads: u64, uploaded: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "subject": "DSA",
            "branch": "Computer Engineering",
            "semester": 3,
            "year": 2023,
            "exam_type": "External",
            "question_paper_url": format!("https://cdn.example/{}.pdf", id),
            "solution_url": null,
            "upload_date": uploaded,
            "download_count": downloads
        })
    }

    fn form() -> PaperUploadForm {
        PaperUploadForm {
            title: "Operating Systems External".into(),
            subject: "OS".into(),
            branch: "Information Technology".into(),
            semester: 4,
            year: 2024,
            exam_type: "External".into(),
            difficulty: Difficulty::Hard,
            tags: "scheduling, memory".into(),
            chapters: "Processes".into(),
        }
    }

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    async fn service() -> (PaperService, Arc<MemoryRecordStore>, Arc<MemoryBlobStore>) {
        let records = Arc::new(MemoryRecordStore::new());
        records
            .seed(
                Table::Papers,
                vec![
                    paper_row("p1", "DSA 2022", 10, "2024-01-01T00:00:00Z"),
                    paper_row("p2", "DSA 2023", 30, "2024-02-01T00:00:00Z"),
                ],
            )
            .await;
        let blobs = Arc::new(MemoryBlobStore::default());
        let service = PaperService::new(records.clone(), blobs.clone(), "papers".into());
        (service, records, blobs)
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (service, _, _) = service().await;
        let papers = service.list(&PaperFilter::default()).await.unwrap();
        let ids: Vec<_> = papers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_featured_orders_by_downloads() {
        let (service, _, _) = service().await;
        let papers = service.featured().await.unwrap();
        assert_eq!(papers[0].id, "p2");
    }

    #[tokio::test]
    async fn test_record_download_increments_by_one() {
        let (service, records, _) = service().await;
        let paper = service.record_download("p1").await.unwrap();
        assert_eq!(paper.download_count, 11);

        let rows = records.rows(Table::Papers).await;
        let stored = rows.iter().find(|r| r["id"] == "p1").unwrap();
        assert_eq!(stored["download_count"], 11);
    }

    #[tokio::test]
    async fn test_record_download_unknown_paper() {
        let (service, _, _) = service().await;
        assert!(matches!(
            service.record_download("missing").await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_stores_files_then_row() {
        let (service, records, blobs) = service().await;

        let paper = service
            .upload(form(), pdf("os.pdf"), Some(pdf("os-solution.pdf")))
            .await
            .unwrap();

        assert!(paper.verified);
        assert_eq!(paper.download_count, 0);
        assert_eq!(paper.rating, 0.0);
        assert_eq!(paper.tags, vec!["scheduling", "memory"]);
        assert!(paper.question_paper_url.contains("/papers/papers/"));
        assert!(paper
            .solution_url
            .as_deref()
            .is_some_and(|url| url.contains("/papers/solutions/")));
        assert_eq!(blobs.len().await, 2);
        assert_eq!(records.rows(Table::Papers).await.len(), 3);
    }

    #[tokio::test]
    async fn test_blob_failure_leaves_table_unchanged() {
        let (service, records, blobs) = service().await;
        blobs.set_failing(true);

        let err = service.upload(form(), pdf("os.pdf"), None).await.unwrap_err();
        assert!(matches!(err, PortalError::Upload(_)));
        assert_eq!(records.rows(Table::Papers).await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_form_uploads_nothing() {
        let (service, _, blobs) = service().await;
        let mut bad = form();
        bad.semester = 11;

        let err = service.upload(bad, pdf("os.pdf"), None).await.unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert_eq!(blobs.len().await, 0);
    }
}
