use axum::{
    extract::{multipart::Field, rejection::QueryRejection, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PortalError, Result};
use crate::models::paper::{
    Difficulty, DownloadResponse, Paper, PaperFilter, PaperUploadForm, UploadedFile,
};
use crate::services::{paper_service::PaperService, AppState};

fn service(state: &AppState) -> PaperService {
    PaperService::new(
        state.records.clone(),
        state.blobs.clone(),
        state.config.blob_store.bucket.clone(),
    )
}

pub async fn list_papers(
    State(state): State<Arc<AppState>>,
    filter: std::result::Result<Query<PaperFilter>, QueryRejection>,
) -> Result<Json<Vec<Paper>>> {
    let Query(filter) = filter.map_err(|e| PortalError::validation(e.body_text()))?;
    tracing::debug!(?filter, "Listing papers");

    let papers = service(&state).list(&filter).await?;
    Ok(Json(papers))
}

pub async fn featured_papers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Paper>>> {
    let papers = service(&state).featured().await?;
    Ok(Json(papers))
}

pub async fn get_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Paper>> {
    let paper = service(&state).get(&id).await?;
    Ok(Json(paper))
}

/// Records a download and hands back the file URLs.
pub async fn download_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>> {
    let paper = service(&state).record_download(&id).await?;
    Ok(Json(DownloadResponse::from(&paper)))
}

/// Multipart upload: text fields of [`PaperUploadForm`] plus a required
/// `question_paper` file and an optional `solution` file.
pub async fn upload_paper(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut question_paper = None;
    let mut solution = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "question_paper" => question_paper = Some(read_file(field).await?),
            "solution" => solution = Some(read_file(field).await?),
            _ => {
                let value = field.text().await.map_err(|e| {
                    PortalError::validation(format!("Unreadable field '{}': {}", name, e))
                })?;
                fields.insert(name, value);
            }
        }
    }

    let question_paper = question_paper
        .ok_or_else(|| PortalError::validation("A question_paper file is required"))?;
    let form = parse_form(&fields)?;

    let paper = service(&state)
        .upload(form, question_paper, solution)
        .await?;

    Ok((StatusCode::CREATED, Json(paper)))
}

async fn read_file(field: Field<'_>) -> Result<UploadedFile> {
    let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| PortalError::validation(format!("Failed to read '{}': {}", file_name, e)))?;

    Ok(UploadedFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

fn parse_form(fields: &HashMap<String, String>) -> Result<PaperUploadForm> {
    let text = |key: &str| fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default();

    let semester = text("semester")
        .parse::<u8>()
        .map_err(|_| PortalError::validation("Semester must be a number between 1 and 8"))?;
    let year = text("year")
        .parse::<i32>()
        .map_err(|_| PortalError::validation("Year must be a number"))?;
    let difficulty = match fields.get("difficulty").map(|v| v.trim()) {
        None | Some("") => Difficulty::default(),
        Some(raw) => raw.parse::<Difficulty>().map_err(PortalError::Validation)?,
    };

    Ok(PaperUploadForm {
        title: text("title"),
        subject: text("subject"),
        branch: text("branch"),
        semester,
        year,
        exam_type: text("exam_type"),
        difficulty,
        tags: text("tags"),
        chapters: text("chapters"),
    })
}
